use crate::cmd::{load_config, open_store};
use crate::output::{or_dash, print_fields, print_json, print_table};
use crate::root::Paths;
use anyhow::Context;
use hotload_core::{FailureReason, InstallHost, Pipeline, ReqwestClient, RunOutcome, RunReport};
use std::path::PathBuf;

pub fn run(paths: &Paths, install: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = load_config(paths)?;
    for w in config.ensure_valid()? {
        tracing::warn!("config: {}", w.message);
    }

    let target = install.unwrap_or_else(|| paths.default_install(&config.script_path));
    let store = open_store(paths)?;
    let http = ReqwestClient::new().context("failed to build HTTP client")?;
    let mut pipeline = Pipeline::new(config, http, store, InstallHost::new(&target));

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(pipeline.run());

    if json {
        #[derive(serde::Serialize)]
        struct RunOutput<'a> {
            #[serde(flatten)]
            report: &'a RunReport,
            install: String,
            health: Option<hotload_core::HealthReport>,
        }

        let health = pipeline
            .health_report()
            .context("failed to read health record")?;
        print_json(&RunOutput {
            report: &report,
            install: target.display().to_string(),
            health,
        })?;
    } else {
        print_summary(&report, &target);
    }

    match &report.outcome {
        RunOutcome::Succeeded { .. } => Ok(()),
        RunOutcome::Failed { reason } => anyhow::bail!("update failed: {}", describe(reason)),
    }
}

fn describe(reason: &FailureReason) -> String {
    match reason {
        FailureReason::AllSourcesExhausted {
            candidates,
            attempts,
        } => format!("all {candidates} sources exhausted after {attempts} attempts"),
        FailureReason::Activation { message } => format!("activation failed: {message}"),
    }
}

fn print_summary(report: &RunReport, target: &std::path::Path) {
    let outcome = match &report.outcome {
        RunOutcome::Succeeded { source, bytes } => format!("succeeded from {source} ({bytes} bytes)"),
        RunOutcome::Failed { .. } => "failed".to_string(),
    };
    let revision = match (&report.revision, report.revision_from_cache) {
        (Some(rev), true) => format!("{} (last recorded)", rev.short()),
        (Some(rev), false) => rev.short().to_string(),
        (None, _) => format!("- ({})", or_dash(report.resolve_error.as_deref())),
    };
    print_fields(&[
        ("run", report.run_id.to_string()),
        ("outcome", outcome),
        ("revision", revision),
        ("attempts", report.fetch_attempts.to_string()),
        ("elapsed", format!("{}ms", report.elapsed_ms)),
        ("install", target.display().to_string()),
    ]);

    if !report.candidates.is_empty() {
        println!();
        let rows = report
            .candidates
            .iter()
            .map(|c| {
                vec![
                    c.priority.to_string(),
                    c.label.clone(),
                    c.url().unwrap_or("(local cache)").to_string(),
                ]
            })
            .collect();
        print_table(&["#", "SOURCE", "LOCATION"], rows);
    }
}
