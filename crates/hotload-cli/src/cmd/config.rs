use crate::cmd::load_config;
use crate::output::print_json;
use crate::root::Paths;
use anyhow::Context;
use clap::Subcommand;
use hotload_core::config::WarnLevel;
use hotload_core::LoaderConfig;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a config file with default settings
    Init {
        /// Tracked repository as owner/name
        #[arg(long)]
        repo: String,
        /// Path of the payload inside the repository
        #[arg(long)]
        script_path: String,
        /// Branch or tag to follow
        #[arg(long)]
        reference: Option<String>,
        /// Static URL tried after the branch copy
        #[arg(long)]
        fallback_url: Option<String>,
        /// Keep a local copy of the last payload as a last resort
        #[arg(long)]
        enable_local_cache: bool,
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(paths: &Paths, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init {
            repo,
            script_path,
            reference,
            fallback_url,
            enable_local_cache,
            force,
        } => {
            let mut config = LoaderConfig::new(repo, script_path);
            if let Some(reference) = reference {
                config.reference = reference;
            }
            config.fallback_url = fallback_url;
            config.enable_local_cache = enable_local_cache;
            init(paths, &config, force, json)
        }
        ConfigSubcommand::Validate => validate(paths, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(paths: &Paths, config: &LoaderConfig, force: bool, json: bool) -> anyhow::Result<()> {
    if paths.config.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            paths.config.display()
        );
    }
    config
        .save(&paths.config)
        .with_context(|| format!("failed to write {}", paths.config.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": paths.config.display().to_string(),
            "config": config,
        }))?;
    } else {
        println!("Wrote {}", paths.config.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(paths: &Paths, json: bool) -> anyhow::Result<()> {
    let config = load_config(paths)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
