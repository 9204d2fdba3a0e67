use crate::cmd::open_store;
use crate::output::{or_dash, print_fields, print_json};
use crate::root::Paths;
use anyhow::Context;
use hotload_core::HealthStore;

pub fn run(paths: &Paths, json: bool) -> anyhow::Result<()> {
    let store = open_store(paths)?;
    let health = HealthStore::new(&store);
    let report = health.report().context("failed to read health record")?;

    if json {
        return print_json(&report);
    }

    let revision = health.last_revision().context("failed to read health record")?;
    print_fields(&[
        ("status", report.status.to_string()),
        ("last success", or_dash(report.last_success.as_deref())),
        ("last failure", or_dash(report.last_failure.as_deref())),
        ("revision", or_dash(revision)),
    ]);
    Ok(())
}
