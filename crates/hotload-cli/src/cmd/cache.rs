use crate::cmd::{load_config, open_store};
use crate::output::{print_fields, print_json};
use crate::root::Paths;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use clap::Subcommand;
use hotload_core::PayloadCache;

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Show the cached payload's age and freshness
    Show,

    /// Remove the cached payload
    Clear,
}

pub fn run(paths: &Paths, subcmd: CacheSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CacheSubcommand::Show => show(paths, json),
        CacheSubcommand::Clear => clear(paths, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(paths: &Paths, json: bool) -> anyhow::Result<()> {
    let config = load_config(paths)?;
    let store = open_store(paths)?;
    let cache = PayloadCache::new(&store, config.cache_expiration());
    let entry = cache.peek().context("failed to read cache")?;
    let now = Utc::now();

    let Some(entry) = entry else {
        if json {
            print_json(&serde_json::json!({ "cached": false }))?;
        } else {
            println!("No cached payload.");
        }
        return Ok(());
    };

    let fresh = entry.is_fresh(cache.ttl(), now);
    let stored_at = entry
        .stored_at()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
    let age_ms = now.timestamp_millis() - entry.timestamp;

    if json {
        print_json(&serde_json::json!({
            "cached": true,
            "bytes": entry.content.len(),
            "storedAt": stored_at,
            "ageMs": age_ms,
            "fresh": fresh,
            "enabled": config.enable_local_cache,
        }))?;
    } else {
        print_fields(&[
            ("bytes", entry.content.len().to_string()),
            ("stored at", stored_at.unwrap_or_else(|| entry.timestamp.to_string())),
            ("age", format!("{}s", age_ms / 1000)),
            ("fresh", fresh.to_string()),
            ("enabled", config.enable_local_cache.to_string()),
        ]);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// clear
// ---------------------------------------------------------------------------

fn clear(paths: &Paths, json: bool) -> anyhow::Result<()> {
    let store = open_store(paths)?;
    // TTL is irrelevant for removal.
    PayloadCache::new(&store, std::time::Duration::ZERO)
        .clear()
        .context("failed to clear cache")?;

    if json {
        print_json(&serde_json::json!({ "cleared": true }))?;
    } else {
        println!("Cache cleared.");
    }
    Ok(())
}
