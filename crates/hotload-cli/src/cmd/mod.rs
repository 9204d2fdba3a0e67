pub mod cache;
pub mod config;
pub mod health;
pub mod run;

use anyhow::Context;
use hotload_core::{LoaderConfig, RedbStore};

use crate::root::Paths;

pub(crate) fn load_config(paths: &Paths) -> anyhow::Result<LoaderConfig> {
    LoaderConfig::load(&paths.config)
        .with_context(|| format!("failed to load config from {}", paths.config.display()))
}

pub(crate) fn open_store(paths: &Paths) -> anyhow::Result<RedbStore> {
    let db = paths.state_db();
    RedbStore::open(&db).with_context(|| format!("failed to open state at {}", db.display()))
}
