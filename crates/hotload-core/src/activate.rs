//! Handing a retrieved payload to the host.
//!
//! The host decides what "execute" means. [`InstallHost`] is the one shipped
//! implementation: it installs the payload as a file for an external runner.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::io::atomic_write;

// ---------------------------------------------------------------------------
// ControlSurface
// ---------------------------------------------------------------------------

/// Counters published by an activated payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceStats {
    pub total_processed: u64,
    pub rule_executions: BTreeMap<String, u64>,
    pub global_rules_executed: BTreeMap<String, bool>,
    pub active: bool,
}

/// Control handle an activated payload may expose to the host.
pub trait ControlSurface: Send {
    fn version(&self) -> &str;
    fn stats(&self) -> SurfaceStats;
    /// Apply every applicable rule again.
    fn reprocess(&mut self);
    /// Stop all work. A cleaned-up surface stays inert until `restart`.
    fn cleanup(&mut self);
    fn restart(&mut self);
    /// Run the named global rule now, ignoring run-once bookkeeping.
    /// Returns whether the rule applied: false for an unknown or declining
    /// rule, or while the surface is cleaned up.
    fn execute_global_rule(&mut self, name: &str) -> bool;
    fn reset_global_rule(&mut self, name: &str);
}

// ---------------------------------------------------------------------------
// CodeHost
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host rejected payload: {0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Capability that turns a payload into running behaviour.
pub trait CodeHost: Send + Sync {
    fn execute(&self, payload: &str) -> Result<Option<Box<dyn ControlSurface>>, HostError>;
}

impl<T: CodeHost> CodeHost for Arc<T> {
    fn execute(&self, payload: &str) -> Result<Option<Box<dyn ControlSurface>>, HostError> {
        (**self).execute(payload)
    }
}

/// Writes each activated payload atomically to `target`.
#[derive(Debug, Clone)]
pub struct InstallHost {
    target: PathBuf,
}

impl InstallHost {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl CodeHost for InstallHost {
    fn execute(&self, payload: &str) -> Result<Option<Box<dyn ControlSurface>>, HostError> {
        atomic_write(&self.target, payload.as_bytes()).map_err(|e| match e {
            crate::error::LoaderError::Io(io) => HostError::Io(io),
            other => HostError::Rejected(other.to_string()),
        })?;
        info!(path = %self.target.display(), bytes = payload.len(), "payload installed");
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Activator
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error(transparent)]
    Host(#[from] HostError),
}

pub struct Activation {
    pub surface: Option<Box<dyn ControlSurface>>,
    pub bytes: usize,
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("surface", &self.surface.as_ref().map(|s| s.version().to_string()))
            .field("bytes", &self.bytes)
            .finish()
    }
}

pub struct Activator<'a, C> {
    host: &'a C,
}

impl<'a, C: CodeHost> Activator<'a, C> {
    pub fn new(host: &'a C) -> Self {
        Self { host }
    }

    /// Single attempt; a host failure is returned, never retried.
    pub fn activate(&self, payload: &str) -> Result<Activation, ActivationError> {
        if payload.trim().is_empty() {
            return Err(ActivationError::EmptyPayload);
        }
        let surface = self.host.execute(payload)?;
        if let Some(s) = &surface {
            debug!(version = s.version(), "payload exposed a control surface");
        }
        Ok(Activation {
            surface,
            bytes: payload.len(),
        })
    }
}
