//! One update cycle: resolve, fetch, activate, record health.
//!
//! `Pipeline::run` never returns an error. Every stage turns its failures
//! into values, and the outcome is summarised in a [`RunReport`]. The health
//! store is written exactly once per run, at the terminal transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::activate::{Activator, CodeHost};
use crate::cache::PayloadCache;
use crate::chain::{build_candidates, FallbackChain, SourceCandidate};
use crate::config::LoaderConfig;
use crate::error::Result;
use crate::fetch::ContentFetcher;
use crate::health::{HealthReport, HealthStore};
use crate::http::HttpClient;
use crate::resolve::VersionResolver;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::store::KeyValueStore;
use crate::types::Revision;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Transitions: `Idle → Resolving → Fetching → Activating → Succeeded | Failed`,
/// plus `Fetching → Failed` when no source yields a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Resolving,
    Fetching,
    Activating,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Fetching)
                | (Fetching, Activating)
                | (Fetching, Failed)
                | (Activating, Succeeded)
                | (Activating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

struct Transitions(Vec<PipelineState>);

impl Transitions {
    fn new() -> Self {
        Self(vec![PipelineState::Idle])
    }

    fn current(&self) -> PipelineState {
        self.0.last().copied().unwrap_or(PipelineState::Idle)
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.current().can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.current()
        );
        debug!(from = ?self.current(), to = ?next, "pipeline transition");
        self.0.push(next);
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// No candidate produced a usable payload.
    AllSourcesExhausted { candidates: usize, attempts: u32 },
    /// The host refused the payload.
    Activation { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded { source: String, bytes: usize },
    Failed { reason: FailureReason },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub transitions: Vec<PipelineState>,
    pub revision: Option<Revision>,
    /// The revision came from the health store after a rate-limited lookup.
    pub revision_from_cache: bool,
    pub resolve_error: Option<String>,
    pub candidates: Vec<SourceCandidate>,
    pub fetch_attempts: u32,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }

    pub fn final_state(&self) -> PipelineState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<H, S, C> {
    config: LoaderConfig,
    http: H,
    store: S,
    host: C,
    session: Session,
}

impl<H: HttpClient, S: KeyValueStore, C: CodeHost> Pipeline<H, S, C> {
    pub fn new(config: LoaderConfig, http: H, store: S, host: C) -> Self {
        Self {
            config,
            http,
            store,
            host,
            session: Session::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn host(&self) -> &C {
        &self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn health(&self) -> HealthStore<'_, S> {
        HealthStore::new(&self.store)
    }

    pub fn cache(&self) -> PayloadCache<'_, S> {
        PayloadCache::new(&self.store, self.config.cache_expiration())
    }

    /// Health report for external monitors; `None` when health checks are
    /// disabled in config.
    pub fn health_report(&self) -> Result<Option<HealthReport>> {
        if !self.config.health_check_enabled {
            return Ok(None);
        }
        self.health().report().map(Some)
    }

    /// Run one full update cycle.
    pub async fn run(&mut self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, repo = %self.config.repo);
        self.run_cycle(run_id).instrument(span).await
    }

    async fn run_cycle(&mut self, run_id: Uuid) -> RunReport {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let mut track = Transitions::new();

        track.advance(PipelineState::Resolving);
        let resolved = VersionResolver::new(&self.http, &self.store, &self.config)
            .resolve(&self.config.reference)
            .await;
        let (revision, revision_from_cache, resolve_error) = match resolved {
            Ok(r) => {
                info!(
                    revision = r.revision.short(),
                    from_cache = r.from_cache,
                    "revision resolved"
                );
                (Some(r.revision), r.from_cache, None)
            }
            Err(e) => {
                warn!(error = %e, "revision unresolved; continuing without a pin");
                (None, false, Some(e.to_string()))
            }
        };

        track.advance(PipelineState::Fetching);
        let candidates = build_candidates(&self.config, revision.as_ref());
        let retrieved = {
            let cache = self
                .config
                .enable_local_cache
                .then(|| PayloadCache::new(&self.store, self.config.cache_expiration()));
            let chain = FallbackChain::new(
                ContentFetcher::new(&self.http, self.config.timeout()),
                RetryPolicy::from_config(&self.config),
                cache,
            );
            chain.try_all(&candidates).await
        };

        let (outcome, fetch_attempts) = match retrieved {
            Err(exhausted) => {
                error!(
                    candidates = exhausted.candidates,
                    attempts = exhausted.attempts,
                    "all sources exhausted"
                );
                let reason = FailureReason::AllSourcesExhausted {
                    candidates: exhausted.candidates,
                    attempts: exhausted.attempts,
                };
                (RunOutcome::Failed { reason }, exhausted.attempts)
            }
            Ok(retrieved) => {
                track.advance(PipelineState::Activating);
                let outcome = match Activator::new(&self.host).activate(&retrieved.payload) {
                    Ok(activation) => {
                        info!(
                            source = %retrieved.candidate.label,
                            bytes = activation.bytes,
                            "payload activated"
                        );
                        let bytes = activation.bytes;
                        self.session.record_success(activation.surface);
                        RunOutcome::Succeeded {
                            source: retrieved.candidate.label.clone(),
                            bytes,
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "activation failed");
                        RunOutcome::Failed {
                            reason: FailureReason::Activation {
                                message: e.to_string(),
                            },
                        }
                    }
                };
                (outcome, retrieved.attempts)
            }
        };

        self.session.record_attempts(fetch_attempts);
        let succeeded = matches!(outcome, RunOutcome::Succeeded { .. });
        if succeeded {
            track.advance(PipelineState::Succeeded);
        } else {
            self.session.record_failure();
            track.advance(PipelineState::Failed);
        }
        self.record_health(succeeded, revision.as_ref());

        RunReport {
            run_id,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            transitions: track.0,
            revision,
            revision_from_cache,
            resolve_error,
            candidates,
            fetch_attempts,
            outcome,
        }
    }

    fn record_health(&self, succeeded: bool, revision: Option<&Revision>) {
        let health = self.health();
        let written = if succeeded {
            health.record_success(revision)
        } else {
            health.record_failure()
        };
        if let Err(e) = written {
            error!(error = %e, succeeded, "failed to record health");
        }
    }
}
