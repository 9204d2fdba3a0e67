//! Ordered source candidates and the chain that walks them.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::PayloadCache;
use crate::config::LoaderConfig;
use crate::fetch::ContentFetcher;
use crate::http::HttpClient;
use crate::retry::RetryPolicy;
use crate::store::KeyValueStore;
use crate::types::Revision;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidateKind {
    Network { url: String },
    LocalCache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCandidate {
    pub label: String,
    pub kind: CandidateKind,
    pub requires_cache_busting: bool,
    pub priority: u32,
}

impl SourceCandidate {
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            CandidateKind::Network { url } => Some(url),
            CandidateKind::LocalCache => None,
        }
    }
}

/// `<content_base>/<repo>/<rev>/<path>` with redundant slashes removed.
pub fn content_url(content_base: &str, repo: &str, rev: &str, path: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        content_base.trim_end_matches('/'),
        repo.trim_matches('/'),
        rev.trim_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Candidates in try order: revision-pinned, branch-pinned, static fallback,
/// local cache. A URL already present is not added twice.
pub fn build_candidates(config: &LoaderConfig, revision: Option<&Revision>) -> Vec<SourceCandidate> {
    let mut out: Vec<SourceCandidate> = Vec::with_capacity(4);
    let push_network = |out: &mut Vec<SourceCandidate>, label: &str, url: String| {
        if out.iter().any(|c| c.url() == Some(url.as_str())) {
            debug!(%url, label, "dropping duplicate candidate");
            return;
        }
        let priority = out.len() as u32;
        out.push(SourceCandidate {
            label: label.to_string(),
            kind: CandidateKind::Network { url },
            requires_cache_busting: config.cache_busting_enabled,
            priority,
        });
    };

    if let Some(rev) = revision {
        let url = content_url(&config.content_base, &config.repo, rev.as_str(), &config.script_path);
        push_network(&mut out, "revision", url);
    }
    let url = content_url(
        &config.content_base,
        &config.repo,
        &config.reference,
        &config.script_path,
    );
    push_network(&mut out, "branch", url);
    if let Some(fallback) = config.fallback_url.as_deref().filter(|u| !u.trim().is_empty()) {
        push_network(&mut out, "fallback", fallback.trim().to_string());
    }
    if config.enable_local_cache {
        let priority = out.len() as u32;
        out.push(SourceCandidate {
            label: "cache".into(),
            kind: CandidateKind::LocalCache,
            requires_cache_busting: false,
            priority,
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub payload: String,
    pub candidate: SourceCandidate,
    /// Network attempts made across the whole chain.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {candidates} sources exhausted after {attempts} network attempts")]
pub struct AllSourcesExhausted {
    pub candidates: usize,
    pub attempts: u32,
}

pub struct FallbackChain<'a, H, S> {
    fetcher: ContentFetcher<'a, H>,
    retry: RetryPolicy,
    cache: Option<PayloadCache<'a, S>>,
}

impl<'a, H: HttpClient, S: KeyValueStore> FallbackChain<'a, H, S> {
    /// `cache` is both the last-resort source and the sink for network
    /// successes; pass `None` when local caching is disabled.
    pub fn new(
        fetcher: ContentFetcher<'a, H>,
        retry: RetryPolicy,
        cache: Option<PayloadCache<'a, S>>,
    ) -> Self {
        Self {
            fetcher,
            retry,
            cache,
        }
    }

    pub async fn try_all(
        &self,
        candidates: &[SourceCandidate],
    ) -> Result<Retrieved, AllSourcesExhausted> {
        let mut ordered: Vec<&SourceCandidate> = candidates.iter().collect();
        ordered.sort_by_key(|c| c.priority);

        let mut attempts = 0;
        for candidate in ordered {
            match &candidate.kind {
                CandidateKind::Network { url } => {
                    debug!(label = %candidate.label, %url, "trying network source");
                    let retried = self
                        .retry
                        .run(|_| self.fetcher.fetch(url, candidate.requires_cache_busting))
                        .await;
                    attempts += retried.attempts;
                    match retried.outcome.into_payload() {
                        Some(payload) => {
                            info!(
                                label = %candidate.label,
                                attempts = retried.attempts,
                                bytes = payload.len(),
                                "payload retrieved"
                            );
                            self.remember(&payload);
                            return Ok(Retrieved {
                                payload,
                                candidate: candidate.clone(),
                                attempts,
                            });
                        }
                        None => warn!(label = %candidate.label, "source failed; moving on"),
                    }
                }
                CandidateKind::LocalCache => {
                    if let Some(payload) = self.cached() {
                        info!(bytes = payload.len(), "using locally cached payload");
                        return Ok(Retrieved {
                            payload,
                            candidate: candidate.clone(),
                            attempts,
                        });
                    }
                    debug!("no fresh cached payload");
                }
            }
        }

        Err(AllSourcesExhausted {
            candidates: candidates.len(),
            attempts,
        })
    }

    fn remember(&self, payload: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store_payload(payload, Utc::now()) {
                warn!(error = %e, "failed to cache payload");
            }
        }
    }

    fn cached(&self) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.load_fresh(Utc::now()) {
            Ok(Some(content)) if !content.trim().is_empty() => Some(content),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "failed to read cached payload");
                None
            }
        }
    }
}
