//! Revision resolution against the version-control API.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::health::HealthStore;
use crate::http::{HttpClient, HttpRequest, TransportError};
use crate::store::KeyValueStore;
use crate::types::Revision;

pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("version API rate limited the request and no revision is recorded")]
    RateLimited,

    #[error("version API returned HTTP {0}")]
    Status(u16),

    #[error("version API timed out")]
    Timeout,

    #[error("version API unreachable: {0}")]
    Network(String),

    #[error("could not parse revision: {0}")]
    Parse(String),
}

impl From<TransportError> for ResolveError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => ResolveError::Timeout,
            TransportError::Network(detail) => ResolveError::Network(detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub revision: Revision,
    /// Taken from the health store because the API rate limited us.
    pub from_cache: bool,
}

#[derive(Deserialize)]
struct CommitBody {
    sha: String,
}

/// `<api_base>/<repo>/commits/<reference>`
pub fn commits_url(api_base: &str, repo: &str, reference: &str) -> String {
    format!(
        "{}/{}/commits/{}",
        api_base.trim_end_matches('/'),
        repo.trim_matches('/'),
        reference
    )
}

pub fn parse_revision(body: &str) -> Result<Revision, ResolveError> {
    let commit: CommitBody =
        serde_json::from_str(body).map_err(|e| ResolveError::Parse(e.to_string()))?;
    let revision =
        Revision::new(commit.sha).ok_or_else(|| ResolveError::Parse("empty sha".into()))?;
    if !is_path_safe(revision.as_str()) {
        return Err(ResolveError::Parse(format!(
            "sha '{}' is not a plain identifier",
            revision
        )));
    }
    Ok(revision)
}

/// The revision becomes a path segment of the content URL.
fn is_path_safe(id: &str) -> bool {
    !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub struct VersionResolver<'a, H, S> {
    http: &'a H,
    store: &'a S,
    api_base: &'a str,
    repo: &'a str,
    timeout: Duration,
}

impl<'a, H: HttpClient, S: KeyValueStore> VersionResolver<'a, H, S> {
    pub fn new(http: &'a H, store: &'a S, config: &'a LoaderConfig) -> Self {
        Self {
            http,
            store,
            api_base: &config.api_base,
            repo: &config.repo,
            timeout: config.resolve_timeout(),
        }
    }

    /// Resolve the head revision of `reference` with a single request.
    ///
    /// HTTP 403 falls back to the revision recorded by the last successful
    /// run. Every other failure is returned to the caller, which proceeds
    /// without a pinned revision.
    pub async fn resolve(&self, reference: &str) -> Result<Resolved, ResolveError> {
        let url = commits_url(self.api_base, self.repo, reference);
        debug!(%url, "resolving revision");

        let request = HttpRequest::get(&url, self.timeout).header("Accept", GITHUB_ACCEPT);
        let response = match tokio::time::timeout(self.timeout, self.http.get(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(ResolveError::Timeout),
        };

        match response.status {
            200 => parse_revision(&response.body).map(|revision| Resolved {
                revision,
                from_cache: false,
            }),
            403 => match HealthStore::new(self.store).last_revision() {
                Ok(Some(revision)) => {
                    warn!(
                        revision = revision.short(),
                        "version API rate limited; using last recorded revision"
                    );
                    Ok(Resolved {
                        revision,
                        from_cache: true,
                    })
                }
                Ok(None) => Err(ResolveError::RateLimited),
                Err(e) => {
                    warn!(error = %e, "could not read last recorded revision");
                    Err(ResolveError::RateLimited)
                }
            },
            status => Err(ResolveError::Status(status)),
        }
    }
}
