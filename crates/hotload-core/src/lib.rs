pub mod activate;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod fetch;
pub mod health;
pub mod http;
pub mod io;
pub mod pipeline;
pub mod resolve;
pub mod retry;
pub mod rules;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use activate::{Activation, ActivationError, Activator, CodeHost, ControlSurface, InstallHost};
pub use cache::{CachedPayload, PayloadCache};
pub use chain::{build_candidates, AllSourcesExhausted, FallbackChain, SourceCandidate};
pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use fetch::{ContentFetcher, FetchOutcome};
pub use health::{HealthRecord, HealthReport, HealthStatus, HealthStore};
pub use http::{HttpClient, ReqwestClient};
pub use pipeline::{FailureReason, Pipeline, PipelineState, RunOutcome, RunReport};
pub use resolve::{ResolveError, VersionResolver};
pub use retry::RetryPolicy;
pub use store::{KeyValueStore, MemoryStore, RedbStore};
pub use types::Revision;
