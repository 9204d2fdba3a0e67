use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_reference() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com/repos".to_string()
}

fn default_content_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    12_000
}

fn default_resolve_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_cache_expiration_ms() -> u64 {
    3_600_000
}

// ---------------------------------------------------------------------------
// LoaderConfig
// ---------------------------------------------------------------------------

/// In-process options record for one update pipeline.
///
/// Every field except `repo` and `script_path` has a default, so a minimal
/// YAML file only needs those two keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// `<owner>/<name>` of the tracked repository.
    pub repo: String,
    /// Branch or tag whose head revision is resolved on every run.
    #[serde(default = "default_reference")]
    pub reference: String,
    /// Path of the payload inside the repository.
    pub script_path: String,
    /// Base of the version API; the commits endpoint is appended to it.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Base of the raw content host.
    #[serde(default = "default_content_base")]
    pub content_base: String,
    /// Static, non-revisioned URL tried after the branch-pinned source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_url: Option<String>,
    /// Total fetch attempts per source.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Wall-clock limit for each content fetch.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Wall-clock limit for the single version API call.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub cache_busting_enabled: bool,
    #[serde(default)]
    pub enable_local_cache: bool,
    #[serde(default = "default_cache_expiration_ms")]
    pub cache_expiration_ms: u64,
    /// Publishes the health report after a run when set.
    #[serde(default = "default_true")]
    pub health_check_enabled: bool,
}

impl LoaderConfig {
    pub fn new(repo: impl Into<String>, script_path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            reference: default_reference(),
            script_path: script_path.into(),
            api_base: default_api_base(),
            content_base: default_content_base(),
            fallback_url: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            cache_busting_enabled: true,
            enable_local_cache: false,
            cache_expiration_ms: default_cache_expiration_ms(),
            health_check_enabled: true,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_millis(self.cache_expiration_ms)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LoaderError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: LoaderConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        let repo = self.repo.trim();
        if repo.is_empty() {
            push(WarnLevel::Error, "repo must not be empty".into());
        } else if repo.split('/').filter(|s| !s.is_empty()).count() != 2 {
            push(
                WarnLevel::Warning,
                format!("repo '{}' is not of the form <owner>/<name>", repo),
            );
        }

        if self.script_path.trim().is_empty() {
            push(WarnLevel::Error, "script_path must not be empty".into());
        }

        if self.reference.trim().is_empty() {
            push(WarnLevel::Error, "reference must not be empty".into());
        }

        if self.max_retries == 0 {
            push(
                WarnLevel::Error,
                "max_retries must be at least 1 (it counts total attempts)".into(),
            );
        } else if self.max_retries > 10 {
            push(
                WarnLevel::Warning,
                format!("max_retries={} (>10 is unusual)", self.max_retries),
            );
        }

        if self.timeout_ms == 0 {
            push(WarnLevel::Error, "timeout_ms must be greater than 0".into());
        }

        if self.resolve_timeout_ms == 0 {
            push(
                WarnLevel::Error,
                "resolve_timeout_ms must be greater than 0".into(),
            );
        }

        if self.enable_local_cache && self.cache_expiration_ms == 0 {
            push(
                WarnLevel::Warning,
                "enable_local_cache is set but cache_expiration_ms is 0; the cache will never be served"
                    .into(),
            );
        }

        for (field, value) in [
            ("api_base", Some(&self.api_base)),
            ("content_base", Some(&self.content_base)),
            ("fallback_url", self.fallback_url.as_ref()),
        ] {
            if let Some(url) = value {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    push(
                        WarnLevel::Error,
                        format!("{field} '{url}' is not an http(s) URL"),
                    );
                }
            }
        }

        warnings
    }

    /// True when `validate` reports no error-level findings.
    pub fn is_valid(&self) -> bool {
        !self
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error)
    }

    /// Fail with `InvalidConfig` on any error-level finding; otherwise
    /// hand back the remaining warnings.
    pub fn ensure_valid(&self) -> Result<Vec<ConfigWarning>> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .validate()
            .into_iter()
            .partition(|w| w.level == WarnLevel::Error);
        if errors.is_empty() {
            return Ok(warnings);
        }
        let messages: Vec<String> = errors.into_iter().map(|w| w.message).collect();
        Err(LoaderError::InvalidConfig(messages.join("; ")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let yaml = "repo: acme/widgets\nscript_path: dist/app.js\n";
        let cfg: LoaderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.reference, "main");
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_delay_ms, 2_000);
        assert_eq!(cfg.timeout_ms, 12_000);
        assert!(cfg.cache_busting_enabled);
        assert!(!cfg.enable_local_cache);
        assert!(cfg.health_check_enabled);
        assert_eq!(cfg.fallback_url, None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hotload.yaml");
        let mut cfg = LoaderConfig::new("acme/widgets", "dist/app.js");
        cfg.fallback_url = Some("https://mirror.example.com/app.js".into());
        cfg.enable_local_cache = true;
        cfg.save(&path).unwrap();

        let loaded = LoaderConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn fallback_url_not_serialized_when_absent() {
        let cfg = LoaderConfig::new("acme/widgets", "app.js");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        assert!(!yaml.contains("fallback_url"));
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = LoaderConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, LoaderError::ConfigNotFound(_)));
    }

    #[test]
    fn durations_follow_millisecond_fields() {
        let mut cfg = LoaderConfig::new("acme/widgets", "app.js");
        cfg.retry_delay_ms = 250;
        cfg.timeout_ms = 18_000;
        assert_eq!(cfg.retry_delay(), Duration::from_millis(250));
        assert_eq!(cfg.timeout(), Duration::from_secs(18));
        assert_eq!(cfg.cache_expiration(), Duration::from_secs(3600));
    }

    #[test]
    fn validate_default_config_no_warnings() {
        let cfg = LoaderConfig::new("acme/widgets", "dist/app.js");
        assert!(cfg.validate().is_empty());
        assert!(cfg.is_valid());
    }

    #[test]
    fn validate_zero_retries_is_error() {
        let mut cfg = LoaderConfig::new("acme/widgets", "app.js");
        cfg.max_retries = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("max_retries")));
        assert!(!cfg.is_valid());
    }

    #[test]
    fn ensure_valid_rejects_errors_and_passes_warnings() {
        let mut cfg = LoaderConfig::new("widgets", "app.js");
        let warnings = cfg.ensure_valid().unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);

        cfg.max_retries = 0;
        cfg.timeout_ms = 0;
        let err = cfg.ensure_valid().unwrap_err();
        match err {
            LoaderError::InvalidConfig(msg) => {
                assert!(msg.contains("max_retries"));
                assert!(msg.contains("timeout_ms"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_many_retries_is_warning_only() {
        let mut cfg = LoaderConfig::new("acme/widgets", "app.js");
        cfg.max_retries = 25;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(cfg.is_valid());
    }

    #[test]
    fn validate_empty_repo_is_error() {
        let cfg = LoaderConfig::new("  ", "app.js");
        assert!(!cfg.is_valid());
    }

    #[test]
    fn validate_repo_without_owner_warns() {
        let cfg = LoaderConfig::new("widgets", "app.js");
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("<owner>/<name>")));
    }

    #[test]
    fn validate_non_http_fallback_is_error() {
        let mut cfg = LoaderConfig::new("acme/widgets", "app.js");
        cfg.fallback_url = Some("ftp://mirror/app.js".into());
        assert!(!cfg.is_valid());
    }

    #[test]
    fn validate_cache_without_expiration_warns() {
        let mut cfg = LoaderConfig::new("acme/widgets", "app.js");
        cfg.enable_local_cache = true;
        cfg.cache_expiration_ms = 0;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("cache")));
    }
}
