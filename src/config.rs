//! Configuration types for the relay.
//!
//! All process-wide behaviour is controlled through [`RelayConfig`], built via
//! its [`RelayConfigBuilder`] once at startup and shared read-only by every
//! request. The library never reads environment variables itself; the binary
//! maps flags and env vars onto the builder.

use crate::error::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Upper bound on [`RelayConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for the extraction pipeline and HTTP front end.
///
/// # Example
/// ```rust
/// use doculoader::{FailurePolicy, RelayConfig};
///
/// let config = RelayConfig::builder()
///     .work_dir("/tmp/doculoader-test")
///     .max_concurrency(8)
///     .failure_policy(FailurePolicy::AbortAll)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_concurrency, 8);
/// ```
#[derive(Clone)]
pub struct RelayConfig {
    /// Scratch directory for request-scoped staging. Default: `/tmp/doculoader`.
    pub work_dir: PathBuf,

    /// Maximum OCR calls in flight for one request. Default: 4.
    ///
    /// The provider rate-limits per resource, not per request, so keep this
    /// low when several uploads are expected at once.
    pub max_concurrency: usize,

    /// Per-page submit-and-wait timeout in seconds. Default: 120.
    pub page_timeout_secs: u64,

    /// Whole-request deadline in seconds. Default: 600.
    pub request_timeout_secs: u64,

    /// Extra attempts for a failed page. Default: 0, at most [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// What to do when a page fails. Default: [`FailurePolicy::BestEffort`].
    pub failure_policy: FailurePolicy,

    /// Marker placed before each page's text. Default: [`PageMarker::Dashed`].
    pub page_marker: PageMarker,

    /// Largest accepted upload in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Bearer token required on `/process`. `None` disables the check.
    pub api_key: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/doculoader"),
            max_concurrency: 4,
            page_timeout_secs: 120,
            request_timeout_secs: 600,
            max_retries: 0,
            retry_backoff_ms: 500,
            failure_policy: FailurePolicy::default(),
            page_marker: PageMarker::default(),
            max_upload_bytes: 100 * 1024 * 1024,
            api_key: None,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("work_dir", &self.work_dir)
            .field("max_concurrency", &self.max_concurrency)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("failure_policy", &self.failure_policy)
            .field("page_marker", &self.page_marker)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n.max(1);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn page_marker(mut self, marker: PageMarker) -> Self {
        self.config.page_marker = marker;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// An empty key is treated as "no key".
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, RelayError> {
        let c = &self.config;
        if c.work_dir.as_os_str().is_empty() {
            return Err(RelayError::InvalidConfig("work_dir must not be empty".into()));
        }
        if c.page_timeout_secs == 0 {
            return Err(RelayError::InvalidConfig(
                "page timeout must be ≥ 1s".into(),
            ));
        }
        if c.request_timeout_secs < c.page_timeout_secs {
            return Err(RelayError::InvalidConfig(format!(
                "request timeout ({}s) must not be shorter than page timeout ({}s)",
                c.request_timeout_secs, c.page_timeout_secs
            )));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(RelayError::InvalidConfig(format!(
                "max retries ({}) must not exceed {}",
                c.max_retries, MAX_RETRIES
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        if let PageMarker::Custom(t) = &c.page_marker {
            if !t.contains("{page}") {
                return Err(RelayError::InvalidConfig(format!(
                    "custom page marker {t:?} must contain {{page}}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How a request treats pages whose OCR failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Keep going; the failed page's slot holds an explicit failure marker. (default)
    #[default]
    BestEffort,
    /// Fail the whole request with the first failed page's error.
    AbortAll,
}

impl FromStr for FailurePolicy {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(FailurePolicy::BestEffort),
            "abort" | "abort-all" | "abort_all" | "strict" => Ok(FailurePolicy::AbortAll),
            other => Err(RelayError::InvalidConfig(format!(
                "unknown failure policy {other:?} (expected best-effort or abort)"
            ))),
        }
    }
}

/// Annotation placed before each page's text in the aggregated output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageMarker {
    /// No marker; pages joined with a blank line.
    None,
    /// `--- Page N ---` (default)
    #[default]
    Dashed,
    /// Custom template; `{page}` is replaced by the ordinal.
    Custom(String),
}

impl PageMarker {
    /// Render the marker for the given page number (1-indexed).
    pub fn render(&self, page_num: usize) -> Option<String> {
        match self {
            PageMarker::None => None,
            PageMarker::Dashed => Some(format!("--- Page {} ---", page_num)),
            PageMarker::Custom(t) => Some(t.replace("{page}", &page_num.to_string())),
        }
    }
}

impl FromStr for PageMarker {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PageMarker::None),
            "dashed" | "default" => Ok(PageMarker::Dashed),
            custom if custom.contains("{page}") => Ok(PageMarker::Custom(custom.to_string())),
            other => Err(RelayError::InvalidConfig(format!(
                "page marker {other:?} is not none, dashed, or a template containing {{page}}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RelayConfig::default();
        assert_eq!(c.max_concurrency, 4);
        assert_eq!(c.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(c.page_marker, PageMarker::Dashed);
        assert!(c.api_key.is_none());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = RelayConfig::builder().max_concurrency(0).build().unwrap();
        assert_eq!(c.max_concurrency, 1);
    }

    #[test]
    fn builder_rejects_short_request_timeout() {
        let err = RelayConfig::builder()
            .page_timeout_secs(60)
            .request_timeout_secs(30)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
    }

    #[test]
    fn builder_caps_retries() {
        let c = RelayConfig::builder().max_retries(MAX_RETRIES).build().unwrap();
        assert_eq!(c.max_retries, MAX_RETRIES);
        let err = RelayConfig::builder()
            .max_retries(MAX_RETRIES + 1)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidConfig");
        assert!(err.to_string().contains("max retries"), "got: {err}");
    }

    #[test]
    fn blank_api_key_disables_auth() {
        let c = RelayConfig::builder()
            .api_key(Some("  ".into()))
            .build()
            .unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = RelayConfig::builder()
            .api_key(Some("s3cret".into()))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn failure_policy_parsing() {
        assert_eq!("best-effort".parse::<FailurePolicy>().unwrap(), FailurePolicy::BestEffort);
        assert_eq!("ABORT".parse::<FailurePolicy>().unwrap(), FailurePolicy::AbortAll);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn page_marker_render() {
        assert_eq!(PageMarker::Dashed.render(2).as_deref(), Some("--- Page 2 ---"));
        assert_eq!(PageMarker::None.render(2), None);
        let custom: PageMarker = "<!-- page {page} -->".parse().unwrap();
        assert_eq!(custom.render(10).as_deref(), Some("<!-- page 10 -->"));
        assert!("plain".parse::<PageMarker>().is_err());
    }
}
