//! Error types for the doculoader library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RelayError`] is **fatal**: the request cannot produce a result (empty
//!   upload, not a PDF, provider not configured, every page failed). Returned
//!   as `Err(RelayError)` from [`crate::extract::Extractor::extract`] and
//!   rendered by the HTTP layer as a structured error body.
//!
//! * [`PageError`] is **non-fatal**: a single page failed OCR but the others
//!   may be fine. Stored inside [`crate::output::PageResult`]; the configured
//!   [`crate::config::FailurePolicy`] decides whether it aborts the request.
//!
//! Every variant of [`RelayError`] maps to a stable string via
//! [`RelayError::kind`]. Clients match on that string, never on the message.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doculoader library.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request body was empty.
    #[error("No file data provided")]
    EmptyDocument,

    /// The upload is not declared as a PDF.
    #[error("Only PDF files are supported (content type {content_type:?}, filename {filename:?})")]
    UnsupportedContentType {
        content_type: Option<String>,
        filename: String,
    },

    /// The bytes could not be parsed as a PDF.
    #[error("Invalid PDF document: {reason}")]
    InvalidDocumentFormat { reason: String },

    /// Missing or wrong bearer token.
    #[error("Missing or invalid API key")]
    Unauthorized,

    // ── Provider errors ───────────────────────────────────────────────────
    /// Provider credentials are absent or malformed.
    #[error("OCR provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// A page did not finish OCR within the per-page timeout.
    #[error("OCR timed out after {secs}s on page {page}")]
    ProviderTimeout { page: usize, secs: u64 },

    /// The provider rejected or failed a page.
    #[error("OCR provider error on page {page}: {detail}")]
    ProviderError { page: usize, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The aggregator was handed a result set with gaps or failed pages
    /// and no placeholder policy.
    #[error("Incomplete OCR result: missing pages {missing:?}")]
    IncompleteResult { missing: Vec<usize> },

    /// Staging or cleaning a temporary file failed.
    #[error("Temporary file error at '{path}': {source}")]
    TemporaryResource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The whole request exceeded its deadline.
    #[error("Request timed out after {secs}s")]
    RequestTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Stable machine-readable error kind, sent to clients as `"error"`.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::EmptyDocument => "EmptyDocument",
            RelayError::UnsupportedContentType { .. } => "UnsupportedContentType",
            RelayError::InvalidDocumentFormat { .. } => "InvalidDocumentFormat",
            RelayError::Unauthorized => "Unauthorized",
            RelayError::NotConfigured { .. } => "NotConfigured",
            RelayError::ProviderTimeout { .. } => "ProviderTimeout",
            RelayError::ProviderError { .. } => "ProviderError",
            RelayError::IncompleteResult { .. } => "IncompleteResult",
            RelayError::TemporaryResource { .. } => "TemporaryResourceError",
            RelayError::RequestTimeout { .. } => "RequestTimeout",
            RelayError::InvalidConfig(_) => "InvalidConfig",
            RelayError::Internal(_) => "Internal",
        }
    }

    pub(crate) fn temp(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RelayError::TemporaryResource {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The provider did not answer within the per-page timeout.
    #[error("Page {page}: OCR timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The provider returned an error or an unusable response.
    #[error("Page {page}: OCR provider error: {detail}")]
    Provider { page: usize, detail: String },

    /// The page file could not be staged or read back.
    #[error("Page {page}: staging failed: {detail}")]
    Staging { page: usize, detail: String },
}

impl PageError {
    /// Same vocabulary as [`RelayError::kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::Timeout { .. } => "ProviderTimeout",
            PageError::Provider { .. } => "ProviderError",
            PageError::Staging { .. } => "TemporaryResourceError",
        }
    }
}

impl From<PageError> for RelayError {
    fn from(e: PageError) -> Self {
        match e {
            PageError::Timeout { page, secs } => RelayError::ProviderTimeout { page, secs },
            PageError::Provider { page, detail } => RelayError::ProviderError { page, detail },
            PageError::Staging { page, detail } => RelayError::TemporaryResource {
                path: PathBuf::from(format!("page-{page:04}.pdf")),
                source: std::io::Error::other(detail),
            },
        }
    }
}
