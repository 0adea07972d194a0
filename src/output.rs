//! Result types produced by the extraction pipeline.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Default filename reported when the client sends none.
pub const DEFAULT_FILENAME: &str = "document.pdf";

/// Default content type reported when the client sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// An uploaded document as received at ingress.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            filename: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Filename to report, falling back to [`DEFAULT_FILENAME`].
    pub fn display_filename(&self) -> &str {
        self.filename
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME)
    }
}

/// One page of a [`SourceDocument`], itself a complete single-page PDF.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// 1-indexed position in the source document.
    pub ordinal: usize,
    pub bytes: Vec<u8>,
}

/// OCR outcome for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Recognised text; empty when `error` is set.
    pub text: String,
    pub duration_ms: u64,
    /// Attempts beyond the first.
    pub retries: u8,
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Metadata echoed back to the ingestion client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub filename: String,
    pub content_type: String,
    pub engine: String,
}

/// Per-request counters, logged and exposed to library callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    pub total_duration_ms: u64,
    pub split_duration_ms: u64,
    pub ocr_duration_ms: u64,
}

/// Final artifact of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: ExtractionMetadata,
    pub pages: Vec<PageResult>,
    pub stats: ExtractionStats,
}

/// Body returned by `PUT /process`, in the shape the Open WebUI external
/// loader expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderResponse {
    pub page_content: String,
    pub metadata: ExtractionMetadata,
}

impl From<ExtractionResult> for LoaderResponse {
    fn from(r: ExtractionResult) -> Self {
        Self {
            page_content: r.text,
            metadata: r.metadata,
        }
    }
}
