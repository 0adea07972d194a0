//! OCR provider capability.
//!
//! The pipeline only knows [`OcrProvider`]: hand over one single-page PDF,
//! get its text back. The production implementation is
//! [`AzureDocumentIntelligence`]; tests plug in deterministic doubles.

mod azure;

pub use azure::{AzureConfig, AzureDocumentIntelligence, AZURE_ENGINE};

use crate::error::{PageError, RelayError};
use async_trait::async_trait;

/// Submit-and-wait OCR for a single page.
///
/// Implementations must not retry and must not hold per-request state:
/// the pipeline calls `recognize` concurrently for different pages.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Engine identifier reported in response metadata.
    fn engine(&self) -> &str;

    /// Check that credentials are present and well-formed. Must not touch
    /// the network.
    fn ensure_configured(&self) -> Result<(), RelayError>;

    fn is_configured(&self) -> bool {
        self.ensure_configured().is_ok()
    }

    /// Recognise the text of `pdf`, a single-page document at position `page`.
    async fn recognize(&self, page: usize, pdf: &[u8]) -> Result<String, PageError>;
}
