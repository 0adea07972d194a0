//! # doculoader
//!
//! OCR relay between Open WebUI's "external document loader" hook and Azure
//! AI Document Intelligence.
//!
//! Open WebUI `PUT`s the raw bytes of an uploaded PDF to `/process`. The relay
//! splits the document into single-page PDFs, sends each page to the OCR
//! provider with bounded concurrency, and returns the recognised text of all
//! pages, in page order, as one `{page_content, metadata}` document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PUT /process
//!  │
//!  ├─ 1. Input      reject empty / non-PDF uploads, check provider config
//!  ├─ 2. Stage      request-scoped scratch directory under TEMP_WORK_DIR
//!  ├─ 3. Split      one single-page PDF per page via lopdf (spawn_blocking)
//!  ├─ 4. OCR        concurrent submit-and-poll calls, per-page timeout
//!  ├─ 5. Clean      line endings, invisible characters, blank-line runs
//!  └─ 6. Aggregate  ordinal order, `--- Page N ---` markers
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doculoader::{AzureConfig, AzureDocumentIntelligence, Extractor, RelayConfig, SourceDocument};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = AzureDocumentIntelligence::new(AzureConfig {
//!         endpoint: std::env::var("AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT").ok(),
//!         api_key: std::env::var("AZURE_DOCUMENT_INTELLIGENCE_KEY").ok(),
//!         ..AzureConfig::default()
//!     })?;
//!     let extractor = Extractor::new(RelayConfig::default(), Arc::new(provider));
//!
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let result = extractor
//!         .extract(SourceDocument::new(bytes).with_filename("scan.pdf"))
//!         .await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doculoader` binary (clap + anyhow + dotenvy + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FailurePolicy, PageMarker, RelayConfig, RelayConfigBuilder};
pub use error::{PageError, RelayError};
pub use extract::Extractor;
pub use output::{
    ExtractionMetadata, ExtractionResult, ExtractionStats, LoaderResponse, PageResult,
    SourceDocument,
};
pub use provider::{AzureConfig, AzureDocumentIntelligence, OcrProvider};
pub use server::{router, serve, AppState};
