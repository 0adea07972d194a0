//! Request orchestration: validate, split, stage, OCR, aggregate.
//!
//! One call to [`Extractor::extract`] handles one upload end to end. Pages
//! fan out to the provider through `buffer_unordered`, bounded by
//! [`RelayConfig::max_concurrency`], and are joined before aggregation so the
//! output order never depends on completion order.
//!
//! Temporary files live in a [`RequestScratch`] owned by the call. It is
//! closed explicitly on the way out (so cleanup failures are reported) and
//! removed by `Drop` on every other path, including the request deadline
//! cancelling the pipeline mid-flight.

use crate::config::{FailurePolicy, RelayConfig};
use crate::error::RelayError;
use crate::output::{
    ExtractionMetadata, ExtractionResult, ExtractionStats, PageDocument, PageResult,
    SourceDocument, DEFAULT_CONTENT_TYPE,
};
use crate::pipeline::aggregate::{self, GapPolicy};
use crate::pipeline::staging::RequestScratch;
use crate::pipeline::{input, ocr, postprocess, split};
use crate::provider::OcrProvider;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared, read-only extraction service.
///
/// Cheap to clone; every clone shares the same configuration and provider.
#[derive(Clone)]
pub struct Extractor {
    config: Arc<RelayConfig>,
    provider: Arc<dyn OcrProvider>,
}

impl Extractor {
    pub fn new(config: RelayConfig, provider: Arc<dyn OcrProvider>) -> Self {
        Self {
            config: Arc::new(config),
            provider,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Engine identifier reported in response metadata.
    pub fn engine(&self) -> &str {
        self.provider.engine()
    }

    /// Whether provider credentials are present and well-formed.
    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Extract text using the configured failure policy.
    pub async fn extract(&self, source: SourceDocument) -> Result<ExtractionResult, RelayError> {
        self.extract_with(source, self.config.failure_policy).await
    }

    /// Extract text with an explicit failure policy.
    ///
    /// # Errors
    /// Fatal errors only: empty or non-PDF upload, provider not configured,
    /// unparseable PDF, a failed page under [`FailurePolicy::AbortAll`],
    /// scratch I/O failures, or the request deadline. Under
    /// [`FailurePolicy::BestEffort`] a failed page never fails the request,
    /// even when it is the only page.
    pub async fn extract_with(
        &self,
        source: SourceDocument,
        policy: FailurePolicy,
    ) -> Result<ExtractionResult, RelayError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("extract", request_id = %request_id);
        let deadline = self.config.request_timeout_secs;

        match timeout(Duration::from_secs(deadline), self.run(source, policy, request_id))
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Request {} exceeded {}s deadline", request_id, deadline);
                Err(RelayError::RequestTimeout { secs: deadline })
            }
        }
    }

    async fn run(
        &self,
        source: SourceDocument,
        policy: FailurePolicy,
        request_id: Uuid,
    ) -> Result<ExtractionResult, RelayError> {
        let total_start = Instant::now();

        // ── Step 1: Validate upload ──────────────────────────────────────────
        input::validate(&source)?;
        let metadata = ExtractionMetadata {
            filename: source.display_filename().to_string(),
            content_type: source
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            engine: self.provider.engine().to_string(),
        };
        info!(
            "Processing '{}' ({} bytes)",
            metadata.filename,
            source.bytes.len()
        );

        // ── Step 2: Provider must be usable before any real work ─────────────
        self.provider.ensure_configured()?;
        input::check_magic(&source.bytes)?;

        // ── Step 3: Split, OCR, aggregate inside a per-request scratch ───────
        let scratch = RequestScratch::create(&self.config.work_dir, request_id).await?;
        let outcome = self
            .process(source.bytes, &scratch, policy, metadata, total_start)
            .await;

        // ── Step 4: Release scratch on every outcome ─────────────────────────
        settle(outcome, scratch.close())
    }

    async fn process(
        &self,
        bytes: Vec<u8>,
        scratch: &RequestScratch,
        policy: FailurePolicy,
        metadata: ExtractionMetadata,
        total_start: Instant,
    ) -> Result<ExtractionResult, RelayError> {
        let split_start = Instant::now();
        let pages = split::split_pages(bytes).await?;
        let split_duration_ms = split_start.elapsed().as_millis() as u64;
        let total_pages = pages.len();
        info!("Split into {} pages in {}ms", total_pages, split_duration_ms);

        let ocr_start = Instant::now();
        let mut results = self.process_concurrent(pages, scratch).await;
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        for page in results.iter_mut().filter(|p| p.is_ok()) {
            page.text = postprocess::clean_text(&page.text);
        }
        results.sort_by_key(|p| p.page_num);

        let failed = results.iter().filter(|p| !p.is_ok()).count();
        if let Some(first) = results.iter().find_map(|p| p.error.clone()) {
            if policy == FailurePolicy::AbortAll {
                warn!("{}/{} pages failed; aborting request", failed, total_pages);
                return Err(first.into());
            }
            warn!(
                "{}/{} pages failed; substituting failure markers",
                failed, total_pages
            );
        }

        let gaps = match policy {
            FailurePolicy::BestEffort => GapPolicy::Placeholder,
            FailurePolicy::AbortAll => GapPolicy::Fail,
        };
        let text = aggregate::aggregate(&results, total_pages, &self.config.page_marker, gaps)?;

        let stats = ExtractionStats {
            total_pages,
            succeeded_pages: total_pages - failed,
            failed_pages: failed,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            split_duration_ms,
            ocr_duration_ms,
        };
        info!(
            "Extraction complete: {}/{} pages, {} chars, {}ms total",
            stats.succeeded_pages,
            total_pages,
            text.len(),
            stats.total_duration_ms
        );

        Ok(ExtractionResult {
            text,
            metadata,
            pages: results,
            stats,
        })
    }

    /// Run every page through OCR, at most `max_concurrency` at a time.
    async fn process_concurrent(
        &self,
        pages: Vec<PageDocument>,
        scratch: &RequestScratch,
    ) -> Vec<PageResult> {
        let provider = self.provider.as_ref();
        let config = self.config.as_ref();
        debug!(
            "Dispatching {} pages with concurrency {}",
            pages.len(),
            config.max_concurrency
        );

        stream::iter(
            pages
                .into_iter()
                .map(|page| ocr::process_page(provider, scratch, page, config)),
        )
        .buffer_unordered(config.max_concurrency)
        .collect()
        .await
    }
}

/// Combine the pipeline outcome with scratch cleanup.
///
/// A successful result is only returned once its scratch is gone; when both
/// fail, the pipeline error wins.
fn settle<T>(
    outcome: Result<T, RelayError>,
    cleanup: Result<(), RelayError>,
) -> Result<T, RelayError> {
    match (outcome, cleanup) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(_), Err(cleanup)) => Err(cleanup),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            warn!("Cleanup after failed request also failed: {}", cleanup);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
        configured: bool,
    }

    #[async_trait]
    impl OcrProvider for Echo {
        fn engine(&self) -> &str {
            "echo"
        }

        fn ensure_configured(&self) -> Result<(), RelayError> {
            if self.configured {
                Ok(())
            } else {
                Err(RelayError::NotConfigured {
                    provider: "echo".into(),
                    hint: "no key".into(),
                })
            }
        }

        async fn recognize(&self, page: usize, _pdf: &[u8]) -> Result<String, PageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("page {page}"))
        }
    }

    fn extractor(work: &std::path::Path, configured: bool) -> (Extractor, Arc<Echo>) {
        let provider = Arc::new(Echo {
            calls: AtomicUsize::new(0),
            configured,
        });
        let config = RelayConfig::builder().work_dir(work).build().unwrap();
        (Extractor::new(config, provider.clone()), provider)
    }

    #[tokio::test]
    async fn empty_upload_rejected_before_config_check() {
        let work = tempfile::tempdir().unwrap();
        let (ex, provider) = extractor(work.path(), false);
        let err = ex.extract(SourceDocument::new(Vec::new())).await.unwrap_err();
        assert_eq!(err.kind(), "EmptyDocument");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn not_configured_fails_fast() {
        let work = tempfile::tempdir().unwrap();
        let (ex, provider) = extractor(work.path(), false);
        let err = ex
            .extract(SourceDocument::new(b"%PDF-1.4 whatever".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NotConfigured");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unparseable_pdf_leaves_no_scratch() {
        let work = tempfile::tempdir().unwrap();
        let (ex, provider) = extractor(work.path(), true);
        let err = ex
            .extract(SourceDocument::new(b"%PDF-1.4 truncated".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidDocumentFormat");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    fn cleanup_error() -> RelayError {
        RelayError::temp(
            "/tmp/req-x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        )
    }

    #[test]
    fn failed_cleanup_replaces_a_successful_result() {
        let err = settle(Ok("text"), Err(cleanup_error())).unwrap_err();
        assert_eq!(err.kind(), "TemporaryResourceError");
    }

    #[test]
    fn pipeline_error_outranks_failed_cleanup() {
        let err = settle::<()>(Err(RelayError::EmptyDocument), Err(cleanup_error())).unwrap_err();
        assert_eq!(err.kind(), "EmptyDocument");
    }

    #[test]
    fn clean_close_passes_outcome_through() {
        assert_eq!(settle(Ok(7), Ok(())).unwrap(), 7);
        let err = settle::<()>(Err(RelayError::EmptyDocument), Ok(())).unwrap_err();
        assert_eq!(err.kind(), "EmptyDocument");
    }

    #[tokio::test]
    async fn unusable_work_dir_is_a_temporary_resource_error() {
        let work = tempfile::tempdir().unwrap();
        let occupied = work.path().join("occupied");
        std::fs::write(&occupied, b"not a directory").unwrap();
        let (ex, provider) = extractor(&occupied, true);
        let err = ex
            .extract(SourceDocument::new(b"%PDF-1.4 whatever".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TemporaryResourceError");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
