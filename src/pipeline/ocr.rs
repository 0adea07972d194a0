//! Per-page OCR: stage the page, submit it, wait, clean up.
//!
//! [`recognize_with_timeout`] is the adapter contract: one bounded
//! submit-and-wait, no retries. [`process_page`] is the handler-side step that
//! adds staging, retry with exponential backoff, and deletion of the staged
//! file once the page's outcome is known.

use crate::config::RelayConfig;
use crate::error::PageError;
use crate::output::{PageDocument, PageResult};
use crate::pipeline::staging::RequestScratch;
use crate::provider::OcrProvider;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One submit-and-wait call bounded by `timeout_secs`.
pub async fn recognize_with_timeout(
    provider: &dyn OcrProvider,
    page: usize,
    pdf: &[u8],
    timeout_secs: u64,
) -> Result<String, PageError> {
    match timeout(Duration::from_secs(timeout_secs), provider.recognize(page, pdf)).await {
        Ok(result) => result,
        Err(_) => Err(PageError::Timeout {
            page,
            secs: timeout_secs,
        }),
    }
}

/// Run one page through staging and OCR.
///
/// Always returns a `PageResult`; the failure policy is applied by the caller.
pub async fn process_page(
    provider: &dyn OcrProvider,
    scratch: &RequestScratch,
    page: PageDocument,
    config: &RelayConfig,
) -> PageResult {
    let start = Instant::now();
    let page_num = page.ordinal;

    let staged = match scratch.stage_page(&page).await {
        Ok(staged) => staged,
        Err(e) => {
            warn!("Page {}: {}", page_num, e);
            return failed(page_num, start, 0, PageError::Staging {
                page: page_num,
                detail: e.to_string(),
            });
        }
    };
    drop(page);

    let bytes = match staged.read().await {
        Ok(bytes) => bytes,
        Err(e) => {
            staged.discard().await;
            return failed(page_num, start, 0, PageError::Staging {
                page: page_num,
                detail: format!("failed to read staged page: {e}"),
            });
        }
    };

    let mut last_err: Option<PageError> = None;
    let mut attempts_used = 0u32;

    for attempt in 0..=config.max_retries {
        attempts_used = attempt;
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match recognize_with_timeout(provider, page_num, &bytes, config.page_timeout_secs).await {
            Ok(text) => {
                staged.discard().await;
                let duration = start.elapsed();
                debug!("Page {}: {} chars in {:?}", page_num, text.len(), duration);
                return PageResult {
                    page_num,
                    text,
                    duration_ms: duration.as_millis() as u64,
                    retries: retry_count(attempt),
                    error: None,
                };
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    staged.discard().await;
    let err = last_err.unwrap_or(PageError::Provider {
        page: page_num,
        detail: "Unknown error".to_string(),
    });
    failed(page_num, start, attempts_used, err)
}

fn failed(page_num: usize, start: Instant, retries: u32, error: PageError) -> PageResult {
    PageResult {
        page_num,
        text: String::new(),
        duration_ms: start.elapsed().as_millis() as u64,
        retries: retry_count(retries),
        error: Some(error),
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base_ms.saturating_mul(factor)
}

fn retry_count(attempt: u32) -> u8 {
    u8::try_from(attempt).unwrap_or(u8::MAX)
}
