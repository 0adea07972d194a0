//! PDF splitting: one source document in, one single-page PDF per page out.
//!
//! ## Why not re-render?
//!
//! The OCR provider reads the original page content best; rasterising would
//! lose embedded text layers and inflate uploads. Each page document is the
//! parsed source with every other page deleted and unreferenced objects
//! pruned, so content streams, fonts, and images are copied byte-for-byte.
//!
//! Parsing and serialising are CPU-bound, so the work runs on
//! `spawn_blocking` to keep the Tokio workers free for network I/O.

use crate::error::RelayError;
use crate::output::PageDocument;
use crate::pipeline::input;
use lopdf::Document;
use tracing::{debug, info};

/// Split `bytes` into single-page PDFs ordered by page number.
///
/// A zero-page document yields an empty vector.
pub async fn split_pages(bytes: Vec<u8>) -> Result<Vec<PageDocument>, RelayError> {
    tokio::task::spawn_blocking(move || split_pages_blocking(&bytes))
        .await
        .map_err(|e| RelayError::Internal(format!("Split task panicked: {}", e)))?
}

/// Blocking implementation of page splitting.
pub fn split_pages_blocking(bytes: &[u8]) -> Result<Vec<PageDocument>, RelayError> {
    input::check_magic(bytes)?;

    let mut source = Document::load_mem(bytes).map_err(|e| RelayError::InvalidDocumentFormat {
        reason: format!("failed to parse PDF: {}", e),
    })?;
    unlock(&mut source)?;

    let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
    info!("PDF loaded: {} pages", page_numbers.len());

    let mut pages = Vec::with_capacity(page_numbers.len());
    for (idx, &keep) in page_numbers.iter().enumerate() {
        let ordinal = idx + 1;
        let others: Vec<u32> = page_numbers
            .iter()
            .copied()
            .filter(|&p| p != keep)
            .collect();

        let mut single = source.clone();
        single.delete_pages(&others);
        single.prune_objects();

        let mut buf = Vec::new();
        single
            .save_to(&mut buf)
            .map_err(|e| RelayError::Internal(format!("failed to write page {}: {}", ordinal, e)))?;

        debug!("Split page {} → {} bytes", ordinal, buf.len());
        pages.push(PageDocument {
            ordinal,
            bytes: buf,
        });
    }

    Ok(pages)
}

/// Decrypt a document protected only by an owner password.
///
/// Page documents are written in the clear, so the `Encrypt` entry must not
/// survive into them. A document that needs a user password is rejected.
fn unlock(doc: &mut Document) -> Result<(), RelayError> {
    if !doc.is_encrypted() {
        return Ok(());
    }
    doc.decrypt("")
        .map_err(|e| RelayError::InvalidDocumentFormat {
            reason: format!("encrypted PDF could not be opened: {}", e),
        })?;
    doc.trailer.remove(b"Encrypt");
    debug!("Decrypted owner-password PDF");
    Ok(())
}
