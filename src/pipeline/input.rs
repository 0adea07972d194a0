//! Input validation: decide whether an upload is a PDF worth splitting.
//!
//! Checks run cheapest-first and none of them touches the network, so a bad
//! upload is rejected before any provider call is made.

use crate::error::RelayError;
use crate::output::SourceDocument;
use tracing::debug;

const PDF_MEDIA_TYPE: &str = "application/pdf";
const OCTET_STREAM: &str = "application/octet-stream";

/// Reject empty uploads and anything not declared as a PDF.
pub fn validate(doc: &SourceDocument) -> Result<(), RelayError> {
    if doc.bytes.is_empty() {
        return Err(RelayError::EmptyDocument);
    }

    let filename = doc.display_filename();
    if !is_pdf_upload(doc.content_type.as_deref(), filename) {
        return Err(RelayError::UnsupportedContentType {
            content_type: doc.content_type.clone(),
            filename: filename.to_string(),
        });
    }

    debug!(
        "Accepted upload '{}' ({} bytes, content type {:?})",
        filename,
        doc.bytes.len(),
        doc.content_type
    );
    Ok(())
}

/// A declared `application/pdf` wins. Without a useful declaration
/// (missing, or the generic octet-stream) the filename extension decides.
pub fn is_pdf_upload(content_type: Option<&str>, filename: &str) -> bool {
    match content_type.map(media_type) {
        Some(mt) if mt == PDF_MEDIA_TYPE => true,
        Some(mt) if mt == OCTET_STREAM || mt.is_empty() => has_pdf_extension(filename),
        Some(_) => false,
        None => has_pdf_extension(filename),
    }
}

/// Lower-cased media type with parameters (`; charset=...`) stripped.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn has_pdf_extension(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

/// Verify the PDF magic bytes before handing the buffer to the parser.
pub fn check_magic(bytes: &[u8]) -> Result<(), RelayError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let magic: Vec<u8> = bytes.iter().take(4).copied().collect();
        return Err(RelayError::InvalidDocumentFormat {
            reason: format!("not a PDF, first bytes: {:?}", String::from_utf8_lossy(&magic)),
        });
    }
    Ok(())
}
