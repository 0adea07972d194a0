//! Assemble per-page results into one document-level text blob.
//!
//! Results may arrive in any order (concurrent OCR completes out of order);
//! the output is always in ordinal order, each page preceded by its marker
//! so page provenance survives in the final text.

use crate::config::PageMarker;
use crate::error::{PageError, RelayError};
use crate::output::PageResult;

/// What to do with a page whose OCR failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapPolicy {
    /// Any failed page makes the result incomplete.
    Fail,
    /// Put an explicit failure marker in the failed page's slot.
    Placeholder,
}

/// Placeholder text for a failed page.
pub fn failure_marker(page: usize, error: &PageError) -> String {
    format!("[OCR failed for page {}: {}]", page, error.kind())
}

/// Concatenate `pages` in ordinal order.
///
/// `total` is the page count of the source document; ordinals must be
/// exactly `1..=total`. Missing or duplicate ordinals, and failed pages under
/// [`GapPolicy::Fail`], yield [`RelayError::IncompleteResult`].
pub fn aggregate(
    pages: &[PageResult],
    total: usize,
    marker: &PageMarker,
    gaps: GapPolicy,
) -> Result<String, RelayError> {
    let mut missing = Vec::new();
    let mut slots: Vec<Option<&PageResult>> = vec![None; total];
    for page in pages {
        match page.page_num.checked_sub(1).and_then(|i| slots.get_mut(i)) {
            Some(slot) if slot.is_none() => *slot = Some(page),
            _ => {
                return Err(RelayError::Internal(format!(
                    "page {} is duplicated or outside 1..={}",
                    page.page_num, total
                )))
            }
        }
    }
    for (i, slot) in slots.iter().enumerate() {
        match slot {
            None => missing.push(i + 1),
            Some(p) if p.error.is_some() && gaps == GapPolicy::Fail => missing.push(i + 1),
            Some(_) => {}
        }
    }
    if !missing.is_empty() {
        return Err(RelayError::IncompleteResult { missing });
    }

    let sections: Vec<String> = slots
        .into_iter()
        .flatten()
        .map(|page| {
            let body = match &page.error {
                Some(e) => failure_marker(page.page_num, e),
                None => page.text.clone(),
            };
            match marker.render(page.page_num) {
                Some(m) if body.is_empty() => m,
                Some(m) => format!("{}\n\n{}", m, body),
                None => body,
            }
        })
        .collect();

    Ok(sections.join("\n\n"))
}
