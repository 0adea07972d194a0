//! Pipeline stages for PDF-to-text extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and the orchestration in [`crate::extract`] stays a readable sequence.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ staging ──▶ ocr ──▶ postprocess ──▶ aggregate
//! (checks)  (lopdf)   (scratch)   (provider) (cleanup)     (ordered text)
//! ```
//!
//! 1. [`input`]: reject empty or non-PDF uploads before any work
//! 2. [`split`]: one single-page PDF per page; runs in `spawn_blocking`
//! 3. [`staging`]: request-scoped scratch directory, removed on every exit
//! 4. [`ocr`]: bounded submit-and-wait per page, handler-side retries;
//!    the only stage with network I/O
//! 5. [`postprocess`]: deterministic text clean-up rules
//! 6. [`aggregate`]: ordinal-ordered concatenation with page markers

pub mod aggregate;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod split;
pub mod staging;
