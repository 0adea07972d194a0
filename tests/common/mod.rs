//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use doculoader::{OcrProvider, PageError, RelayError};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Build an in-memory PDF with one text line per page.
pub fn build_pdf(texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Number of entries left under `dir`, recursively.
pub fn leftover_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        1 + leftover_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Deterministic OCR double.
///
/// Answers `"text of page N"` for page `N`, fails the ordinals in `failing`,
/// and records what it observed while running.
pub struct Scripted {
    pub configured: bool,
    pub failing: HashSet<usize>,
    /// Sleep `(pages - N) * step` before answering, so later pages finish first.
    pub reverse_delay: Option<(usize, Duration)>,
    /// Never answer.
    pub hang: bool,
    /// Scratch root; when set, the double checks that a staged file exists.
    pub work_dir: Option<PathBuf>,

    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub saw_staged_file: AtomicBool,
    pub single_page_inputs: AtomicBool,
}

impl Scripted {
    pub fn new() -> Self {
        Self {
            configured: true,
            failing: HashSet::new(),
            reverse_delay: None,
            hang: false,
            work_dir: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            saw_staged_file: AtomicBool::new(false),
            single_page_inputs: AtomicBool::new(true),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn failing(mut self, pages: &[usize]) -> Self {
        self.failing = pages.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for Scripted {
    fn engine(&self) -> &str {
        "scripted"
    }

    fn ensure_configured(&self) -> Result<(), RelayError> {
        if self.configured {
            Ok(())
        } else {
            Err(RelayError::NotConfigured {
                provider: "scripted".into(),
                hint: "set SCRIPTED_KEY".into(),
            })
        }
    }

    async fn recognize(&self, page: usize, pdf: &[u8]) -> Result<String, PageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let single = Document::load_mem(pdf)
            .map(|d| d.get_pages().len() == 1)
            .unwrap_or(false);
        if !single {
            self.single_page_inputs.store(false, Ordering::SeqCst);
        }
        if let Some(dir) = &self.work_dir {
            if leftover_files(dir) > 0 {
                self.saw_staged_file.store(true, Ordering::SeqCst);
            }
        }

        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some((pages, step)) = self.reverse_delay {
            let factor = pages.saturating_sub(page) as u32;
            tokio::time::sleep(step * factor).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(&page) {
            Err(PageError::Provider {
                page,
                detail: "HTTP 500: simulated".into(),
            })
        } else {
            Ok(format!("text of page {page}"))
        }
    }
}
