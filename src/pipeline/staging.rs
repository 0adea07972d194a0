//! Request-scoped scratch space on the local filesystem.
//!
//! Every request owns one directory under the configured work directory,
//! named after its request id so concurrent requests never collide. The
//! directory is a [`tempfile::TempDir`]: dropping [`RequestScratch`] removes
//! it and everything inside on any exit path (early `?`, panic, or a
//! cancelled future). [`RequestScratch::close`] does the same but reports
//! failures, which the success path uses so cleanup errors are surfaced.

use crate::error::RelayError;
use crate::output::PageDocument;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch directory owned by a single request.
pub struct RequestScratch {
    dir: TempDir,
}

/// A page written to the scratch directory.
#[derive(Debug, Clone)]
pub struct StagedPage {
    pub path: PathBuf,
}

impl RequestScratch {
    /// Create `<work_dir>/req-<request_id>-XXXXXX`, creating `work_dir` if needed.
    pub async fn create(work_dir: &Path, request_id: Uuid) -> Result<Self, RelayError> {
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| RelayError::temp(work_dir, e))?;

        let prefix = format!("req-{}-", request_id);
        let dir = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(work_dir)
            .map_err(|e| RelayError::temp(work_dir, e))?;

        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one page to `page-NNNN.pdf`.
    pub async fn stage_page(&self, page: &PageDocument) -> Result<StagedPage, RelayError> {
        let path = self.page_path(page.ordinal);
        tokio::fs::write(&path, &page.bytes)
            .await
            .map_err(|e| RelayError::temp(&path, e))?;
        Ok(StagedPage { path })
    }

    pub fn page_path(&self, ordinal: usize) -> PathBuf {
        self.dir.path().join(format!("page-{:04}.pdf", ordinal))
    }

    /// Remove the scratch directory, reporting any failure.
    pub fn close(self) -> Result<(), RelayError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| RelayError::temp(&path, e))?;
        debug!("Removed scratch directory {}", path.display());
        Ok(())
    }
}

impl StagedPage {
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the staged file once its OCR result is known.
    ///
    /// Failure is logged, not returned: the directory removal at the end of
    /// the request retries it and reports the error if it persists.
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to delete staged page {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn scratch_is_namespaced_and_removed_on_close() {
        let work = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let scratch = RequestScratch::create(work.path(), id).await.unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("req-{id}-")), "got: {name}");

        let staged = scratch
            .stage_page(&PageDocument {
                ordinal: 3,
                bytes: b"%PDF-1.5".to_vec(),
            })
            .await
            .unwrap();
        assert!(staged.path.ends_with("page-0003.pdf"));
        assert_eq!(staged.read().await.unwrap(), b"%PDF-1.5");

        scratch.close().unwrap();
        assert_eq!(count_entries(work.path()), 0);
    }

    #[tokio::test]
    async fn drop_removes_scratch() {
        let work = tempfile::tempdir().unwrap();
        {
            let scratch = RequestScratch::create(work.path(), Uuid::new_v4()).await.unwrap();
            scratch
                .stage_page(&PageDocument {
                    ordinal: 1,
                    bytes: b"%PDF-1.5".to_vec(),
                })
                .await
                .unwrap();
            assert_eq!(count_entries(work.path()), 1);
            assert_eq!(count_entries(scratch.path()), 1);
        }
        assert_eq!(count_entries(work.path()), 0);
    }

    #[tokio::test]
    async fn discard_is_idempotent() {
        let work = tempfile::tempdir().unwrap();
        let scratch = RequestScratch::create(work.path(), Uuid::new_v4()).await.unwrap();
        let staged = scratch
            .stage_page(&PageDocument {
                ordinal: 1,
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap();
        staged.discard().await;
        assert!(!staged.path.exists());
        staged.discard().await;
    }

    #[tokio::test]
    async fn creates_missing_work_dir() {
        let work = tempfile::tempdir().unwrap();
        let nested = work.path().join("a/b");
        let scratch = RequestScratch::create(&nested, Uuid::new_v4()).await.unwrap();
        assert!(scratch.path().starts_with(&nested));
    }
}
