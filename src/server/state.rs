//! Shared application state.

use crate::config::RelayConfig;
use crate::extract::Extractor;
use std::sync::Arc;

/// State handed to every handler. Cloning is a pointer copy.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    extractor: Extractor,
}

impl AppState {
    pub fn new(extractor: Extractor) -> Self {
        Self {
            inner: Arc::new(AppStateInner { extractor }),
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.inner.extractor
    }

    pub fn config(&self) -> &RelayConfig {
        self.inner.extractor.config()
    }
}
