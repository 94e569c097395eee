//! Shared request state
//!
//! Only read-only values live here: the path resolver built from the
//! configured root, and the archive engine.

use std::path::Path;
use std::sync::Arc;

use crate::archive::ArchiveEngine;
use crate::storage::PathResolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<PathResolver>,
    pub engine: Arc<ArchiveEngine>,
}

impl AppState {
    pub fn new(root: impl AsRef<Path>, engine: ArchiveEngine) -> Self {
        Self {
            resolver: Arc::new(PathResolver::new(root)),
            engine: Arc::new(engine),
        }
    }
}
