//! Content module loading.
//!
//! Transformers read the files they depend on through a [`ModuleLoader`] so
//! that every resolved path can be reported as a dependency, and so that the
//! watch controller can tell the loader to forget stale content.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// A loader for source content that can forget cached state per path.
pub trait ModuleLoader: Send + Sync {
    /// Load the content of `path`.
    fn load(&self, path: &Path) -> io::Result<Arc<str>>;

    /// Drop anything cached for `path`.
    fn forget(&self, path: &Path);

    /// Drop everything cached.
    fn forget_all(&self);
}

/// In-memory text cache keyed by absolute path.
///
/// Shared partials and data files are read once per session until forgotten.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl SourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `path` is currently cached.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(path)
    }
}

impl ModuleLoader for SourceCache {
    fn load(&self, path: &Path) -> io::Result<Arc<str>> {
        if let Some(content) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(path)
        {
            return Ok(Arc::clone(content));
        }

        let content: Arc<str> = std::fs::read_to_string(path)?.into();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::clone(&content));
        Ok(content)
    }

    fn forget(&self, path: &Path) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(path);
    }

    fn forget_all(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
