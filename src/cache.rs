//! Bounded cache of temporary files
//!
//! Tracks at most `maxsize` files on disk. When a new file pushes the count
//! over the bound, the oldest tracked file is deleted. Order is insertion
//! order only; access never reorders entries.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache shared between worker threads
pub type SharedFileCache = Arc<Mutex<LruFileCache>>;

#[derive(Debug, Clone)]
pub struct LruFileCache {
    files: VecDeque<PathBuf>,
    maxsize: usize,
}

impl LruFileCache {
    /// Cache starting from `initial`; entries beyond `maxsize` are evicted
    /// oldest first.
    pub fn new(initial: Vec<PathBuf>, maxsize: usize) -> Self {
        let mut cache = Self {
            files: VecDeque::with_capacity(maxsize.saturating_add(1)),
            maxsize,
        };
        for path in initial {
            if !cache.files.contains(&path) {
                cache.files.push_back(path);
            }
        }
        while cache.files.len() > cache.maxsize {
            cache.evict_oldest();
        }
        cache
    }

    pub fn shared(self) -> SharedFileCache {
        Arc::new(Mutex::new(self))
    }

    /// Start tracking `path`; no-op if it is already tracked.
    ///
    /// Evicts the single oldest entry when the bound is exceeded.
    pub fn track<P: AsRef<Path>>(&mut self, path: P) {
        let path = path.as_ref();
        if self.files.iter().any(|p| p == path) {
            return;
        }
        self.files.push_back(path.to_path_buf());
        if self.files.len() > self.maxsize {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let Some(path) = self.files.pop_front() else {
            return;
        };
        if !path.exists() {
            return;
        }
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Evicted cached file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete evicted file"),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn maxsize(&self) -> usize {
        self.maxsize
    }
}
