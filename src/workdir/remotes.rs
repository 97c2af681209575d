//! workdir::remotes
//!
//! The remote-configuration cache.
//!
//! # Design
//!
//! Listing remotes walks the repository config, so the result is cached.
//! The cache is an explicit two-state value: either `Unloaded` or
//! `Loaded(list)`, never partially stale. Any remote add or remove
//! transitions it back to `Unloaded`; the next read reloads the full list.

use crate::git::{GitError, RemoteInfo};

/// Cache of the repository's configured remotes.
#[derive(Debug, Default)]
pub enum RemoteCache {
    /// Stale; reload on next access.
    #[default]
    Unloaded,
    /// Fully populated.
    Loaded(Vec<RemoteInfo>),
}

impl RemoteCache {
    /// Whether the cache currently holds a list.
    pub fn is_loaded(&self) -> bool {
        matches!(self, RemoteCache::Loaded(_))
    }

    /// Drop the cached list; the next read reloads.
    pub fn invalidate(&mut self) {
        *self = RemoteCache::Unloaded;
    }

    /// Return the cached list, loading it via `load` when unloaded.
    ///
    /// On load failure the cache stays `Unloaded`.
    pub fn get_or_load<F>(&mut self, load: F) -> Result<&[RemoteInfo], GitError>
    where
        F: FnOnce() -> Result<Vec<RemoteInfo>, GitError>,
    {
        if let RemoteCache::Unloaded = self {
            *self = RemoteCache::Loaded(load()?);
        }

        match self {
            RemoteCache::Loaded(remotes) => Ok(remotes),
            RemoteCache::Unloaded => unreachable!("cache was just loaded"),
        }
    }
}
