//! Existence cache for virtual-host directories.
//!
//! Two sorted sets of directory keys (`"<host>/"`): those known to exist and
//! those known to be missing. Both live behind one lock so a lookup never
//! observes a half-applied insert.

use std::sync::{PoisonError, RwLock};

use crate::vhost::{DEFAULT_ROOT, RESERVED_DIRS};

/// Result of consulting the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Known to exist on disk.
    Found,
    /// Known to be absent (or reserved).
    Missing,
    /// Never seen; the caller must probe.
    Unknown,
}

#[derive(Debug, Default)]
struct Entries {
    found: Vec<String>,
    missing: Vec<String>,
}

impl Entries {
    fn contains(set: &[String], key: &str) -> bool {
        set.binary_search_by(|probe| probe.as_str().cmp(key)).is_ok()
    }

    /// Sorted insert; duplicates are dropped.
    fn insert(set: &mut Vec<String>, key: &str) -> bool {
        match set.binary_search_by(|probe| probe.as_str().cmp(key)) {
            Ok(_) => false,
            Err(pos) => {
                set.insert(pos, key.to_string());
                true
            }
        }
    }
}

/// Thread-safe record of which host directories exist.
///
/// Grows for the lifetime of the process; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    inner: RwLock<Entries>,
}

impl ExistenceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that already knows the server-internal folders.
    ///
    /// `html/` is recorded as found (it is the default root); every other
    /// reserved folder is recorded as missing so no host can shadow it.
    pub fn seeded() -> Self {
        let cache = Self::new();
        for dir in RESERVED_DIRS {
            if dir == DEFAULT_ROOT {
                cache.insert_found(dir);
            } else {
                cache.insert_missing(dir);
            }
        }
        cache
    }

    /// Look a directory key up in both sets.
    pub fn lookup(&self, key: &str) -> Lookup {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if Entries::contains(&entries.found, key) {
            Lookup::Found
        } else if Entries::contains(&entries.missing, key) {
            Lookup::Missing
        } else {
            Lookup::Unknown
        }
    }

    /// Record a directory as existing.
    ///
    /// Returns false if the key was already known (in either set); the first
    /// recorded outcome wins so a key never sits in both sets.
    pub fn insert_found(&self, key: &str) -> bool {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if Entries::contains(&entries.missing, key) {
            return false;
        }
        Entries::insert(&mut entries.found, key)
    }

    /// Record a directory as missing. Same first-wins rule as [`insert_found`](Self::insert_found).
    pub fn insert_missing(&self, key: &str) -> bool {
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if Entries::contains(&entries.found, key) {
            return false;
        }
        Entries::insert(&mut entries.missing, key)
    }
}
