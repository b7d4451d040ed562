//! Hostname to document-root resolution.
//!
//! # Responsibilities
//! - Map an inbound hostname to `<root>/<host>/` when that directory exists
//! - Fall back to `<root>/html/` otherwise
//! - Consult the existence cache before touching the disk
//!
//! # Design Decisions
//! - Hostnames are used verbatim; traversal is rejected by the static file layer
//! - Any probe error (permission denied included) counts as "missing"
//! - Probing goes through [`DirProbe`] so tests can count disk hits

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::observability::metrics;
use crate::vhost::cache::{ExistenceCache, Lookup};
use crate::vhost::{DEFAULT_ROOT, RESERVED_DIRS};

/// Filesystem check used on a cache miss.
pub trait DirProbe: Send + Sync {
    /// Resolves to true if `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> impl Future<Output = bool> + Send;
}

/// Probe backed by `tokio::fs::metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl DirProbe for FsProbe {
    async fn is_dir(&self, path: &Path) -> bool {
        // Errors other than NotFound are folded into "missing" as well.
        tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }
}

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Dynamic serving off, or a reserved name.
    Default,
    /// Answered by the existence cache.
    Cache,
    /// Answered by a filesystem probe.
    Probe,
}

/// Outcome of resolving one hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Directory key relative to the server root, e.g. `example.com/` or `html/`.
    pub key: String,
    pub source: Source,
}

impl Resolution {
    fn default_root(source: Source) -> Self {
        Self {
            key: DEFAULT_ROOT.to_string(),
            source,
        }
    }

    /// True when the request falls back to the default site.
    pub fn is_default(&self) -> bool {
        self.key == DEFAULT_ROOT
    }
}

/// Resolves hostnames to document roots.
pub struct HostResolver<P = FsProbe> {
    root: PathBuf,
    dynamic: bool,
    cache: Option<ExistenceCache>,
    probe: P,
}

impl HostResolver<FsProbe> {
    /// Create a resolver over `root` using the real filesystem.
    pub fn new(root: impl Into<PathBuf>, dynamic: bool, cache_lookups: bool) -> Self {
        Self::with_probe(root, dynamic, cache_lookups, FsProbe)
    }
}

impl<P: DirProbe> HostResolver<P> {
    /// Create a resolver with a custom probe.
    pub fn with_probe(root: impl Into<PathBuf>, dynamic: bool, cache_lookups: bool, probe: P) -> Self {
        Self {
            root: root.into(),
            dynamic,
            cache: cache_lookups.then(ExistenceCache::seeded),
            probe,
        }
    }

    /// Resolve `hostname` to the absolute directory to serve from.
    pub async fn resolve(&self, hostname: &str) -> PathBuf {
        self.root.join(self.resolve_key(hostname).await.key)
    }

    /// Resolve `hostname` to a directory key relative to the server root.
    pub async fn resolve_key(&self, hostname: &str) -> Resolution {
        if !self.dynamic {
            return Resolution::default_root(Source::Default);
        }

        let key = format!("{}/", hostname);

        match &self.cache {
            Some(cache) => match cache.lookup(&key) {
                Lookup::Found => {
                    metrics::record_host_lookup("hit_found");
                    return Resolution { key, source: Source::Cache };
                }
                Lookup::Missing => {
                    metrics::record_host_lookup("hit_missing");
                    return Resolution::default_root(Source::Cache);
                }
                Lookup::Unknown => {}
            },
            None => {
                if RESERVED_DIRS.contains(&key.as_str()) {
                    return Resolution::default_root(Source::Default);
                }
            }
        }

        if self.probe.is_dir(&self.root.join(&key)).await {
            metrics::record_host_lookup("probe_found");
            if let Some(cache) = &self.cache {
                cache.insert_found(&key);
                tracing::info!(host = %hostname, "Host directory found");
            }
            Resolution { key, source: Source::Probe }
        } else {
            metrics::record_host_lookup("probe_missing");
            if let Some(cache) = &self.cache {
                cache.insert_missing(&key);
                tracing::info!(host = %hostname, "Host directory not found, using default root");
            }
            Resolution::default_root(Source::Probe)
        }
    }

    /// The existence cache, when lookups are cached.
    pub fn cache(&self) -> Option<&ExistenceCache> {
        self.cache.as_ref()
    }

    /// Server root all keys are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl<P> std::fmt::Debug for HostResolver<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostResolver")
            .field("root", &self.root)
            .field("dynamic", &self.dynamic)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
