//! Virtual host subsystem.
//!
//! # Data Flow
//! ```text
//! Host header
//!     → resolver.rs ("<host>/" key)
//!     → cache.rs (found / missing / unknown)
//!     → on unknown: filesystem probe, result recorded in cache.rs
//!     → document root (<root>/<host>/ or <root>/html/)
//! ```
//!
//! # Design Decisions
//! - Sorted sets with binary search, guarded by a single RwLock
//! - No eviction: the cache lives as long as the process
//! - Reserved folders can never be selected as a host root

pub mod cache;
pub mod resolver;

pub use cache::{ExistenceCache, Lookup};
pub use resolver::{DirProbe, FsProbe, HostResolver, Resolution, Source};

/// Directory key of the default site.
pub const DEFAULT_ROOT: &str = "html/";

/// Server-internal folders that a virtual host may not shadow.
pub const RESERVED_DIRS: [&str; 4] = ["ssl/", "error/", "cache/", "html/"];
