//! Pull-through file cache.
//!
//! # Data Flow
//! ```text
//! cache/<name>.txt (URL)
//!     → pointer.rs (discovery, URL validation)
//!     → worker.rs (GET, stream to .<name>.part, rename over cache/<name>)
//!     → served by the HTTP layer at /cache/<name>
//! ```
//!
//! # Design Decisions
//! - One long-lived task; sleeps a fixed interval between passes
//! - Per-entry failures are logged and never stop the loop

pub mod pointer;
pub mod worker;

pub use pointer::{discover, PointerFile, POINTER_SUFFIX};
pub use worker::{CacheRefresher, RefreshError, RefreshReport};
