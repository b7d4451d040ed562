//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, escaped path)
//!     → matcher.rs (decode path, extract host / first segment)
//!     → router.rs (proxy or redirect table lookup)
//!     → rewrite.rs (strip matched key, prepend upstream base)
//!     → Return: upstream URI or NoMatch
//!
//! Route Compilation (at startup):
//!     [[proxy]] / [[redirect]] entries
//!     → HashMap per table
//!     → Freeze as immutable RouteTable, shared via Arc
//! ```
//!
//! # Design Decisions
//! - Routes built at startup, immutable at runtime
//! - Host match checked before path match
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod rewrite;
pub mod router;

pub use matcher::{request_host, RouteKeys};
pub use rewrite::{rewrite_target, websocket_url};
pub use router::{MatchKind, RouteMatch, RouteTable};
