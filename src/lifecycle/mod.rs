//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Check site layout → Bind listeners
//!
//! Update check (update_check.rs):
//!     Fetch latest release tag → Compare → Log
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod update_check;

pub use shutdown::Shutdown;
pub use startup::{bind_listeners, prepare, Listeners, Prepared, StartupError};
pub use update_check::{compare_versions, UpdateStatus};
