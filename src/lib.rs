// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod artifact;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod notify;
pub mod runner;
pub mod state;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::error::MonitorError;
pub use crate::extract::Snapshot;
pub use crate::notify::{NotificationEvent, NotifierMux};
pub use crate::runner::{Runner, SourceOutcome};
pub use crate::state::StateStore;
