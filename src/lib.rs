//! Profile supervisor library
//!
//! Runs a service once under a profiler for a bounded window when requested through an
//! environment variable, prints the post-processed profile, then starts the service normally.

pub mod app;
pub mod artifact;
pub mod config;
pub mod error;
mod local_logger;
pub mod logger;
mod prelude;
pub mod process;
pub mod session;
pub mod supervisor;

pub use error::SessionError;
pub use local_logger::clean_logger;
pub use session::{ProfileSession, SessionConfig, SessionOutcome, SessionPlan, SessionState};
pub use supervisor::{CommandService, Service, Supervision, supervise};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
