//! Session management
//!
//! Server-side connection lifecycle: per-session state, the shared client
//! registry, envelope routing, and the per-connection task.

pub mod handler;
pub mod registry;
pub mod router;
pub mod state;

pub use handler::handle_session;
pub use registry::Registry;
pub use router::RouteOutcome;
pub use state::{Session, SessionHandle, SessionState};
