//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State machine (state.rs):
//!     Unconfigured → Configured → Listening → Stopping → Stopped
//!
//! Shutdown (shutdown.rs):
//!     stop() → sample timeout → drain in-flight requests → detach
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop()
//! ```
//!
//! # Design Decisions
//! - Registration is only allowed before Listening; the state cell is the single source of truth
//! - Shutdown has a timeout: the server reaches Stopped even if the drain does not finish

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::ShutdownTimeout;
pub use state::{ServerState, StateCell};
