//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! HttpConfig
//!     → listener.rs (derive options, resolve, bind)
//!     → tls.rs (optional rustls acceptor)
//!     → axum-server serve loop
//!     → inflight.rs (count requests for drain reporting)
//! ```

pub mod inflight;
pub mod listener;
pub mod tls;

pub use inflight::{InFlightGuard, InFlightTracker};
pub use listener::{ListenerError, ListenerOptions};
