//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured log events, one debug line per response)
//!     → metrics.rs (counters, gauges, histograms)
//!     → elu.rs (per-request active time and utilization)
//! ```
//!
//! # Design Decisions
//! - Request id and request uuid are attached to every per-request event
//! - Metrics recording is cheap and a no-op without an installed recorder

pub mod elu;
pub mod logging;
pub mod metrics;
