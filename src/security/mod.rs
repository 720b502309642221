//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched route, after authentication:
//!     → xsrf.rs (require the XSRF header on protected routes)
//!
//! Rendering collaborators:
//!     → csp.rs (Content-Security-Policy value from config)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a protected route without the header is rejected
//! - The XSRF allow-list and global switch are resolved when routes are configured

pub mod csp;
pub mod xsrf;

pub use xsrf::XSRF_HEADER;
