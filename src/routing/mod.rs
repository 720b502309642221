//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! HttpRouter (prefix + RouteDescriptor[])
//!     → configure.rs (resolve payload, XSRF, access, timeout, auth mode)
//!     → table.rs (build engine router with static dirs, reject conflicts)
//!     → live table (swapped atomically, dispatched per request)
//!
//! Per matched route:
//!     pre-auth → auth → post-auth → XSRF → payload.rs → handler
//! ```
//!
//! # Design Decisions
//! - Tables are built once per change and never mutated
//! - Duplicate or conflicting routes are errors, not panics
//! - Deterministic: routes are configured in registration order

pub mod configure;
pub mod payload;
pub mod route;
pub mod router;
pub mod table;

pub use configure::{configure_route, PayloadSettings, ResolvedRoute};
pub use route::{
    AuthMode, AuthRequirement, BodyOptions, BodyOutput, RouteAccess, RouteContext, RouteDescriptor,
    RouteHandler, RouteMethod, RouteOptions, RouteTimeout,
};
pub use router::{HttpRouter, RouterId};
pub use table::StaticDir;
