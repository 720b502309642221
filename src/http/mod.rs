//! HTTP server shell subsystem.
//!
//! # Data Flow
//! ```text
//! HttpServer::setup(config)
//!     → setup.rs (HttpServerSetup: routers, static dirs, hooks, auth, sessions)
//! HttpServer::start()
//!     → routing (configure pending routers, build + swap the route table)
//!     → net (bind, optional TLS) → axum-server serve loop
//!     → pipeline.rs (per-request stages, see module docs)
//!     → response.rs (hook responses, 500/503 bodies)
//! HttpServer::stop()
//!     → graceful drain bounded by the sampled shutdown timeout
//! ```

pub mod base_path;
pub mod compression;
pub mod error;
pub(crate) mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod setup;

pub use base_path::BasePath;
pub use compression::ReferrerAllowList;
pub use error::{HttpServerError, Result};
pub use request::{HttpRequest, RequestId, RequestUuid, X_OPAQUE_ID};
pub use response::HookResponse;
pub use server::HttpServer;
pub use setup::{HttpServerSetup, ServerInfo};
