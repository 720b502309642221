//! HTTP server shell with a hook-based request lifecycle.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────────────────┐
//!                       │                    HTTP SERVER SHELL                       │
//!                       │                                                            │
//!     Client Request    │  ┌─────────┐   ┌──────────────┐   ┌──────────────────┐    │
//!     ──────────────────┼─▶│   net   │──▶│ http         │──▶│ hooks            │    │
//!                       │  │listener │   │ request      │   │ onPreRouting     │    │
//!                       │  │ + TLS   │   │ state stage  │   │ (guard, base     │    │
//!                       │  └─────────┘   └──────────────┘   │ path, compress)  │    │
//!                       │                                   └────────┬─────────┘    │
//!                       │                                            ▼              │
//!                       │  ┌──────────────┐   ┌──────────────────────────────────┐  │
//!                       │  │ routing      │◀──│ live route table (arc-swap)      │  │
//!                       │  │ preAuth/auth │   └──────────────────────────────────┘  │
//!                       │  │ postAuth/    │                                          │
//!                       │  │ XSRF/payload │──▶ route handler                         │
//!                       │  └──────────────┘          │                               │
//!     Client Response   │  ┌──────────────┐          │                               │
//!     ◀─────────────────┼──│ onPreResponse│◀─────────┘                               │
//!                       │  │ + cookies    │                                          │
//!                       │  └──────────────┘                                          │
//!                       │                                                            │
//!                       │  ┌──────────────────────────────────────────────────────┐ │
//!                       │  │  config │ lifecycle │ auth │ observability │ security │ │
//!                       │  └──────────────────────────────────────────────────────┘ │
//!                       └───────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Request lifecycle
pub mod auth;
pub mod hooks;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::{HttpConfig, ServerConfig};
pub use http::{HttpRequest, HttpServer, HttpServerError, HttpServerSetup, ServerInfo};
pub use lifecycle::{ServerState, ShutdownTimeout};
pub use routing::{HttpRouter, RouteMethod, RouteOptions};
