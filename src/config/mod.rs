//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → HttpConfig handed to HttpServer::setup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → changed shutdown timeout / compression referrers published to the running server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server is set up, apart from the settings
//!   the watcher publishes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CompressionConfig, CspConfig, HttpConfig, ObservabilityConfig, RequestIdConfig, ServerConfig,
    StaticDirConfig, TlsConfig, XsrfConfig,
};
