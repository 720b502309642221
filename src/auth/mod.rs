//! Authentication side-tables and session storage.
//!
//! # Data Flow
//! ```text
//! auth strategy (hooks::auth)
//!     → state_storage.rs   (auth state per request uuid)
//!     → headers_storage.rs (request headers merged in, response headers copied out)
//!
//! route handler
//!     → session.rs (signed cookie read, Set-Cookie queued)
//!     → pre-response stage emits queued cookies
//! ```
//!
//! # Design Decisions
//! - Every side-table is keyed by the server-assigned request uuid
//! - Entries are removed when the request-scope guard drops, never by TTL

pub mod headers_storage;
pub mod session;
pub mod state_storage;

pub use headers_storage::AuthHeadersStorage;
pub use session::{
    SameSite, SessionCookieOptions, SessionError, SessionStorage, SessionStorageFactory,
    SessionValidation,
};
pub use state_storage::{AuthStateResult, AuthStateStorage, AuthStatus, HttpAuth};
