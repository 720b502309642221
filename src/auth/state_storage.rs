//! Per-request authentication state.
//!
//! # Responsibilities
//! - Record the state returned by a successful authentication
//! - Answer "is this request authenticated?" for handlers and hooks
//! - Report `Unknown` when no authentication strategy is registered

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::http::request::{HttpRequest, RequestUuid};

/// Authentication status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Authenticated,
    Unauthenticated,
    /// No authentication strategy is registered.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStateResult {
    pub status: AuthStatus,
    pub state: Option<serde_json::Value>,
}

/// Side-table of auth state keyed by request uuid.
#[derive(Debug, Clone, Default)]
pub struct AuthStateStorage {
    states: Arc<DashMap<RequestUuid, serde_json::Value>>,
    registered: Arc<AtomicBool>,
}

impl AuthStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a strategy as registered. Returns `false` if one already was.
    pub(crate) fn mark_registered(&self) -> bool {
        !self.registered.swap(true, Ordering::SeqCst)
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set(&self, id: RequestUuid, state: serde_json::Value) {
        self.states.insert(id, state);
    }

    pub fn get(&self, id: RequestUuid) -> AuthStateResult {
        if !self.is_registered() {
            return AuthStateResult {
                status: AuthStatus::Unknown,
                state: None,
            };
        }
        match self.states.get(&id) {
            Some(state) => AuthStateResult {
                status: AuthStatus::Authenticated,
                state: Some(state.value().clone()),
            },
            None => AuthStateResult {
                status: AuthStatus::Unauthenticated,
                state: None,
            },
        }
    }

    pub fn is_authenticated(&self, id: RequestUuid) -> bool {
        self.get(id).status == AuthStatus::Authenticated
    }

    pub fn remove(&self, id: RequestUuid) {
        self.states.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Read-only view of auth state handed to route handlers.
#[derive(Debug, Clone)]
pub struct HttpAuth {
    storage: AuthStateStorage,
}

impl HttpAuth {
    pub(crate) fn new(storage: AuthStateStorage) -> Self {
        Self { storage }
    }

    pub fn get(&self, request: &HttpRequest) -> AuthStateResult {
        self.storage.get(request.uuid())
    }

    pub fn is_authenticated(&self, request: &HttpRequest) -> bool {
        self.storage.is_authenticated(request.uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_without_strategy() {
        let storage = AuthStateStorage::new();
        let id = RequestUuid::new();
        storage.set(id, json!({"user": "a"}));
        assert_eq!(storage.get(id).status, AuthStatus::Unknown);
        assert!(!storage.is_authenticated(id));
    }

    #[test]
    fn authenticated_after_set() {
        let storage = AuthStateStorage::new();
        assert!(storage.mark_registered());
        let id = RequestUuid::new();
        assert_eq!(storage.get(id).status, AuthStatus::Unauthenticated);

        storage.set(id, json!({"user": "a"}));
        let result = storage.get(id);
        assert_eq!(result.status, AuthStatus::Authenticated);
        assert_eq!(result.state, Some(json!({"user": "a"})));

        storage.remove(id);
        assert!(!storage.is_authenticated(id));
        assert!(storage.is_empty());
    }

    #[test]
    fn registration_flag_is_set_once() {
        let storage = AuthStateStorage::new();
        assert!(storage.mark_registered());
        assert!(!storage.clone().mark_registered());
    }
}
