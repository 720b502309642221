//! Per-request auth header side-tables.
//!
//! Two instances exist: headers the auth strategy wants added to the
//! incoming request, and headers it wants added to the outgoing response.

use std::sync::Arc;

use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::http::request::RequestUuid;

#[derive(Debug, Clone, Default)]
pub struct AuthHeadersStorage {
    headers: Arc<DashMap<RequestUuid, HeaderMap>>,
}

impl AuthHeadersStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: RequestUuid, headers: HeaderMap) {
        self.headers.insert(id, headers);
    }

    pub fn get(&self, id: RequestUuid) -> Option<HeaderMap> {
        self.headers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: RequestUuid) -> Option<HeaderMap> {
        self.headers.remove(&id).map(|(_, headers)| headers)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let storage = AuthHeadersStorage::new();
        let id = RequestUuid::new();
        assert!(storage.get(id).is_none());

        let mut headers = HeaderMap::new();
        headers.insert("x-user", "alice".parse().unwrap());
        storage.set(id, headers);
        assert_eq!(storage.get(id).unwrap()["x-user"], "alice");

        assert!(storage.remove(id).is_some());
        assert!(storage.is_empty());
    }
}
