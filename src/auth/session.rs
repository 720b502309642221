//! Signed-cookie session storage.
//!
//! # Responsibilities
//! - Validate cookie options once, when the factory is created
//! - Read a session value from the request cookie (signature, expiry, user validation)
//! - Queue `Set-Cookie` headers that the pipeline emits before the response is sent
//!
//! # Design Decisions
//! - Cookie value is `hex(json) . hex(HMAC-SHA256)`; integrity-protected, not encrypted
//! - The first key signs, every key verifies, so keys can be rotated
//! - Invalid or expired cookies read as "no session" and are cleared

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderValue};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::http::request::{HttpRequest, RequestUuid};

type HmacSha256 = Hmac<Sha256>;

/// Minimum length of a signing key in bytes.
pub const MIN_KEY_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session cookie options: {0}")]
    InvalidOptions(String),

    #[error("Failed to serialize session value: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Session cookie is not a valid header value")]
    InvalidHeader,
}

/// Outcome of the user-supplied session validation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionValidation {
    pub is_valid: bool,
    /// Cookie path to clear when the session is rejected.
    pub path: Option<String>,
}

impl SessionValidation {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            path: None,
        }
    }

    pub fn invalid(path: Option<String>) -> Self {
        Self {
            is_valid: false,
            path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        })
    }
}

type Validator<T> = Arc<dyn Fn(&T) -> SessionValidation + Send + Sync>;

/// Cookie configuration for [`SessionStorageFactory`].
pub struct SessionCookieOptions<T> {
    pub name: String,
    pub encryption_keys: Vec<String>,
    pub validate: Validator<T>,
    pub is_secure: bool,
    pub same_site: Option<SameSite>,
    pub ttl: Option<Duration>,
}

impl<T: 'static> SessionCookieOptions<T> {
    pub fn new(name: impl Into<String>, encryption_keys: Vec<String>) -> Self {
        Self {
            name: name.into(),
            encryption_keys,
            validate: Arc::new(|_: &T| SessionValidation::valid()),
            is_secure: false,
            same_site: None,
            ttl: None,
        }
    }

    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> SessionValidation + Send + Sync + 'static,
    {
        self.validate = Arc::new(validate);
        self
    }

    pub fn secure(mut self, is_secure: bool) -> Self {
        self.is_secure = is_secure;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn check(&self) -> Result<(), SessionError> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid_name {
            return Err(SessionError::InvalidOptions(format!(
                "cookie name {:?} is not a valid token",
                self.name
            )));
        }
        if self.encryption_keys.is_empty() {
            return Err(SessionError::InvalidOptions(
                "at least one encryption key is required".into(),
            ));
        }
        if let Some(position) = self
            .encryption_keys
            .iter()
            .position(|key| key.len() < MIN_KEY_LENGTH)
        {
            return Err(SessionError::InvalidOptions(format!(
                "encryption key #{} must be at least {} bytes",
                position, MIN_KEY_LENGTH
            )));
        }
        Ok(())
    }
}

impl<T> fmt::Debug for SessionCookieOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieOptions")
            .field("name", &self.name)
            .field("encryption_keys", &format_args!("[{} redacted]", self.encryption_keys.len()))
            .field("is_secure", &self.is_secure)
            .field("same_site", &self.same_site)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// `Set-Cookie` values queued per request, drained by the pre-response stage.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionCookieJar {
    queued: Arc<DashMap<RequestUuid, Vec<HeaderValue>>>,
}

impl SessionCookieJar {
    pub(crate) fn queue(&self, id: RequestUuid, cookie: HeaderValue) {
        self.queued.entry(id).or_default().push(cookie);
    }

    pub(crate) fn take(&self, id: RequestUuid) -> Vec<HeaderValue> {
        self.queued.remove(&id).map(|(_, cookies)| cookies).unwrap_or_default()
    }

    pub(crate) fn remove(&self, id: RequestUuid) {
        self.queued.remove(&id);
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    value: T,
    expires_at: Option<u64>,
}

struct FactoryInner<T> {
    options: SessionCookieOptions<T>,
    cookie_path: String,
    jar: SessionCookieJar,
}

/// Creates request-scoped [`SessionStorage`] handles.
pub struct SessionStorageFactory<T> {
    inner: Arc<FactoryInner<T>>,
}

impl<T> Clone for SessionStorageFactory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SessionStorageFactory<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub(crate) fn new(
        options: SessionCookieOptions<T>,
        cookie_path: String,
        jar: SessionCookieJar,
    ) -> Result<Self, SessionError> {
        options.check()?;
        Ok(Self {
            inner: Arc::new(FactoryInner {
                options,
                cookie_path,
                jar,
            }),
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.inner.options.name
    }

    /// Session storage bound to one request.
    pub fn as_scoped(&self, request: &HttpRequest) -> SessionStorage<T> {
        SessionStorage {
            inner: Arc::clone(&self.inner),
            request_uuid: request.uuid(),
            cookie: read_cookie(request, &self.inner.options.name),
        }
    }
}

pub struct SessionStorage<T> {
    inner: Arc<FactoryInner<T>>,
    request_uuid: RequestUuid,
    cookie: Option<String>,
}

impl<T> SessionStorage<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Current session value, or `None` if absent, tampered with, expired or rejected.
    pub fn get(&self) -> Option<T> {
        let raw = self.cookie.as_deref()?;
        let Some(envelope) = self.inner.decode(raw) else {
            tracing::debug!(cookie = %self.inner.options.name, "Discarding unverifiable session cookie");
            self.clear();
            return None;
        };

        if envelope.expires_at.is_some_and(|expires_at| expires_at <= now_millis()) {
            self.clear();
            return None;
        }

        let validation = (self.inner.options.validate)(&envelope.value);
        if !validation.is_valid {
            self.queue(self.inner.clearing_cookie(validation.path.as_deref()));
            return None;
        }
        Some(envelope.value)
    }

    pub fn set(&self, value: T) -> Result<(), SessionError> {
        let cookie = self.inner.encode(value)?;
        let header = HeaderValue::from_str(&cookie).map_err(|_| SessionError::InvalidHeader)?;
        self.inner.jar.queue(self.request_uuid, header);
        Ok(())
    }

    pub fn clear(&self) {
        self.queue(self.inner.clearing_cookie(None));
    }

    fn queue(&self, cookie: String) {
        match HeaderValue::from_str(&cookie) {
            Ok(header) => self.inner.jar.queue(self.request_uuid, header),
            Err(_) => tracing::warn!(cookie = %self.inner.options.name, "Dropping invalid session cookie"),
        }
    }
}

impl<T> FactoryInner<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: T) -> Result<String, SessionError> {
        let envelope = Envelope {
            value,
            expires_at: self
                .options
                .ttl
                .map(|ttl| now_millis().saturating_add(ttl.as_millis() as u64)),
        };
        let payload = hex::encode(serde_json::to_vec(&envelope)?);
        let signature = hex::encode(sign(&self.options.encryption_keys[0], &payload));

        let mut cookie = format!(
            "{}={}.{}; Path={}; HttpOnly",
            self.options.name, payload, signature, self.cookie_path
        );
        if let Some(ttl) = self.options.ttl {
            cookie.push_str(&format!("; Max-Age={}", ttl.as_secs()));
        }
        self.push_attributes(&mut cookie);
        Ok(cookie)
    }

    fn decode(&self, raw: &str) -> Option<Envelope<T>> {
        let (payload, signature) = raw.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let verified = self.options.encryption_keys.iter().any(|key| {
            let expected = sign(key, payload);
            expected.len() == signature.len() && bool::from(expected.ct_eq(&signature))
        });
        if !verified {
            return None;
        }
        serde_json::from_slice(&hex::decode(payload).ok()?).ok()
    }

    fn clearing_cookie(&self, path: Option<&str>) -> String {
        let mut cookie = format!(
            "{}=; Path={}; HttpOnly; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.options.name,
            path.unwrap_or(&self.cookie_path)
        );
        self.push_attributes(&mut cookie);
        cookie
    }

    fn push_attributes(&self, cookie: &mut String) {
        if self.options.is_secure {
            cookie.push_str("; Secure");
        }
        if let Some(same_site) = self.options.same_site {
            cookie.push_str(&format!("; SameSite={}", same_site));
        }
    }
}

fn sign(key: &str, payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn read_cookie(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
