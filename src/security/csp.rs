//! Content-Security-Policy header rendering.

use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;

use crate::config::CspConfig;

impl CspConfig {
    /// Directives joined into a `Content-Security-Policy` value.
    pub fn header(&self) -> String {
        self.directives.join("; ")
    }

    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.header())
    }
}
