//! Response compression.
//!
//! # Design Decisions
//! - The compression layer is always installed; whether a request is
//!   compressed is decided by removing its `Accept-Encoding` header
//! - With a referrer allow-list, requests from other (or unparsable)
//!   referrers are served uncompressed; requests without a referrer are not affected
//! - The allow-list can be replaced while listening; each request reads the
//!   list current at its arrival

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::http::{header, HeaderMap};
use tower_http::compression::{CompressionLayer, CompressionLevel};
use url::Url;

use crate::config::CompressionConfig;
use crate::hooks::{HookFuture, OnPreRoutingHandler, PreRoutingOutcome};
use crate::http::request::HttpRequest;

pub(crate) fn compression_layer(config: &CompressionConfig) -> CompressionLayer {
    let layer = CompressionLayer::new().br(config.brotli.enabled);
    if config.brotli.enabled {
        layer.quality(CompressionLevel::Precise(config.brotli.quality as i32))
    } else {
        layer
    }
}

/// Referrer hosts allowed to receive compressed responses. `None` allows all.
#[derive(Debug, Clone, Default)]
pub struct ReferrerAllowList(Arc<ArcSwapOption<Vec<String>>>);

impl ReferrerAllowList {
    pub fn new(hosts: Option<Vec<String>>) -> Self {
        Self(Arc::new(ArcSwapOption::from(hosts.map(Arc::new))))
    }

    pub fn replace(&self, hosts: Option<Vec<String>>) {
        self.0.store(hosts.map(Arc::new));
    }

    pub fn current(&self) -> Option<Arc<Vec<String>>> {
        self.0.load_full()
    }
}

/// Pre-routing hook that disables compression per request.
pub(crate) struct ConditionalCompression {
    enabled: bool,
    referrers: ReferrerAllowList,
}

impl ConditionalCompression {
    pub(crate) fn new(enabled: bool, referrers: ReferrerAllowList) -> Self {
        Self { enabled, referrers }
    }

    pub(crate) fn allows(&self, request: &HttpRequest) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(allowed), Some(referrer)) = (self.referrers.current(), request.referrer()) else {
            return true;
        };
        Url::parse(referrer)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| allowed.iter().any(|entry| entry.eq_ignore_ascii_case(&host)))
    }
}

impl OnPreRoutingHandler for ConditionalCompression {
    fn on_pre_routing(&self, request: HttpRequest) -> HookFuture<PreRoutingOutcome> {
        let outcome = if self.allows(&request) {
            PreRoutingOutcome::Next
        } else {
            PreRoutingOutcome::NextWith {
                set_headers: HeaderMap::new(),
                remove_headers: vec![header::ACCEPT_ENCODING],
            }
        };
        Box::pin(async move { Ok(outcome) })
    }
}
