//! Mount table and dispatch.
//!
//! # Responsibilities
//! - Hold registered mounts in registration order
//! - Strip the mount prefix and hand the request to the mount's service
//! - Fall through to the next mount when a service declines the request
//!
//! # Design Decisions
//! - Lock-free reads via ArcSwap; registration swaps in a new list, so
//!   mounts added after startup (inspection views) never block requests
//! - A service declines by answering with the [`Unmatched`] extension;
//!   any other response, errors included, ends dispatch
//! - Services see prefix-relative paths, so a relative redirect they emit
//!   gets the prefix put back
//! - O(n) prefix scan (acceptable for typical mount counts)

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;

use crate::routing::binding::{MountKind, RouteBinding};
use crate::routing::matcher::PathPrefixMatcher;

/// Response extension marking "this mount has nothing here, try the next".
#[derive(Debug, Clone, Copy)]
pub struct Unmatched;

/// Request extension carrying the prefix the request was dispatched under.
#[derive(Debug, Clone)]
pub struct MountPrefix(pub Arc<str>);

/// 404 that lets dispatch continue with the next mount.
pub fn unmatched() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    response.extensions_mut().insert(Unmatched);
    response
}

#[derive(Debug)]
struct Mount {
    matcher: PathPrefixMatcher,
    kind: MountKind,
    service: Router,
}

#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Arc<ArcSwap<Vec<Arc<Mount>>>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mount. Earlier mounts keep precedence.
    pub fn register(&self, binding: &RouteBinding, service: Router) {
        let mount = Arc::new(Mount {
            matcher: PathPrefixMatcher::new(binding.prefix.as_str()),
            kind: binding.kind,
            service,
        });
        self.mounts.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&mount));
            next
        });
        tracing::info!(
            prefix = binding.display_prefix(),
            kind = ?binding.kind,
            timing = binding.flags.timing,
            cors = binding.flags.cors,
            "Mount registered"
        );
    }

    pub fn len(&self) -> usize {
        self.mounts.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.load().is_empty()
    }

    /// Registered prefixes in dispatch order.
    pub fn prefixes(&self) -> Vec<String> {
        self.mounts
            .load()
            .iter()
            .map(|m| m.matcher.prefix().to_string())
            .collect()
    }

    pub fn is_registered(&self, prefix: &str, kind: MountKind) -> bool {
        self.mounts
            .load()
            .iter()
            .any(|m| m.kind == kind && m.matcher.prefix() == prefix)
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let mounts = self.mounts.load_full();
        let (parts, body) = request.into_parts();
        // Tile and asset handlers never read bodies, so only the first
        // candidate gets the original one.
        let mut body = Some(body);

        for mount in mounts.iter() {
            let Some(rest) = mount.matcher.strip(parts.uri.path()) else {
                continue;
            };
            let Some(uri) = rewrite_uri(rest, parts.uri.query()) else {
                continue;
            };

            let mut inner = Request::new(body.take().unwrap_or_else(Body::empty));
            *inner.method_mut() = parts.method.clone();
            *inner.uri_mut() = uri;
            *inner.version_mut() = parts.version;
            *inner.headers_mut() = parts.headers.clone();
            *inner.extensions_mut() = parts.extensions.clone();
            inner
                .extensions_mut()
                .insert(MountPrefix(Arc::from(mount.matcher.prefix())));

            let mut response = match mount.service.clone().oneshot(inner).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response.extensions().get::<Unmatched>().is_none() {
                restore_prefix(&mut response, mount.matcher.prefix());
                return response;
            }
            tracing::trace!(prefix = mount.matcher.prefix(), path = %parts.uri.path(), "Mount declined request");
        }

        StatusCode::NOT_FOUND.into_response()
    }
}

fn restore_prefix(response: &mut Response, prefix: &str) {
    if prefix.is_empty() || !response.status().is_redirection() {
        return;
    }
    let Some(location) = response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };
    // only path-absolute locations; `//host/...` is a network path
    if !location.starts_with('/') || location.starts_with("//") {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{prefix}{location}")) {
        response.headers_mut().insert(LOCATION, value);
    }
}

fn rewrite_uri(path: &str, query: Option<&str>) -> Option<Uri> {
    let path_and_query = match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    Uri::builder().path_and_query(path_and_query).build().ok()
}
