//! Per-mount middleware.
//!
//! # Responsibilities
//! - `X-Response-Time` header (milliseconds, three decimals)
//! - Permissive CORS
//! - Assemble the chain from a mount's flags
//!
//! # Design Decisions
//! - Timing is the outer layer so the measurement includes CORS handling
//! - Layers are applied per mount, so two mounts can disagree on flags

use std::time::Instant;

use axum::extract::Request;
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::routing::MountFlags;

pub const X_RESPONSE_TIME: &str = "x-response-time";

pub async fn response_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = format!("{:.3}ms", start.elapsed().as_secs_f64() * 1000.0);
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(X_RESPONSE_TIME, value);
    }
    response
}

pub fn cors() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods([
        Method::GET,
        Method::HEAD,
        Method::PUT,
        Method::PATCH,
        Method::POST,
        Method::DELETE,
    ])
}

/// Wrap a mount's service according to its flags.
pub fn apply(router: Router, flags: MountFlags) -> Router {
    let router = if flags.cors { router.layer(cors()) } else { router };
    if flags.timing {
        router.layer(middleware::from_fn(response_time))
    } else {
        router
    }
}
