//! Origin allow-list enforcement

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::GatewayError;

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// Exact-match set of allowed request origins
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    /// Build from the comma-separated form used in configuration
    pub fn from_list(raw: &str) -> Self {
        Self::new(tripcast_config::parse_origin_list(raw))
    }

    pub fn allows(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed.iter().any(|a| a == origin)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Reject requests from unlisted origins before anything else runs
pub async fn guard_origin(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match origin {
        Some(origin) if policy.allows(&origin) => {
            debug!("{} {} from {}", request.method(), request.uri(), origin);
            let mut response = next.run(request).await;
            apply_cors_headers(response.headers_mut(), &origin);
            response
        }
        origin => {
            warn!("Rejected request from origin {:?}", origin);
            GatewayError::OriginRejected(origin).into_response()
        }
    }
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}
