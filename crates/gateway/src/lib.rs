//! HTTP boundary
//!
//! One endpoint: `POST` a trip form and get the aggregated plan back.
//! Origins are checked first, preflight is answered without touching the
//! planner, and only boundary violations produce non-2xx statuses.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use tripcast_agent::{AgentError, DispatchLoop, ResponseEnvelope, TripForm, TripRequest, TripResponse};

pub mod origin;

pub use origin::OriginPolicy;

/// Boundary errors, each mapped to an HTTP status
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("origin not allowed: {}", .0.as_deref().unwrap_or("<none>"))]
    OriginRejected(Option<String>),

    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::OriginRejected(_) => StatusCode::FORBIDDEN,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AgentError> for GatewayError {
    fn from(err: AgentError) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(json!({"error": self.to_string()}))).into_response();
        if let GatewayError::MethodNotAllowed(_) = self {
            response.headers_mut().insert(
                axum::http::header::ALLOW,
                axum::http::HeaderValue::from_static(origin::ALLOWED_METHODS),
            );
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Turns a validated trip into the outward response
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, trip: TripRequest) -> TripResponse;
}

#[async_trait]
impl Planner for DispatchLoop {
    async fn plan(&self, trip: TripRequest) -> TripResponse {
        self.answer(trip).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<dyn Planner>,
}

/// Build the router with origin guard and request tracing
pub fn router(planner: Arc<dyn Planner>, origins: OriginPolicy) -> Router {
    Router::new()
        .route("/", any(handle_trip))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(origins),
            origin::guard_origin,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { planner })
}

async fn handle_trip(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    match method {
        Method::OPTIONS => StatusCode::NO_CONTENT.into_response(),
        Method::POST => match plan_trip(&state, &body).await {
            Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
            Err(e) => {
                warn!("Rejected trip request: {}", e);
                e.into_response()
            }
        },
        other => GatewayError::MethodNotAllowed(other).into_response(),
    }
}

async fn plan_trip(state: &AppState, body: &[u8]) -> Result<ResponseEnvelope> {
    let form: TripForm = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid request: malformed JSON body: {}", e)))?;
    let trip = form.validate()?;

    info!("Trip request: {} -> {}", trip.origin, trip.destination);
    let response = state.planner.plan(trip).await;
    Ok(ResponseEnvelope::from(response))
}

/// Bind and serve until the process is stopped
pub async fn serve(address: &str, planner: Arc<dyn Planner>, origins: OriginPolicy) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Listening on {}", listener.local_addr()?);
    info!("Allowed origins: {}", origins.allowed().join(", "));

    axum::serve(listener, router(planner, origins)).await?;
    Ok(())
}
