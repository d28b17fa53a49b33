//! HTTP API.
//!
//! | Route | Methods |
//! |---|---|
//! | `/api/calculate-tax` | `POST` |
//! | `/api/compare` | `POST` |
//! | `/api/slabs` | `GET` |
//! | `/api/slabs/:year` | `GET`, `PUT`, `DELETE` |
//!
//! Bodies are JSON. Amounts may be sent as numbers or numeric strings and
//! are returned as strings rounded to two places. Errors are
//! `{"error": "..."}` with a 4xx or 5xx status.

mod payload;

use std::net::SocketAddr;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tax_core::{CalculationError, RepositoryError};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::report::{round_comparison, round_result};
use crate::service::{AppState, ServiceError};
use crate::session::{SESSION_HEADER, SessionId};

pub use payload::{CalculateRequest, CompareRequest, PayloadError};

const CALCULATION_FAILED: &str = "Error calculating tax.";
const STORE_FAILED: &str = "Error accessing slab store.";

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// An error response: status plus the message sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Maps a service failure. `internal` is the message sent for failures
    /// the client cannot fix.
    fn from_service(
        err: ServiceError,
        internal: &str,
    ) -> Self {
        match err {
            ServiceError::Calculation(CalculationError::Slab(e)) | ServiceError::Slab(e) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ServiceError::EmptyTable(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ServiceError::Calculation(
                e @ (CalculationError::NegativeCtc(_) | CalculationError::InvalidHike(_)),
            ) => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            ServiceError::DefaultYear(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            ServiceError::Store(RepositoryError::NotFound) => {
                Self::new(StatusCode::NOT_FOUND, "No custom slab table for that year.")
            }
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, internal)
            }
        }
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            warn!(status = %self.status, error = %self.message, "rejected request");
        }
        error_response(self.status, &self.message)
    }
}

/// Routes for the API, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/calculate-tax",
            post(calculate_tax).fallback(method_not_allowed),
        )
        .route("/api/compare", post(compare).fallback(method_not_allowed))
        .route("/api/slabs", get(list_slabs).fallback(method_not_allowed))
        .route(
            "/api/slabs/:year",
            get(get_slabs)
                .put(put_slabs)
                .delete(delete_slabs)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .with_state(state)
}

/// Serves the API on an already bound listener until the process stops.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

pub async fn run_http_server(
    state: AppState,
    addr: SocketAddr,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "tax API listening");
    info!("local access: http://127.0.0.1:{}/api/calculate-tax", addr.port());

    serve(listener, state).await
}

pub async fn calculate_tax(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let session = session_id(&headers)?;
    let request = CalculateRequest::from_json(&body)?;

    let result = state
        .calculate(request.input, request.regime, session.as_ref())
        .await
        .map_err(|e| ApiError::from_service(e, CALCULATION_FAILED))?;

    Ok(json_response(StatusCode::OK, round_result(&result)))
}

pub async fn compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let session = session_id(&headers)?;
    let request = CompareRequest::from_json(&body)?;

    let comparison = state
        .compare(
            request.base_ctc,
            request.first,
            request.second,
            request.regime,
            session.as_ref(),
        )
        .await
        .map_err(|e| ApiError::from_service(e, CALCULATION_FAILED))?;

    Ok(json_response(StatusCode::OK, round_comparison(&comparison)))
}

pub async fn list_slabs(State(state): State<AppState>) -> Result<Response, ApiError> {
    let years = state
        .list_years()
        .await
        .map_err(|e| ApiError::from_service(e, STORE_FAILED))?;

    Ok(json_response(StatusCode::OK, years))
}

pub async fn get_slabs(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Response, ApiError> {
    let year = payload::parse_path_year(&year)?;

    match state
        .get_slabs(year)
        .await
        .map_err(|e| ApiError::from_service(e, STORE_FAILED))?
    {
        Some(view) => Ok(json_response(StatusCode::OK, view)),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No slab table for {year}."),
        )),
    }
}

pub async fn put_slabs(
    State(state): State<AppState>,
    Path(year): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let year = payload::parse_path_year(&year)?;
    let slabs = payload::parse_slab_table(&body)?;

    let view = state
        .put_slabs(year, &slabs)
        .await
        .map_err(|e| ApiError::from_service(e, STORE_FAILED))?;

    Ok(json_response(StatusCode::OK, view))
}

pub async fn delete_slabs(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> Result<Response, ApiError> {
    let year = payload::parse_path_year(&year)?;

    state
        .delete_slabs(year)
        .await
        .map_err(|e| ApiError::from_service(e, STORE_FAILED))?;

    Ok(with_cache_control(StatusCode::NO_CONTENT))
}

pub async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn session_id(headers: &HeaderMap) -> Result<Option<SessionId>, ApiError> {
    let Some(raw) = headers.get(SESSION_HEADER) else {
        return Ok(None);
    };

    let invalid = |e: String| ApiError::new(StatusCode::BAD_REQUEST, e);
    let raw = raw.to_str().map_err(|e| invalid(e.to_string()))?;
    SessionId::parse(raw)
        .map(Some)
        .map_err(|e| invalid(e.to_string()))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(
    status: StatusCode,
    body: T,
) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(
    status: StatusCode,
    msg: &str,
) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
