//! HTTP API - JSON routes for the storefront and the admin screens.
//!
//! Handlers stay thin: they translate path and query parameters into
//! [`crate::core`] calls and wrap the result in an [`ApiResponse`] envelope.
//! Domain errors are mapped to status codes in [`map_error`].

mod admin;
mod catalog;
/// Request-id middleware
pub mod middleware;
mod products;

use crate::errors::Error;
use axum::{
    Extension, Json, Router,
    extract::{FromRequest, Request, State},
    http::{HeaderName, Method, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Serialize, de::DeserializeOwned};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use self::middleware::{REQUEST_ID_HEADER, RequestId, request_id};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
}

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response payload
    pub data: T,
    /// Request metadata
    pub meta: ResponseMeta,
}

/// Metadata attached to every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    /// Id of the request, echoed in the `x-request-id` header
    pub request_id: String,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
}

/// Error response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// What went wrong
    pub error: ErrorBody,
    /// Request metadata
    pub meta: ResponseMeta,
}

/// Machine-readable code plus a human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code, e.g. `not_found`
    pub code: String,
    /// Description for humans
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    /// Builds an error envelope for `request_id`.
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// JSON request body. Unreadable bodies are rejected with an [`ApiError`]
/// instead of axum's plain-text response.
pub(crate) struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map_or_else(String::new, |id| id.0.clone());

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::new(
                request_id,
                "validation_error",
                rejection.body_text(),
            )),
        }
    }
}

/// Maps a domain error to its API error. Unexpected errors are logged and
/// reported without detail.
pub(crate) fn map_error(request_id: String, error: &Error) -> ApiError {
    match error {
        Error::ProductNotFound { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        Error::Validation { .. } | Error::InvalidAmount { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        Error::InvalidReferenceProduct { .. } => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "request failed");
            ApiError::new(request_id, "internal_error", "internal server error")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn storefront_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/catalog/home", get(catalog::home))
        .route("/api/v1/catalog/search", get(catalog::search))
        .route("/api/v1/catalog/best-sellers", get(catalog::best_sellers))
        .route("/api/v1/catalog/sale", get(catalog::sale))
        .route("/api/v1/products/{id}", get(products::get_product))
        .route("/api/v1/products/{id}/similar", get(products::similar))
        .route(
            "/api/v1/products/{id}/manufacturer",
            get(products::by_manufacturer),
        )
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/admin/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/api/v1/admin/products/{id}",
            get(admin::get_product)
                .put(admin::update_product)
                .delete(admin::delete_product),
        )
}

/// Builds the complete application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(storefront_router())
        .merge(admin_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                },
                req_id.0,
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    req_id.0,
                )),
            )
        }
    }
}
