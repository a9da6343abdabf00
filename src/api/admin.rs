use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    core::product::{self, CatalogProduct, NewProduct, ProductUpdate},
    errors::Error,
};

use super::{ApiError, ApiResponse, AppState, JsonBody, map_error, middleware::RequestId};

#[derive(Debug, Deserialize)]
pub(super) struct AdminQuery {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedProduct {
    id: i64,
    name: String,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogProduct>>>, ApiError> {
    let products = product::admin_search(&state.db, &query.search)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(products, req_id.0)))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CatalogProduct>>, ApiError> {
    let item = product::get_product_with_flavors(&state.db, id)
        .await
        .and_then(|found| found.ok_or(Error::ProductNotFound { id }))
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(item, req_id.0)))
}

pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    JsonBody(body): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<CatalogProduct>>), ApiError> {
    let item = product::create_product(&state.db, body)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(item, req_id.0))))
}

pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<ProductUpdate>,
) -> Result<Json<ApiResponse<CatalogProduct>>, ApiError> {
    let item = product::update_product(&state.db, id, body)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(item, req_id.0)))
}

pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedProduct>>, ApiError> {
    let removed = product::delete_product(&state.db, id)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(
        DeletedProduct {
            id: removed.id,
            name: removed.name,
        },
        req_id.0,
    )))
}
