use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Serialize;

use crate::{
    core::{
        card::ProductDetail,
        catalog::CatalogContext,
        product::{self, CatalogProduct},
    },
    errors::{Error, Result},
};

use super::{
    ApiError, ApiResponse, AppState,
    catalog::{CatalogView, listing, strip},
    map_error,
    middleware::RequestId,
};

#[derive(Debug, Serialize)]
pub(super) struct ProductPage {
    detail: ProductDetail,
    related: Vec<CatalogView>,
}

async fn load(state: &AppState, id: i64) -> Result<CatalogProduct> {
    product::get_product_with_flavors(&state.db, id)
        .await?
        .ok_or(Error::ProductNotFound { id })
}

async fn page(state: &AppState, id: i64) -> Result<ProductPage> {
    let item = load(state, id).await?;
    let mut related = Vec::with_capacity(2);
    for context in [
        CatalogContext::SimilarTo(item.product.clone()),
        CatalogContext::ByManufacturer(item.product.clone()),
    ] {
        related.push(strip(state, &context).await?);
    }
    Ok(ProductPage {
        detail: ProductDetail::build(&item, Utc::now()),
        related,
    })
}

/// Detail page with the Similar Products and manufacturer carousels.
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<ApiResponse<ProductPage>>, ApiError> {
    let data = page(&state, id)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

async fn related_listing(
    state: &AppState,
    req_id: RequestId,
    id: i64,
    context: fn(crate::entities::ProductModel) -> CatalogContext,
) -> std::result::Result<Json<ApiResponse<CatalogView>>, ApiError> {
    let view = async {
        let item = load(state, id).await?;
        listing(state, &context(item.product)).await
    }
    .await
    .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(view, req_id.0)))
}

pub(super) async fn similar(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<ApiResponse<CatalogView>>, ApiError> {
    related_listing(&state, req_id, id, CatalogContext::SimilarTo).await
}

pub(super) async fn by_manufacturer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<ApiResponse<CatalogView>>, ApiError> {
    related_listing(&state, req_id, id, CatalogContext::ByManufacturer).await
}
