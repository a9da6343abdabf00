use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::{
    card::ProductCard,
    catalog::{self, CatalogContext},
};

use super::{ApiError, ApiResponse, AppState, map_error, middleware::RequestId};

/// A titled list of product cards: a full listing or a carousel strip.
#[derive(Debug, Serialize)]
pub(super) struct CatalogView {
    pub title: String,
    pub products: Vec<ProductCard>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Full listing for `context`.
pub(super) async fn listing(
    state: &AppState,
    context: &CatalogContext,
) -> crate::errors::Result<CatalogView> {
    let products = catalog::compose(&state.db, context).await?;
    Ok(CatalogView {
        title: context.title(),
        products: ProductCard::build_all(&products, context.selection_policy(), Utc::now()),
    })
}

/// Carousel strip for `context`.
pub(super) async fn strip(
    state: &AppState,
    context: &CatalogContext,
) -> crate::errors::Result<CatalogView> {
    let products = catalog::carousel(&state.db, context).await?;
    Ok(CatalogView {
        title: context.title(),
        products: ProductCard::build_all(&products, context.carousel_policy(), Utc::now()),
    })
}

async fn respond(
    state: &AppState,
    req_id: RequestId,
    context: CatalogContext,
) -> Result<Json<ApiResponse<CatalogView>>, ApiError> {
    let view = listing(state, &context)
        .await
        .map_err(|e| map_error(req_id.0.clone(), &e))?;
    Ok(Json(ApiResponse::new(view, req_id.0)))
}

pub(super) async fn search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<CatalogView>>, ApiError> {
    respond(&state, req_id, CatalogContext::FreeText(query.query)).await
}

pub(super) async fn best_sellers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CatalogView>>, ApiError> {
    respond(&state, req_id, CatalogContext::BestSellers).await
}

pub(super) async fn sale(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CatalogView>>, ApiError> {
    respond(&state, req_id, CatalogContext::Sale).await
}

/// Landing page: the Best Sellers and Sale carousels.
pub(super) async fn home(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CatalogView>>>, ApiError> {
    let mut strips = Vec::with_capacity(2);
    for context in [CatalogContext::BestSellers, CatalogContext::Sale] {
        let view = strip(&state, &context)
            .await
            .map_err(|e| map_error(req_id.0.clone(), &e))?;
        strips.push(view);
    }
    Ok(Json(ApiResponse::new(strips, req_id.0)))
}
