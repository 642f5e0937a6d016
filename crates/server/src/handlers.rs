//! Request handlers.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub revision: String,
}

/// CPE lookup response, partitioned by the deprecated flag.
#[derive(Debug, Serialize)]
pub struct CpeLookupResponse {
    pub cpe_uris: Vec<String>,
    pub deprecated: Vec<String>,
}

/// Deprecation point-lookup response.
#[derive(Debug, Serialize)]
pub struct DeprecatedResponse {
    pub cpe_uri: String,
    pub deprecated: bool,
}

/// `GET /health`
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.store.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        revision: state.build.revision.clone(),
    }))
}

/// `GET /cpes/{vendor}/{product}`
///
/// Path segments are matched with SQL LIKE semantics, so `%` and `_`
/// wildcards pass through to the store.
pub async fn get_cpes(
    State(state): State<AppState>,
    Path((vendor, product)): Path<(String, String)>,
) -> ApiResult<Json<CpeLookupResponse>> {
    let (cpe_uris, deprecated) = state.store.cpes_by_vendor_product(&vendor, &product).await?;
    Ok(Json(CpeLookupResponse {
        cpe_uris,
        deprecated,
    }))
}

/// `GET /vendor-products`
pub async fn list_vendor_products(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.store.vendor_products().await?))
}

/// `GET /deprecated/{cpe_uri}`
pub async fn get_deprecated(
    State(state): State<AppState>,
    Path(cpe_uri): Path<String>,
) -> ApiResult<Json<DeprecatedResponse>> {
    let deprecated = state.store.is_deprecated(&cpe_uri).await?;
    Ok(Json(DeprecatedResponse {
        cpe_uri,
        deprecated,
    }))
}
