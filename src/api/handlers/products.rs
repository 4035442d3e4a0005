//! Product catalog endpoints

use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::{PrintAreaRect, Side, Size};
use crate::AppState;
use super::{parse_side, ApiFailure};

/// Summary of a customizable product
#[derive(Serialize, ToSchema)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub mockup_size: Size,
    pub sides: Vec<Side>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
}

/// Response for listing products
#[derive(Serialize, ToSchema)]
pub struct ProductsListResponse {
    pub success: bool,
    pub data: Vec<ProductSummary>,
    pub count: usize,
}

/// A usable print zone
#[derive(Serialize, ToSchema)]
pub struct ZoneInfo {
    pub name: String,
    pub area: PrintAreaRect,
}

/// Response for zone listing
#[derive(Serialize, ToSchema)]
pub struct ZonesResponse {
    pub success: bool,
    pub product_id: String,
    pub side: Side,
    pub data: Vec<ZoneInfo>,
}

/// GET /api/v1/products - List customizable products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    responses(
        (status = 200, description = "All products in the catalog", body = ProductsListResponse)
    )
)]
pub async fn list_products(state: web::Data<AppState>) -> HttpResponse {
    let data: Vec<ProductSummary> = state
        .registry()
        .products()
        .map(|p| ProductSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            mockup_size: p.mockup_size,
            sides: p.sides.iter().map(|s| s.side).collect(),
            colors: p.colors.clone(),
            sizes: p.sizes.clone(),
        })
        .collect();

    let count = data.len();
    HttpResponse::Ok().json(ProductsListResponse {
        success: true,
        data,
        count,
    })
}

/// GET /api/v1/products/{product_id}/sides/{side}/zones - Usable zones on one side
///
/// Zones with zero area are not offered and never listed. An unknown side on
/// a known product yields an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/products/{product_id}/sides/{side}/zones",
    tag = "products",
    params(
        ("product_id" = String, Path, description = "Product identifier (e.g., 'tshirt-regular-short')"),
        ("side" = String, Path, description = "Product side (front, back, left_sleeve, right_sleeve)")
    ),
    responses(
        (status = 200, description = "Usable zones", body = ZonesResponse),
        (status = 400, description = "Unknown side name", body = super::ErrorResponse),
        (status = 404, description = "Product not found", body = super::ErrorResponse)
    )
)]
pub async fn list_zones(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (product_id, raw_side) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let registry = state.registry();

    if registry.product(&product_id).is_none() {
        return Err(ApiFailure::ProductNotFound(product_id));
    }

    let data: Vec<ZoneInfo> = registry
        .get_available_zones(&product_id, side)
        .into_iter()
        .filter_map(|name| {
            let area = registry.get_print_area(&product_id, side, &name)?;
            Some(ZoneInfo { name, area })
        })
        .collect();

    debug!(product_id = %product_id, side = %side, zones = data.len(), "Listed zones");

    Ok(HttpResponse::Ok().json(ZonesResponse {
        success: true,
        product_id,
        side,
        data,
    }))
}
