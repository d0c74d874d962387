//! Store listing endpoints: pricing, variant configuration, stock

use axum::{
    extract::{Extension, Path, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::AuthenticatedUser;
use crate::http::routes::{require_store_role, AppError};
use crate::inventory::pricing::VariantPrice;
use crate::inventory::variants::{ReconcileOutcome, VariantConfig};
use crate::store::products::{Product, StoreProduct, StoreProductWithDetails};

#[derive(Serialize)]
pub struct ListingsResponse {
    products: Vec<StoreProductWithDetails>,
}

pub async fn list_products_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(store_id): Path<Uuid>,
) -> Result<Json<ListingsResponse>, AppError> {
    require_store_role(&state, auth.user_id, store_id).await?;

    let products = state.products.list_store_products(store_id).await?;

    Ok(Json(ListingsResponse { products }))
}

#[derive(Serialize)]
pub struct PricingResponse {
    product: Product,
    variants: Vec<VariantPrice>,
}

pub async fn pricing_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<PricingResponse>, AppError> {
    require_store_role(&state, auth.user_id, store_id).await?;

    let (product, variants) = state.inventory.pricing(product_id).await?;
    Ok(Json(PricingResponse { product, variants }))
}

#[derive(Deserialize)]
pub struct ConfigureVariantsRequest {
    variants: Vec<VariantConfig>,
}

pub async fn configure_variants_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ConfigureVariantsRequest>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    require_store_role(&state, auth.user_id, store_id).await?;

    let outcome = state
        .inventory
        .configure_variants(store_id, product_id, &req.variants, Utc::now())
        .await?;

    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub struct StockRequest {
    stock_quantity: i32,
}

pub async fn set_stock_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((store_id, store_product_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<StockRequest>,
) -> Result<Json<StoreProduct>, AppError> {
    require_store_role(&state, auth.user_id, store_id).await?;

    let listing = state
        .inventory
        .set_stock(store_id, store_product_id, req.stock_quantity, Utc::now())
        .await?;

    Ok(Json(listing))
}
