//! Order endpoints: status changes and pickup verification

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::AuthenticatedUser;
use crate::http::routes::AppError;
use crate::orders::lifecycle::LifecycleError;
use crate::orders::{OrderStatus, OrderView};

// ============================================================================
// Reads
// ============================================================================

pub async fn get_order_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state
        .orders
        .get_order(auth.user_id, order_id, Utc::now())
        .await?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct OrderListQuery {
    status: Option<String>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    orders: Vec<OrderView>,
}

pub async fn list_store_orders_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(store_id): Path<Uuid>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrderListResponse>, AppError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let orders = state
        .orders
        .list_store_orders(auth.user_id, store_id, status, Utc::now())
        .await?;

    Ok(Json(OrderListResponse { orders }))
}

// ============================================================================
// Status changes
// ============================================================================

#[derive(Deserialize)]
pub struct StatusChangeRequest {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

pub async fn change_status_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<OrderView>, AppError> {
    let target: OrderStatus = req
        .status
        .parse()
        .map_err(|e: LifecycleError| AppError::BadRequest(e.to_string()))?;

    let view = state
        .orders
        .change_status(
            auth.user_id,
            order_id,
            target,
            req.reason.as_deref(),
            Utc::now(),
        )
        .await?;

    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    otp: String,
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    verified: bool,
    order: OrderView,
}

pub async fn verify_otp_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, AppError> {
    let order = state
        .orders
        .verify_otp(auth.user_id, order_id, &req.otp, Utc::now())
        .await?;

    Ok(Json(VerifyOtpResponse {
        verified: true,
        order,
    }))
}

pub async fn resend_pickup_code_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let view = state
        .orders
        .resend_pickup_code(auth.user_id, order_id, Utc::now())
        .await?;

    Ok(Json(view))
}
