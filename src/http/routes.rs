//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, patch, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use uuid::Uuid;

use crate::app::AppState;
use crate::http::account::{
    list_notifications_handler, mark_all_read_handler, mark_read_handler, set_availability_handler,
};
use crate::http::inventory::{
    configure_variants_handler, list_products_handler, pricing_handler, set_stock_handler,
};
use crate::http::middleware::require_auth;
use crate::http::orders::{
    change_status_handler, get_order_handler, list_store_orders_handler,
    resend_pickup_code_handler, verify_otp_handler,
};
use crate::inventory::InventoryError;
use crate::orders::lifecycle::LifecycleError;
use crate::orders::repository::StoreAccess;
use crate::orders::OrderError;
use crate::store::stores::StoreRole;
use crate::store::supabase::SupabaseError;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/orders/:order_id", get(get_order_handler))
        .route("/orders/:order_id/status", patch(change_status_handler))
        .route("/orders/:order_id/verify-otp", post(verify_otp_handler))
        .route("/orders/:order_id/pickup-code", post(resend_pickup_code_handler))
        .route("/stores/:store_id/orders", get(list_store_orders_handler))
        .route("/stores/:store_id/availability", patch(set_availability_handler))
        .route("/stores/:store_id/products", get(list_products_handler))
        .route(
            "/stores/:store_id/products/:product_id/pricing",
            get(pricing_handler),
        )
        .route(
            "/stores/:store_id/products/:product_id/variants",
            put(configure_variants_handler),
        )
        .route(
            "/stores/:store_id/listings/:store_product_id/stock",
            patch(set_stock_handler),
        )
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/read-all", post(mark_all_read_handler))
        .route("/notifications/:notification_id/read", post(mark_read_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Role of `user_id` in `store_id`, or `Forbidden`
pub async fn require_store_role(
    state: &AppState,
    user_id: Uuid,
    store_id: Uuid,
) -> Result<StoreRole, AppError> {
    state
        .stores
        .role_for(user_id, store_id)
        .await?
        .ok_or(AppError::Forbidden)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    feed_subscribers: usize,
    otp_limiters: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        feed_subscribers: state.feed.subscribers(),
        otp_limiters: state.orders.otp_limiters(),
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SupabaseError> for AppError {
    fn from(e: SupabaseError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound => AppError::NotFound(e.to_string()),
            OrderError::Forbidden => AppError::Forbidden,
            OrderError::Lifecycle(LifecycleError::ReasonRequired { .. })
            | OrderError::Lifecycle(LifecycleError::UnknownStatus(_))
            | OrderError::OtpFormat(_)
            | OrderError::InvalidOtp => AppError::BadRequest(e.to_string()),
            OrderError::Lifecycle(LifecycleError::ActorNotAllowed { .. }) => AppError::Forbidden,
            OrderError::Lifecycle(_)
            | OrderError::StaleStatus { .. }
            | OrderError::Expired
            | OrderError::ReturnWindowClosed
            | OrderError::NotReady(_) => AppError::Conflict(e.to_string()),
            OrderError::TooManyAttempts => AppError::TooManyRequests(e.to_string()),
            OrderError::OtpMissing | OrderError::Database(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::ProductNotFound | InventoryError::ListingNotFound => {
                AppError::NotFound(e.to_string())
            }
            InventoryError::Database(_) => AppError::Internal(e.to_string()),
            InventoryError::NoVariants
            | InventoryError::DuplicateVariant(_)
            | InventoryError::NegativeStock { .. }
            | InventoryError::Price { .. }
            | InventoryError::Pricing(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
