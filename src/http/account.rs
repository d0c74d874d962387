//! Store availability and notification endpoints

use axum::{
    extract::{Extension, Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::AuthenticatedUser;
use crate::http::routes::{require_store_role, AppError};
use crate::store::notifications::Notification;
use crate::store::stores::{Store, StoreRole};

// ============================================================================
// Store availability
// ============================================================================

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    is_online: bool,
}

pub async fn set_availability_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(store_id): Path<Uuid>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<Store>, AppError> {
    if require_store_role(&state, auth.user_id, store_id).await? != StoreRole::Owner {
        return Err(AppError::Forbidden);
    }

    let store = state
        .stores
        .set_online(store_id, req.is_online)
        .await?
        .ok_or_else(|| AppError::NotFound("Store not found".to_string()))?;

    info!(store_id = %store_id, is_online = req.is_online, "Store availability changed");
    Ok(Json(store))
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    unread_only: bool,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    notifications: Vec<Notification>,
}

pub async fn list_notifications_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationsResponse>, AppError> {
    let notifications = state
        .notifications
        .list_for_user(auth.user_id, query.unread_only)
        .await?;
    Ok(Json(NotificationsResponse { notifications }))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    updated: usize,
}

pub async fn mark_read_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    if !state
        .notifications
        .mark_read(auth.user_id, notification_id)
        .await?
    {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(MarkReadResponse { updated: 1 }))
}

pub async fn mark_all_read_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}
