//! Merchant and customer notifications

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orders::repository::NotificationSink;

use super::supabase::{SupabaseClient, SupabaseError};

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderUpdate,
    PickupCode,
    OrderCancelled,
    ReturnRequest,
}

/// Notification row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub store_id: Option<Uuid>,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// New notification for insertion
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub store_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
struct ReadUpdate {
    is_read: bool,
}

/// Notification store operations
#[derive(Clone)]
pub struct NotificationStore {
    client: SupabaseClient,
}

impl NotificationStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Notifications of a user, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, SupabaseError> {
        let mut query = format!("user_id=eq.{}&order=created_at.desc&limit=100", user_id);
        if unread_only {
            query.push_str("&is_read=eq.false");
        }
        self.client.get("notifications", &query).await
    }

    /// Mark one notification read, returns false if it is not the user's
    pub async fn mark_read(
        &self,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, SupabaseError> {
        let rows: Vec<Notification> = self
            .client
            .update_returning(
                "notifications",
                &format!("id=eq.{}&user_id=eq.{}", notification_id, user_id),
                &ReadUpdate { is_read: true },
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Mark every unread notification of a user read, returns how many changed
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize, SupabaseError> {
        let rows: Vec<Notification> = self
            .client
            .update_returning(
                "notifications",
                &format!("user_id=eq.{}&is_read=eq.false", user_id),
                &ReadUpdate { is_read: true },
            )
            .await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl NotificationSink for NotificationStore {
    async fn push(&self, notification: NewNotification) -> Result<(), SupabaseError> {
        self.client
            .insert_minimal("notifications", &notification)
            .await
    }
}
