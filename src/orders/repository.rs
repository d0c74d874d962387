//! Seams between the order service and the hosted database

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::notifications::NewNotification;
use crate::store::orders::{Order, OrderItem, OrderPatch};
use crate::store::stores::StoreRole;
use crate::store::supabase::SupabaseError;

use super::lifecycle::OrderStatus;

/// Order reads and guarded writes
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find(&self, order_id: Uuid) -> Result<Option<Order>, SupabaseError>;

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, SupabaseError>;

    /// Orders of a store, newest first
    async fn list_for_store(
        &self,
        store_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, SupabaseError>;

    /// PENDING orders created at or before `cutoff`
    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, SupabaseError>;

    /// Apply `patch` only if the row still has status `expected`.
    /// Returns `None` when the row moved on in the meantime.
    async fn update_if_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, SupabaseError>;
}

/// Who may act for a store
#[async_trait]
pub trait StoreAccess: Send + Sync {
    async fn role_for(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<StoreRole>, SupabaseError>;

    async fn owner_user_id(&self, store_id: Uuid) -> Result<Option<Uuid>, SupabaseError>;
}

/// Where order notifications go
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, notification: NewNotification) -> Result<(), SupabaseError>;
}
