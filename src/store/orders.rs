//! Order rows and their Supabase access

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orders::lifecycle::OrderStatus;
use crate::orders::repository::OrderRepository;

use super::supabase::{SupabaseClient, SupabaseError};

/// Order row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    /// Order total in minor currency units
    pub total_amount: i64,
    /// Keyed hash of the pickup code, never sent to clients
    #[serde(default, skip_serializing)]
    pub otp_hash: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub return_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Order line with the listing it was bought from (joined)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub store_product_id: Uuid,
    pub quantity: i32,
    /// Price per unit at the time of ordering, minor units
    pub unit_price: i64,
    #[serde(rename = "store_products", default)]
    pub listing: Option<OrderItemListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemListing {
    pub variant_label: String,
    #[serde(rename = "products", default)]
    pub product: Option<ProductName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductName {
    pub name: String,
}

/// Columns written on a status change
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// `Some(None)` clears the stored hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_hash: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// Patch moving an order to `to`, stamping the matching timestamp and
    /// storing `reason` in the column that status uses
    pub fn transition(to: OrderStatus, reason: Option<String>, now: DateTime<Utc>) -> Self {
        let mut patch = Self {
            status: Some(to),
            updated_at: Some(now),
            ..Self::default()
        };

        match to {
            OrderStatus::Confirmed => patch.confirmed_at = Some(now),
            OrderStatus::Ready => patch.ready_at = Some(now),
            OrderStatus::Completed => {
                patch.completed_at = Some(now);
                patch.otp_hash = Some(None);
            }
            OrderStatus::Cancelled => {
                patch.cancelled_at = Some(now);
                patch.rejection_reason = reason;
            }
            OrderStatus::ReturnRequested => patch.return_reason = reason,
            OrderStatus::ReturnRejected => patch.rejection_reason = reason,
            OrderStatus::Pending
            | OrderStatus::Preparing
            | OrderStatus::ReturnApproved
            | OrderStatus::Refunded => {}
        }

        patch
    }
}

/// Order store operations
#[derive(Clone)]
pub struct OrderStore {
    client: SupabaseClient,
}

impl OrderStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderRepository for OrderStore {
    async fn find(&self, order_id: Uuid) -> Result<Option<Order>, SupabaseError> {
        self.client
            .get_one("orders", &format!("id=eq.{}", order_id))
            .await
    }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, SupabaseError> {
        let query = format!(
            "order_id=eq.{}&select=*,store_products(variant_label,products(name))",
            order_id
        );
        self.client.get("order_items", &query).await
    }

    async fn list_for_store(
        &self,
        store_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, SupabaseError> {
        let mut query = format!("store_id=eq.{}&order=created_at.desc", store_id);
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status));
        }
        self.client.get("orders", &query).await
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, SupabaseError> {
        // `+` in the offset would be read as a space in a query string
        let query = format!(
            "status=eq.{}&created_at=lte.{}&order=created_at.asc",
            OrderStatus::Pending,
            cutoff.format("%Y-%m-%dT%H:%M:%S%.fZ")
        );
        self.client.get("orders", &query).await
    }

    async fn update_if_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, SupabaseError> {
        let query = format!("id=eq.{}&status=eq.{}", order_id, expected);
        let rows: Vec<Order> = self
            .client
            .update_returning("orders", &query, patch)
            .await?;
        Ok(rows.into_iter().next())
    }
}
