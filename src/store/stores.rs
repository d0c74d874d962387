//! Store rows, ownership and staff membership

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orders::repository::StoreAccess;

use super::supabase::{SupabaseClient, SupabaseError};

/// How a user is attached to a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRole {
    Owner,
    Staff,
}

/// Store row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub opens_at: Option<String>,
    #[serde(default)]
    pub closes_at: Option<String>,
}

/// Store with the owning merchant's auth user (joined)
#[derive(Debug, Clone, Deserialize)]
struct StoreOwner {
    #[serde(rename = "merchants")]
    merchant: Option<MerchantUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct MerchantUser {
    user_id: Uuid,
}

#[derive(Debug, Serialize)]
struct AvailabilityUpdate {
    is_online: bool,
}

/// Store lookups
#[derive(Clone)]
pub struct StoreDirectory {
    client: SupabaseClient,
}

impl StoreDirectory {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Flip the online/offline flag, returns the updated row
    pub async fn set_online(
        &self,
        store_id: Uuid,
        is_online: bool,
    ) -> Result<Option<Store>, SupabaseError> {
        let rows: Vec<Store> = self
            .client
            .update_returning(
                "stores",
                &format!("id=eq.{}", store_id),
                &AvailabilityUpdate { is_online },
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl StoreAccess for StoreDirectory {
    async fn role_for(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<StoreRole>, SupabaseError> {
        if self.owner_user_id(store_id).await? == Some(user_id) {
            return Ok(Some(StoreRole::Owner));
        }

        let query = format!(
            "store_id=eq.{}&user_id=eq.{}&is_active=eq.true&select=id",
            store_id, user_id
        );
        let staff: Option<serde_json::Value> = self.client.get_one("staff", &query).await?;
        Ok(staff.map(|_| StoreRole::Staff))
    }

    async fn owner_user_id(&self, store_id: Uuid) -> Result<Option<Uuid>, SupabaseError> {
        let query = format!("id=eq.{}&select=merchants(user_id)", store_id);
        let store: Option<StoreOwner> = self.client.get_one("stores", &query).await?;
        Ok(store.and_then(|s| s.merchant).map(|m| m.user_id))
    }
}
