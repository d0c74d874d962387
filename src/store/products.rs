//! Catalog products and store listings (store_products)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::repository::ListingRepository;

use super::supabase::{SupabaseClient, SupabaseError};

/// Composite uniqueness constraint of `store_products`
pub const STORE_PRODUCT_CONFLICT: &str = "store_id,product_id,variant_label";

/// Global catalog product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    /// MRP of the base (1x) variant, minor units
    pub base_mrp: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A store's priced, stocked listing of one variant of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProduct {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub variant_label: String,
    pub selling_price: i64,
    pub mrp: i64,
    pub stock_quantity: i32,
    pub is_active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Listing with the catalog product (joined)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProductWithDetails {
    #[serde(flatten)]
    pub listing: StoreProduct,
    #[serde(rename = "products", default)]
    pub product: Option<Product>,
}

/// Row sent in a reconciliation upsert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreProductUpsert {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub variant_label: String,
    pub selling_price: i64,
    pub mrp: i64,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct DeactivateUpdate {
    is_active: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct StockUpdate {
    stock_quantity: i32,
    updated_at: DateTime<Utc>,
}

/// Catalog and listing store operations
#[derive(Clone)]
pub struct ProductStore {
    client: SupabaseClient,
}

impl ProductStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// All listings of a store with product details
    pub async fn list_store_products(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<StoreProductWithDetails>, SupabaseError> {
        let query = format!(
            "store_id=eq.{}&select=*,products(id,name,category,base_mrp,image_url)&order=product_id,variant_label",
            store_id
        );
        self.client.get("store_products", &query).await
    }
}

#[async_trait]
impl ListingRepository for ProductStore {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, SupabaseError> {
        self.client
            .get_one("products", &format!("id=eq.{}", product_id))
            .await
    }

    async fn variants_of(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        let query = format!("store_id=eq.{}&product_id=eq.{}", store_id, product_id);
        self.client.get("store_products", &query).await
    }

    /// Bulk upsert keyed on the composite constraint
    async fn upsert_variants(
        &self,
        rows: &[StoreProductUpsert],
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .upsert("store_products", &rows, STORE_PRODUCT_CONFLICT)
            .await
    }

    /// Mark a listing inactive; order items keep pointing at it
    async fn deactivate(
        &self,
        store_product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        self.client
            .update_returning(
                "store_products",
                &format!("id=eq.{}", store_product_id),
                &DeactivateUpdate {
                    is_active: false,
                    updated_at: now,
                },
            )
            .await
    }

    /// Set the stock of a listing that belongs to `store_id`
    async fn set_stock(
        &self,
        store_id: Uuid,
        store_product_id: Uuid,
        stock_quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoreProduct>, SupabaseError> {
        let rows: Vec<StoreProduct> = self
            .client
            .update_returning(
                "store_products",
                &format!("id=eq.{}&store_id=eq.{}", store_product_id, store_id),
                &StockUpdate {
                    stock_quantity,
                    updated_at: now,
                },
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
