//! Seam between inventory rules and the listing tables

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::products::{Product, StoreProduct, StoreProductUpsert};
use crate::store::supabase::SupabaseError;

/// Catalog reads and `store_products` writes
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, SupabaseError>;

    /// Listings of one product in one store, any activity state
    async fn variants_of(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<StoreProduct>, SupabaseError>;

    /// Insert or update on `(store_id, product_id, variant_label)`
    async fn upsert_variants(
        &self,
        rows: &[StoreProductUpsert],
    ) -> Result<Vec<StoreProduct>, SupabaseError>;

    async fn deactivate(
        &self,
        store_product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoreProduct>, SupabaseError>;

    /// `None` when the listing does not exist in `store_id`
    async fn set_stock(
        &self,
        store_id: Uuid,
        store_product_id: Uuid,
        stock_quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoreProduct>, SupabaseError>;
}
