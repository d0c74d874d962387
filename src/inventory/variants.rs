//! Variant configuration of a store listing and its upsert reconciliation

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::store::products::{Product, StoreProduct, StoreProductUpsert};
use crate::store::supabase::SupabaseError;

use super::pricing::{derived_mrp, normalize_label, price_sheet, ratio_for, validate_price, PricingError, VariantPrice};
use super::repository::ListingRepository;

/// Merchant's desired state of one variant
#[derive(Debug, Clone, Deserialize)]
pub struct VariantConfig {
    pub label: String,
    pub selling_price: i64,
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// What has to be written to make the stored rows match the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub upserts: Vec<StoreProductUpsert>,
    /// Active rows whose variant is no longer configured
    pub deactivations: Vec<Uuid>,
    /// Configured variants already stored exactly as requested
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deactivations.is_empty()
    }
}

/// Validate `configs` against the product's category and diff them with
/// `existing` rows of the same store and product
pub fn plan_reconciliation(
    store_id: Uuid,
    product: &Product,
    existing: &[StoreProduct],
    configs: &[VariantConfig],
    now: DateTime<Utc>,
) -> Result<ReconcilePlan, InventoryError> {
    if configs.is_empty() {
        return Err(InventoryError::NoVariants);
    }

    let mut seen = HashSet::new();
    let mut plan = ReconcilePlan::default();

    for config in configs {
        let label = normalize_label(&config.label);
        if !seen.insert(label.clone()) {
            return Err(InventoryError::DuplicateVariant(label));
        }
        if config.stock_quantity < 0 {
            return Err(InventoryError::NegativeStock {
                label,
                stock: config.stock_quantity,
            });
        }

        let ratio = ratio_for(&product.category, &label)?;
        let mrp = derived_mrp(product.base_mrp, ratio)?;
        validate_price(config.selling_price, mrp).map_err(|source| InventoryError::Price {
            label: label.clone(),
            source,
        })?;

        let current = existing
            .iter()
            .find(|row| row.product_id == product.id && row.variant_label == label);
        if let Some(row) = current {
            if row.selling_price == config.selling_price
                && row.mrp == mrp
                && row.stock_quantity == config.stock_quantity
                && row.is_active == config.is_active
            {
                plan.unchanged += 1;
                continue;
            }
        }

        plan.upserts.push(StoreProductUpsert {
            store_id,
            product_id: product.id,
            variant_label: label,
            selling_price: config.selling_price,
            mrp,
            stock_quantity: config.stock_quantity,
            is_active: config.is_active,
            updated_at: now,
        });
    }

    plan.deactivations = existing
        .iter()
        .filter(|row| row.product_id == product.id && row.is_active && !seen.contains(&row.variant_label))
        .map(|row| row.id)
        .collect();

    Ok(plan)
}

/// Result of a reconciliation
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub variants: Vec<StoreProduct>,
    pub upserted: usize,
    pub deactivated: usize,
    pub unchanged: usize,
}

/// Inventory operations for merchants
#[derive(Clone)]
pub struct InventoryService {
    products: Arc<dyn ListingRepository>,
}

impl InventoryService {
    pub fn new(products: Arc<dyn ListingRepository>) -> Self {
        Self { products }
    }

    /// Price sheet of a catalog product
    pub async fn pricing(
        &self,
        product_id: Uuid,
    ) -> Result<(Product, Vec<VariantPrice>), InventoryError> {
        let product = self.product(product_id).await?;
        let sheet = price_sheet(&product.category, product.base_mrp)?;
        Ok((product, sheet))
    }

    /// Make the store's listings of `product_id` match `configs`
    pub async fn configure_variants(
        &self,
        store_id: Uuid,
        product_id: Uuid,
        configs: &[VariantConfig],
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, InventoryError> {
        let product = self.product(product_id).await?;
        let existing = self.products.variants_of(store_id, product_id).await?;
        let plan = plan_reconciliation(store_id, &product, &existing, configs, now)?;

        if !plan.is_empty() {
            self.products.upsert_variants(&plan.upserts).await?;
            for id in &plan.deactivations {
                self.products.deactivate(*id, now).await?;
            }
        }

        info!(
            store_id = %store_id,
            product_id = %product_id,
            upserted = plan.upserts.len(),
            deactivated = plan.deactivations.len(),
            unchanged = plan.unchanged,
            "Variants reconciled"
        );

        let variants = self.products.variants_of(store_id, product_id).await?;
        Ok(ReconcileOutcome {
            variants,
            upserted: plan.upserts.len(),
            deactivated: plan.deactivations.len(),
            unchanged: plan.unchanged,
        })
    }

    /// Set stock of one listing
    pub async fn set_stock(
        &self,
        store_id: Uuid,
        store_product_id: Uuid,
        stock_quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<StoreProduct, InventoryError> {
        if stock_quantity < 0 {
            return Err(InventoryError::NegativeStock {
                label: store_product_id.to_string(),
                stock: stock_quantity,
            });
        }
        self.products
            .set_stock(store_id, store_product_id, stock_quantity, now)
            .await?
            .ok_or(InventoryError::ListingNotFound)
    }

    async fn product(&self, product_id: Uuid) -> Result<Product, InventoryError> {
        self.products
            .get_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound)
    }
}

/// Inventory errors
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Store listing not found")]
    ListingNotFound,

    #[error("At least one variant must be configured")]
    NoVariants,

    #[error("Variant '{0}' is configured more than once")]
    DuplicateVariant(String),

    #[error("Stock for '{label}' cannot be negative ({stock})")]
    NegativeStock { label: String, stock: i32 },

    #[error("Variant '{label}': {source}")]
    Price {
        label: String,
        #[source]
        source: PricingError,
    },

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}
