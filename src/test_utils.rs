//! Shared test utilities: in-memory stand-ins for the hosted database

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::inventory::repository::ListingRepository;
use crate::inventory::InventoryService;
use crate::orders::lifecycle::OrderStatus;
use crate::orders::otp::OtpIssuer;
use crate::orders::repository::{NotificationSink, OrderRepository, StoreAccess};
use crate::orders::service::OrderService;
use crate::store::notifications::{NewNotification, NotificationKind};
use crate::store::orders::{Order, OrderItem, OrderPatch};
use crate::store::products::{Product, StoreProduct, StoreProductUpsert};
use crate::store::stores::StoreRole;
use crate::store::supabase::SupabaseError;
use crate::ws::OrderFeed;

/// An order with sensible defaults: one minute old, 250.00 total
pub fn order_fixture(status: OrderStatus) -> Order {
    Order {
        id: Uuid::new_v4(),
        store_id: Uuid::nil(),
        customer_id: Uuid::new_v4(),
        status,
        total_amount: 25_000,
        otp_hash: None,
        rejection_reason: None,
        return_reason: None,
        created_at: Utc::now() - chrono::Duration::minutes(1),
        confirmed_at: None,
        ready_at: None,
        completed_at: None,
        cancelled_at: None,
        updated_at: None,
    }
}

/// What PostgREST does with a PATCH body on one row
fn apply_patch(patch: &OrderPatch, order: &mut Order) {
    if let Some(status) = patch.status {
        order.status = status;
    }
    if let Some(hash) = &patch.otp_hash {
        order.otp_hash = hash.clone();
    }
    if let Some(reason) = &patch.rejection_reason {
        order.rejection_reason = Some(reason.clone());
    }
    if let Some(reason) = &patch.return_reason {
        order.return_reason = Some(reason.clone());
    }
    order.confirmed_at = patch.confirmed_at.or(order.confirmed_at);
    order.ready_at = patch.ready_at.or(order.ready_at);
    order.completed_at = patch.completed_at.or(order.completed_at);
    order.cancelled_at = patch.cancelled_at.or(order.cancelled_at);
    order.updated_at = patch.updated_at.or(order.updated_at);
}

#[derive(Default)]
struct State {
    orders: Vec<Order>,
    staff: Vec<Uuid>,
    notifications: Vec<NewNotification>,
    products: Vec<Product>,
    listings: Vec<StoreProduct>,
}

/// One store with an owner, backing all three repository traits
#[derive(Clone)]
pub struct TestBackend {
    pub store_id: Uuid,
    pub owner: Uuid,
    pub feed: OrderFeed,
    state: Arc<Mutex<State>>,
    fail_guard: Arc<AtomicBool>,
    fail_notifications: Arc<AtomicBool>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self {
            store_id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            feed: OrderFeed::new(),
            state: Arc::new(Mutex::new(State::default())),
            fail_guard: Arc::new(AtomicBool::new(false)),
            fail_notifications: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Order service wired to this backend with the test configuration
    pub fn service(&self) -> OrderService {
        OrderService::with_issuer(
            &Config::for_tests(),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            self.feed.clone(),
            OtpIssuer::seeded("test-otp-secret", 42),
        )
    }

    /// Inventory service over this backend's catalog and listings
    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(Arc::new(self.clone()))
    }

    /// Store an order in this backend's store
    pub fn insert_order(&self, mut order: Order) -> Order {
        order.store_id = self.store_id;
        self.state.lock().orders.push(order.clone());
        order
    }

    pub fn add_staff(&self) -> Uuid {
        let user = Uuid::new_v4();
        self.state.lock().staff.push(user);
        user
    }

    pub fn order(&self, order_id: Uuid) -> Order {
        self.state
            .lock()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .expect("order exists")
    }

    pub fn notifications(&self) -> Vec<NewNotification> {
        self.state.lock().notifications.clone()
    }

    /// Code from the latest pickup notification
    pub fn last_pickup_code(&self) -> Option<String> {
        self.notifications()
            .iter()
            .rev()
            .find(|n| n.kind == NotificationKind::PickupCode)
            .and_then(|n| n.body.split("code ").nth(1))
            .map(|rest| rest.chars().take(4).collect())
    }

    pub fn add_product(&self, product: Product) -> Product {
        self.state.lock().products.push(product.clone());
        product
    }

    pub fn add_listing(&self, listing: StoreProduct) -> StoreProduct {
        self.state.lock().listings.push(listing.clone());
        listing
    }

    /// Listings of a product in this backend's store
    pub fn listings(&self, product_id: Uuid) -> Vec<StoreProduct> {
        self.state
            .lock()
            .listings
            .iter()
            .filter(|l| l.store_id == self.store_id && l.product_id == product_id)
            .cloned()
            .collect()
    }

    /// Make every notification write fail until switched back
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    /// Make the next guarded update behave as if another client won the race
    pub fn fail_next_guard(&self) {
        self.fail_guard.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for TestBackend {
    async fn find(&self, order_id: Uuid) -> Result<Option<Order>, SupabaseError> {
        Ok(self
            .state
            .lock()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn items(&self, _order_id: Uuid) -> Result<Vec<OrderItem>, SupabaseError> {
        Ok(Vec::new())
    }

    async fn list_for_store(
        &self,
        store_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, SupabaseError> {
        let mut orders: Vec<Order> = self
            .state
            .lock()
            .orders
            .iter()
            .filter(|o| o.store_id == store_id && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn pending_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, SupabaseError> {
        Ok(self
            .state
            .lock()
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn update_if_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        patch: &OrderPatch,
    ) -> Result<Option<Order>, SupabaseError> {
        if self.fail_guard.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        let mut state = self.state.lock();
        let Some(order) = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.status == expected)
        else {
            return Ok(None);
        };
        apply_patch(patch, order);
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl StoreAccess for TestBackend {
    async fn role_for(
        &self,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<StoreRole>, SupabaseError> {
        if store_id != self.store_id {
            return Ok(None);
        }
        if user_id == self.owner {
            return Ok(Some(StoreRole::Owner));
        }
        Ok(self
            .state
            .lock()
            .staff
            .contains(&user_id)
            .then_some(StoreRole::Staff))
    }

    async fn owner_user_id(&self, store_id: Uuid) -> Result<Option<Uuid>, SupabaseError> {
        Ok((store_id == self.store_id).then_some(self.owner))
    }
}

#[async_trait]
impl NotificationSink for TestBackend {
    async fn push(&self, notification: NewNotification) -> Result<(), SupabaseError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(SupabaseError::Api {
                status: 503,
                body: "notifications unavailable".to_string(),
            });
        }
        self.state.lock().notifications.push(notification);
        Ok(())
    }
}

#[async_trait]
impl ListingRepository for TestBackend {
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, SupabaseError> {
        Ok(self
            .state
            .lock()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned())
    }

    async fn variants_of(
        &self,
        store_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        Ok(self
            .state
            .lock()
            .listings
            .iter()
            .filter(|l| l.store_id == store_id && l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn upsert_variants(
        &self,
        rows: &[StoreProductUpsert],
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        let mut state = self.state.lock();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let existing = state.listings.iter_mut().find(|l| {
                l.store_id == row.store_id
                    && l.product_id == row.product_id
                    && l.variant_label == row.variant_label
            });
            let listing = match existing {
                Some(listing) => {
                    listing.selling_price = row.selling_price;
                    listing.mrp = row.mrp;
                    listing.stock_quantity = row.stock_quantity;
                    listing.is_active = row.is_active;
                    listing.updated_at = Some(row.updated_at);
                    listing.clone()
                }
                None => {
                    let listing = StoreProduct {
                        id: Uuid::new_v4(),
                        store_id: row.store_id,
                        product_id: row.product_id,
                        variant_label: row.variant_label.clone(),
                        selling_price: row.selling_price,
                        mrp: row.mrp,
                        stock_quantity: row.stock_quantity,
                        is_active: row.is_active,
                        updated_at: Some(row.updated_at),
                    };
                    state.listings.push(listing.clone());
                    listing
                }
            };
            stored.push(listing);
        }
        Ok(stored)
    }

    async fn deactivate(
        &self,
        store_product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoreProduct>, SupabaseError> {
        let mut state = self.state.lock();
        Ok(state
            .listings
            .iter_mut()
            .filter(|l| l.id == store_product_id)
            .map(|l| {
                l.is_active = false;
                l.updated_at = Some(now);
                l.clone()
            })
            .collect())
    }

    async fn set_stock(
        &self,
        store_id: Uuid,
        store_product_id: Uuid,
        stock_quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<StoreProduct>, SupabaseError> {
        let mut state = self.state.lock();
        Ok(state
            .listings
            .iter_mut()
            .find(|l| l.id == store_product_id && l.store_id == store_id)
            .map(|l| {
                l.stock_quantity = stock_quantity;
                l.updated_at = Some(now);
                l.clone()
            }))
    }
}
