//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::inventory::InventoryService;
use crate::orders::OrderService;
use crate::store::{NotificationStore, OrderStore, ProductStore, StoreDirectory, SupabaseClient};
use crate::ws::OrderFeed;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: StoreDirectory,
    pub notifications: NotificationStore,
    pub products: ProductStore,
    pub inventory: InventoryService,
    pub orders: Arc<OrderService>,
    pub feed: OrderFeed,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize Supabase client
        let supabase = SupabaseClient::new(&config);

        // Initialize stores
        let stores = StoreDirectory::new(supabase.clone());
        let notifications = NotificationStore::new(supabase.clone());
        let products = ProductStore::new(supabase.clone());
        let inventory = InventoryService::new(Arc::new(products.clone()));

        // Realtime fan-out shared by the order service and WebSocket sessions
        let feed = OrderFeed::new();

        let orders = Arc::new(OrderService::new(
            &config,
            Arc::new(OrderStore::new(supabase)),
            Arc::new(stores.clone()),
            Arc::new(notifications.clone()),
            feed.clone(),
        ));

        Self {
            config,
            stores,
            notifications,
            products,
            inventory,
            orders,
            feed,
        }
    }
}
