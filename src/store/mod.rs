//! Data store modules for Supabase integration

pub mod notifications;
pub mod orders;
pub mod products;
pub mod stores;
pub mod supabase;

pub use notifications::NotificationStore;
pub use orders::OrderStore;
pub use products::ProductStore;
pub use stores::StoreDirectory;
pub use supabase::SupabaseClient;
