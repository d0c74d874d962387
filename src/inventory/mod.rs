//! Store inventory: variant pricing rules and listing reconciliation

pub mod pricing;
pub mod repository;
pub mod variants;

pub use variants::{InventoryError, InventoryService};
