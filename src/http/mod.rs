//! HTTP surface: router, auth middleware and handlers

pub mod account;
pub mod inventory;
pub mod middleware;
pub mod orders;
pub mod routes;

pub use routes::build_router;
