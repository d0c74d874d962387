//! Realtime order feed over WebSocket

pub mod feed;
pub mod handler;
pub mod protocol;

pub use feed::{OrderEvent, OrderFeed};
