//! WebSocket protocol message definitions
//! These are the wire types for the merchant order feed

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::feed::OrderEvent;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        store_id: Uuid,
        server_time: u64,
    },

    /// An order of the subscribed store changed status
    OrderUpdated {
        #[serde(flatten)]
        event: OrderEvent,
    },

    /// Events were dropped; the client should refetch its order list
    Resync { missed: u64 },

    /// Pong response
    Pong {
        /// Echo of client timestamp
        t: u64,
        /// Server timestamp
        server_time: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::lifecycle::OrderStatus;

    #[test]
    fn order_updates_are_flat_tagged_objects() {
        let msg = ServerMsg::OrderUpdated {
            event: OrderEvent {
                order_id: Uuid::nil(),
                store_id: Uuid::nil(),
                customer_id: Uuid::nil(),
                status: OrderStatus::Ready,
                previous: OrderStatus::Preparing,
                at: chrono::Utc::now(),
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "order_updated");
        assert_eq!(json["status"], "READY");
        assert_eq!(json["previous"], "PREPARING");
    }

    #[test]
    fn parses_ping() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"ping","t":42}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Ping { t: 42 }));
    }
}
