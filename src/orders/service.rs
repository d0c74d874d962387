//! Applies status changes: access checks, transition rules, guarded writes,
//! notifications and realtime fan-out

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::store::notifications::{NewNotification, NotificationKind};
use crate::store::orders::{Order, OrderItem, OrderPatch};
use crate::store::supabase::SupabaseError;
use crate::util::rate_limit::OtpAttemptLimiter;
use crate::util::time::saturating_add;
use crate::ws::{OrderEvent, OrderFeed};

use super::lifecycle::{allowed_next, check_transition, normalize_reason, Actor, LifecycleError, OrderStatus};
use super::otp::{parse_code, OtpFormatError, OtpIssuer};
use super::repository::{NotificationSink, OrderRepository, StoreAccess};
use super::timer::AcceptWindow;

/// Order as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    /// Auto-reject deadline, only for PENDING orders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_seconds_remaining: Option<u64>,
    /// Statuses the viewer may move the order to
    pub allowed_actions: Vec<OrderStatus>,
    /// Whether the viewer can complete the order with the pickup code
    pub can_verify_otp: bool,
}

/// Order lifecycle service
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    access: Arc<dyn StoreAccess>,
    notifications: Arc<dyn NotificationSink>,
    feed: OrderFeed,
    otp: OtpIssuer,
    otp_attempts: OtpAttemptLimiter,
    accept_window: AcceptWindow,
    return_window: Duration,
}

impl OrderService {
    pub fn new(
        config: &Config,
        orders: Arc<dyn OrderRepository>,
        access: Arc<dyn StoreAccess>,
        notifications: Arc<dyn NotificationSink>,
        feed: OrderFeed,
    ) -> Self {
        Self::with_issuer(
            config,
            orders,
            access,
            notifications,
            feed,
            OtpIssuer::new(&config.otp_hash_secret),
        )
    }

    pub fn with_issuer(
        config: &Config,
        orders: Arc<dyn OrderRepository>,
        access: Arc<dyn StoreAccess>,
        notifications: Arc<dyn NotificationSink>,
        feed: OrderFeed,
        otp: OtpIssuer,
    ) -> Self {
        Self {
            orders,
            access,
            notifications,
            feed,
            otp,
            otp_attempts: OtpAttemptLimiter::new(
                config.otp_max_attempts,
                config.otp_attempt_refill,
            ),
            accept_window: AcceptWindow::new(config.order_accept_window),
            return_window: config.return_window,
        }
    }

    /// Orders currently holding an OTP attempt bucket
    pub fn otp_limiters(&self) -> usize {
        self.otp_attempts.tracked()
    }

    /// Single order with its items
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<OrderView, OrderError> {
        let order = self.load(order_id).await?;
        let actors = self.actors_for(user_id, &order).await?;
        let items = self.orders.items(order_id).await?;
        Ok(self.view(order, items, &actors, now))
    }

    /// Orders of a store, newest first; merchants only
    pub async fn list_store_orders(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        status: Option<OrderStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderView>, OrderError> {
        self.require_merchant(user_id, store_id).await?;

        let orders = self.orders.list_for_store(store_id, status).await?;
        Ok(orders
            .into_iter()
            .map(|order| self.view(order, Vec::new(), &[Actor::Merchant], now))
            .collect())
    }

    /// Move an order to `target` on behalf of `user_id`
    pub async fn change_status(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        target: OrderStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<OrderView, OrderError> {
        let order = self.load(order_id).await?;
        let actors = self.actors_for(user_id, &order).await?;
        let from = order.status;

        // Accepting after the countdown ran out rejects the order instead
        if from == OrderStatus::Pending
            && target == OrderStatus::Confirmed
            && actors.contains(&Actor::Merchant)
            && self.accept_window.is_expired(order.created_at, now)
        {
            return Err(if self.auto_reject(&order, now).await? {
                OrderError::Expired
            } else {
                OrderError::StaleStatus { expected: from }
            });
        }

        let actor = pick_actor(&actors, from, target, reason)?;

        if target == OrderStatus::ReturnRequested {
            let completed_at = order.completed_at.unwrap_or(order.created_at);
            if now > saturating_add(completed_at, self.return_window) {
                return Err(OrderError::ReturnWindowClosed);
            }
        }

        let reason = normalize_reason(reason);
        let mut patch = OrderPatch::transition(target, reason.clone(), now);
        let mut pickup_code = None;
        if target == OrderStatus::Ready {
            let (code, hash) = self.otp.issue(order.id);
            patch.otp_hash = Some(Some(hash));
            pickup_code = Some(code);
        }

        let updated = self.commit(&order, &patch).await?;

        info!(
            order_id = %order.id,
            store_id = %order.store_id,
            from = %from,
            to = %target,
            actor = ?actor,
            "Order status changed"
        );

        self.after_transition(&updated, from, actor, reason.as_deref(), pickup_code.as_deref())
            .await;

        let items = self.orders.items(order_id).await.unwrap_or_else(|e| {
            warn!(order_id = %order_id, error = %e, "Failed to load order items");
            Vec::new()
        });
        Ok(self.view(updated, items, &actors, now))
    }

    /// Complete a READY order with the code the customer shows at pickup
    pub async fn verify_otp(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderView, OrderError> {
        let code = parse_code(submitted)?;
        let order = self.load(order_id).await?;
        self.require_merchant(user_id, order.store_id).await?;

        if order.status != OrderStatus::Ready {
            return Err(OrderError::NotReady(order.status));
        }

        if !self.otp_attempts.check(order_id) {
            warn!(order_id = %order_id, user_id = %user_id, "OTP attempts exhausted");
            return Err(OrderError::TooManyAttempts);
        }

        let stored = order.otp_hash.as_deref().ok_or(OrderError::OtpMissing)?;
        if !self.otp.verify(order_id, code, stored) {
            warn!(order_id = %order_id, "Invalid pickup OTP");
            return Err(OrderError::InvalidOtp);
        }

        check_transition(order.status, OrderStatus::Completed, Actor::System, None)?;
        let patch = OrderPatch::transition(OrderStatus::Completed, None, now);
        let updated = self.commit(&order, &patch).await?;
        self.otp_attempts.forget(order_id);

        info!(order_id = %order_id, store_id = %order.store_id, "Order completed at pickup");

        self.after_transition(&updated, OrderStatus::Ready, Actor::System, None, None)
            .await;

        let items = self.orders.items(order_id).await.unwrap_or_default();
        Ok(self.view(updated, items, &[Actor::Merchant], now))
    }

    /// Rotate the pickup code of a READY order and send it to the customer
    /// again. The previous code stops working.
    pub async fn resend_pickup_code(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<OrderView, OrderError> {
        let order = self.load(order_id).await?;
        self.require_merchant(user_id, order.store_id).await?;

        if order.status != OrderStatus::Ready {
            return Err(OrderError::NotReady(order.status));
        }

        let (code, hash) = self.otp.issue(order.id);
        let patch = OrderPatch {
            otp_hash: Some(Some(hash)),
            updated_at: Some(now),
            ..OrderPatch::default()
        };
        let updated = self.commit(&order, &patch).await?;

        let (kind, title, body) = notification_text(&updated, None, Some(&code));
        self.notifications
            .push(NewNotification {
                user_id: updated.customer_id,
                store_id: Some(updated.store_id),
                order_id: Some(updated.id),
                kind,
                title,
                body,
            })
            .await?;

        info!(order_id = %order_id, user_id = %user_id, "Pickup code re-issued");

        let items = self.orders.items(order_id).await.unwrap_or_default();
        Ok(self.view(updated, items, &[Actor::Merchant], now))
    }

    /// Cancel every PENDING order whose accept window ran out.
    /// Returns how many were cancelled by this call.
    pub async fn expire_stale_orders(&self, now: DateTime<Utc>) -> Result<usize, OrderError> {
        let cutoff = self.accept_window.cutoff(now);
        let stale = self.orders.pending_created_before(cutoff).await?;

        let mut cancelled = 0;
        for order in stale {
            match self.auto_reject(&order, now).await {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) => warn!(order_id = %order.id, error = %e, "Failed to auto-reject order"),
            }
        }

        Ok(cancelled)
    }

    /// Cancel an expired PENDING order as the system.
    /// Returns false if someone else changed it first.
    async fn auto_reject(&self, order: &Order, now: DateTime<Utc>) -> Result<bool, OrderError> {
        let reason = self.accept_window.rejection_reason();
        check_transition(order.status, OrderStatus::Cancelled, Actor::System, Some(&reason))?;

        let patch = OrderPatch::transition(OrderStatus::Cancelled, Some(reason.clone()), now);
        let Some(updated) = self
            .orders
            .update_if_status(order.id, order.status, &patch)
            .await?
        else {
            return Ok(false);
        };

        info!(order_id = %order.id, store_id = %order.store_id, "Order auto-rejected");
        self.after_transition(&updated, order.status, Actor::System, Some(&reason), None)
            .await;
        Ok(true)
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .find(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Guarded write; a concurrent change surfaces as `StaleStatus`
    async fn commit(&self, order: &Order, patch: &OrderPatch) -> Result<Order, OrderError> {
        self.orders
            .update_if_status(order.id, order.status, patch)
            .await?
            .ok_or(OrderError::StaleStatus {
                expected: order.status,
            })
    }

    /// Roles `user_id` holds on `order`; empty means no access
    async fn actors_for(&self, user_id: Uuid, order: &Order) -> Result<Vec<Actor>, OrderError> {
        let mut actors = Vec::with_capacity(2);
        if self.access.role_for(user_id, order.store_id).await?.is_some() {
            actors.push(Actor::Merchant);
        }
        if order.customer_id == user_id {
            actors.push(Actor::Customer);
        }

        if actors.is_empty() {
            return Err(OrderError::Forbidden);
        }
        Ok(actors)
    }

    async fn require_merchant(&self, user_id: Uuid, store_id: Uuid) -> Result<(), OrderError> {
        match self.access.role_for(user_id, store_id).await? {
            Some(_) => Ok(()),
            None => Err(OrderError::Forbidden),
        }
    }

    /// Notifications and realtime event for a committed change.
    /// Failures here are logged and never undo the write.
    async fn after_transition(
        &self,
        order: &Order,
        previous: OrderStatus,
        actor: Actor,
        reason: Option<&str>,
        pickup_code: Option<&str>,
    ) {
        self.feed.publish(OrderEvent {
            order_id: order.id,
            store_id: order.store_id,
            customer_id: order.customer_id,
            status: order.status,
            previous,
            at: order.updated_at.unwrap_or_else(Utc::now),
        });

        let recipient = match actor {
            Actor::Customer => match self.access.owner_user_id(order.store_id).await {
                Ok(Some(owner)) => owner,
                Ok(None) => {
                    warn!(store_id = %order.store_id, "Store has no owner to notify");
                    return;
                }
                Err(e) => {
                    warn!(store_id = %order.store_id, error = %e, "Failed to look up store owner");
                    return;
                }
            },
            Actor::Merchant | Actor::System => order.customer_id,
        };

        let (kind, title, body) = notification_text(order, reason, pickup_code);
        let notification = NewNotification {
            user_id: recipient,
            store_id: Some(order.store_id),
            order_id: Some(order.id),
            kind,
            title,
            body,
        };

        if let Err(e) = self.notifications.push(notification).await {
            warn!(order_id = %order.id, error = %e, "Failed to write notification");
        }
    }

    fn view(
        &self,
        order: Order,
        items: Vec<OrderItem>,
        actors: &[Actor],
        now: DateTime<Utc>,
    ) -> OrderView {
        let pending = order.status == OrderStatus::Pending;
        let accept_deadline = pending.then(|| self.accept_window.deadline(order.created_at));
        let accept_seconds_remaining =
            pending.then(|| self.accept_window.remaining(order.created_at, now).as_secs());

        let mut allowed_actions: Vec<OrderStatus> = Vec::new();
        for actor in actors {
            for status in allowed_next(order.status, *actor) {
                if !allowed_actions.contains(&status) {
                    allowed_actions.push(status);
                }
            }
        }
        if pending && self.accept_window.is_expired(order.created_at, now) {
            allowed_actions.retain(|s| *s != OrderStatus::Confirmed);
        }

        let can_verify_otp = order.status == OrderStatus::Ready && actors.contains(&Actor::Merchant);

        OrderView {
            order,
            items,
            accept_deadline,
            accept_seconds_remaining,
            allowed_actions,
            can_verify_otp,
        }
    }
}

/// First role of the user that the transition table accepts
fn pick_actor(
    actors: &[Actor],
    from: OrderStatus,
    to: OrderStatus,
    reason: Option<&str>,
) -> Result<Actor, LifecycleError> {
    let mut first_err = None;
    for actor in actors {
        match check_transition(from, to, *actor, reason) {
            Ok(()) => return Ok(*actor),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.unwrap_or(LifecycleError::NotAllowed { from, to }))
}

fn notification_text(
    order: &Order,
    reason: Option<&str>,
    pickup_code: Option<&str>,
) -> (NotificationKind, String, String) {
    let short_id = &order.id.to_string()[..8];
    match order.status {
        OrderStatus::Confirmed => (
            NotificationKind::OrderUpdate,
            "Order accepted".to_string(),
            format!("Your order {} was accepted by the store", short_id),
        ),
        OrderStatus::Preparing => (
            NotificationKind::OrderUpdate,
            "Order being prepared".to_string(),
            format!("The store started preparing order {}", short_id),
        ),
        OrderStatus::Ready => (
            NotificationKind::PickupCode,
            "Ready for pickup".to_string(),
            format!(
                "Order {} is ready. Show code {} at the counter",
                short_id,
                pickup_code.unwrap_or("----")
            ),
        ),
        OrderStatus::Completed => (
            NotificationKind::OrderUpdate,
            "Order picked up".to_string(),
            format!("Order {} was handed over. Thank you!", short_id),
        ),
        OrderStatus::Cancelled => (
            NotificationKind::OrderCancelled,
            "Order cancelled".to_string(),
            match reason {
                Some(reason) => format!("Order {} was cancelled: {}", short_id, reason),
                None => format!("Order {} was cancelled", short_id),
            },
        ),
        OrderStatus::ReturnRequested => (
            NotificationKind::ReturnRequest,
            "Return requested".to_string(),
            format!(
                "A return was requested for order {}: {}",
                short_id,
                reason.unwrap_or("no reason given")
            ),
        ),
        OrderStatus::ReturnApproved => (
            NotificationKind::OrderUpdate,
            "Return approved".to_string(),
            format!("Your return for order {} was approved", short_id),
        ),
        OrderStatus::ReturnRejected => (
            NotificationKind::OrderUpdate,
            "Return rejected".to_string(),
            format!(
                "Your return for order {} was rejected: {}",
                short_id,
                reason.unwrap_or("no reason given")
            ),
        ),
        OrderStatus::Refunded => (
            NotificationKind::OrderUpdate,
            "Refund issued".to_string(),
            format!("Order {} was refunded", short_id),
        ),
        OrderStatus::Pending => (
            NotificationKind::OrderUpdate,
            "New order".to_string(),
            format!("Order {} is waiting for the store", short_id),
        ),
    }
}

/// Order service errors
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotFound,

    #[error("You do not have access to this order")]
    Forbidden,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Order changed concurrently, expected status {expected}")]
    StaleStatus { expected: OrderStatus },

    #[error("Order was not accepted in time and has been rejected")]
    Expired,

    #[error("The return window for this order has closed")]
    ReturnWindowClosed,

    #[error("Order is {0}, only READY orders can be verified")]
    NotReady(OrderStatus),

    #[error(transparent)]
    OtpFormat(#[from] OtpFormatError),

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("Too many OTP attempts, try again later")]
    TooManyAttempts,

    #[error("Order has no pickup code")]
    OtpMissing,

    #[error("Database error: {0}")]
    Database(#[from] SupabaseError),
}
