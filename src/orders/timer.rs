//! Accept window for new orders and the auto-reject sweeper

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::util::time::{saturating_add, saturating_between, saturating_sub, Timer};

use super::service::OrderService;

/// How long a merchant has to accept a PENDING order
#[derive(Debug, Clone, Copy)]
pub struct AcceptWindow {
    duration: Duration,
}

impl AcceptWindow {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Moment after which the order is auto-rejected
    pub fn deadline(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        saturating_add(created_at, self.duration)
    }

    /// Time left on the countdown, zero once expired
    pub fn remaining(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        saturating_between(now, self.deadline(created_at))
    }

    pub fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= self.deadline(created_at)
    }

    /// Orders created before this instant have run out of time
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        saturating_sub(now, self.duration)
    }

    /// Reason recorded on auto-rejected orders
    pub fn rejection_reason(&self) -> String {
        format!("Not accepted within {} seconds", self.duration.as_secs())
    }
}

/// Periodically cancels PENDING orders whose accept window ran out
pub struct AutoRejectSweeper {
    service: Arc<OrderService>,
    interval: Duration,
}

impl AutoRejectSweeper {
    pub fn new(service: Arc<OrderService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run until the process exits
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            "Auto-reject sweeper started"
        );

        loop {
            interval.tick().await;

            let timer = Timer::new();
            match self.service.expire_stale_orders(Utc::now()).await {
                Ok(0) => debug!("No expired orders"),
                Ok(cancelled) => info!(
                    cancelled,
                    elapsed_ms = timer.elapsed_ms(),
                    "Auto-rejected expired orders"
                ),
                Err(e) => error!(error = %e, "Auto-reject sweep failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn countdown_runs_down_to_zero() {
        let window = AcceptWindow::new(Duration::from_secs(180));
        let now = created() + chrono::Duration::seconds(60);

        assert_eq!(window.remaining(created(), now), Duration::from_secs(120));
        assert!(!window.is_expired(created(), now));

        let late = created() + chrono::Duration::seconds(181);
        assert_eq!(window.remaining(created(), late), Duration::ZERO);
        assert!(window.is_expired(created(), late));
    }

    #[test]
    fn expires_exactly_at_deadline() {
        let window = AcceptWindow::new(Duration::from_secs(180));
        assert!(window.is_expired(created(), window.deadline(created())));
    }

    #[test]
    fn cutoff_matches_deadline() {
        let window = AcceptWindow::new(Duration::from_secs(90));
        let now = created() + chrono::Duration::seconds(90);
        assert_eq!(window.cutoff(now), created());
    }

    #[test]
    fn oversized_window_never_expires() {
        let window = AcceptWindow::new(Duration::from_secs(u64::MAX / 2));
        let now = created() + chrono::Duration::days(365);

        assert!(!window.is_expired(created(), now));
        assert!(window.remaining(created(), now) > Duration::from_secs(86_400));
        assert!(window.cutoff(now) < created());
    }

    #[test]
    fn reason_mentions_window() {
        let window = AcceptWindow::new(Duration::from_secs(180));
        assert_eq!(window.rejection_reason(), "Not accepted within 180 seconds");
    }
}
