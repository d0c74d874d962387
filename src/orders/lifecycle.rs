//! Order status transitions and who may trigger them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of an order as stored in `orders.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::ReturnRequested,
        OrderStatus::ReturnApproved,
        OrderStatus::ReturnRejected,
        OrderStatus::Refunded,
    ];

    /// Wire/database name, also used in PostgREST filters
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::ReturnRequested => "RETURN_REQUESTED",
            OrderStatus::ReturnApproved => "RETURN_APPROVED",
            OrderStatus::ReturnRejected => "RETURN_REJECTED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// No transition leaves these
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::ReturnRejected | OrderStatus::Refunded
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LifecycleError::UnknownStatus(s.to_string()))
    }
}

/// Who is asking for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Store owner or active staff member
    Merchant,
    /// The customer who placed the order
    Customer,
    /// The server itself (auto-reject sweeper, OTP verification)
    System,
}

/// Whether a transition needs a reason attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReasonRule {
    None,
    Optional,
    Required,
}

/// One row of the transition table
struct Rule {
    from: OrderStatus,
    to: OrderStatus,
    actors: &'static [Actor],
    reason: ReasonRule,
}

const RULES: &[Rule] = &[
    Rule {
        from: OrderStatus::Pending,
        to: OrderStatus::Confirmed,
        actors: &[Actor::Merchant],
        reason: ReasonRule::None,
    },
    Rule {
        from: OrderStatus::Pending,
        to: OrderStatus::Cancelled,
        actors: &[Actor::Merchant, Actor::System],
        reason: ReasonRule::Required,
    },
    Rule {
        from: OrderStatus::Pending,
        to: OrderStatus::Cancelled,
        actors: &[Actor::Customer],
        reason: ReasonRule::Optional,
    },
    Rule {
        from: OrderStatus::Confirmed,
        to: OrderStatus::Preparing,
        actors: &[Actor::Merchant],
        reason: ReasonRule::None,
    },
    Rule {
        from: OrderStatus::Confirmed,
        to: OrderStatus::Cancelled,
        actors: &[Actor::Merchant],
        reason: ReasonRule::Required,
    },
    Rule {
        from: OrderStatus::Preparing,
        to: OrderStatus::Ready,
        actors: &[Actor::Merchant],
        reason: ReasonRule::None,
    },
    Rule {
        from: OrderStatus::Ready,
        to: OrderStatus::Completed,
        actors: &[Actor::System],
        reason: ReasonRule::None,
    },
    Rule {
        from: OrderStatus::Completed,
        to: OrderStatus::ReturnRequested,
        actors: &[Actor::Customer],
        reason: ReasonRule::Required,
    },
    Rule {
        from: OrderStatus::ReturnRequested,
        to: OrderStatus::ReturnApproved,
        actors: &[Actor::Merchant],
        reason: ReasonRule::None,
    },
    Rule {
        from: OrderStatus::ReturnRequested,
        to: OrderStatus::ReturnRejected,
        actors: &[Actor::Merchant],
        reason: ReasonRule::Required,
    },
    Rule {
        from: OrderStatus::ReturnApproved,
        to: OrderStatus::Refunded,
        actors: &[Actor::Merchant],
        reason: ReasonRule::None,
    },
];

/// Trim a free-text reason, treating blank input as absent
pub fn normalize_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Validate a transition request against the table
pub fn check_transition(
    from: OrderStatus,
    to: OrderStatus,
    actor: Actor,
    reason: Option<&str>,
) -> Result<(), LifecycleError> {
    if from.is_terminal() {
        return Err(LifecycleError::Terminal(from));
    }

    let mut edge_exists = false;
    for rule in RULES.iter().filter(|r| r.from == from && r.to == to) {
        edge_exists = true;
        if !rule.actors.contains(&actor) {
            continue;
        }
        if rule.reason == ReasonRule::Required && normalize_reason(reason).is_none() {
            return Err(LifecycleError::ReasonRequired { to });
        }
        return Ok(());
    }

    if !edge_exists {
        return Err(LifecycleError::NotAllowed { from, to });
    }

    // Completion is only ever done by the pickup code check
    if to == OrderStatus::Completed {
        return Err(LifecycleError::OtpRequired);
    }

    Err(LifecycleError::ActorNotAllowed { actor, from, to })
}

/// Statuses `actor` may move an order to from `from`
pub fn allowed_next(from: OrderStatus, actor: Actor) -> Vec<OrderStatus> {
    let mut next: Vec<OrderStatus> = RULES
        .iter()
        .filter(|r| r.from == from && r.actors.contains(&actor))
        .map(|r| r.to)
        .collect();
    next.dedup();
    next
}

/// Transition rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Order is already {0} and cannot change")]
    Terminal(OrderStatus),

    #[error("Cannot move an order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },

    #[error("{actor:?} may not move an order from {from} to {to}")]
    ActorNotAllowed {
        actor: Actor,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("A reason is required to move an order to {to}")]
    ReasonRequired { to: OrderStatus },

    #[error("Orders are completed by verifying the pickup OTP")]
    OtpRequired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merchant_happy_path() {
        use OrderStatus::*;
        let path = [Pending, Confirmed, Preparing, Ready];
        for pair in path.windows(2) {
            assert_eq!(check_transition(pair[0], pair[1], Actor::Merchant, None), Ok(()));
        }
        assert_eq!(check_transition(Ready, Completed, Actor::System, None), Ok(()));
    }

    #[test]
    fn merchant_cannot_complete_without_otp() {
        assert_eq!(
            check_transition(OrderStatus::Ready, OrderStatus::Completed, Actor::Merchant, None),
            Err(LifecycleError::OtpRequired)
        );
    }

    #[test]
    fn rejection_needs_a_reason() {
        assert_eq!(
            check_transition(OrderStatus::Pending, OrderStatus::Cancelled, Actor::Merchant, Some("  ")),
            Err(LifecycleError::ReasonRequired {
                to: OrderStatus::Cancelled
            })
        );
        assert_eq!(
            check_transition(
                OrderStatus::Pending,
                OrderStatus::Cancelled,
                Actor::Merchant,
                Some("Out of stock")
            ),
            Ok(())
        );
    }

    #[test]
    fn customer_may_cancel_pending_without_reason() {
        assert_eq!(
            check_transition(OrderStatus::Pending, OrderStatus::Cancelled, Actor::Customer, None),
            Ok(())
        );
        assert!(matches!(
            check_transition(OrderStatus::Confirmed, OrderStatus::Cancelled, Actor::Customer, None),
            Err(LifecycleError::ActorNotAllowed { .. })
        ));
    }

    #[test]
    fn terminal_statuses_are_final() {
        for status in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert_eq!(
                    check_transition(status, to, Actor::Merchant, Some("x")),
                    Err(LifecycleError::Terminal(status))
                );
            }
            assert!(allowed_next(status, Actor::Merchant).is_empty());
        }
    }

    #[test]
    fn skipping_steps_is_rejected() {
        assert_eq!(
            check_transition(OrderStatus::Pending, OrderStatus::Ready, Actor::Merchant, None),
            Err(LifecycleError::NotAllowed {
                from: OrderStatus::Pending,
                to: OrderStatus::Ready
            })
        );
    }

    #[test]
    fn return_flow() {
        use OrderStatus::*;
        assert_eq!(
            check_transition(Completed, ReturnRequested, Actor::Customer, Some("Damaged")),
            Ok(())
        );
        assert!(check_transition(Completed, ReturnRequested, Actor::Merchant, Some("x")).is_err());
        assert!(check_transition(ReturnRequested, ReturnRejected, Actor::Merchant, None).is_err());
        assert_eq!(check_transition(ReturnRequested, ReturnApproved, Actor::Merchant, None), Ok(()));
        assert_eq!(check_transition(ReturnApproved, Refunded, Actor::Merchant, None), Ok(()));
    }

    #[test]
    fn allowed_next_per_actor() {
        assert_eq!(
            allowed_next(OrderStatus::Pending, Actor::Merchant),
            vec![OrderStatus::Confirmed, OrderStatus::Cancelled]
        );
        assert_eq!(
            allowed_next(OrderStatus::Pending, Actor::Customer),
            vec![OrderStatus::Cancelled]
        );
        assert!(allowed_next(OrderStatus::Ready, Actor::Merchant).is_empty());
    }

    #[test]
    fn parses_status_names() {
        assert_eq!("return_requested".parse::<OrderStatus>(), Ok(OrderStatus::ReturnRequested));
        assert_eq!(" READY ".parse::<OrderStatus>(), Ok(OrderStatus::Ready));
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::ReturnApproved).unwrap();
        assert_eq!(json, "\"RETURN_APPROVED\"");
    }
}
