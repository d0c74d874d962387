//! Order lifecycle: transition rules, accept window, pickup OTP

pub mod lifecycle;
pub mod otp;
pub mod repository;
pub mod service;
pub mod timer;

pub use lifecycle::OrderStatus;
pub use service::{OrderError, OrderService, OrderView};
pub use timer::AutoRejectSweeper;
