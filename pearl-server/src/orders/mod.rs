//! Order aggregate and lifecycle orchestration
//!
//! `status` holds the allowed-edge table, `shipping` the region-based
//! fee function, `service` the orchestrator every caller (HTTP handler,
//! webhook, scheduler sweep) goes through.

pub mod service;
pub mod shipping;
pub mod status;

pub use service::{OrderService, PaymentStatusView};
