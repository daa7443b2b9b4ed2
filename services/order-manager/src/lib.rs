//! Order lifecycle management
//!
//! Submission, cancel, and modify pipelines over one order book, with
//! reservation-based risk accounting kept consistent with every book
//! mutation. All lifecycle operations on one manager are linearizable.

pub mod manager;
pub mod state;

pub use manager::OrderManager;
pub use state::{OrderRejectReason, OrderState, OrderStatus, SubmissionResult};
