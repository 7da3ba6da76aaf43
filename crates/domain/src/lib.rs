//! Domain layer for the bookstore order engine.
//!
//! This crate provides:
//! - `OrderService`, the only entry point the HTTP layer may call
//! - `DomainError`, the error taxonomy handlers map to responses
//! - Re-exports of the order, item and book types it hands out

pub mod error;
pub mod order;

pub use common::{BookId, Money, OrderId, OrderItemId, UserId};
pub use error::DomainError;
pub use inventory_store::{
    Book, CartLine, HistoryItem, HistoryOrder, Order, OrderItemFull, OrderStatus,
};
pub use order::{OrderDetails, OrderService};
