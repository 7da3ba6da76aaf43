//! Shared types for the bookstore order engine.

mod money;
mod types;

pub use money::Money;
pub use types::{BookId, OrderId, OrderItemId, UserId};
