//! Draft order use cases.

mod details;
mod service;

pub use details::OrderDetails;
pub use service::OrderService;
