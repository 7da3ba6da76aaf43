pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{BookId, Money, OrderId, OrderItemId, UserId};
pub use error::{RepositoryError, Result};
pub use memory::InMemoryOrderRepository;
pub use model::{
    Book, CartLine, HistoryItem, HistoryOrder, Order, OrderItem, OrderItemFull, OrderStatus,
};
pub use postgres::PostgresOrderRepository;
pub use store::OrderRepository;
