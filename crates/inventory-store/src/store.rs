use async_trait::async_trait;

use crate::{
    Book, BookId, CartLine, HistoryOrder, Order, OrderId, OrderItemFull, Result, UserId,
};

/// Transactional data access for draft orders, their line items and the book
/// stock they reserve.
///
/// Every mutating operation runs as one atomic unit: it either applies in full
/// or leaves no trace. Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Returns the user's draft order, creating an empty one if none exists.
    ///
    /// Concurrent first-time callers for the same user observe the same order.
    async fn get_or_create_draft_order(&self, user_id: UserId) -> Result<Order>;

    /// Creates an empty draft order.
    ///
    /// Fails with `DuplicateDraftOrder` if the user already has one.
    async fn create_draft_order(&self, user_id: UserId) -> Result<Order>;

    /// Returns the user's draft order, if any. Takes no locks.
    async fn find_draft_order(&self, user_id: UserId) -> Result<Option<Order>>;

    /// Returns the user's draft order together with its items, both read
    /// from one snapshot so that the order total matches the items.
    async fn get_draft_with_items(
        &self,
        user_id: UserId,
    ) -> Result<Option<(Order, Vec<OrderItemFull>)>>;

    /// Applies a batch of additions to the user's draft order, all or nothing.
    ///
    /// Items are applied in the order given. Each book row is locked before
    /// its stock is checked and decremented; a repeated book increments the
    /// existing line item, keeping its captured price. The first item that
    /// fails (`BookNotFound`, `InsufficientStock`, `AmountOverflow`) rolls
    /// back the whole batch.
    async fn add_items(&self, user_id: UserId, items: &[CartLine]) -> Result<()>;

    /// Removes the line item for `book_id` from the user's draft order and
    /// returns its quantity to stock.
    async fn remove_item(&self, user_id: UserId, book_id: BookId) -> Result<()>;

    /// Marks the draft order as paid.
    ///
    /// Optimistic: fails with `ConcurrentModification` if the order is no
    /// longer a draft owned by `user_id`.
    async fn checkout(&self, user_id: UserId, order_id: OrderId) -> Result<()>;

    /// Returns the items of a draft order joined with book titles, ordered by
    /// title. Paid orders yield no items here; see `get_history`.
    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItemFull>>;

    /// Returns all non-draft orders of a user with their items, newest first.
    async fn get_history(&self, user_id: UserId) -> Result<Vec<HistoryOrder>>;

    /// Reads a book from the catalog. Takes no locks.
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;
}
