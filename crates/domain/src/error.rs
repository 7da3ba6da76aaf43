//! Domain error types.

use inventory_store::{BookId, OrderId, OrderStatus, RepositoryError, UserId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A cart batch contained no lines.
    #[error("Cart batch is empty")]
    EmptyBatch,

    /// A cart line asked for zero copies.
    #[error("Invalid quantity for book {book_id}: must be greater than 0")]
    InvalidQuantity { book_id: BookId },

    /// Not enough stock left for the requested quantity.
    #[error("Insufficient stock for book {book_id}")]
    InsufficientStock { book_id: BookId },

    /// A line or order total does not fit in a 64-bit cent amount.
    #[error("Amount overflow for book {book_id}")]
    AmountOverflow { book_id: BookId },

    /// The book is not in the catalog.
    #[error("Book not found: {book_id}")]
    BookNotFound { book_id: BookId },

    /// No draft order exists for the user.
    #[error("Order not found")]
    OrderNotFound,

    /// The user's draft order has no item for this book.
    #[error("Item not found for book {book_id}")]
    ItemNotFound { book_id: BookId },

    /// The order is no longer a draft.
    #[error("Invalid state transition: cannot {action} an order in {status} status")]
    InvalidTransition {
        status: OrderStatus,
        action: &'static str,
    },

    /// The user already has a draft order.
    #[error("User {user_id} already has a draft order")]
    DuplicateDraftOrder { user_id: UserId },

    /// Checkout lost a race, or the order was not a draft of this user.
    #[error("Order {order_id} was modified concurrently or is not a draft")]
    ConcurrentModification { order_id: OrderId },

    /// The storage layer failed.
    #[error("Storage error")]
    Storage(#[source] RepositoryError),
}

impl DomainError {
    /// Returns true if repeating the call may succeed without any change in
    /// its input.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Storage(_))
    }
}

impl From<RepositoryError> for DomainError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::InsufficientStock { book_id } => {
                DomainError::InsufficientStock { book_id }
            }
            RepositoryError::InvalidQuantity { book_id } => {
                DomainError::InvalidQuantity { book_id }
            }
            RepositoryError::AmountOverflow { book_id } => DomainError::AmountOverflow { book_id },
            RepositoryError::BookNotFound { book_id } => DomainError::BookNotFound { book_id },
            RepositoryError::OrderNotFound => DomainError::OrderNotFound,
            RepositoryError::ItemNotFound { book_id } => DomainError::ItemNotFound { book_id },
            RepositoryError::InvalidTransition { status, action } => {
                DomainError::InvalidTransition { status, action }
            }
            RepositoryError::DuplicateDraftOrder { user_id } => {
                DomainError::DuplicateDraftOrder { user_id }
            }
            RepositoryError::ConcurrentModification { order_id } => {
                DomainError::ConcurrentModification { order_id }
            }
            storage @ RepositoryError::Storage { .. } => DomainError::Storage(storage),
        }
    }
}
