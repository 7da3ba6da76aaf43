use thiserror::Error;

use crate::{BookId, OrderId, OrderStatus, UserId};

/// Errors that can occur when interacting with the order repository.
///
/// Every variant except `Storage` is a domain condition the caller can react
/// to. Whatever the variant, the transaction that produced it has been rolled
/// back.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested quantity exceeds the book's stock at lock time.
    #[error("Insufficient stock for book {book_id}")]
    InsufficientStock { book_id: BookId },

    /// A batch line asked for zero copies of a book.
    #[error("Invalid quantity for book {book_id}: must be greater than 0")]
    InvalidQuantity { book_id: BookId },

    /// A price times quantity, or the resulting order total, does not fit in
    /// a 64-bit cent amount.
    #[error("Amount overflow for book {book_id}")]
    AmountOverflow { book_id: BookId },

    /// A batch referenced a book that is not in the catalog.
    #[error("Book not found: {book_id}")]
    BookNotFound { book_id: BookId },

    /// The order does not exist, or is not a draft owned by the caller.
    #[error("Order not found")]
    OrderNotFound,

    /// The caller's draft order has no line item for this book.
    #[error("Item not found for book {book_id}")]
    ItemNotFound { book_id: BookId },

    /// A mutation was attempted on an order that is no longer a draft.
    #[error("Invalid state transition: cannot {action} an order in {status} status")]
    InvalidTransition {
        status: OrderStatus,
        action: &'static str,
    },

    /// The user already has a draft order.
    #[error("User {user_id} already has a draft order")]
    DuplicateDraftOrder { user_id: UserId },

    /// The optimistic checkout update matched no draft row.
    #[error("Order {order_id} was modified concurrently or is not a draft")]
    ConcurrentModification { order_id: OrderId },

    /// The underlying store failed (connectivity, deadlock, constraint, ...).
    #[error("Storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl RepositoryError {
    /// Returns true if the error is an underlying storage failure rather than
    /// a domain condition.
    pub fn is_storage(&self) -> bool {
        matches!(self, RepositoryError::Storage { .. })
    }
}

/// Returns a `map_err` adapter that wraps a `sqlx::Error` with the name of
/// the operation that produced it.
pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |source| RepositoryError::Storage { operation, source }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_adapter_keeps_operation_context() {
        let err = storage("checkout")(sqlx::Error::RowNotFound);
        assert!(err.is_storage());
        assert!(err.to_string().starts_with("Storage failure during checkout"));
    }

    #[test]
    fn domain_conditions_are_not_storage() {
        let err = RepositoryError::InvalidTransition {
            status: OrderStatus::Paid,
            action: "add items to",
        };
        assert!(!err.is_storage());
        assert_eq!(
            err.to_string(),
            "Invalid state transition: cannot add items to an order in paid status"
        );
    }
}
