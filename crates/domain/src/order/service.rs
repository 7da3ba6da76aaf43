//! Order service: the use-case API over the order repository.

use inventory_store::{
    BookId, CartLine, HistoryOrder, Order, OrderId, OrderRepository, RepositoryError, UserId,
};

use crate::error::DomainError;

use super::OrderDetails;

/// Service for managing a user's cart and orders.
///
/// Each call is one use case and at most one repository transaction. Checks
/// that need no lock (empty batches, zero quantities, an existing draft on
/// explicit create) are made here, before storage is touched.
pub struct OrderService<R: OrderRepository> {
    repository: R,
}

impl<R: OrderRepository> OrderService<R> {
    /// Creates a new order service over the given repository.
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Explicitly opens an empty draft order for the user.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, user_id: UserId) -> Result<Order, DomainError> {
        if self.repository.find_draft_order(user_id).await?.is_some() {
            return Err(DomainError::DuplicateDraftOrder { user_id });
        }

        let order = self.repository.create_draft_order(user_id).await?;
        tracing::info!(order_id = %order.id, "draft order created");
        Ok(order)
    }

    /// Adds a batch of books to the user's cart, opening a draft order if
    /// needed. Either every line is applied or none is.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn add_cart_items(
        &self,
        user_id: UserId,
        items: &[CartLine],
    ) -> Result<(), DomainError> {
        if items.is_empty() {
            return Err(DomainError::EmptyBatch);
        }
        if let Some(line) = items.iter().find(|line| line.quantity == 0) {
            return Err(DomainError::InvalidQuantity {
                book_id: line.book_id,
            });
        }

        if let Err(e) = self.repository.add_items(user_id, items).await {
            metrics::counter!("cart_batches_rejected_total").increment(1);
            tracing::warn!(error = %e, "cart batch rejected");
            return Err(e.into());
        }

        metrics::counter!("cart_items_added_total").increment(items.len() as u64);
        Ok(())
    }

    /// Removes a book from the user's cart and returns its copies to stock.
    #[tracing::instrument(skip(self))]
    pub async fn remove_cart_item(
        &self,
        user_id: UserId,
        book_id: BookId,
    ) -> Result<(), DomainError> {
        self.repository.remove_item(user_id, book_id).await?;
        metrics::counter!("cart_items_removed_total").increment(1);
        Ok(())
    }

    /// Transitions the user's draft order to paid.
    ///
    /// Not retried here: a `ConcurrentModification` is returned to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId, order_id: OrderId) -> Result<(), DomainError> {
        match self.repository.checkout(user_id, order_id).await {
            Ok(()) => {
                metrics::counter!("orders_checked_out_total").increment(1);
                tracing::info!("order checked out");
                Ok(())
            }
            Err(e) => {
                if matches!(e, RepositoryError::ConcurrentModification { .. }) {
                    metrics::counter!("orders_checkout_conflicts_total").increment(1);
                }
                tracing::warn!(error = %e, "checkout rejected");
                Err(e.into())
            }
        }
    }

    /// Loads the user's draft order with its items, read together so the
    /// order total always matches the items.
    ///
    /// Returns None if the user has no draft order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId) -> Result<Option<OrderDetails>, DomainError> {
        let cart = self.repository.get_draft_with_items(user_id).await?;
        Ok(cart.map(|(order, items)| OrderDetails { order, items }))
    }

    /// Lists the user's finalized orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_history(&self, user_id: UserId) -> Result<Vec<HistoryOrder>, DomainError> {
        Ok(self.repository.get_history(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory_store::{Book, InMemoryOrderRepository, Money, OrderStatus};

    async fn service_with_book(
        price_cents: i64,
        stock: u32,
    ) -> (OrderService<InMemoryOrderRepository>, BookId) {
        let repository = InMemoryOrderRepository::new();
        let book = Book::new("Dune", "Frank Herbert", Money::from_cents(price_cents), stock);
        let book_id = book.id;
        repository.insert_book(book).await;
        (OrderService::new(repository), book_id)
    }

    #[tokio::test]
    async fn test_create_order() {
        let service = OrderService::new(InMemoryOrderRepository::new());
        let user_id = UserId::new();

        let order = service.create_order(user_id).await.unwrap();

        assert_eq!(order.user_id, user_id);
        assert_eq!(order.status, OrderStatus::Draft);
        assert!(order.total_price.is_zero());
    }

    #[tokio::test]
    async fn test_create_order_twice_is_duplicate() {
        let service = OrderService::new(InMemoryOrderRepository::new());
        let user_id = UserId::new();
        service.create_order(user_id).await.unwrap();

        let result = service.create_order(user_id).await;

        assert!(matches!(
            result,
            Err(DomainError::DuplicateDraftOrder { user_id: u }) if u == user_id
        ));
    }

    #[tokio::test]
    async fn test_add_cart_items_opens_draft() {
        let (service, book_id) = service_with_book(1000, 5).await;
        let user_id = UserId::new();

        service
            .add_cart_items(user_id, &[CartLine::new(book_id, 2)])
            .await
            .unwrap();

        let details = service.get_order(user_id).await.unwrap().unwrap();
        assert_eq!(details.item_count(), 2);
        assert_eq!(details.order.total_price.cents(), 2000);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let service = OrderService::new(InMemoryOrderRepository::new());
        let user_id = UserId::new();

        let result = service.add_cart_items(user_id, &[]).await;

        assert!(matches!(result, Err(DomainError::EmptyBatch)));
        assert_eq!(service.repository().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let (service, book_id) = service_with_book(1000, 5).await;

        let result = service
            .add_cart_items(UserId::new(), &[CartLine::new(book_id, 0)])
            .await;

        assert!(matches!(result, Err(DomainError::InvalidQuantity { .. })));
        assert_eq!(service.repository().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_cart_item() {
        let (service, book_id) = service_with_book(1000, 5).await;
        let user_id = UserId::new();
        service
            .add_cart_items(user_id, &[CartLine::new(book_id, 2)])
            .await
            .unwrap();

        service.remove_cart_item(user_id, book_id).await.unwrap();

        let details = service.get_order(user_id).await.unwrap().unwrap();
        assert!(details.items.is_empty());
        assert!(details.order.total_price.is_zero());
    }

    #[tokio::test]
    async fn test_get_order_without_draft() {
        let service = OrderService::new(InMemoryOrderRepository::new());

        let result = service.get_order(UserId::new()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_checkout_moves_order_to_history() {
        let (service, book_id) = service_with_book(1000, 5).await;
        let user_id = UserId::new();
        service
            .add_cart_items(user_id, &[CartLine::new(book_id, 1)])
            .await
            .unwrap();
        let order_id = service.get_order(user_id).await.unwrap().unwrap().order.id;

        service.checkout(user_id, order_id).await.unwrap();

        assert!(service.get_order(user_id).await.unwrap().is_none());
        let history = service.get_history(user_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, order_id);
    }
}
