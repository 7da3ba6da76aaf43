use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    Book, BookId, CartLine, HistoryItem, HistoryOrder, Order, OrderId, OrderItem, OrderItemFull,
    OrderItemId, OrderStatus, RepositoryError, Result, UserId, store::OrderRepository,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    books: HashMap<BookId, Book>,
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
}

impl Tables {
    fn draft_order(&self, user_id: UserId) -> Option<&Order> {
        self.orders
            .values()
            .find(|o| o.user_id == user_id && o.status == OrderStatus::Draft)
    }

    fn get_or_create_draft(&mut self, user_id: UserId) -> Order {
        if let Some(order) = self.draft_order(user_id) {
            return order.clone();
        }
        let order = Order::draft(user_id);
        self.orders.insert(order.id, order.clone());
        order
    }

    fn apply_line(&mut self, order_id: OrderId, line: &CartLine) -> Result<()> {
        let book_id = line.book_id;
        if line.quantity == 0 {
            return Err(RepositoryError::InvalidQuantity { book_id });
        }

        let book = self
            .books
            .get_mut(&book_id)
            .ok_or(RepositoryError::BookNotFound { book_id })?;
        if book.stock < line.quantity {
            return Err(RepositoryError::InsufficientStock { book_id });
        }
        book.stock -= line.quantity;
        let book_price = book.price;

        let line_price = match self
            .items
            .iter_mut()
            .find(|i| i.order_id == order_id && i.book_id == book_id)
        {
            Some(item) => {
                item.quantity += line.quantity;
                item.price
            }
            None => {
                self.items.push(OrderItem {
                    id: OrderItemId::new(),
                    order_id,
                    book_id,
                    quantity: line.quantity,
                    price: book_price,
                });
                book_price
            }
        };

        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(RepositoryError::OrderNotFound)?;
        order.total_price = line_price
            .checked_multiply(line.quantity)
            .and_then(|line_total| order.total_price.checked_add(line_total))
            .ok_or(RepositoryError::AmountOverflow { book_id })?;
        Ok(())
    }

    /// Items of a draft order joined with book titles, ordered by title.
    fn draft_items(&self, order_id: OrderId) -> Vec<OrderItemFull> {
        let is_draft = self
            .orders
            .get(&order_id)
            .is_some_and(|o| o.status == OrderStatus::Draft);
        if !is_draft {
            return Vec::new();
        }

        let mut items: Vec<_> = self
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| OrderItemFull {
                id: i.id,
                book_id: i.book_id,
                title: self.title_of(i.book_id),
                quantity: i.quantity,
                price: i.price,
            })
            .collect();
        items.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        items
    }

    fn title_of(&self, book_id: BookId) -> String {
        self.books
            .get(&book_id)
            .map(|b| b.title.clone())
            .unwrap_or_default()
    }
}

/// In-memory order repository for testing.
///
/// A single store-wide lock stands in for PostgreSQL row locks, so every
/// operation is serialized. Batches are applied to a staged copy of the
/// tables and only swapped in once every line has succeeded, which gives the
/// same all-or-nothing behavior as a rolled-back transaction.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a book to the catalog, replacing any book with the same id.
    pub async fn insert_book(&self, book: Book) {
        self.tables.lock().await.books.insert(book.id, book);
    }

    /// Returns the total number of orders, draft and paid.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    #[tracing::instrument(skip(self))]
    async fn get_or_create_draft_order(&self, user_id: UserId) -> Result<Order> {
        Ok(self.tables.lock().await.get_or_create_draft(user_id))
    }

    #[tracing::instrument(skip(self))]
    async fn create_draft_order(&self, user_id: UserId) -> Result<Order> {
        let mut tables = self.tables.lock().await;
        if tables.draft_order(user_id).is_some() {
            return Err(RepositoryError::DuplicateDraftOrder { user_id });
        }
        Ok(tables.get_or_create_draft(user_id))
    }

    #[tracing::instrument(skip(self))]
    async fn find_draft_order(&self, user_id: UserId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.draft_order(user_id).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn get_draft_with_items(
        &self,
        user_id: UserId,
    ) -> Result<Option<(Order, Vec<OrderItemFull>)>> {
        let tables = self.tables.lock().await;
        Ok(tables.draft_order(user_id).map(|order| {
            let items = tables.draft_items(order.id);
            (order.clone(), items)
        }))
    }

    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    async fn add_items(&self, user_id: UserId, items: &[CartLine]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let mut staged = tables.clone();

        let order = staged.get_or_create_draft(user_id);
        if !order.status.can_modify_items() {
            return Err(RepositoryError::InvalidTransition {
                status: order.status,
                action: "add items to",
            });
        }

        for line in items {
            staged.apply_line(order.id, line)?;
        }

        *tables = staged;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_item(&self, user_id: UserId, book_id: BookId) -> Result<()> {
        let mut tables = self.tables.lock().await;

        let order_id = tables
            .draft_order(user_id)
            .map(|o| o.id)
            .ok_or(RepositoryError::ItemNotFound { book_id })?;
        let position = tables
            .items
            .iter()
            .position(|i| i.order_id == order_id && i.book_id == book_id)
            .ok_or(RepositoryError::ItemNotFound { book_id })?;
        if !tables.books.contains_key(&book_id) {
            return Err(RepositoryError::BookNotFound { book_id });
        }

        let item = tables.items.remove(position);
        if let Some(book) = tables.books.get_mut(&book_id) {
            book.stock += item.quantity;
        }
        if let Some(order) = tables.orders.get_mut(&order_id) {
            order.total_price -= item.line_total();
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn checkout(&self, user_id: UserId, order_id: OrderId) -> Result<()> {
        let mut tables = self.tables.lock().await;
        match tables.orders.get_mut(&order_id) {
            Some(order) if order.user_id == user_id && order.status.can_checkout() => {
                order.status = OrderStatus::Paid;
                Ok(())
            }
            _ => Err(RepositoryError::ConcurrentModification { order_id }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItemFull>> {
        Ok(self.tables.lock().await.draft_items(order_id))
    }

    #[tracing::instrument(skip(self))]
    async fn get_history(&self, user_id: UserId) -> Result<Vec<HistoryOrder>> {
        let tables = self.tables.lock().await;
        let mut history: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id && o.status != OrderStatus::Draft)
            .map(|o| {
                let mut items: Vec<_> = tables
                    .items
                    .iter()
                    .filter(|i| i.order_id == o.id)
                    .map(|i| HistoryItem {
                        book_id: i.book_id,
                        title: tables.title_of(i.book_id),
                        quantity: i.quantity,
                        price: i.price,
                    })
                    .collect();
                items.sort_by(|a, b| a.title.cmp(&b.title));
                HistoryOrder {
                    id: o.id,
                    total_price: o.total_price,
                    status: o.status,
                    created_at: o.created_at,
                    items,
                }
            })
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    #[tracing::instrument(skip(self))]
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.tables.lock().await.books.get(&book_id).cloned())
    }
}
