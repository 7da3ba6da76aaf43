use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    Book, BookId, CartLine, HistoryItem, HistoryOrder, Money, Order, OrderId, OrderItemFull,
    OrderItemId, OrderStatus, RepositoryError, Result, UserId,
    error::storage,
    store::OrderRepository,
};

/// Name of the partial unique index allowing one draft order per user.
const ONE_DRAFT_PER_USER: &str = "orders_one_draft_per_user";

/// SQLSTATE raised when `BIGINT` arithmetic overflows.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// PostgreSQL-backed order repository.
///
/// Every mutating transaction locks the user's draft order row
/// (`SELECT ... FOR UPDATE`) before touching book or line-item rows, so
/// operations on one user's cart are serialized by that row. Stock updates on
/// one book are serialized by locking the book row before its stock is read.
/// Line-item rows belong to a single order and are only locked while the
/// order row is held.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> std::result::Result<Order, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            total_price: Money::from_cents(row.try_get("total_price")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_book(row: &PgRow) -> std::result::Result<Book, sqlx::Error> {
        Ok(Book {
            id: BookId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            price: Money::from_cents(row.try_get("price")?),
            stock: decode_count(row.try_get("stock")?)?,
        })
    }

    fn row_to_item_full(row: &PgRow) -> std::result::Result<OrderItemFull, sqlx::Error> {
        Ok(OrderItemFull {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            book_id: BookId::from_uuid(row.try_get::<Uuid, _>("book_id")?),
            title: row.try_get("title")?,
            quantity: decode_count(row.try_get("quantity")?)?,
            price: Money::from_cents(row.try_get("price")?),
        })
    }

    fn row_to_history(row: &PgRow) -> std::result::Result<HistoryOrder, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let Json(items) = row.try_get::<Json<Vec<HistoryItem>>, _>("items")?;
        Ok(HistoryOrder {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            total_price: Money::from_cents(row.try_get("total_price")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            created_at: row.try_get("created_at")?,
            items,
        })
    }

    /// Locks and returns the user's draft order row, if one exists.
    async fn lock_draft_order(conn: &mut PgConnection, user_id: UserId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, total_price, created_at
            FROM orders
            WHERE user_id = $1 AND status = 'draft'
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("lock_draft_order"))?;

        row.as_ref()
            .map(Self::row_to_order)
            .transpose()
            .map_err(storage("lock_draft_order"))
    }

    /// Reads the user's draft order without locking it.
    async fn fetch_draft_order(conn: &mut PgConnection, user_id: UserId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, total_price, created_at
            FROM orders
            WHERE user_id = $1 AND status = 'draft'
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("find_draft_order"))?;

        row.as_ref()
            .map(Self::row_to_order)
            .transpose()
            .map_err(storage("find_draft_order"))
    }

    /// Reads the items of a draft order joined with book titles.
    async fn fetch_draft_items(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Vec<OrderItemFull>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.book_id, b.title, oi.quantity, oi.price
            FROM order_items oi
            JOIN books b ON b.id = oi.book_id
            JOIN orders o ON o.id = oi.order_id
            WHERE oi.order_id = $1 AND o.status = 'draft'
            ORDER BY b.title ASC, oi.id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage("get_items"))?;

        rows.iter()
            .map(Self::row_to_item_full)
            .collect::<std::result::Result<_, _>>()
            .map_err(storage("get_items"))
    }

    /// Returns the user's locked draft order, inserting one if none exists.
    ///
    /// A concurrent creator makes our insert a no-op through the partial
    /// unique index; the row it committed is then fetched and locked instead.
    async fn draft_order_for_update(conn: &mut PgConnection, user_id: UserId) -> Result<Order> {
        if let Some(order) = Self::lock_draft_order(conn, user_id).await? {
            return Ok(order);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_price, created_at)
            VALUES ($1, $2, 'draft', 0, $3)
            ON CONFLICT (user_id) WHERE status = 'draft' DO NOTHING
            RETURNING id, user_id, status, total_price, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("create_draft_order"))?;

        if let Some(row) = inserted {
            let order = Self::row_to_order(&row).map_err(storage("create_draft_order"))?;
            tracing::debug!(order_id = %order.id, %user_id, "created draft order");
            return Ok(order);
        }

        tracing::debug!(%user_id, "draft order created concurrently, re-fetching");
        Self::lock_draft_order(conn, user_id)
            .await?
            .ok_or(RepositoryError::OrderNotFound)
    }

    /// Applies one batch line inside the caller's transaction.
    async fn apply_line(conn: &mut PgConnection, order_id: OrderId, line: &CartLine) -> Result<()> {
        let book_id = line.book_id;
        if line.quantity == 0 {
            return Err(RepositoryError::InvalidQuantity { book_id });
        }

        let book = sqlx::query("SELECT price, stock FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage("lock_book"))?
            .ok_or(RepositoryError::BookNotFound { book_id })?;

        let book_price: i64 = book.try_get("price").map_err(storage("lock_book"))?;
        let stock: i32 = book.try_get("stock").map_err(storage("lock_book"))?;

        let quantity = match i32::try_from(line.quantity) {
            Ok(quantity) if quantity <= stock => quantity,
            _ => return Err(RepositoryError::InsufficientStock { book_id }),
        };

        let existing = sqlx::query(
            "SELECT id, price FROM order_items WHERE order_id = $1 AND book_id = $2 FOR UPDATE",
        )
        .bind(order_id.as_uuid())
        .bind(book_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage("lock_order_item"))?;

        let line_price = match existing {
            Some(row) => {
                let item_id: Uuid = row.try_get("id").map_err(storage("lock_order_item"))?;
                let captured: i64 = row.try_get("price").map_err(storage("lock_order_item"))?;

                sqlx::query("UPDATE order_items SET quantity = quantity + $1 WHERE id = $2")
                    .bind(quantity)
                    .bind(item_id)
                    .execute(&mut *conn)
                    .await
                    .map_err(storage("update_order_item"))?;
                captured
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO order_items (id, order_id, book_id, quantity, price)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(order_id.as_uuid())
                .bind(book_id.as_uuid())
                .bind(quantity)
                .bind(book_price)
                .execute(&mut *conn)
                .await
                .map_err(storage("insert_order_item"))?;
                book_price
            }
        };

        let line_total = Money::from_cents(line_price)
            .checked_multiply(line.quantity)
            .ok_or(RepositoryError::AmountOverflow { book_id })?;

        sqlx::query("UPDATE books SET stock = stock - $1 WHERE id = $2")
            .bind(quantity)
            .bind(book_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(storage("reserve_stock"))?;

        sqlx::query("UPDATE orders SET total_price = total_price + $1 WHERE id = $2")
            .bind(line_total.cents())
            .bind(order_id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err)
                    if db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) =>
                {
                    RepositoryError::AmountOverflow { book_id }
                }
                e => RepositoryError::Storage {
                    operation: "update_order_total",
                    source: e,
                },
            })?;

        tracing::debug!(%order_id, %book_id, quantity, %line_total, "applied cart line");
        Ok(())
    }
}

/// Converts a non-negative `INTEGER` column into a count.
fn decode_count(value: i32) -> std::result::Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    #[tracing::instrument(skip(self))]
    async fn get_or_create_draft_order(&self, user_id: UserId) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;
        let order = Self::draft_order_for_update(&mut *tx, user_id).await?;
        tx.commit().await.map_err(storage("commit"))?;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn create_draft_order(&self, user_id: UserId) -> Result<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_price, created_at)
            VALUES ($1, $2, 'draft', 0, $3)
            RETURNING id, user_id, status, total_price, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(ONE_DRAFT_PER_USER)
            {
                return RepositoryError::DuplicateDraftOrder { user_id };
            }
            RepositoryError::Storage {
                operation: "create_draft_order",
                source: e,
            }
        })?;

        Self::row_to_order(&row).map_err(storage("create_draft_order"))
    }

    #[tracing::instrument(skip(self))]
    async fn find_draft_order(&self, user_id: UserId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire"))?;
        Self::fetch_draft_order(&mut *conn, user_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_draft_with_items(
        &self,
        user_id: UserId,
    ) -> Result<Option<(Order, Vec<OrderItemFull>)>> {
        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;

        // Both reads see the snapshot taken by the first one.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(storage("set_transaction"))?;

        let Some(order) = Self::fetch_draft_order(&mut *tx, user_id).await? else {
            return Ok(None);
        };
        let items = Self::fetch_draft_items(&mut *tx, order.id).await?;

        tx.commit().await.map_err(storage("commit"))?;
        Ok(Some((order, items)))
    }

    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    async fn add_items(&self, user_id: UserId, items: &[CartLine]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;

        let order = Self::draft_order_for_update(&mut *tx, user_id).await?;
        if !order.status.can_modify_items() {
            return Err(RepositoryError::InvalidTransition {
                status: order.status,
                action: "add items to",
            });
        }

        // Any early return drops `tx`, rolling back every line applied so far.
        for line in items {
            Self::apply_line(&mut *tx, order.id, line).await?;
        }

        tx.commit().await.map_err(storage("commit"))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_item(&self, user_id: UserId, book_id: BookId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage("begin"))?;

        let order = Self::lock_draft_order(&mut *tx, user_id)
            .await?
            .ok_or(RepositoryError::ItemNotFound { book_id })?;

        let item = sqlx::query(
            r#"
            SELECT id, quantity, price
            FROM order_items
            WHERE order_id = $1 AND book_id = $2
            FOR UPDATE
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(book_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage("lock_order_item"))?
        .ok_or(RepositoryError::ItemNotFound { book_id })?;

        let item_id: Uuid = item.try_get("id").map_err(storage("lock_order_item"))?;
        let quantity: i32 = item.try_get("quantity").map_err(storage("lock_order_item"))?;
        let price: i64 = item.try_get("price").map_err(storage("lock_order_item"))?;

        let restored = sqlx::query("UPDATE books SET stock = stock + $1 WHERE id = $2")
            .bind(quantity)
            .bind(book_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage("restore_stock"))?;
        if restored.rows_affected() == 0 {
            return Err(RepositoryError::BookNotFound { book_id });
        }

        sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(storage("delete_order_item"))?;

        let line_total = Money::from_cents(price)
            .checked_multiply(decode_count(quantity).map_err(storage("lock_order_item"))?)
            .ok_or(RepositoryError::AmountOverflow { book_id })?;
        sqlx::query("UPDATE orders SET total_price = total_price - $1 WHERE id = $2")
            .bind(line_total.cents())
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage("update_order_total"))?;

        tx.commit().await.map_err(storage("commit"))?;
        tracing::debug!(order_id = %order.id, %book_id, quantity, %line_total, "removed cart line");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn checkout(&self, user_id: UserId, order_id: OrderId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'paid'
            WHERE user_id = $1
              AND id = $2
              AND status = 'draft'
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(order_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(storage("checkout"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::ConcurrentModification { order_id });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItemFull>> {
        let mut conn = self.pool.acquire().await.map_err(storage("acquire"))?;
        Self::fetch_draft_items(&mut *conn, order_id).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_history(&self, user_id: UserId) -> Result<Vec<HistoryOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id,
                o.total_price,
                o.status,
                o.created_at,
                COALESCE(
                    json_agg(
                        json_build_object(
                            'book_id', oi.book_id,
                            'title', b.title,
                            'quantity', oi.quantity,
                            'price', oi.price
                        )
                        ORDER BY b.title
                    ) FILTER (WHERE oi.id IS NOT NULL),
                    '[]'::json
                ) AS items
            FROM orders o
            LEFT JOIN order_items oi ON oi.order_id = o.id
            LEFT JOIN books b ON b.id = oi.book_id
            WHERE o.user_id = $1 AND o.status <> 'draft'
            GROUP BY o.id
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("get_history"))?;

        rows.iter()
            .map(Self::row_to_history)
            .collect::<std::result::Result<_, _>>()
            .map_err(storage("get_history"))
    }

    #[tracing::instrument(skip(self))]
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT id, title, author, price, stock FROM books WHERE id = $1")
            .bind(book_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("get_book"))?;

        row.as_ref()
            .map(Self::row_to_book)
            .transpose()
            .map_err(storage("get_book"))
    }
}
