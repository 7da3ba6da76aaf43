//! Book catalog loading and seeding.
//!
//! The catalog file is a JSON array of books with decimal prices:
//!
//! ```json
//! [{ "title": "Dune", "author": "Frank Herbert", "price": 15.99, "stock": 12 }]
//! ```

use std::path::Path;

use chrono::Utc;
use inventory_store::{Book, Money};
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::{Result, SeedError, storage};

/// One entry of the catalog file.
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    title: String,
    author: String,
    price: f64,
    stock: u32,
}

impl CatalogEntry {
    fn into_book(self) -> Result<Book> {
        let Some(price) = price_to_money(self.price) else {
            return Err(SeedError::InvalidPrice {
                title: self.title,
                price: self.price,
            });
        };
        Ok(Book::new(self.title, self.author, price, self.stock))
    }
}

/// What a seeding run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The catalog was empty and this many books were inserted.
    Seeded { count: usize },
    /// The catalog already had books; nothing was written.
    AlreadySeeded,
}

/// Converts a decimal currency amount to cents, rounding half away from zero.
///
/// Returns None for negative, non-finite or out-of-range amounts.
pub fn price_to_money(price: f64) -> Option<Money> {
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    let cents = (price * 100.0).round();
    if cents >= i64::MAX as f64 {
        return None;
    }
    Some(Money::from_cents(cents as i64))
}

/// Parses a catalog document into books with fresh ids.
pub fn parse_catalog(json: &str) -> Result<Vec<Book>> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
    entries.into_iter().map(CatalogEntry::into_book).collect()
}

/// Reads and parses the catalog file at `path`.
pub async fn load_catalog(path: &Path) -> Result<Vec<Book>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::ReadCatalog {
            path: path.to_path_buf(),
            source,
        })?;
    parse_catalog(&json)
}

/// Inserts `books` if the `books` table is empty.
///
/// Runs in one transaction holding a lock on `books` that conflicts with
/// itself, so two seeders started together cannot both insert.
#[tracing::instrument(skip(pool, books), fields(count = books.len()))]
pub async fn seed_catalog(pool: &PgPool, books: &[Book]) -> Result<SeedOutcome> {
    let mut tx = pool.begin().await.map_err(storage("begin"))?;

    sqlx::query("LOCK TABLE books IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await
        .map_err(storage("lock_books"))?;

    let seeded: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books)")
        .fetch_one(&mut *tx)
        .await
        .map_err(storage("check_catalog"))?;
    if seeded {
        return Ok(SeedOutcome::AlreadySeeded);
    }

    let created_at = Utc::now();
    for book in books {
        let stock = i32::try_from(book.stock).map_err(|_| SeedError::StockOutOfRange {
            title: book.title.clone(),
            stock: book.stock,
        })?;

        sqlx::query(
            r#"
            INSERT INTO books (id, title, author, price, stock, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.id.as_uuid())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.price.cents())
        .bind(stock)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage("insert_book"))?;

        tracing::debug!(book_id = %book.id, title = %book.title, "book inserted");
    }

    tx.commit().await.map_err(storage("commit"))?;
    Ok(SeedOutcome::Seeded { count: books.len() })
}
