//! Seeder error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while seeding the catalog.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read catalog file {path}: {source}")]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    ParseCatalog(#[from] serde_json::Error),

    #[error("invalid price {price} for book '{title}'")]
    InvalidPrice { title: String, price: f64 },

    #[error("stock {stock} for book '{title}' exceeds the column range")]
    StockOutOfRange { title: String, stock: u32 },

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("database error during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Adapter for `map_err` that tags a database error with the step it failed in.
pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> SeedError {
    move |source| SeedError::Storage { operation, source }
}

/// Result type for seeder operations.
pub type Result<T> = std::result::Result<T, SeedError>;
