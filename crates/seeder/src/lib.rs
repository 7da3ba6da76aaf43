//! Catalog seeder for the bookstore database.
//!
//! Applies the schema migrations and fills an empty `books` table from a
//! JSON catalog file. A catalog that already has books is left untouched.

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{SeedOutcome, load_catalog, parse_catalog, price_to_money, seed_catalog};
pub use config::Config;
pub use error::{Result, SeedError};
