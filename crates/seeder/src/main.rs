//! Seeder entry point.

use inventory_store::PostgresOrderRepository;
use seeder::{Config, SeedOutcome};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Connect and apply the schema
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let repository = PostgresOrderRepository::new(pool);
    repository
        .run_migrations()
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations applied");

    // 3. Seed the catalog
    let books = seeder::load_catalog(&config.books_file)
        .await
        .expect("failed to load catalog");
    match seeder::seed_catalog(repository.pool(), &books)
        .await
        .expect("failed to seed catalog")
    {
        SeedOutcome::Seeded { count } => {
            tracing::info!(count, file = %config.books_file.display(), "catalog seeded");
        }
        SeedOutcome::AlreadySeeded => {
            tracing::info!("catalog already seeded, nothing to do");
        }
    }

    repository.pool().close().await;
}
