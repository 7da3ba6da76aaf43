//! Catalog seeding against PostgreSQL
//!
//! ```bash
//! cargo test -p seeder --test seed_integration
//! ```

use std::sync::Arc;

use inventory_store::{Book, Money, OrderRepository, PostgresOrderRepository};
use seeder::{SeedOutcome, parse_catalog, seed_catalog};
use serial_test::serial;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Repository over a migrated schema with an empty catalog
async fn get_test_repo() -> PostgresOrderRepository {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();
    let repo = PostgresOrderRepository::new(pool);
    repo.run_migrations().await.unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, books")
        .execute(repo.pool())
        .await
        .unwrap();

    repo
}

fn sample_catalog() -> Vec<Book> {
    parse_catalog(
        r#"[
            {"title": "Dune", "author": "Frank Herbert", "price": 15.99, "stock": 12},
            {"title": "Emma", "author": "Jane Austen", "price": 4.5, "stock": 3}
        ]"#,
    )
    .unwrap()
}

async fn book_count(repo: &PostgresOrderRepository) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(repo.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
async fn seeds_empty_catalog() {
    let repo = get_test_repo().await;
    let books = sample_catalog();

    let outcome = seed_catalog(repo.pool(), &books).await.unwrap();

    assert_eq!(outcome, SeedOutcome::Seeded { count: 2 });
    let dune = repo.get_book(books[0].id).await.unwrap().unwrap();
    assert_eq!(dune.title, "Dune");
    assert_eq!(dune.price, Money::from_cents(1599));
    assert_eq!(dune.stock, 12);
}

#[tokio::test]
#[serial]
async fn second_run_leaves_catalog_untouched() {
    let repo = get_test_repo().await;
    seed_catalog(repo.pool(), &sample_catalog()).await.unwrap();

    let again = sample_catalog();
    let outcome = seed_catalog(repo.pool(), &again).await.unwrap();

    assert_eq!(outcome, SeedOutcome::AlreadySeeded);
    assert_eq!(book_count(&repo).await, 2);
    assert!(repo.get_book(again[0].id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn concurrent_seeders_insert_once() {
    let repo = get_test_repo().await;
    let first = sample_catalog();
    let second = sample_catalog();

    let (a, b) = tokio::join!(
        seed_catalog(repo.pool(), &first),
        seed_catalog(repo.pool(), &second)
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    assert!(outcomes.contains(&SeedOutcome::Seeded { count: 2 }));
    assert!(outcomes.contains(&SeedOutcome::AlreadySeeded));
    assert_eq!(book_count(&repo).await, 2);
}
