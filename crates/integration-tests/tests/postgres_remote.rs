//! `PgRemoteCartStore` against a real `PostgreSQL` database.
//!
//! These tests are ignored by default. Run with:
//! ```bash
//! CRUMB_TEST_DATABASE_URL=postgres://localhost/crumb_test \
//!     cargo test -p crumb-integration-tests --test postgres_remote -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crumb_cart::remote::{PgRemoteCartStore, RemoteCartStore, create_pool, run_migrations};
use crumb_core::{ProductId, UserId};
use crumb_integration_tests::{line, pairs, user};
use secrecy::SecretString;

async fn store() -> PgRemoteCartStore {
    let url = std::env::var("CRUMB_TEST_DATABASE_URL")
        .expect("CRUMB_TEST_DATABASE_URL must be set for postgres tests");
    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    PgRemoteCartStore::new(pool)
}

/// A user id no other test touches, starting from an empty cart.
async fn fresh_user(store: &PgRemoteCartStore, name: &str) -> UserId {
    let user_id = user(&format!("it-{name}-{}", std::process::id()));
    store.clear(&user_id).await.unwrap();
    user_id
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_upsert_inserts_then_replaces() {
    let store = store().await;
    let u = fresh_user(&store, "upsert").await;

    store.upsert(&u, &line("cookie-1", 2)).await.unwrap();
    store.upsert(&u, &line("cookie-2", 1)).await.unwrap();
    store.upsert(&u, &line("cookie-1", 5)).await.unwrap();

    let lines = store.read_all(&u).await.unwrap();
    assert_eq!(
        pairs(&lines),
        [("cookie-1".to_string(), 5), ("cookie-2".to_string(), 1)]
    );

    store.clear(&u).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_remove_and_clear() {
    let store = store().await;
    let u = fresh_user(&store, "remove").await;

    store.upsert(&u, &line("cookie-1", 1)).await.unwrap();
    store.upsert(&u, &line("cookie-3", 4)).await.unwrap();

    store.remove(&u, &ProductId::new("cookie-1")).await.unwrap();
    assert_eq!(store.read_all(&u).await.unwrap(), vec![line("cookie-3", 4)]);

    // Removing an absent product is not an error.
    store.remove(&u, &ProductId::new("cookie-9")).await.unwrap();

    store.clear(&u).await.unwrap();
    assert!(store.read_all(&u).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_carts_are_scoped_by_user() {
    let store = store().await;
    let alice = fresh_user(&store, "alice").await;
    let bob = fresh_user(&store, "bob").await;

    store.upsert(&alice, &line("cookie-2", 2)).await.unwrap();

    assert!(store.read_all(&bob).await.unwrap().is_empty());
    store.clear(&bob).await.unwrap();
    assert_eq!(store.read_all(&alice).await.unwrap(), vec![line("cookie-2", 2)]);

    store.clear(&alice).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_saturated_quantity_round_trips() {
    let store = store().await;
    let u = fresh_user(&store, "saturated").await;

    store.upsert(&u, &line("cookie-1", u32::MAX)).await.unwrap();
    assert_eq!(
        store.read_all(&u).await.unwrap(),
        vec![line("cookie-1", u32::MAX)]
    );

    store.clear(&u).await.unwrap();
}
