//! Postgres store tests. They need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use collection_api::repository::{CredentialStore, PostgresRepository, RecordStore, StoreError};
use serde_json::{Map, Value, json};
use sqlx::PgPool;
use std::sync::Arc;

// --- Test Context and Setup ---

struct DbTestContext {
    repo: Arc<PostgresRepository>,
    /// Resource name unique to this test run, so runs never see each other's rows.
    resource: String,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");
        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        let repo = PostgresRepository::new(pool);
        repo.migrate().await.expect("Failed to create tables.");

        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        DbTestContext {
            repo: Arc::new(repo),
            resource: format!("test_movies_{}", nanos),
        }
    }
}

fn movie(title: &str, year: i64) -> Map<String, Value> {
    match json!({ "title": title, "director": "Someone", "year": year }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

// --- Tests ---

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_assigns_sequential_ids_and_checks_natural_key() {
    let ctx = DbTestContext::setup().await;
    let r = ctx.resource.as_str();

    let first = ctx.repo.insert(r, Some("title"), movie("Dune", 2021)).await.unwrap();
    let second = ctx.repo.insert(r, Some("title"), movie("Alien", 1979)).await.unwrap();
    assert_eq!((first.id, second.id), (1, 2));

    let dup = ctx.repo.insert(r, Some("title"), movie("Dune", 1984)).await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));

    // Without a natural key duplicates are fine.
    let third = ctx.repo.insert(r, None, movie("Dune", 1984)).await.unwrap();
    assert_eq!(third.id, 3);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_inserts_get_distinct_ids() {
    let ctx = DbTestContext::setup().await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let repo = ctx.repo.clone();
            let resource = ctx.resource.clone();
            tokio::spawn(async move {
                repo.insert(&resource, None, movie(&format!("Film {i}"), 2000))
                    .await
                    .map(|record| record.id)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().expect("no insert may fail under contention"));
    }
    ids.sort();
    assert_eq!(ids, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_scan_get_replace_delete() {
    let ctx = DbTestContext::setup().await;
    let r = ctx.resource.as_str();

    let created = ctx.repo.insert(r, None, movie("Dune", 2021)).await.unwrap();
    assert_eq!(ctx.repo.scan(r).await.unwrap(), vec![created.clone()]);
    assert_eq!(ctx.repo.get(r, created.id).await.unwrap(), Some(created.clone()));

    let mut changed = created.clone();
    changed.fields.insert("year".into(), json!(2022));
    let replaced = ctx.repo.replace(r, changed.clone()).await.unwrap();
    assert_eq!(replaced, Some(changed.clone()));
    assert_eq!(ctx.repo.get(r, created.id).await.unwrap(), Some(changed));

    assert!(ctx.repo.delete(r, created.id).await.unwrap());
    assert!(!ctx.repo.delete(r, created.id).await.unwrap());
    assert_eq!(ctx.repo.get(r, created.id).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_credentials_unique_username() {
    let ctx = DbTestContext::setup().await;
    let username = format!("user_{}", ctx.resource);

    let created = ctx
        .repo
        .create_credential(&username, "hash", "regular")
        .await
        .unwrap();
    let found = ctx.repo.find_credential(&username).await.unwrap();
    assert_eq!(found, Some(created));

    let dup = ctx.repo.create_credential(&username, "hash", "admin").await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));
}
