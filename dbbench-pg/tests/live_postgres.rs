#![cfg(feature = "db-tests")]
//! Live PostgreSQL tests.
//!
//! Connection settings come from `DBBENCH_PG_URL` (or the default
//! local URL). Every test removes what it writes.

use dbbench_core::BenchConfig;
use dbbench_pg::PgBackend;
use dbbench_storage::Backend;
use dbbench_test_utils::conformance;

fn test_backend() -> PgBackend {
    let config = BenchConfig::from_env().expect("invalid DBBENCH_* environment");
    PgBackend::from_config(&config.postgres).expect("Failed to create postgres pool")
}

#[tokio::test]
async fn test_postgres_conformance() {
    let backend = test_backend();
    backend.prepare().await.unwrap();
    conformance::check_backend(&backend).await.unwrap();
}

#[tokio::test]
async fn test_postgres_prepare_is_idempotent() {
    let backend = test_backend();
    backend.prepare().await.unwrap();
    backend.prepare().await.unwrap();
}

#[tokio::test]
async fn test_postgres_edge_requires_endpoints() {
    let backend = test_backend();
    backend.prepare().await.unwrap();

    let mut graph = dbbench_core::generate::pairs(1);
    graph.artifacts.truncate(1);
    let err = backend.insert_graph(&graph).await.unwrap_err();
    assert!(err.to_string().contains("failed inserting into edge table"));

    // the transaction rolled back, so the lone artifact is absent too
    let found = backend.read_artifacts(&graph.artifact_ids()).await.unwrap();
    assert_eq!(found, 0);
}
