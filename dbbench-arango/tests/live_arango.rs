#![cfg(feature = "db-tests")]
//! Live ArangoDB tests.
//!
//! Connection settings come from the `DBBENCH_ARANGO_*` environment variables
//! (or the local defaults). Every test removes what it writes.

use dbbench_arango::ArangoBackend;
use dbbench_core::BenchConfig;
use dbbench_storage::Backend;
use dbbench_test_utils::conformance;

fn test_backend() -> ArangoBackend {
    let config = BenchConfig::from_env().expect("invalid DBBENCH_* environment");
    ArangoBackend::new(&config.arango).expect("Failed to create arango client")
}

#[tokio::test]
async fn test_arango_conformance() {
    let backend = test_backend();
    backend.prepare().await.unwrap();
    conformance::check_backend(&backend).await.unwrap();

    // runs after the relative-count checks so it cannot skew them
    let created = backend.create_one().await.unwrap();
    let existing = backend.read_artifact(created.ids[0]).await.unwrap();
    let err = backend.insert_artifact(&existing).await.unwrap_err();
    assert!(err.to_string().starts_with("failed creating document"));
    backend.remove_artifacts(&created.ids).await.unwrap();
}

#[tokio::test]
async fn test_arango_prepare_is_idempotent() {
    let backend = test_backend();
    backend.prepare().await.unwrap();
    backend.prepare().await.unwrap();
}
