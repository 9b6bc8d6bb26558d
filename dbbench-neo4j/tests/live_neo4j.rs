#![cfg(feature = "db-tests")]
//! Live Neo4j tests.
//!
//! Connection settings come from the `DBBENCH_NEO4J_*` environment variables
//! (or the local defaults). Every test removes what it writes.

use dbbench_core::BenchConfig;
use dbbench_neo4j::Neo4jBackend;
use dbbench_storage::Backend;
use dbbench_test_utils::conformance;

async fn test_backend() -> Neo4jBackend {
    let config = BenchConfig::from_env().expect("invalid DBBENCH_* environment");
    Neo4jBackend::connect(&config.neo4j)
        .await
        .expect("Failed to connect to neo4j")
}

#[tokio::test]
async fn test_neo4j_conformance() {
    let backend = test_backend().await;
    backend.prepare().await.unwrap();
    conformance::check_backend(&backend).await.unwrap();
}

#[tokio::test]
async fn test_neo4j_dangling_edge_rolls_back() {
    let backend = test_backend().await;
    backend.prepare().await.unwrap();

    let mut graph = dbbench_core::generate::pairs(1);
    graph.artifacts.truncate(1);
    assert!(backend.insert_graph(&graph).await.is_err());

    let found = backend.read_artifacts(&graph.artifact_ids()).await.unwrap();
    assert_eq!(found, 0);
}
