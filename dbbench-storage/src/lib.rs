//! dbbench Storage - Backend Capability Trait and Reference Implementation
//!
//! Defines the uniform workload interface every database adapter implements.
//! Adapters supply the primitives (insert, read, update, query, traversal,
//! removal); the provided methods layer the benchmark contract on top:
//! generate records, write them, and report the post-operation totals.
//!
//! Traversal convention shared by all backends: hops are counted from the
//! root (hop 0), bounds are inclusive, and edges are followed outbound only.

pub mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;
use chrono::Utc;
use dbbench_core::{
    generate, Artifact, ArtifactPatch, BackendKind, BenchResult, ConfigError, Created,
    GraphBatch, GraphCreated, RecordId,
};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Workload families a backend may decline to benchmark. Steps exercising an
/// unsupported capability are recorded as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CreateEach,
    CreateMany,
    ReadOne,
    ReadMany,
    UpdateOne,
    UpdateMany,
    QueryAll,
    CreatePairs,
    QueryPairs,
    QueryPairsInYear,
    CreateChain,
    ChainNeighbour,
    ChainSum,
    CreateStar,
    SortedNeighbours,
}

impl Capability {
    pub const ALL: [Capability; 15] = [
        Capability::CreateEach,
        Capability::CreateMany,
        Capability::ReadOne,
        Capability::ReadMany,
        Capability::UpdateOne,
        Capability::UpdateMany,
        Capability::QueryAll,
        Capability::CreatePairs,
        Capability::QueryPairs,
        Capability::QueryPairsInYear,
        Capability::CreateChain,
        Capability::ChainNeighbour,
        Capability::ChainSum,
        Capability::CreateStar,
        Capability::SortedNeighbours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateEach => "create_each",
            Capability::CreateMany => "create_many",
            Capability::ReadOne => "read_one",
            Capability::ReadMany => "read_many",
            Capability::UpdateOne => "update_one",
            Capability::UpdateMany => "update_many",
            Capability::QueryAll => "query_all",
            Capability::CreatePairs => "create_pairs",
            Capability::QueryPairs => "query_pairs",
            Capability::QueryPairsInYear => "query_pairs_in_year",
            Capability::CreateChain => "create_chain",
            Capability::ChainNeighbour => "chain_neighbour",
            Capability::ChainSum => "chain_sum",
            Capability::CreateStar => "create_star",
            Capability::SortedNeighbours => "sorted_neighbours",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "skip".to_string(),
                value: s.to_string(),
                reason: "unknown workload capability".to_string(),
            })
    }
}

/// Async workload interface implemented once per database.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether this backend benchmarks `capability`. All are supported unless
    /// an adapter says otherwise.
    fn supports(&self, capability: Capability) -> bool {
        let _ = capability;
        true
    }

    // ========================================================================
    // SCHEMA & COUNTS
    // ========================================================================

    /// Create tables, collections and indexes if they do not exist.
    async fn prepare(&self) -> BenchResult<()>;

    /// Total artifacts currently stored.
    async fn count_artifacts(&self) -> BenchResult<u64>;

    /// Total edges currently stored.
    async fn count_edges(&self) -> BenchResult<u64>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert a single artifact in its own round trip.
    async fn insert_artifact(&self, artifact: &Artifact) -> BenchResult<()>;

    /// Insert many artifacts in one round trip. A failing batch may leave
    /// part of it written.
    async fn insert_artifacts(&self, artifacts: &[Artifact]) -> BenchResult<()>;

    /// Insert the artifacts of a graph, then its edges.
    async fn insert_graph(&self, graph: &GraphBatch) -> BenchResult<()>;

    /// Overwrite name and description of one artifact.
    async fn update_artifact(&self, id: RecordId, patch: &ArtifactPatch) -> BenchResult<()>;

    /// Overwrite many artifacts in one round trip; returns how many matched.
    async fn update_artifacts(&self, updates: &[(RecordId, ArtifactPatch)]) -> BenchResult<usize>;

    async fn remove_artifacts(&self, ids: &[RecordId]) -> BenchResult<()>;

    async fn remove_edges(&self, ids: &[RecordId]) -> BenchResult<()>;

    // ========================================================================
    // READS & QUERIES
    // ========================================================================

    /// Point read; `NotFound` when the id is unknown.
    async fn read_artifact(&self, id: RecordId) -> BenchResult<Artifact>;

    /// Bulk read; returns how many of `ids` were found.
    async fn read_artifacts(&self, ids: &[RecordId]) -> BenchResult<usize>;

    /// Full scan of the artifact store, returning the row count.
    async fn query_all(&self) -> BenchResult<u64>;

    /// One-hop outbound traversal from every artifact; returns the number of
    /// traversed target vertices.
    async fn query_pairs(&self) -> BenchResult<u64>;

    /// [`Backend::query_pairs`] restricted to targets created in `year` (UTC).
    async fn query_pairs_in_year(&self, year: i32) -> BenchResult<u64>;

    /// The artifact exactly `hop` outbound hops from `root` (`hop = 0` is the
    /// root itself). `NotFound` when the chain is shorter.
    async fn chain_neighbour_at(&self, root: RecordId, hop: usize) -> BenchResult<Artifact>;

    /// Sum of `item` over hops `0..=max_hop` from `root`. `NotFound` when the
    /// root does not exist.
    async fn sum_chain_items(&self, root: RecordId, max_hop: usize) -> BenchResult<i64>;

    /// Names of the direct outbound neighbours of `root`, ordered by name.
    async fn sorted_neighbours(&self, root: RecordId) -> BenchResult<Vec<String>>;

    // ========================================================================
    // PROVIDED WORKLOAD OPERATIONS
    // ========================================================================

    /// Create one artifact.
    async fn create_one(&self) -> BenchResult<Created> {
        self.create_each(1).await
    }

    /// Create `n` artifacts one round trip at a time.
    async fn create_each(&self, n: usize) -> BenchResult<Created> {
        let artifacts = generate::flat_batch(n, Utc::now());
        for artifact in &artifacts {
            self.insert_artifact(artifact).await?;
        }
        let total = self.count_artifacts().await?;
        Ok(Created {
            ids: artifacts.into_iter().map(|a| a.id).collect(),
            total,
        })
    }

    /// Create `n` artifacts in a single bulk insert.
    async fn create_many(&self, n: usize) -> BenchResult<Created> {
        let artifacts = generate::flat_batch(n, Utc::now());
        if !artifacts.is_empty() {
            self.insert_artifacts(&artifacts).await?;
        }
        let total = self.count_artifacts().await?;
        Ok(Created {
            ids: artifacts.into_iter().map(|a| a.id).collect(),
            total,
        })
    }

    /// Write a generated graph and report post-operation totals.
    async fn create_graph(&self, graph: GraphBatch) -> BenchResult<GraphCreated> {
        if !graph.is_empty() {
            self.insert_graph(&graph).await?;
        }
        let artifact_total = self.count_artifacts().await?;
        let edge_total = self.count_edges().await?;
        debug!(
            backend = %self.kind(),
            artifacts = graph.artifacts.len(),
            edges = graph.edges.len(),
            artifact_total,
            edge_total,
            "graph created"
        );
        Ok(GraphCreated {
            artifact_ids: graph.artifact_ids(),
            edge_ids: graph.edge_ids(),
            roots: graph.roots,
            artifact_total,
            edge_total,
        })
    }

    /// `n` connected pairs (2n artifacts, n edges).
    async fn create_pairs(&self, n: usize) -> BenchResult<GraphCreated> {
        self.create_graph(generate::pairs(n)).await
    }

    /// `repeat` chains of `len` artifacts.
    async fn create_chains(&self, len: usize, repeat: usize) -> BenchResult<GraphCreated> {
        self.create_graph(generate::chains(len, repeat)).await
    }

    /// One root with `n - 1` direct children.
    async fn create_star(&self, n: usize) -> BenchResult<GraphCreated> {
        self.create_graph(generate::star(n)).await
    }

    async fn read_one(&self, id: RecordId) -> BenchResult<Artifact> {
        self.read_artifact(id).await
    }

    async fn read_many(&self, ids: &[RecordId]) -> BenchResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.read_artifacts(ids).await
    }

    /// Randomize name and description of one artifact.
    async fn update_one(&self, id: RecordId) -> BenchResult<()> {
        let patch = ArtifactPatch::randomized(&mut rand::rng());
        self.update_artifact(id, &patch).await
    }

    /// Randomize name and description of every artifact in `ids` in one
    /// round trip; returns the updated count.
    async fn update_many(&self, ids: &[RecordId]) -> BenchResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let updates: Vec<(RecordId, ArtifactPatch)> = {
            let mut rng = rand::rng();
            ids.iter()
                .map(|id| (*id, ArtifactPatch::randomized(&mut rng)))
                .collect()
        };
        self.update_artifacts(&updates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_each_reports_total() {
        let backend = MemoryBackend::new();
        let first = backend.create_one().await.unwrap();
        assert_eq!(first.ids.len(), 1);
        assert_eq!(first.total, 1);

        let created = backend.create_each(10).await.unwrap();
        assert_eq!(created.ids.len(), 10);
        assert_eq!(created.total, 11);
    }

    #[tokio::test]
    async fn test_create_many_zero_is_noop() {
        let backend = MemoryBackend::new();
        let created = backend.create_many(0).await.unwrap();
        assert!(created.ids.is_empty());
        assert_eq!(created.total, 0);
    }

    #[tokio::test]
    async fn test_create_pairs_totals() {
        let backend = MemoryBackend::new();
        let created = backend.create_pairs(25).await.unwrap();
        assert_eq!(created.artifact_total, 50);
        assert_eq!(created.edge_total, 25);
        assert_eq!(created.roots.len(), 25);
        assert_eq!(created.artifact_ids.len(), 50);
        assert_eq!(created.edge_ids.len(), 25);
    }

    #[tokio::test]
    async fn test_create_chains_and_star() {
        let backend = MemoryBackend::new();
        let chains = backend.create_chains(20, 3).await.unwrap();
        assert_eq!(chains.artifact_total, 60);
        assert_eq!(chains.edge_total, 57);

        let star = backend.create_star(10).await.unwrap();
        assert_eq!(star.artifact_total, 70);
        assert_eq!(star.edge_total, 66);
    }

    #[tokio::test]
    async fn test_read_many_empty() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read_many(&[]).await.unwrap(), 0);
        assert_eq!(backend.update_many(&[]).await.unwrap(), 0);
    }

    #[test]
    fn test_capability_parse() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
        assert_eq!(
            "Read-Many".parse::<Capability>().unwrap(),
            Capability::ReadMany
        );
        assert!("teleport".parse::<Capability>().is_err());
    }

    #[tokio::test]
    async fn test_update_one_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_one(dbbench_core::new_record_id())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
