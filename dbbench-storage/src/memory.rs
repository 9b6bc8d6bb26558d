//! In-memory reference backend.
//!
//! Holds artifacts and edges in hash maps behind a single lock, with an
//! outbound adjacency index for traversals. Used by the harness tests and the
//! `memory` CLI backend; it is also the executable statement of the traversal
//! convention the database adapters must reproduce.

use crate::{Backend, Capability};
use async_trait::async_trait;
use chrono::Datelike;
use dbbench_core::{
    Artifact, ArtifactPatch, BackendKind, BenchError, BenchResult, Edge, GraphBatch, RecordId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    artifacts: HashMap<RecordId, Artifact>,
    edges: HashMap<RecordId, Edge>,
    /// artifact id -> outbound edge ids, in insertion order
    outbound: HashMap<RecordId, Vec<RecordId>>,
}

impl State {
    fn insert_artifact(&mut self, artifact: &Artifact) -> BenchResult<()> {
        if self.artifacts.contains_key(&artifact.id) {
            return Err(BenchError::backend(
                "failed creating document",
                format!("duplicate key {}", artifact.id),
            ));
        }
        self.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    fn insert_edge(&mut self, edge: &Edge) -> BenchResult<()> {
        if self.edges.contains_key(&edge.id) {
            return Err(BenchError::backend(
                "failed creating edge",
                format!("duplicate key {}", edge.id),
            ));
        }
        for endpoint in [edge.from, edge.to] {
            if !self.artifacts.contains_key(&endpoint) {
                return Err(BenchError::backend(
                    "failed creating edge",
                    format!("unknown endpoint {}", endpoint),
                ));
            }
        }
        self.edges.insert(edge.id, edge.clone());
        self.outbound.entry(edge.from).or_default().push(edge.id);
        Ok(())
    }

    /// Direct outbound targets of `id` that still exist.
    fn targets(&self, id: &RecordId) -> impl Iterator<Item = &Artifact> + '_ {
        self.outbound
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
            .filter_map(|edge| self.artifacts.get(&edge.to))
    }

    /// Breadth-first levels from `root`, up to and including `max_hop`.
    /// Each vertex is visited at most once.
    fn levels<'a>(&'a self, root: &'a Artifact, max_hop: usize) -> Vec<Vec<&'a Artifact>> {
        let mut seen: HashSet<RecordId> = HashSet::from([root.id]);
        let mut levels = vec![vec![root]];

        for _ in 0..max_hop {
            let mut next = Vec::new();
            if let Some(frontier) = levels.last() {
                for vertex in frontier {
                    for target in self.targets(&vertex.id) {
                        if seen.insert(target.id) {
                            next.push(target);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(next);
        }

        levels
    }
}

/// Thread-safe in-memory [`Backend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
    fault: Arc<RwLock<Option<String>>>,
    unsupported: HashSet<Capability>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decline to benchmark `capability`.
    pub fn without(mut self, capability: Capability) -> Self {
        self.unsupported.insert(capability);
        self
    }

    /// Make every subsequent call of operation `op` (e.g. `"query_pairs"`)
    /// fail with a backend error.
    pub fn inject_fault(&self, op: &str) {
        if let Ok(mut fault) = self.fault.write() {
            *fault = Some(op.to_string());
        }
    }

    pub fn clear_fault(&self) {
        if let Ok(mut fault) = self.fault.write() {
            *fault = None;
        }
    }

    /// Drop all stored data.
    pub fn clear(&self) -> BenchResult<()> {
        let mut state = self.write()?;
        state.artifacts.clear();
        state.edges.clear();
        state.outbound.clear();
        Ok(())
    }

    fn read(&self) -> BenchResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| BenchError::backend("memory store", e))
    }

    fn write(&self) -> BenchResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| BenchError::backend("memory store", e))
    }

    fn check(&self, op: &str) -> BenchResult<()> {
        let fault = self
            .fault
            .read()
            .map_err(|e| BenchError::backend("memory store", e))?;
        match fault.as_deref() {
            Some(faulty) if faulty == op => Err(BenchError::backend(op, "injected fault")),
            _ => Ok(()),
        }
    }

    fn root<'a>(state: &'a State, root: &RecordId) -> BenchResult<&'a Artifact> {
        state
            .artifacts
            .get(root)
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", root)))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn supports(&self, capability: Capability) -> bool {
        !self.unsupported.contains(&capability)
    }

    async fn prepare(&self) -> BenchResult<()> {
        self.check("prepare")
    }

    async fn count_artifacts(&self) -> BenchResult<u64> {
        self.check("count_artifacts")?;
        Ok(self.read()?.artifacts.len() as u64)
    }

    async fn count_edges(&self) -> BenchResult<u64> {
        self.check("count_edges")?;
        Ok(self.read()?.edges.len() as u64)
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> BenchResult<()> {
        self.check("insert_artifact")?;
        self.write()?.insert_artifact(artifact)
    }

    async fn insert_artifacts(&self, artifacts: &[Artifact]) -> BenchResult<()> {
        self.check("insert_artifacts")?;
        let mut state = self.write()?;
        for artifact in artifacts {
            state.insert_artifact(artifact)?;
        }
        Ok(())
    }

    async fn insert_graph(&self, graph: &GraphBatch) -> BenchResult<()> {
        self.check("insert_graph")?;
        let mut state = self.write()?;
        for artifact in &graph.artifacts {
            state.insert_artifact(artifact)?;
        }
        for edge in &graph.edges {
            state.insert_edge(edge)?;
        }
        Ok(())
    }

    async fn update_artifact(&self, id: RecordId, patch: &ArtifactPatch) -> BenchResult<()> {
        self.check("update_artifact")?;
        let mut state = self.write()?;
        let artifact = state
            .artifacts
            .get_mut(&id)
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", id)))?;
        artifact.apply(patch);
        Ok(())
    }

    async fn update_artifacts(&self, updates: &[(RecordId, ArtifactPatch)]) -> BenchResult<usize> {
        self.check("update_artifacts")?;
        let mut state = self.write()?;
        let mut updated = 0;
        for (id, patch) in updates {
            if let Some(artifact) = state.artifacts.get_mut(id) {
                artifact.apply(patch);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn remove_artifacts(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.check("remove_artifacts")?;
        let mut state = self.write()?;
        for id in ids {
            state.artifacts.remove(id);
        }
        Ok(())
    }

    async fn remove_edges(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.check("remove_edges")?;
        let mut state = self.write()?;
        for id in ids {
            if let Some(edge) = state.edges.remove(id) {
                if let Some(out) = state.outbound.get_mut(&edge.from) {
                    out.retain(|e| e != id);
                    if out.is_empty() {
                        state.outbound.remove(&edge.from);
                    }
                }
            }
        }
        Ok(())
    }

    async fn read_artifact(&self, id: RecordId) -> BenchResult<Artifact> {
        self.check("read_artifact")?;
        self.read()?
            .artifacts
            .get(&id)
            .cloned()
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", id)))
    }

    async fn read_artifacts(&self, ids: &[RecordId]) -> BenchResult<usize> {
        self.check("read_artifacts")?;
        let state = self.read()?;
        Ok(ids.iter().filter(|id| state.artifacts.contains_key(id)).count())
    }

    async fn query_all(&self) -> BenchResult<u64> {
        self.check("query_all")?;
        Ok(self.read()?.artifacts.len() as u64)
    }

    async fn query_pairs(&self) -> BenchResult<u64> {
        self.check("query_pairs")?;
        let state = self.read()?;
        let count: u64 = state
            .artifacts
            .keys()
            .map(|id| state.targets(id).count() as u64)
            .sum();
        Ok(count)
    }

    async fn query_pairs_in_year(&self, year: i32) -> BenchResult<u64> {
        self.check("query_pairs_in_year")?;
        let state = self.read()?;
        let count: u64 = state
            .artifacts
            .keys()
            .map(|id| {
                state
                    .targets(id)
                    .filter(|t| t.create_time.year() == year)
                    .count() as u64
            })
            .sum();
        Ok(count)
    }

    async fn chain_neighbour_at(&self, root: RecordId, hop: usize) -> BenchResult<Artifact> {
        self.check("chain_neighbour_at")?;
        let state = self.read()?;
        let start = Self::root(&state, &root)?;
        state
            .levels(start, hop)
            .get(hop)
            .and_then(|level| level.first())
            .map(|a| (*a).clone())
            .ok_or_else(|| BenchError::not_found(format!("{} hops from {}", hop, root)))
    }

    async fn sum_chain_items(&self, root: RecordId, max_hop: usize) -> BenchResult<i64> {
        self.check("sum_chain_items")?;
        let state = self.read()?;
        let start = Self::root(&state, &root)?;
        Ok(state
            .levels(start, max_hop)
            .iter()
            .flatten()
            .map(|a| a.item)
            .sum())
    }

    async fn sorted_neighbours(&self, root: RecordId) -> BenchResult<Vec<String>> {
        self.check("sorted_neighbours")?;
        let state = self.read()?;
        let mut names: Vec<String> = state.targets(&root).map(|a| a.name.clone()).collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbbench_core::generate;

    #[tokio::test]
    async fn test_insert_and_read() {
        let backend = MemoryBackend::new();
        let artifact = Artifact::new("artifact-0", "description-0", generate::epoch());
        backend.insert_artifact(&artifact).await.unwrap();

        let read = backend.read_artifact(artifact.id).await.unwrap();
        assert_eq!(read, artifact);
        assert_eq!(backend.count_artifacts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let backend = MemoryBackend::new();
        let artifact = Artifact::new("a", "d", generate::epoch());
        backend.insert_artifact(&artifact).await.unwrap();
        assert!(backend.insert_artifact(&artifact).await.is_err());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .read_artifact(dbbench_core::new_record_id())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_edge_requires_endpoints() {
        let backend = MemoryBackend::new();
        let mut graph = generate::pairs(1);
        graph.artifacts.truncate(1);
        assert!(backend.insert_graph(&graph).await.is_err());
    }

    #[tokio::test]
    async fn test_chain_traversal() {
        let backend = MemoryBackend::new();
        let graph = generate::chains(10, 1);
        backend.insert_graph(&graph).await.unwrap();
        let root = graph.roots[0];

        assert_eq!(backend.chain_neighbour_at(root, 0).await.unwrap().id, root);
        assert_eq!(
            backend.chain_neighbour_at(root, 9).await.unwrap().name,
            "artifact-9"
        );
        assert!(backend
            .chain_neighbour_at(root, 10)
            .await
            .unwrap_err()
            .is_not_found());

        assert_eq!(backend.sum_chain_items(root, 0).await.unwrap(), 1);
        assert_eq!(backend.sum_chain_items(root, 4).await.unwrap(), 5);
        assert_eq!(backend.sum_chain_items(root, 50).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_sum_missing_root_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .sum_chain_items(dbbench_core::new_record_id(), 3)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sorted_neighbours_of_star() {
        let backend = MemoryBackend::new();
        let graph = generate::star(12);
        backend.insert_graph(&graph).await.unwrap();

        let names = backend.sorted_neighbours(graph.roots[0]).await.unwrap();
        assert_eq!(names.len(), 11);
        assert_eq!(names[0], "artifact-1");
        assert_eq!(names[1], "artifact-10");
        assert_eq!(names[2], "artifact-11");
        assert_eq!(names[3], "artifact-2");
    }

    #[tokio::test]
    async fn test_pairs_in_year() {
        let backend = MemoryBackend::new();
        backend.insert_graph(&generate::pairs(800)).await.unwrap();

        assert_eq!(backend.query_pairs().await.unwrap(), 800);
        assert_eq!(backend.query_pairs_in_year(2000).await.unwrap(), 366);
        assert_eq!(backend.query_pairs_in_year(2001).await.unwrap(), 365);
        assert_eq!(backend.query_pairs_in_year(2002).await.unwrap(), 69);
    }

    #[tokio::test]
    async fn test_remove_edges_detaches_traversal() {
        let backend = MemoryBackend::new();
        let graph = generate::pairs(3);
        backend.insert_graph(&graph).await.unwrap();

        backend.remove_edges(&graph.edge_ids()).await.unwrap();
        assert_eq!(backend.count_edges().await.unwrap(), 0);
        assert_eq!(backend.query_pairs().await.unwrap(), 0);

        backend.remove_artifacts(&graph.artifact_ids()).await.unwrap();
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_many_counts_matches() {
        let backend = MemoryBackend::new();
        let created = backend.create_many(5).await.unwrap();
        let mut ids = created.ids.clone();
        ids.push(dbbench_core::new_record_id());

        assert_eq!(backend.update_many(&ids).await.unwrap(), 5);
        let read = backend.read_artifact(created.ids[0]).await.unwrap();
        assert!(read.name.starts_with("new-artifact-"));
        assert!(read.description.starts_with("new-description-"));
    }

    #[test]
    fn test_without_capability() {
        let backend = MemoryBackend::new().without(Capability::ReadOne);
        assert!(!backend.supports(Capability::ReadOne));
        assert!(backend.supports(Capability::ReadMany));
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let backend = MemoryBackend::new();
        backend.inject_fault("query_all");
        assert!(backend.query_all().await.is_err());
        assert!(backend.count_artifacts().await.is_ok());

        backend.clear_fault();
        assert_eq!(backend.query_all().await.unwrap(), 0);
    }
}
