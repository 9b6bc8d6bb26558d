//! Scenario fixtures: the ids a setup step wrote, released when the scenario
//! ends.

use dbbench_core::{BenchError, BenchResult, Created, GraphCreated, RecordId};
use dbbench_storage::Backend;
use tracing::{debug, warn};

/// Records written by one setup step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fixture {
    pub artifacts: Vec<RecordId>,
    pub edges: Vec<RecordId>,
    pub roots: Vec<RecordId>,
}

impl Fixture {
    /// First root of a graph fixture.
    pub fn root(&self) -> BenchResult<RecordId> {
        self.roots
            .first()
            .copied()
            .ok_or_else(|| BenchError::not_found("fixture root"))
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.edges.is_empty()
    }

    /// Remove edges first, then artifacts, so no dangling edge is ever left
    /// behind.
    pub async fn release(&self, backend: &dyn Backend) -> BenchResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        if !self.edges.is_empty() {
            backend.remove_edges(&self.edges).await?;
        }
        if !self.artifacts.is_empty() {
            backend.remove_artifacts(&self.artifacts).await?;
        }
        debug!(
            artifacts = self.artifacts.len(),
            edges = self.edges.len(),
            "fixture released"
        );
        Ok(())
    }
}

impl From<Created> for Fixture {
    fn from(created: Created) -> Self {
        Self {
            artifacts: created.ids,
            edges: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl From<GraphCreated> for Fixture {
    fn from(created: GraphCreated) -> Self {
        Self {
            artifacts: created.artifact_ids,
            edges: created.edge_ids,
            roots: created.roots,
        }
    }
}

/// Release a fixture after a failed step without masking the step's error.
pub(crate) async fn release_after(
    fixture: &Fixture,
    backend: &dyn Backend,
    step: &str,
    outcome: BenchResult<()>,
) -> BenchResult<()> {
    let released = fixture.release(backend).await;
    if let (Err(_), Err(release_err)) = (&outcome, &released) {
        warn!(step, error = %release_err, "fixture release failed after step failure");
    }
    outcome.and(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbbench_storage::MemoryBackend;

    #[tokio::test]
    async fn test_release_removes_graph() {
        let backend = MemoryBackend::new();
        let fixture = Fixture::from(backend.create_star(5).await.unwrap());
        assert_eq!(fixture.roots.len(), 1);

        fixture.release(&backend).await.unwrap();
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
        assert_eq!(backend.count_edges().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_fixture_release_is_noop() {
        let backend = MemoryBackend::new();
        backend.inject_fault("remove_edges");
        Fixture::default().release(&backend).await.unwrap();
    }

    #[test]
    fn test_flat_fixture_has_no_root() {
        let fixture = Fixture::from(Created {
            ids: vec![dbbench_core::new_record_id()],
            total: 1,
        });
        assert!(fixture.root().unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_release_after_keeps_step_error() {
        let backend = MemoryBackend::new();
        let fixture = Fixture::from(backend.create_pairs(2).await.unwrap());
        let failed = Err(BenchError::expectation("05_step", 1, 2));

        let err = release_after(&fixture, &backend, "05_step", failed)
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Expectation { .. }));
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
    }
}
