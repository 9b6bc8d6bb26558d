//! dbbench Test Utilities
//!
//! Shared test infrastructure for the dbbench workspace:
//! - Proptest generators for records, patches and workload shapes
//! - Fixtures for common scenarios
//! - Custom assertions over `BenchResult`
//! - A backend conformance check run against every adapter

pub use dbbench_core::{
    Artifact, ArtifactPatch, BenchError, BenchResult, Edge, GraphBatch, RecordId, Timestamp,
};
pub use dbbench_storage::{Backend, MemoryBackend};

use uuid::Uuid;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for dbbench entity types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a timestamp between 2000-01-01 and 2030-01-01.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (946_684_800i64..1_893_456_000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_artifact() -> impl Strategy<Value = Artifact> {
        (
            arb_uuid(),
            "[a-z]{1,12}-[0-9]{1,5}",
            "[a-z ]{0,24}",
            arb_timestamp(),
            1i64..100,
        )
            .prop_map(|(id, name, description, create_time, item)| Artifact {
                id,
                name,
                description,
                create_time,
                item,
            })
    }

    /// Generate a patch with a suffix in the randomized update range.
    pub fn arb_patch() -> impl Strategy<Value = ArtifactPatch> {
        (0u32..dbbench_core::entities::PATCH_SUFFIX_RANGE).prop_map(ArtifactPatch::with_suffix)
    }

    /// Generate a small graph workload: (pairs, chain length, chain repeat, star size).
    pub fn arb_shape() -> impl Strategy<Value = (usize, usize, usize, usize)> {
        (0usize..40, 1usize..60, 1usize..4, 1usize..40)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common test scenarios.

    use super::*;
    use dbbench_core::generate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// An artifact stamped at the generator epoch.
    pub fn epoch_artifact(i: usize) -> Artifact {
        Artifact::new(
            format!("artifact-{}", i),
            format!("description-{}", i),
            generate::epoch(),
        )
    }

    /// A deterministic sequence of randomized patches.
    pub fn seeded_patches(seed: u64, n: usize) -> Vec<ArtifactPatch> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| ArtifactPatch::randomized(&mut rng)).collect()
    }

    /// A memory backend holding one chain of `len` artifacts; returns the root.
    pub async fn memory_with_chain(len: usize) -> BenchResult<(MemoryBackend, RecordId)> {
        let backend = MemoryBackend::new();
        let created = backend.create_chains(len, 1).await?;
        let root = created
            .roots
            .first()
            .copied()
            .ok_or_else(|| BenchError::not_found("chain root"))?;
        Ok((backend, root))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for dbbench-specific validation.

    use super::*;

    /// Assert that a BenchResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &BenchResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a BenchResult is a NotFound error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &BenchResult<T>) {
        match result {
            Err(BenchError::NotFound { .. }) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a BenchResult is a Backend error whose context starts with `prefix`.
    #[track_caller]
    pub fn assert_backend_error<T: std::fmt::Debug>(result: &BenchResult<T>, prefix: &str) {
        match result {
            Err(BenchError::Backend { context, .. }) => {
                assert!(
                    context.starts_with(prefix),
                    "Expected context starting with {:?}, got {:?}",
                    prefix,
                    context
                );
            }
            other => panic!("Expected Backend error, got: {:?}", other),
        }
    }

    /// Assert that a BenchResult is an Expectation error for `step`.
    #[track_caller]
    pub fn assert_expectation<T: std::fmt::Debug>(result: &BenchResult<T>, step: &str) {
        match result {
            Err(BenchError::Expectation { step: s, .. }) => {
                assert_eq!(s, step, "Wrong step in Expectation error");
            }
            other => panic!("Expected Expectation error for {}, got: {:?}", step, other),
        }
    }
}

// ============================================================================
// BACKEND CONFORMANCE
// ============================================================================

pub mod conformance {
    //! Behavioural check every [`Backend`] must pass.
    //!
    //! Works against a shared live database: all assertions are relative to
    //! counts captured at the start, traversals start from roots written by
    //! the check itself, and everything written is removed afterwards, also
    //! when a check fails.

    use super::*;
    use dbbench_core::chain_item_sum;

    const CHAIN_LEN: usize = 8;
    const STAR_SIZE: usize = 5;
    const PAIRS: usize = 3;
    const FLAT: usize = 4;

    #[derive(Default)]
    struct Written {
        artifacts: Vec<RecordId>,
        edges: Vec<RecordId>,
    }

    fn expect_eq<T: PartialEq + std::fmt::Display>(step: &str, expected: T, actual: T) -> BenchResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(BenchError::expectation(step, expected, actual))
        }
    }

    fn expect_not_found<T>(step: &str, result: BenchResult<T>) -> BenchResult<()> {
        match result {
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
            Ok(_) => Err(BenchError::expectation(step, "not found", "a result")),
        }
    }

    /// Run the conformance check; the backend must already be prepared.
    pub async fn check_backend(backend: &dyn Backend) -> BenchResult<()> {
        let mut written = Written::default();
        let outcome = run(backend, &mut written).await;

        let released = async {
            backend.remove_edges(&written.edges).await?;
            backend.remove_artifacts(&written.artifacts).await
        }
        .await;

        outcome.and(released)
    }

    async fn run(backend: &dyn Backend, written: &mut Written) -> BenchResult<()> {
        let base_artifacts = backend.count_artifacts().await?;
        let base_edges = backend.count_edges().await?;
        let base_all = backend.query_all().await?;
        let base_pairs = backend.query_pairs().await?;
        let base_year = backend.query_pairs_in_year(2000).await?;

        // flat records
        let flat = backend.create_many(FLAT).await?;
        written.artifacts.extend(&flat.ids);
        expect_eq("create_many", base_artifacts + FLAT as u64, flat.total)?;
        expect_eq("query_all", base_all + FLAT as u64, backend.query_all().await?)?;
        expect_eq("read_many", FLAT, backend.read_many(&flat.ids).await?)?;

        let first = backend.read_one(flat.ids[0]).await?;
        expect_eq("read_one", "artifact-0", first.name.as_str())?;
        expect_eq("update_many", FLAT, backend.update_many(&flat.ids).await?)?;
        backend.update_one(flat.ids[1]).await?;
        let updated = backend.read_one(flat.ids[1]).await?;
        if !updated.name.starts_with("new-artifact-") {
            return Err(BenchError::expectation("update_one", "new-artifact-<r>", updated.name));
        }
        expect_not_found("read_one_missing", backend.read_one(dbbench_core::new_record_id()).await)?;

        // pairs
        let pairs = backend.create_pairs(PAIRS).await?;
        written.artifacts.extend(&pairs.artifact_ids);
        written.edges.extend(&pairs.edge_ids);
        expect_eq("create_pairs", base_edges + PAIRS as u64, pairs.edge_total)?;
        expect_eq(
            "create_pairs",
            base_artifacts + (FLAT + 2 * PAIRS) as u64,
            pairs.artifact_total,
        )?;
        expect_eq("query_pairs", base_pairs + PAIRS as u64, backend.query_pairs().await?)?;
        expect_eq(
            "query_pairs_in_year",
            base_year + PAIRS as u64,
            backend.query_pairs_in_year(2000).await?,
        )?;

        // chain
        let chain = backend.create_chains(CHAIN_LEN, 1).await?;
        written.artifacts.extend(&chain.artifact_ids);
        written.edges.extend(&chain.edge_ids);
        let root = chain.roots[0];
        expect_eq(
            "chain_neighbour_at_0",
            root,
            backend.chain_neighbour_at(root, 0).await?.id,
        )?;
        let last = backend.chain_neighbour_at(root, CHAIN_LEN - 1).await?;
        expect_eq("chain_neighbour_at_last", format!("artifact-{}", CHAIN_LEN - 1), last.name)?;
        expect_not_found(
            "chain_neighbour_past_end",
            backend.chain_neighbour_at(root, CHAIN_LEN).await,
        )?;
        for max_hop in [0, 3, CHAIN_LEN + 10] {
            expect_eq(
                "sum_chain_items",
                chain_item_sum(CHAIN_LEN, max_hop),
                backend.sum_chain_items(root, max_hop).await?,
            )?;
        }
        expect_not_found(
            "sum_chain_items_missing_root",
            backend.sum_chain_items(dbbench_core::new_record_id(), 3).await,
        )?;

        // star
        let star = backend.create_star(STAR_SIZE).await?;
        written.artifacts.extend(&star.artifact_ids);
        written.edges.extend(&star.edge_ids);
        let names = backend.sorted_neighbours(star.roots[0]).await?;
        let expected: Vec<String> = (1..STAR_SIZE).map(|i| format!("artifact-{}", i)).collect();
        expect_eq("sorted_neighbours", expected.join(","), names.join(","))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_memory_backend_conforms() {
        let backend = MemoryBackend::new();
        conformance::check_backend(&backend).await.unwrap();
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
        assert_eq!(backend.count_edges().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_conformance_releases_on_failure() {
        let backend = MemoryBackend::new();
        backend.inject_fault("sorted_neighbours");
        let result = conformance::check_backend(&backend).await;
        assertions::assert_backend_error(&result, "sorted_neighbours");
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
        assert_eq!(backend.count_edges().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_with_chain_fixture() {
        let (backend, root) = fixtures::memory_with_chain(3).await.unwrap();
        assert_eq!(backend.sum_chain_items(root, 10).await.unwrap(), 3);
        assertions::assert_not_found(&backend.chain_neighbour_at(root, 3).await);
    }

    #[test]
    fn test_seeded_patches_are_reproducible() {
        assert_eq!(fixtures::seeded_patches(7, 5), fixtures::seeded_patches(7, 5));
    }

    proptest! {
        #[test]
        fn prop_patch_names_in_range(patch in generators::arb_patch()) {
            let suffix: u32 = patch.name.trim_start_matches("new-artifact-").parse().unwrap();
            prop_assert!(suffix < dbbench_core::entities::PATCH_SUFFIX_RANGE);
            prop_assert_eq!(patch.description, format!("new-description-{}", suffix));
        }

        #[test]
        fn prop_apply_patch_keeps_identity(
            mut artifact in generators::arb_artifact(),
            patch in generators::arb_patch(),
        ) {
            let before = artifact.clone();
            artifact.apply(&patch);
            prop_assert_eq!(artifact.id, before.id);
            prop_assert_eq!(artifact.create_time, before.create_time);
            prop_assert_eq!(artifact.item, before.item);
            prop_assert_eq!(artifact.name, patch.name);
        }
    }
}
