//! Fail-fast suite runner.
//!
//! Runs a [`SuitePlan`] against one [`Backend`], timing every step into a
//! [`Timings`] accumulator. Expected counts are derived from the plan's sizes
//! on top of baselines captured once at suite start. The first failing step
//! is recorded as failed, its scenario's fixture is released, and the suite
//! stops.

use crate::fixture::{release_after, Fixture};
use crate::plan::{expected_pairs_in_year, step_name, Probe, Scenario, Setup, SuitePlan};
use dbbench_core::{
    generate, ArtifactPatch, BenchError, BenchResult, RecordId, Report, StepOutcome, StepRecord,
    Timings,
};
use dbbench_storage::{Backend, Capability};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Knobs for one suite run.
#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    /// Capabilities to record as skipped in addition to the ones the backend
    /// declines.
    pub skip: BTreeSet<Capability>,
    /// Seed for update patches. Unset means thread-local entropy.
    pub seed: Option<u64>,
}

/// Counts present before the suite wrote anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baselines {
    pub artifacts: u64,
    pub edges: u64,
    pub pairs: u64,
    pub pairs_in_year: BTreeMap<i32, u64>,
}

impl Baselines {
    /// Capture the counts the plan's assertions build on. Pair queries are
    /// only run when the plan uses them and they are enabled.
    pub async fn capture(
        backend: &dyn Backend,
        plan: &SuitePlan,
        enabled: impl Fn(Capability) -> bool,
    ) -> BenchResult<Self> {
        let mut baselines = Self {
            artifacts: backend.count_artifacts().await?,
            edges: backend.count_edges().await?,
            ..Self::default()
        };
        if plan.uses(Capability::QueryPairs) && enabled(Capability::QueryPairs) {
            baselines.pairs = backend.query_pairs().await?;
        }
        if enabled(Capability::QueryPairsInYear) {
            for year in plan.probed_years() {
                let count = backend.query_pairs_in_year(year).await?;
                baselines.pairs_in_year.insert(year, count);
            }
        }
        Ok(baselines)
    }
}

/// Outcome of a suite run: the report always, the first error if any.
#[derive(Debug)]
pub struct SuiteRun {
    pub report: Report,
    pub error: Option<BenchError>,
}

impl SuiteRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run `plan` against `backend`.
pub async fn run_suite(backend: &dyn Backend, plan: &SuitePlan, options: &SuiteOptions) -> SuiteRun {
    let suite = format!("{} ({})", backend.kind(), plan.name);
    let mut runner = Runner::new(backend, options);

    let error = runner.run(plan).await.err();
    if let Some(err) = &error {
        warn!(suite = %suite, error = %err, "suite aborted");
    }
    SuiteRun {
        report: runner.timings.report(suite),
        error,
    }
}

struct Runner<'a> {
    backend: &'a dyn Backend,
    skip: &'a BTreeSet<Capability>,
    rng: Option<StdRng>,
    timings: Timings,
    baselines: Baselines,
    seq: usize,
}

/// Totals a setup step reported after writing.
struct Written {
    fixture: Fixture,
    artifact_total: u64,
    edge_total: Option<u64>,
}

impl<'a> Runner<'a> {
    fn new(backend: &'a dyn Backend, options: &'a SuiteOptions) -> Self {
        Self {
            backend,
            skip: &options.skip,
            rng: options.seed.map(StdRng::seed_from_u64),
            timings: Timings::new(),
            baselines: Baselines::default(),
            seq: 0,
        }
    }

    fn enabled(&self, capability: Capability) -> bool {
        self.backend.supports(capability) && !self.skip.contains(&capability)
    }

    fn next_name(&mut self, label: &str) -> String {
        self.seq += 1;
        step_name(self.seq, label)
    }

    async fn run(&mut self, plan: &SuitePlan) -> BenchResult<()> {
        self.backend.prepare().await?;
        let baselines = {
            let backend = self.backend;
            let skip = self.skip;
            Baselines::capture(backend, plan, |c| backend.supports(c) && !skip.contains(&c)).await?
        };
        info!(
            backend = %self.backend.kind(),
            plan = %plan.name,
            steps = plan.step_count(),
            artifacts = baselines.artifacts,
            edges = baselines.edges,
            "suite started"
        );
        self.baselines = baselines;

        for scenario in &plan.scenarios {
            self.scenario(scenario).await?;
        }
        Ok(())
    }

    async fn scenario(&mut self, scenario: &Scenario) -> BenchResult<()> {
        let setup = &scenario.setup;
        let name = self.next_name(&setup.label());

        if !self.enabled(setup.capability()) {
            self.timings.record_skipped(&name);
            for probe in &scenario.probes {
                let probe_name = self.next_name(&probe.label(setup));
                self.timings.record_skipped(probe_name);
            }
            info!(step = %name, probes = scenario.probes.len(), "scenario skipped");
            return Ok(());
        }

        let start = Instant::now();
        let written = match self.create(setup).await {
            Ok(written) => written,
            Err(err) => return Err(self.failed(&name, start, err)),
        };
        let fixture = written.fixture;

        let checked = self.check_setup(&name, setup, written.artifact_total, written.edge_total);
        let outcome = match self.finish(&name, start, checked) {
            Ok(()) => self.probes(scenario, &fixture).await,
            Err(err) => Err(err),
        };
        release_after(&fixture, self.backend, &name, outcome).await
    }

    async fn create(&self, setup: &Setup) -> BenchResult<Written> {
        let backend = self.backend;
        let written = match *setup {
            Setup::CreateEach(n) => flat(backend.create_each(n).await?),
            Setup::CreateMany(n) => flat(backend.create_many(n).await?),
            Setup::CreatePairs(n) => graph(backend.create_pairs(n).await?),
            Setup::CreateChains { len, repeat } => graph(backend.create_chains(len, repeat).await?),
            Setup::CreateStar(n) => graph(backend.create_star(n).await?),
        };
        Ok(written)
    }

    fn check_setup(
        &self,
        name: &str,
        setup: &Setup,
        artifact_total: u64,
        edge_total: Option<u64>,
    ) -> BenchResult<()> {
        expect(name, self.baselines.artifacts + setup.artifacts(), artifact_total)?;
        if let Some(edge_total) = edge_total {
            expect(name, self.baselines.edges + setup.edges(), edge_total)?;
        }
        Ok(())
    }

    async fn probes(&mut self, scenario: &Scenario, fixture: &Fixture) -> BenchResult<()> {
        for probe in &scenario.probes {
            let name = self.next_name(&probe.label(&scenario.setup));
            if !self.enabled(probe.capability()) {
                debug!(step = %name, "step skipped");
                self.timings.record_skipped(name);
                continue;
            }
            let start = Instant::now();
            let result = self.probe(&name, *probe, &scenario.setup, fixture).await;
            self.finish(&name, start, result)?;
        }
        Ok(())
    }

    async fn probe(
        &mut self,
        name: &str,
        probe: Probe,
        setup: &Setup,
        fixture: &Fixture,
    ) -> BenchResult<()> {
        let backend = self.backend;
        let ids = &fixture.artifacts;

        match probe {
            Probe::ReadOne => {
                for id in ids {
                    let artifact = backend.read_one(*id).await?;
                    expect(name, id, &artifact.id)?;
                }
                Ok(())
            }
            Probe::ReadMany => expect(name, ids.len(), backend.read_many(ids).await?),
            Probe::UpdateOne => {
                for id in ids {
                    match self.patch() {
                        Some(patch) => backend.update_artifact(*id, &patch).await?,
                        None => backend.update_one(*id).await?,
                    }
                }
                Ok(())
            }
            Probe::UpdateMany => {
                let updated = match self.patches(ids) {
                    Some(updates) => backend.update_artifacts(&updates).await?,
                    None => backend.update_many(ids).await?,
                };
                expect(name, ids.len(), updated)
            }
            Probe::QueryAll => expect(
                name,
                self.baselines.artifacts + setup.artifacts(),
                backend.query_all().await?,
            ),
            Probe::QueryPairs => expect(
                name,
                self.baselines.pairs + setup.edges(),
                backend.query_pairs().await?,
            ),
            Probe::QueryPairsInYear(year) => {
                let baseline = self.baselines.pairs_in_year.get(&year).copied().unwrap_or(0);
                expect(
                    name,
                    baseline + expected_pairs_in_year(setup.size(), year),
                    backend.query_pairs_in_year(year).await?,
                )
            }
            Probe::ChainNeighbour(hop) => {
                let result = backend.chain_neighbour_at(fixture.root()?, hop).await;
                if hop < setup.size() {
                    expect(name, format!("artifact-{}", hop), result?.name)
                } else {
                    match result {
                        Err(err) if err.is_not_found() => Ok(()),
                        Err(err) => Err(err),
                        Ok(found) => Err(BenchError::expectation(name, "no document", found.name)),
                    }
                }
            }
            Probe::ChainSum(max_hop) => expect(
                name,
                generate::chain_item_sum(setup.size(), max_hop),
                backend.sum_chain_items(fixture.root()?, max_hop).await?,
            ),
            Probe::SortedNeighbours => {
                let names = backend.sorted_neighbours(fixture.root()?).await?;
                expect(name, setup.size().saturating_sub(1), names.len())?;
                if let Some(pair) = names.windows(2).find(|w| w[0] > w[1]) {
                    return Err(BenchError::expectation(
                        name,
                        format!("{} before {}", pair[1], pair[0]),
                        "unsorted neighbours",
                    ));
                }
                Ok(())
            }
        }
    }

    fn patch(&mut self) -> Option<ArtifactPatch> {
        self.rng.as_mut().map(ArtifactPatch::randomized)
    }

    fn patches(&mut self, ids: &[RecordId]) -> Option<Vec<(RecordId, ArtifactPatch)>> {
        let rng = self.rng.as_mut()?;
        Some(
            ids.iter()
                .map(|id| (*id, ArtifactPatch::randomized(rng)))
                .collect(),
        )
    }

    /// Record a step's outcome and pass its result through.
    fn finish<T>(&mut self, name: &str, start: Instant, result: BenchResult<T>) -> BenchResult<T> {
        match result {
            Ok(value) => {
                let elapsed = start.elapsed();
                info!(step = %name, elapsed_ms = elapsed.as_millis() as u64, "step passed");
                self.timings.record(StepRecord {
                    name: name.to_string(),
                    elapsed,
                    outcome: StepOutcome::Passed,
                });
                Ok(value)
            }
            Err(err) => Err(self.failed(name, start, err)),
        }
    }

    fn failed(&mut self, name: &str, start: Instant, err: BenchError) -> BenchError {
        warn!(step = %name, error = %err, "step failed");
        self.timings.record_since(name, start, StepOutcome::Failed);
        err
    }
}

fn flat(created: dbbench_core::Created) -> Written {
    let artifact_total = created.total;
    Written {
        fixture: Fixture::from(created),
        artifact_total,
        edge_total: None,
    }
}

fn graph(created: dbbench_core::GraphCreated) -> Written {
    let artifact_total = created.artifact_total;
    let edge_total = created.edge_total;
    Written {
        fixture: Fixture::from(created),
        artifact_total,
        edge_total: Some(edge_total),
    }
}

fn expect<T: PartialEq + std::fmt::Display>(step: &str, expected: T, actual: T) -> BenchResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(BenchError::expectation(step, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Scenario;
    use dbbench_storage::MemoryBackend;

    fn plan(scenarios: Vec<Scenario>) -> SuitePlan {
        SuitePlan {
            name: "test".to_string(),
            scenarios,
        }
    }

    #[tokio::test]
    async fn test_counts_build_on_baseline() {
        let backend = MemoryBackend::new();
        backend.create_pairs(3).await.unwrap();

        let run = run_suite(
            &backend,
            &plan(vec![
                Scenario::new(Setup::CreateMany(4)).probe(Probe::QueryAll),
                Scenario::new(Setup::CreatePairs(5)).probe(Probe::QueryPairs),
            ]),
            &SuiteOptions::default(),
        )
        .await;

        assert!(run.is_success(), "{:?}", run.error);
        assert_eq!(run.report.steps.len(), 4);
        assert_eq!(backend.count_artifacts().await.unwrap(), 6);
        assert_eq!(backend.count_edges().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_neighbour_past_chain_end_expects_not_found() {
        let backend = MemoryBackend::new();
        let run = run_suite(
            &backend,
            &plan(vec![Scenario::new(Setup::CreateChains { len: 5, repeat: 2 })
                .probe(Probe::ChainNeighbour(4))
                .probe(Probe::ChainNeighbour(5))
                .probe(Probe::ChainSum(10))]),
            &SuiteOptions::default(),
        )
        .await;
        assert!(run.is_success(), "{:?}", run.error);
    }

    #[tokio::test]
    async fn test_seeded_updates() {
        let backend = MemoryBackend::new();
        let options = SuiteOptions {
            seed: Some(7),
            ..SuiteOptions::default()
        };
        let run = run_suite(
            &backend,
            &plan(vec![Scenario::new(Setup::CreateMany(20))
                .probe(Probe::UpdateOne)
                .probe(Probe::UpdateMany)]),
            &options,
        )
        .await;
        assert!(run.is_success(), "{:?}", run.error);
    }

    #[tokio::test]
    async fn test_prepare_failure_reports_nothing() {
        let backend = MemoryBackend::new();
        backend.inject_fault("prepare");
        let run = run_suite(&backend, &SuitePlan::small(), &SuiteOptions::default()).await;
        assert!(run.report.steps.is_empty());
        assert!(matches!(run.error, Some(BenchError::Backend { .. })));
    }

    #[test]
    fn test_expect_formats_both_sides() {
        let err = expect("08_update_10000", 10u64, 9u64).unwrap_err();
        assert_eq!(
            err.to_string(),
            "expectation failed in 08_update_10000: expected 10, got 9"
        );
    }
}
