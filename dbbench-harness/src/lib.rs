//! dbbench Harness - Suites, Fixtures and Populate
//!
//! Drives a [`Backend`] through an ordered [`SuitePlan`], timing each step
//! into a report, and hosts the populate utility and tracing setup used by
//! the `dbbench` binary.

pub mod fixture;
pub mod plan;
pub mod populate;
pub mod runner;
pub mod telemetry;

pub use fixture::Fixture;
pub use plan::{Probe, Scenario, Setup, SuitePlan};
pub use populate::{populate, PopulateOptions, PopulateSummary};
pub use runner::{run_suite, Baselines, SuiteOptions, SuiteRun};
pub use telemetry::{init_tracing, TelemetryConfig};

use dbbench_arango::ArangoBackend;
use dbbench_core::{BackendKind, BenchConfig, BenchResult};
use dbbench_neo4j::Neo4jBackend;
use dbbench_pg::PgBackend;
use dbbench_storage::{Backend, MemoryBackend};
use tracing::info;

/// Build the adapter for `kind` from `config`.
pub async fn connect(kind: BackendKind, config: &BenchConfig) -> BenchResult<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match kind {
        BackendKind::Postgres => Box::new(PgBackend::from_config(&config.postgres)?),
        BackendKind::Arango => Box::new(ArangoBackend::new(&config.arango)?),
        BackendKind::Neo4j => Box::new(Neo4jBackend::connect(&config.neo4j).await?),
        BackendKind::Memory => Box::new(MemoryBackend::new()),
    };
    info!(backend = %kind, "backend connected");
    Ok(backend)
}

/// Point `kind`'s connection setting at `endpoint`.
pub fn override_endpoint(config: &mut BenchConfig, kind: BackendKind, endpoint: String) {
    match kind {
        BackendKind::Postgres => config.postgres.url = endpoint,
        BackendKind::Arango => config.arango.endpoint = endpoint,
        BackendKind::Neo4j => config.neo4j.uri = endpoint,
        BackendKind::Memory => {}
    }
}
