//! dbbench Core - Entity Types, Generators and Reports
//!
//! Pure data structures and deterministic generators shared by every backend
//! adapter. This crate performs no I/O: adapters translate these records into
//! backend-native writes, the harness times them, and the report module turns
//! the recorded durations into a summary.

pub mod config;
pub mod entities;
pub mod error;
pub mod generate;
pub mod report;

pub use config::{
    ArangoConfig, BenchConfig, ConfigError, Neo4jConfig, PlanKind, PostgresConfig, SuiteConfig,
};
pub use entities::{
    Artifact, ArtifactPatch, Created, Edge, GraphBatch, GraphCreated, RecordId, Timestamp,
};
pub use error::{BenchError, BenchResult, ResultExt};
pub use generate::{
    chain_item_sum, chains, days_in_year_within, epoch, flat_batch, pairs, star,
};
pub use report::{Report, ReportLine, StepOutcome, StepRecord, Timings};

use uuid::Uuid;

// ============================================================================
// IDENTITY
// ============================================================================

/// Generate a new UUIDv7 record id (timestamp-sortable, globally unique).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

/// Which database a backend adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    Arango,
    Neo4j,
    Memory,
}

impl BackendKind {
    /// Lowercase name used in suite titles and CLI values.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Arango => "arango",
            BackendKind::Neo4j => "neo4j",
            BackendKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(BackendKind::Postgres),
            "arango" | "arangodb" => Ok(BackendKind::Arango),
            "neo4j" => Ok(BackendKind::Neo4j),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "backend".to_string(),
                value: other.to_string(),
                reason: "expected one of postgres, arango, neo4j, memory".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse_aliases() {
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("arangodb".parse::<BackendKind>().unwrap(), BackendKind::Arango);
        assert_eq!(" neo4j ".parse::<BackendKind>().unwrap(), BackendKind::Neo4j);
        assert_eq!("mem".parse::<BackendKind>().unwrap(), BackendKind::Memory);
    }

    #[test]
    fn test_backend_kind_parse_rejects_unknown() {
        let err = "mongodb".parse::<BackendKind>().unwrap_err();
        assert!(err.to_string().contains("mongodb"));
    }

    #[test]
    fn test_record_ids_are_unique() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
    }
}
