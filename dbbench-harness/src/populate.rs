//! Bulk pre-fill of a backend with flat artifacts.
//!
//! Counts what is already stored, refuses when the target is met, and then
//! inserts chunks of at most `chunk` artifacts until the total reaches the
//! target, logging progress after every chunk.

use chrono::Utc;
use dbbench_core::{generate, BenchError, BenchResult, ConfigError};
use dbbench_storage::Backend;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulateOptions {
    /// Artifact count to reach.
    pub target: u64,
    /// Maximum inserts per bulk operation.
    pub chunk: usize,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            target: 1_000_000,
            chunk: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulateSummary {
    pub existing: u64,
    pub inserted: u64,
}

pub async fn populate(backend: &dyn Backend, options: PopulateOptions) -> BenchResult<PopulateSummary> {
    if options.chunk == 0 {
        return Err(ConfigError::InvalidValue {
            field: "chunk".to_string(),
            value: "0".to_string(),
            reason: "must be > 0".to_string(),
        }
        .into());
    }

    backend.prepare().await?;
    let rows = backend.count_artifacts().await?;
    if rows >= options.target {
        return Err(BenchError::AlreadyPopulated {
            rows,
            target: options.target,
        });
    }
    info!(rows, "pre-feeding status");

    let total = options.target - rows;
    let mut actual = 0u64;
    while actual < total {
        let bulk = (total - actual).min(options.chunk as u64) as usize;
        let batch = generate::flat_batch(bulk, Utc::now());
        backend.insert_artifacts(&batch).await?;
        actual += bulk as u64;

        let perc = (actual + rows) as f64 / options.target as f64 * 100.0;
        info!(count = actual, perc, "status");
    }

    Ok(PopulateSummary {
        existing: rows,
        inserted: actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbbench_storage::MemoryBackend;

    fn options(target: u64, chunk: usize) -> PopulateOptions {
        PopulateOptions { target, chunk }
    }

    #[tokio::test]
    async fn test_populates_up_to_target() {
        let backend = MemoryBackend::new();
        backend.create_many(3).await.unwrap();

        let summary = populate(&backend, options(25, 10)).await.unwrap();
        assert_eq!(summary, PopulateSummary { existing: 3, inserted: 22 });
        assert_eq!(backend.count_artifacts().await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_refuses_when_populated() {
        let backend = MemoryBackend::new();
        backend.create_many(5).await.unwrap();

        let err = populate(&backend, options(5, 2)).await.unwrap_err();
        assert_eq!(err, BenchError::AlreadyPopulated { rows: 5, target: 5 });
        assert_eq!(backend.count_artifacts().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_zero_chunk_rejected() {
        let backend = MemoryBackend::new();
        let err = populate(&backend, options(5, 0)).await.unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[tokio::test]
    async fn test_insert_failure_stops() {
        let backend = MemoryBackend::new();
        backend.inject_fault("insert_artifacts");
        let err = populate(&backend, options(5, 2)).await.unwrap_err();
        assert!(matches!(err, BenchError::Backend { .. }));
        assert_eq!(backend.count_artifacts().await.unwrap(), 0);
    }
}
