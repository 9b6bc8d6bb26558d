//! dbbench PostgreSQL Adapter
//!
//! Implements [`Backend`] over a deadpool-postgres connection pool. Bulk
//! writes are single `UNNEST` statements, graph writes run in one
//! transaction, and traversals are recursive CTEs over the `edges` table.

pub mod sql;

use async_trait::async_trait;
use dbbench_core::{
    Artifact, ArtifactPatch, BackendKind, BenchError, BenchResult, GraphBatch, PostgresConfig,
    RecordId, ResultExt,
};
use dbbench_storage::Backend;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use futures_util::{pin_mut, TryStreamExt};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::debug;

// ============================================================================
// CONNECTION POOL
// ============================================================================

/// Build a connection pool from the `postgres` config section. No connection
/// is opened until the first query.
pub fn create_pool(config: &PostgresConfig) -> BenchResult<Pool> {
    let mut cfg = Config::new();
    cfg.url = Some(config.url.clone());
    cfg.pool = Some(PoolConfig::new(config.pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .context("failed creating postgres pool")
}

fn slice_iter<'a>(
    params: &'a [&'a (dyn ToSql + Sync)],
) -> impl ExactSizeIterator<Item = &'a dyn ToSql> + 'a {
    params.iter().map(|p| *p as _)
}

fn hop_param(hop: usize) -> BenchResult<i32> {
    i32::try_from(hop).map_err(|_| BenchError::backend("invalid hop count", hop))
}

fn artifact_from_row(row: &Row) -> BenchResult<Artifact> {
    let description: Option<String> = row.try_get("description").context("failed scanning description")?;
    Ok(Artifact {
        id: row.try_get("id").context("failed scanning id")?,
        name: row.try_get("name").context("failed scanning name")?,
        description: description.unwrap_or_default(),
        create_time: row.try_get("create_time").context("failed scanning create_time")?,
        item: row.try_get("item").context("failed scanning item")?,
    })
}

/// Column arrays for an `UNNEST` artifact insert.
struct ArtifactColumns {
    ids: Vec<RecordId>,
    names: Vec<String>,
    descriptions: Vec<String>,
    times: Vec<chrono::DateTime<chrono::Utc>>,
    items: Vec<i64>,
}

impl ArtifactColumns {
    fn from_slice(artifacts: &[Artifact]) -> Self {
        let mut cols = Self {
            ids: Vec::with_capacity(artifacts.len()),
            names: Vec::with_capacity(artifacts.len()),
            descriptions: Vec::with_capacity(artifacts.len()),
            times: Vec::with_capacity(artifacts.len()),
            items: Vec::with_capacity(artifacts.len()),
        };
        for a in artifacts {
            cols.ids.push(a.id);
            cols.names.push(a.name.clone());
            cols.descriptions.push(a.description.clone());
            cols.times.push(a.create_time);
            cols.items.push(a.item);
        }
        cols
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// PostgreSQL [`Backend`].
#[derive(Clone)]
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &PostgresConfig) -> BenchResult<Self> {
        Ok(Self::new(create_pool(config)?))
    }

    async fn conn(&self) -> BenchResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .context("failed opening postgres connection")
    }

    async fn count(&self, sql: &str, context: &str) -> BenchResult<u64> {
        let client = self.conn().await?;
        let row = client.query_one(sql, &[]).await.context(context)?;
        let n: i64 = row.try_get(0).context(context)?;
        Ok(n.max(0) as u64)
    }

    /// Stream a result set, counting rows without buffering them.
    async fn drain(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> BenchResult<u64> {
        let client = self.conn().await?;
        let stream = client
            .query_raw(sql, slice_iter(params))
            .await
            .context("failed reading table")?;
        pin_mut!(stream);

        let mut count = 0u64;
        while let Some(_row) = stream.try_next().await.context("failed scanning rows")? {
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl Backend for PgBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn prepare(&self) -> BenchResult<()> {
        let client = self.conn().await?;
        client
            .batch_execute(sql::CREATE_SCHEMA)
            .await
            .context("failed creating testing tables")
    }

    async fn count_artifacts(&self) -> BenchResult<u64> {
        self.count(sql::COUNT_ARTIFACTS, "failed counting rows in artifact table")
            .await
    }

    async fn count_edges(&self) -> BenchResult<u64> {
        self.count(sql::COUNT_EDGES, "failed counting rows in edge table")
            .await
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> BenchResult<()> {
        let client = self.conn().await?;
        client
            .execute(
                sql::INSERT_ARTIFACT,
                &[
                    &artifact.id,
                    &artifact.name,
                    &artifact.description,
                    &artifact.create_time,
                    &artifact.item,
                ],
            )
            .await
            .context("failed inserting into table")?;
        Ok(())
    }

    async fn insert_artifacts(&self, artifacts: &[Artifact]) -> BenchResult<()> {
        let cols = ArtifactColumns::from_slice(artifacts);
        let client = self.conn().await?;
        let inserted = client
            .execute(
                sql::INSERT_ARTIFACTS,
                &[&cols.ids, &cols.names, &cols.descriptions, &cols.times, &cols.items],
            )
            .await
            .context("failed inserting into table")?;
        debug!(inserted, "bulk artifact insert");
        Ok(())
    }

    async fn insert_graph(&self, graph: &GraphBatch) -> BenchResult<()> {
        let cols = ArtifactColumns::from_slice(&graph.artifacts);
        let edge_ids: Vec<RecordId> = graph.edges.iter().map(|e| e.id).collect();
        let froms: Vec<RecordId> = graph.edges.iter().map(|e| e.from).collect();
        let tos: Vec<RecordId> = graph.edges.iter().map(|e| e.to).collect();
        let bodies: Vec<&str> = graph.edges.iter().map(|e| e.body.as_str()).collect();

        let mut client = self.conn().await?;
        let tx = client
            .transaction()
            .await
            .context("failed creating transaction")?;
        tx.execute(
            sql::INSERT_ARTIFACTS,
            &[&cols.ids, &cols.names, &cols.descriptions, &cols.times, &cols.items],
        )
        .await
        .context("failed inserting into artifact table")?;
        tx.execute(sql::INSERT_EDGES, &[&edge_ids, &froms, &tos, &bodies])
            .await
            .context("failed inserting into edge table")?;
        tx.commit().await.context("failed committing transaction")?;

        debug!(
            artifacts = graph.artifacts.len(),
            edges = graph.edges.len(),
            "graph insert"
        );
        Ok(())
    }

    async fn update_artifact(&self, id: RecordId, patch: &ArtifactPatch) -> BenchResult<()> {
        let client = self.conn().await?;
        let updated = client
            .execute(sql::UPDATE_ARTIFACT, &[&id, &patch.name, &patch.description])
            .await
            .context("failed updating document")?;
        if updated == 0 {
            return Err(BenchError::not_found(format!("artifact {}", id)));
        }
        Ok(())
    }

    async fn update_artifacts(&self, updates: &[(RecordId, ArtifactPatch)]) -> BenchResult<usize> {
        let ids: Vec<RecordId> = updates.iter().map(|(id, _)| *id).collect();
        let names: Vec<&str> = updates.iter().map(|(_, p)| p.name.as_str()).collect();
        let descriptions: Vec<&str> = updates
            .iter()
            .map(|(_, p)| p.description.as_str())
            .collect();

        let client = self.conn().await?;
        let updated = client
            .execute(sql::UPDATE_ARTIFACTS, &[&ids, &names, &descriptions])
            .await
            .context("failed updating documents")?;
        Ok(updated as usize)
    }

    async fn remove_artifacts(&self, ids: &[RecordId]) -> BenchResult<()> {
        let client = self.conn().await?;
        let removed = client
            .execute(sql::DELETE_ARTIFACTS, &[&ids])
            .await
            .context("failed removing artifacts")?;
        debug!(removed, "artifacts removed");
        Ok(())
    }

    async fn remove_edges(&self, ids: &[RecordId]) -> BenchResult<()> {
        let client = self.conn().await?;
        let removed = client
            .execute(sql::DELETE_EDGES, &[&ids])
            .await
            .context("failed removing edges")?;
        debug!(removed, "edges removed");
        Ok(())
    }

    async fn read_artifact(&self, id: RecordId) -> BenchResult<Artifact> {
        let client = self.conn().await?;
        let row = client
            .query_opt(sql::SELECT_ARTIFACT, &[&id])
            .await
            .context("failed reading document")?
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", id)))?;
        artifact_from_row(&row)
    }

    async fn read_artifacts(&self, ids: &[RecordId]) -> BenchResult<usize> {
        let client = self.conn().await?;
        let rows = client
            .query(sql::SELECT_ARTIFACTS, &[&ids])
            .await
            .context("failed reading documents")?;
        let artifacts = rows
            .iter()
            .map(artifact_from_row)
            .collect::<BenchResult<Vec<_>>>()?;
        Ok(artifacts.len())
    }

    async fn query_all(&self) -> BenchResult<u64> {
        self.drain(sql::SELECT_ALL, &[]).await
    }

    async fn query_pairs(&self) -> BenchResult<u64> {
        self.drain(sql::SELECT_PAIRS, &[]).await
    }

    async fn query_pairs_in_year(&self, year: i32) -> BenchResult<u64> {
        self.drain(sql::SELECT_PAIRS_IN_YEAR, &[&year]).await
    }

    async fn chain_neighbour_at(&self, root: RecordId, hop: usize) -> BenchResult<Artifact> {
        let depth = hop_param(hop)?;
        let client = self.conn().await?;
        let row = client
            .query_opt(sql::SELECT_NEIGHBOUR_AT, &[&root, &depth])
            .await
            .context("failed searching in chain")?
            .ok_or_else(|| BenchError::not_found(format!("{} hops from {}", hop, root)))?;
        artifact_from_row(&row)
    }

    async fn sum_chain_items(&self, root: RecordId, max_hop: usize) -> BenchResult<i64> {
        let depth = hop_param(max_hop)?;
        let client = self.conn().await?;
        let row = client
            .query_one(sql::SUM_CHAIN_ITEMS, &[&root, &depth])
            .await
            .context("failed searching in chain")?;

        let visited: i64 = row.try_get("visited").context("failed scanning variables")?;
        if visited == 0 {
            return Err(BenchError::not_found(format!("artifact {}", root)));
        }
        row.try_get("total").context("failed scanning variables")
    }

    async fn sorted_neighbours(&self, root: RecordId) -> BenchResult<Vec<String>> {
        let client = self.conn().await?;
        let rows = client
            .query(sql::SELECT_SORTED_NEIGHBOURS, &[&root])
            .await
            .context("failed reading table")?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).context("failed scanning variables"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_param_bounds() {
        assert_eq!(hop_param(7_000).unwrap(), 7_000);
        assert!(hop_param(usize::MAX).is_err());
    }

    #[test]
    fn test_artifact_columns_preserve_order() {
        let batch = dbbench_core::generate::chains(4, 1);
        let cols = ArtifactColumns::from_slice(&batch.artifacts);
        assert_eq!(cols.ids, batch.artifact_ids());
        assert_eq!(cols.names[3], "artifact-3");
        assert_eq!(cols.items, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_create_pool_from_default_config() {
        let pool = create_pool(&PostgresConfig::default()).unwrap();
        assert_eq!(pool.status().max_size, PostgresConfig::default().pool_size);
    }
}
