//! dbbench Neo4j Adapter
//!
//! Implements [`Backend`] over Bolt with neo4rs. Timestamps are stored as
//! RFC 3339 strings and parsed with `datetime()` when filtering by year.

pub mod cypher;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dbbench_core::{
    Artifact, ArtifactPatch, BackendKind, BenchError, BenchResult, GraphBatch, Neo4jConfig,
    RecordId, ResultExt,
};
use dbbench_storage::Backend;
use neo4rs::{query, BoltMap, BoltString, BoltType, Graph, Query, Row};
use tracing::debug;
use uuid::Uuid;

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn bolt_map(entries: Vec<(&str, BoltType)>) -> BoltType {
    let mut map = BoltMap::new();
    for (key, value) in entries {
        map.put(BoltString::from(key), value);
    }
    BoltType::Map(map)
}

fn artifact_props(a: &Artifact) -> BoltType {
    bolt_map(vec![
        ("id", BoltType::from(a.id.to_string())),
        ("name", BoltType::from(a.name.clone())),
        ("description", BoltType::from(a.description.clone())),
        ("create_time", BoltType::from(timestamp(&a.create_time))),
        ("item", BoltType::from(a.item)),
    ])
}

fn id_list(ids: &[RecordId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

fn artifact_from_row(row: &Row) -> BenchResult<Artifact> {
    let id: String = row.get("id").context("failed scanning id")?;
    let create_time: String = row.get("create_time").context("failed scanning create_time")?;
    Ok(Artifact {
        id: Uuid::parse_str(&id).context("failed parsing artifact id")?,
        name: row.get("name").context("failed scanning name")?,
        description: row
            .get::<Option<String>>("description")
            .context("failed scanning description")?
            .unwrap_or_default(),
        create_time: DateTime::parse_from_rfc3339(&create_time)
            .context("failed parsing create_time")?
            .with_timezone(&Utc),
        item: row.get("item").context("failed scanning item")?,
    })
}

/// Neo4j [`Backend`].
#[derive(Clone)]
pub struct Neo4jBackend {
    graph: Graph,
}

impl Neo4jBackend {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(config: &Neo4jConfig) -> BenchResult<Self> {
        let graph = Graph::new(
            config.uri.as_str(),
            config.username.as_str(),
            config.password.as_str(),
        )
        .await
        .context("failed opening neo4j connection")?;
        Ok(Self::new(graph))
    }

    /// Run a query expected to return a single integer column `column`.
    async fn scalar(&self, q: Query, column: &str, context: &str) -> BenchResult<i64> {
        let mut stream = self.graph.execute(q).await.context(context)?;
        let row = stream
            .next()
            .await
            .context(context)?
            .ok_or_else(|| BenchError::backend(context, "query returned no rows"))?;
        row.get::<i64>(column).context(context)
    }

    /// Stream a result set, counting rows.
    async fn drain(&self, q: Query) -> BenchResult<u64> {
        let mut stream = self.graph.execute(q).await.context("failed reading nodes")?;
        let mut count = 0u64;
        while let Some(_row) = stream.next().await.context("failed scanning rows")? {
            count += 1;
        }
        Ok(count)
    }

    async fn rows(&self, q: Query, context: &str) -> BenchResult<Vec<Row>> {
        let mut stream = self.graph.execute(q).await.context(context)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.context(context)? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for Neo4jBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for Neo4jBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Neo4j
    }

    async fn prepare(&self) -> BenchResult<()> {
        for statement in cypher::INDEXES {
            self.graph
                .run(query(statement))
                .await
                .context("failed creating index")?;
        }
        Ok(())
    }

    async fn count_artifacts(&self) -> BenchResult<u64> {
        let n = self
            .scalar(query(cypher::COUNT_ARTIFACTS), "n", "failed counting nodes")
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn count_edges(&self) -> BenchResult<u64> {
        let n = self
            .scalar(query(cypher::COUNT_EDGES), "n", "failed counting relationships")
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> BenchResult<()> {
        let q = query(cypher::CREATE_ARTIFACT)
            .param("id", artifact.id.to_string())
            .param("name", artifact.name.clone())
            .param("description", artifact.description.clone())
            .param("create_time", timestamp(&artifact.create_time))
            .param("item", artifact.item);
        self.graph.run(q).await.context("failed creating node")
    }

    async fn insert_artifacts(&self, artifacts: &[Artifact]) -> BenchResult<()> {
        let batch: Vec<BoltType> = artifacts.iter().map(artifact_props).collect();
        self.graph
            .run(query(cypher::CREATE_ARTIFACTS).param("batch", batch))
            .await
            .context("failed creating nodes")
    }

    async fn insert_graph(&self, graph: &GraphBatch) -> BenchResult<()> {
        let nodes: Vec<BoltType> = graph.artifacts.iter().map(artifact_props).collect();
        let edges: Vec<BoltType> = graph
            .edges
            .iter()
            .map(|e| {
                bolt_map(vec![
                    ("id", BoltType::from(e.id.to_string())),
                    ("from", BoltType::from(e.from.to_string())),
                    ("to", BoltType::from(e.to.to_string())),
                    ("body", BoltType::from(e.body.clone())),
                ])
            })
            .collect();

        let mut txn = self
            .graph
            .start_txn()
            .await
            .context("failed creating transaction")?;
        txn.run(query(cypher::CREATE_ARTIFACTS).param("batch", nodes))
            .await
            .context("failed creating nodes")?;

        let mut stream = txn
            .execute(query(cypher::CREATE_EDGES).param("batch", edges))
            .await
            .context("failed creating relationships")?;
        let mut created = 0i64;
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .context("failed creating relationships")?
        {
            created = row.get::<i64>("n").context("failed creating relationships")?;
        }
        drop(stream);

        if created as usize != graph.edges.len() {
            txn.rollback()
                .await
                .context("failed rolling back transaction")?;
            return Err(BenchError::backend(
                "failed creating relationships",
                format!("{} of {} endpoints matched", created, graph.edges.len()),
            ));
        }

        txn.commit().await.context("failed committing transaction")?;
        debug!(
            nodes = graph.artifacts.len(),
            relationships = created,
            "graph insert"
        );
        Ok(())
    }

    async fn update_artifact(&self, id: RecordId, patch: &ArtifactPatch) -> BenchResult<()> {
        let q = query(cypher::UPDATE_ARTIFACT)
            .param("id", id.to_string())
            .param("name", patch.name.clone())
            .param("description", patch.description.clone());
        let updated = self.scalar(q, "n", "failed updating node").await?;
        if updated == 0 {
            return Err(BenchError::not_found(format!("artifact {}", id)));
        }
        Ok(())
    }

    async fn update_artifacts(&self, updates: &[(RecordId, ArtifactPatch)]) -> BenchResult<usize> {
        let batch: Vec<BoltType> = updates
            .iter()
            .map(|(id, patch)| {
                bolt_map(vec![
                    ("id", BoltType::from(id.to_string())),
                    ("name", BoltType::from(patch.name.clone())),
                    ("description", BoltType::from(patch.description.clone())),
                ])
            })
            .collect();
        let updated = self
            .scalar(
                query(cypher::UPDATE_ARTIFACTS).param("batch", batch),
                "n",
                "failed updating nodes",
            )
            .await?;
        Ok(updated.max(0) as usize)
    }

    async fn remove_artifacts(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.graph
            .run(query(cypher::DELETE_ARTIFACTS).param("ids", id_list(ids)))
            .await
            .context("failed removing nodes")
    }

    async fn remove_edges(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.graph
            .run(query(cypher::DELETE_EDGES).param("ids", id_list(ids)))
            .await
            .context("failed removing relationships")
    }

    async fn read_artifact(&self, id: RecordId) -> BenchResult<Artifact> {
        let rows = self
            .rows(
                query(&cypher::read_artifact()).param("id", id.to_string()),
                "failed reading node",
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", id)))?;
        artifact_from_row(row)
    }

    async fn read_artifacts(&self, ids: &[RecordId]) -> BenchResult<usize> {
        let rows = self
            .rows(
                query(&cypher::read_artifacts()).param("ids", id_list(ids)),
                "failed reading nodes",
            )
            .await?;
        for row in &rows {
            artifact_from_row(row)?;
        }
        Ok(rows.len())
    }

    async fn query_all(&self) -> BenchResult<u64> {
        self.drain(query(cypher::SELECT_ALL)).await
    }

    async fn query_pairs(&self) -> BenchResult<u64> {
        self.drain(query(cypher::SELECT_PAIRS)).await
    }

    async fn query_pairs_in_year(&self, year: i32) -> BenchResult<u64> {
        self.drain(query(cypher::SELECT_PAIRS_IN_YEAR).param("year", i64::from(year)))
            .await
    }

    async fn chain_neighbour_at(&self, root: RecordId, hop: usize) -> BenchResult<Artifact> {
        let rows = self
            .rows(
                query(&cypher::neighbour_at(hop)).param("id", root.to_string()),
                "failed searching in chain",
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| BenchError::not_found(format!("{} hops from {}", hop, root)))?;
        artifact_from_row(row)
    }

    async fn sum_chain_items(&self, root: RecordId, max_hop: usize) -> BenchResult<i64> {
        let rows = self
            .rows(
                query(&cypher::sum_items(max_hop)).param("id", root.to_string()),
                "failed searching in chain",
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| BenchError::not_found(format!("artifact {}", root)))?;
        let visited: i64 = row.get("visited").context("failed scanning variables")?;
        if visited == 0 {
            return Err(BenchError::not_found(format!("artifact {}", root)));
        }
        row.get("total").context("failed scanning variables")
    }

    async fn sorted_neighbours(&self, root: RecordId) -> BenchResult<Vec<String>> {
        let rows = self
            .rows(
                query(cypher::SORTED_NEIGHBOURS).param("id", root.to_string()),
                "failed reading nodes",
            )
            .await?;
        rows.iter()
            .map(|row| row.get::<String>("name").context("failed scanning variables"))
            .collect()
    }
}
