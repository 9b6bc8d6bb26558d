//! dbbench ArangoDB Adapter
//!
//! Implements [`Backend`] over Arango's REST API. Artifacts live in a document
//! collection keyed by their UUID (`_key`), edges in an edge collection whose
//! `_from`/`_to` point at `<collection>/<uuid>`. Bulk writes use the batch
//! document API (one request per batch); traversals are AQL graph traversals
//! over the edge collection.

pub mod client;

pub use client::{ArangoClient, CollectionType};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use client::{check_batch, BatchItem};
use dbbench_core::{
    ArangoConfig, Artifact, ArtifactPatch, BackendKind, BenchError, BenchResult, Edge,
    GraphBatch, RecordId, ResultExt,
};
use dbbench_storage::Backend;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// AQL
// ============================================================================

const AQL_ALL: &str = "FOR d IN @@col RETURN d";

const AQL_PAIRS: &str = "FOR d IN @@col FOR v IN OUTBOUND d._id @@edges RETURN v";

const AQL_PAIRS_IN_YEAR: &str =
    "FOR d IN @@col FOR v IN OUTBOUND d._id @@edges FILTER DATE_YEAR(v.create_time) == @year RETURN v";

const AQL_NEIGHBOUR_AT: &str =
    "FOR v IN @hop..@hop OUTBOUND @start @@edges LIMIT 1 RETURN v";

const AQL_SUM_ITEMS: &str = "LET items = (FOR v IN 0..@hop OUTBOUND @start @@edges RETURN v.item) \
     RETURN { visited: LENGTH(items), total: SUM(items) }";

const AQL_SORTED_NEIGHBOURS: &str =
    "FOR v IN OUTBOUND @start @@edges SORT v.name RETURN v.name";

// ============================================================================
// DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactDoc {
    #[serde(rename = "_key")]
    key: String,
    name: String,
    #[serde(default)]
    description: String,
    create_time: DateTime<Utc>,
    #[serde(default = "default_item")]
    item: i64,
}

fn default_item() -> i64 {
    1
}

impl From<&Artifact> for ArtifactDoc {
    fn from(a: &Artifact) -> Self {
        Self {
            key: a.id.to_string(),
            name: a.name.clone(),
            description: a.description.clone(),
            create_time: a.create_time,
            item: a.item,
        }
    }
}

impl TryFrom<ArtifactDoc> for Artifact {
    type Error = BenchError;

    fn try_from(doc: ArtifactDoc) -> BenchResult<Self> {
        Ok(Artifact {
            id: Uuid::parse_str(&doc.key).context("failed parsing document key")?,
            name: doc.name,
            description: doc.description,
            create_time: doc.create_time,
            item: doc.item,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct EdgeDoc {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_from")]
    from: String,
    #[serde(rename = "_to")]
    to: String,
    body: String,
}

#[derive(Debug, Clone, Serialize)]
struct PatchDoc<'a> {
    #[serde(rename = "_key", skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct SumRow {
    visited: u64,
    total: i64,
}

// ============================================================================
// BACKEND
// ============================================================================

/// ArangoDB [`Backend`].
#[derive(Debug, Clone)]
pub struct ArangoBackend {
    client: ArangoClient,
    documents: String,
    edges: String,
}

impl ArangoBackend {
    pub fn new(config: &ArangoConfig) -> BenchResult<Self> {
        Ok(Self {
            client: ArangoClient::new(config)?,
            documents: config.document_collection.clone(),
            edges: config.edge_collection.clone(),
        })
    }

    pub fn client(&self) -> &ArangoClient {
        &self.client
    }

    fn vertex_id(&self, id: RecordId) -> String {
        format!("{}/{}", self.documents, id)
    }

    fn edge_doc(&self, edge: &Edge) -> EdgeDoc {
        EdgeDoc {
            key: edge.id.to_string(),
            from: self.vertex_id(edge.from),
            to: self.vertex_id(edge.to),
            body: edge.body.clone(),
        }
    }

    fn document_url(&self, collection: &str) -> String {
        self.client
            .db_url(&format!("_api/document/{}", collection))
    }

    async fn insert_batch<T: Serialize + Sync>(
        &self,
        collection: &str,
        docs: &[T],
        context: &str,
    ) -> BenchResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let items: Vec<BatchItem> = self
            .client
            .send(
                self.client
                    .request(Method::POST, &self.document_url(collection))
                    .json(docs),
                context,
            )
            .await?;
        check_batch(&items, context, false)?;
        debug!(collection, inserted = items.len(), "batch insert");
        Ok(())
    }

    async fn remove_batch(&self, collection: &str, ids: &[RecordId], context: &str) -> BenchResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let items: Vec<BatchItem> = self
            .client
            .send(
                self.client
                    .request(Method::DELETE, &self.document_url(collection))
                    .json(&keys),
                context,
            )
            .await?;
        check_batch(&items, context, true)?;
        debug!(collection, removed = items.len(), "batch remove");
        Ok(())
    }

    async fn count_query(&self, aql: &str, bind_vars: serde_json::Value) -> BenchResult<u64> {
        self.client.query_count(aql, &bind_vars).await
    }
}

#[async_trait]
impl Backend for ArangoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Arango
    }

    async fn prepare(&self) -> BenchResult<()> {
        self.client.ensure_database().await?;
        self.client
            .ensure_collection(&self.documents, CollectionType::Document)
            .await?;
        self.client
            .ensure_collection(&self.edges, CollectionType::Edge)
            .await
    }

    async fn count_artifacts(&self) -> BenchResult<u64> {
        self.client.count(&self.documents).await
    }

    async fn count_edges(&self) -> BenchResult<u64> {
        self.client.count(&self.edges).await
    }

    async fn insert_artifact(&self, artifact: &Artifact) -> BenchResult<()> {
        self.client
            .send_tolerating(
                self.client
                    .request(Method::POST, &self.document_url(&self.documents))
                    .json(&ArtifactDoc::from(artifact)),
                "failed creating document",
                &[],
            )
            .await?;
        Ok(())
    }

    async fn insert_artifacts(&self, artifacts: &[Artifact]) -> BenchResult<()> {
        let docs: Vec<ArtifactDoc> = artifacts.iter().map(ArtifactDoc::from).collect();
        self.insert_batch(&self.documents, &docs, "failed creating documents")
            .await
    }

    async fn insert_graph(&self, graph: &GraphBatch) -> BenchResult<()> {
        let docs: Vec<ArtifactDoc> = graph.artifacts.iter().map(ArtifactDoc::from).collect();
        let edges: Vec<EdgeDoc> = graph.edges.iter().map(|e| self.edge_doc(e)).collect();
        self.insert_batch(&self.documents, &docs, "failed creating documents")
            .await?;
        self.insert_batch(&self.edges, &edges, "failed creating edges")
            .await
    }

    async fn update_artifact(&self, id: RecordId, patch: &ArtifactPatch) -> BenchResult<()> {
        let url = format!("{}/{}", self.document_url(&self.documents), id);
        let doc = PatchDoc {
            key: None,
            name: &patch.name,
            description: &patch.description,
        };
        self.client
            .send_tolerating(
                self.client.request(Method::PATCH, &url).json(&doc),
                "failed updating document",
                &[],
            )
            .await?;
        Ok(())
    }

    async fn update_artifacts(&self, updates: &[(RecordId, ArtifactPatch)]) -> BenchResult<usize> {
        let docs: Vec<PatchDoc<'_>> = updates
            .iter()
            .map(|(id, patch)| PatchDoc {
                key: Some(id.to_string()),
                name: &patch.name,
                description: &patch.description,
            })
            .collect();
        let items: Vec<BatchItem> = self
            .client
            .send(
                self.client
                    .request(Method::PATCH, &self.document_url(&self.documents))
                    .json(&docs),
                "failed updating documents",
            )
            .await?;
        check_batch(&items, "failed updating documents", true)?;
        Ok(items.iter().filter(|i| !i.error).count())
    }

    async fn remove_artifacts(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.remove_batch(&self.documents, ids, "failed removing documents")
            .await
    }

    async fn remove_edges(&self, ids: &[RecordId]) -> BenchResult<()> {
        self.remove_batch(&self.edges, ids, "failed removing edges")
            .await
    }

    async fn read_artifact(&self, id: RecordId) -> BenchResult<Artifact> {
        let url = format!("{}/{}", self.document_url(&self.documents), id);
        let doc: ArtifactDoc = self
            .client
            .send(
                self.client.request(Method::GET, &url),
                "failed reading document",
            )
            .await
            .map_err(|e| match e {
                BenchError::NotFound { .. } => BenchError::not_found(format!("artifact {}", id)),
                other => other,
            })?;
        Artifact::try_from(doc)
    }

    async fn read_artifacts(&self, ids: &[RecordId]) -> BenchResult<usize> {
        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let url = format!("{}?onlyget=true", self.document_url(&self.documents));
        let items: Vec<serde_json::Value> = self
            .client
            .send(
                self.client.request(Method::PUT, &url).json(&keys),
                "failed reading documents",
            )
            .await?;

        let mut found = 0;
        for item in items {
            if item.get("error").and_then(|e| e.as_bool()) == Some(true) {
                continue;
            }
            let doc: ArtifactDoc =
                serde_json::from_value(item).context("failed decoding document")?;
            Artifact::try_from(doc)?;
            found += 1;
        }
        Ok(found)
    }

    async fn query_all(&self) -> BenchResult<u64> {
        self.count_query(AQL_ALL, json!({ "@col": self.documents }))
            .await
    }

    async fn query_pairs(&self) -> BenchResult<u64> {
        self.count_query(
            AQL_PAIRS,
            json!({ "@col": self.documents, "@edges": self.edges }),
        )
        .await
    }

    async fn query_pairs_in_year(&self, year: i32) -> BenchResult<u64> {
        self.count_query(
            AQL_PAIRS_IN_YEAR,
            json!({ "@col": self.documents, "@edges": self.edges, "year": year }),
        )
        .await
    }

    async fn chain_neighbour_at(&self, root: RecordId, hop: usize) -> BenchResult<Artifact> {
        let bind_vars = json!({
            "@edges": self.edges,
            "start": self.vertex_id(root),
            "hop": hop,
        });
        let docs: Vec<ArtifactDoc> = self.client.query(AQL_NEIGHBOUR_AT, &bind_vars).await?;
        let doc = docs
            .into_iter()
            .next()
            .ok_or_else(|| BenchError::not_found(format!("{} hops from {}", hop, root)))?;
        Artifact::try_from(doc)
    }

    async fn sum_chain_items(&self, root: RecordId, max_hop: usize) -> BenchResult<i64> {
        let bind_vars = json!({
            "@edges": self.edges,
            "start": self.vertex_id(root),
            "hop": max_hop,
        });
        let rows: Vec<SumRow> = self.client.query(AQL_SUM_ITEMS, &bind_vars).await?;
        match rows.first() {
            Some(row) if row.visited > 0 => Ok(row.total),
            _ => Err(BenchError::not_found(format!("artifact {}", root))),
        }
    }

    async fn sorted_neighbours(&self, root: RecordId) -> BenchResult<Vec<String>> {
        let bind_vars = json!({
            "@edges": self.edges,
            "start": self.vertex_id(root),
        });
        self.client.query(AQL_SORTED_NEIGHBOURS, &bind_vars).await
    }
}
