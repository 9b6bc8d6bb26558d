//! Thin HTTP client for the ArangoDB REST API.
//!
//! Covers the handful of endpoints the adapter needs: database and collection
//! creation, the single and batch document APIs, collection counts, and the
//! AQL cursor API. Every non-success response is turned into a [`BenchError`]
//! carrying Arango's own `errorMessage`.

use dbbench_core::{ArangoConfig, BenchError, BenchResult, ResultExt};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

/// `ERROR_ARANGO_DOCUMENT_NOT_FOUND`
pub const ERROR_DOCUMENT_NOT_FOUND: i64 = 1202;

/// Collection type codes accepted by `POST /_api/collection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionType {
    Document = 2,
    Edge = 3,
}

/// Error body returned by every failing Arango endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub error_num: i64,
}

/// One entry of a batch document API response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_num: Option<i64>,
}

impl BatchItem {
    pub fn is_not_found(&self) -> bool {
        self.error && self.error_num == Some(ERROR_DOCUMENT_NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorBatch<T> {
    result: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorRequest<'a> {
    query: &'a str,
    bind_vars: &'a JsonValue,
    batch_size: usize,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u64,
}

/// Arango REST client bound to one database.
#[derive(Clone)]
pub struct ArangoClient {
    http: Client,
    endpoint: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
    batch_size: usize,
}

impl ArangoClient {
    pub fn new(config: &ArangoConfig) -> BenchResult<Self> {
        let http = Client::builder()
            .build()
            .context("failed creating arango client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            batch_size: config.batch_size,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// URL of a system-level API path (`/_api/...`).
    pub fn system_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// URL of a database-scoped API path (`/_db/<db>/_api/...`).
    pub fn db_url(&self, path: &str) -> String {
        format!(
            "{}/_db/{}/{}",
            self.endpoint,
            self.database,
            path.trim_start_matches('/')
        )
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    /// Send a request and decode a successful JSON body.
    pub async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> BenchResult<T> {
        let response = self.execute(builder, context).await?;
        let response = check(response, context, &[]).await?;
        response.json().await.context(context)
    }

    /// Send a request whose body is irrelevant; statuses in `tolerated` count
    /// as success.
    pub async fn send_tolerating(
        &self,
        builder: RequestBuilder,
        context: &str,
        tolerated: &[StatusCode],
    ) -> BenchResult<StatusCode> {
        let response = self.execute(builder, context).await?;
        let response = check(response, context, tolerated).await?;
        Ok(response.status())
    }

    async fn execute(&self, builder: RequestBuilder, context: &str) -> BenchResult<Response> {
        builder.send().await.context(context)
    }

    /// Create a collection unless it already exists.
    pub async fn ensure_collection(&self, name: &str, kind: CollectionType) -> BenchResult<()> {
        let body = serde_json::json!({ "name": name, "type": kind as u8 });
        let status = self
            .send_tolerating(
                self.request(Method::POST, &self.db_url("_api/collection"))
                    .json(&body),
                "failed creating collection",
                &[StatusCode::CONFLICT],
            )
            .await?;
        debug!(collection = name, status = status.as_u16(), "ensure collection");
        Ok(())
    }

    /// Create the configured database unless it already exists.
    pub async fn ensure_database(&self) -> BenchResult<()> {
        let body = serde_json::json!({ "name": self.database });
        let status = self
            .send_tolerating(
                self.request(Method::POST, &self.system_url("_api/database"))
                    .json(&body),
                "failed creating database",
                &[StatusCode::CONFLICT],
            )
            .await?;
        debug!(database = %self.database, status = status.as_u16(), "ensure database");
        Ok(())
    }

    pub async fn count(&self, collection: &str) -> BenchResult<u64> {
        let url = self.db_url(&format!("_api/collection/{}/count", collection));
        let body: CountBody = self
            .send(self.request(Method::GET, &url), "failed counting documents")
            .await?;
        Ok(body.count)
    }

    /// Run an AQL query and collect every result across all cursor batches.
    pub async fn query<T: DeserializeOwned>(
        &self,
        aql: &str,
        bind_vars: &JsonValue,
    ) -> BenchResult<Vec<T>> {
        let request = CursorRequest {
            query: aql,
            bind_vars,
            batch_size: self.batch_size,
        };
        let first: CursorBatch<T> = self
            .send(
                self.request(Method::POST, &self.db_url("_api/cursor"))
                    .json(&request),
                "failed querying documents",
            )
            .await?;

        let mut results = first.result;
        let mut has_more = first.has_more;
        while has_more {
            let Some(id) = first.id.as_deref() else {
                return Err(BenchError::backend(
                    "failed reading documents",
                    "cursor reports more results but has no id",
                ));
            };
            let url = self.db_url(&format!("_api/cursor/{}", id));
            let next: CursorBatch<T> = self
                .send(self.request(Method::PUT, &url), "failed reading documents")
                .await?;
            results.extend(next.result);
            has_more = next.has_more;
        }

        Ok(results)
    }

    /// Run an AQL query and count its results without decoding them.
    pub async fn query_count(&self, aql: &str, bind_vars: &JsonValue) -> BenchResult<u64> {
        let results: Vec<IgnoredAny> = self.query(aql, bind_vars).await?;
        Ok(results.len() as u64)
    }
}

impl std::fmt::Debug for ArangoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArangoClient")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Map a non-success response to a [`BenchError`]; document-not-found
/// becomes [`BenchError::NotFound`].
async fn check(
    response: Response,
    context: &str,
    tolerated: &[StatusCode],
) -> BenchResult<Response> {
    let status = response.status();
    if status.is_success() || tolerated.contains(&status) {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    if body.error_num == ERROR_DOCUMENT_NOT_FOUND {
        return Err(BenchError::not_found(context.to_string()));
    }

    let message = if body.error_message.is_empty() {
        text
    } else {
        body.error_message
    };
    Err(BenchError::backend(
        context,
        format!("{} (HTTP {})", message, status.as_u16()),
    ))
}

/// Fail on the first errored entry of a batch response, ignoring
/// not-found entries when `allow_missing` is set.
pub fn check_batch(items: &[BatchItem], context: &str, allow_missing: bool) -> BenchResult<()> {
    for item in items {
        if !item.error || (allow_missing && item.is_not_found()) {
            continue;
        }
        let reason = item
            .error_message
            .clone()
            .unwrap_or_else(|| format!("error {}", item.error_num.unwrap_or_default()));
        return Err(BenchError::backend(context, reason));
    }
    Ok(())
}
