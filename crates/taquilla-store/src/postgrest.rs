//! HTTP store speaking the PostgREST dialect (`/rest/v1/<table>`).
//!
//! Failure classes:
//! - transport errors, timeouts, 5xx, 408 and 429 → [`StoreError::Connectivity`]
//! - any other non-success status → [`StoreError::Policy`]
//! - bodies that are not JSON rows → [`StoreError::Decode`]

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::{Query, RemoteStore, Result, Row, StoreError, Table};

/// Client for a PostgREST-compatible endpoint.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
}

impl PostgrestStore {
    /// Build a client for `base_url` authenticating with `api_key`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StoreError::Policy(format!(
                "invalid store URL scheme: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| StoreError::Policy(format!("invalid api key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| StoreError::Policy(format!("invalid api key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Policy(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<Row>> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        decode_rows(&body)
    }
}

/// Query-string pairs for a read.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let select = query
        .columns
        .as_ref()
        .map(|c| c.join(","))
        .unwrap_or_else(|| "*".to_string());
    let mut params = vec![("select".to_string(), select)];

    for filter in &query.filters {
        params.push((
            filter.column.clone(),
            format!("{}.{}", filter.op.as_str(), scalar(&filter.value)),
        ));
    }
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn key_param(table: Table, key: &str) -> [(String, String); 1] {
    [(table.key_column().to_string(), format!("eq.{key}"))]
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn classify_transport(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        StoreError::Connectivity(e.to_string())
    } else if e.is_decode() {
        StoreError::Decode(e.to_string())
    } else {
        StoreError::Connectivity(e.to_string())
    }
}

/// Map an unsuccessful HTTP status to an error class.
pub fn classify_status(status: StatusCode, body: &str) -> StoreError {
    let detail = format!("{status}: {}", body.trim());
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        StoreError::Connectivity(detail)
    } else {
        StoreError::Policy(detail)
    }
}

fn decode_rows(body: &str) -> Result<Vec<Row>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::Decode(format!("expected row object, got {other}"))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        other => Err(StoreError::Decode(format!("expected rows, got {other}"))),
    }
}

fn first_row(rows: Vec<Row>, what: &str) -> Result<Row> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::Policy(format!("{what} returned no row")))
}

impl RemoteStore for PostgrestStore {
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        debug!(table = query.table.name(), "store query");
        let request = self
            .client
            .get(self.table_url(query.table))
            .query(&query_params(query));
        self.send(request).await
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        debug!(table = table.name(), "store insert");
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        first_row(self.send(request).await?, "insert")
    }

    async fn update(&self, table: Table, key: &str, patch: Row) -> Result<Row> {
        debug!(table = table.name(), key, "store update");
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&key_param(table, key))
            .header("Prefer", "return=representation")
            .json(&patch);
        first_row(self.send(request).await?, "update")
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        debug!(table = table.name(), key, "store delete");
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&key_param(table, key));
        self.send(request).await.map(|_| ())
    }
}
