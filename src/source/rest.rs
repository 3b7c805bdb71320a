//! PostgREST-style backend client.
//!
//! Rows are read from `{url}/rest/v1/{table}` with `eq.`/`gte.`/`lt.` column
//! filters, `order`, `offset` and `limit` query parameters. Ordered queries
//! sort on the creation time and then the id column. Counts use a
//! `HEAD` request with `Prefer: count=exact` and read the total from the
//! `Content-Range` response header.

use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::Response;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{DealQuery, DealSource, SourceError, SourceResult};
use crate::models::{DealRecord, FieldMap};

/// Connection settings for the REST backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout_seconds: u64,
    pub fields: FieldMap,
}

/// Deal source backed by a PostgREST endpoint.
pub struct RestDealSource {
    config: RestConfig,
    http_client: reqwest::Client,
}

impl RestDealSource {
    pub fn new(config: RestConfig) -> SourceResult<Self> {
        if !config.url.starts_with("http://") && !config.url.starts_with("https://") {
            return Err(SourceError::Config(format!(
                "backend URL must start with 'http://' or 'https://': {}",
                config.url
            )));
        }
        if config.table.trim().is_empty() {
            return Err(SourceError::Config("table name is empty".to_string()));
        }

        info!("Using REST backend {} (table {})", config.url, config.table);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Query string parameters for `query`.
    pub fn query_params(&self, query: &DealQuery) -> Vec<(String, String)> {
        let fields = &self.config.fields;
        let mut params = vec![("select".to_string(), "*".to_string())];

        if let Some(ref status) = query.status {
            params.push((fields.status.clone(), format!("eq.{}", status)));
        }
        if let Some(ref owner) = query.owner {
            params.push((fields.owner.clone(), format!("eq.{}", owner)));
        }
        if let Some(from) = query.created_from {
            params.push((fields.created_at.clone(), format!("gte.{}", from)));
        }
        if let Some(until) = query.created_until {
            // Timestamps anywhere on the last day must match.
            let bound = until.succ_opt().unwrap_or(until);
            params.push((fields.created_at.clone(), format!("lt.{}", bound)));
        }
        if let Some(order) = query.order {
            // The id column breaks ties so pages do not overlap.
            let direction = order.as_str();
            params.push((
                "order".to_string(),
                format!(
                    "{}.{},{}.{}",
                    fields.created_at, direction, fields.id, direction
                ),
            ));
        }
        if let Some(offset) = query.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    fn request(&self, method: reqwest::Method, query: &DealQuery) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.endpoint())
            .query(&self.query_params(query))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn map_send_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(self.config.timeout_seconds)
        } else if e.is_connect() {
            SourceError::Connect(self.config.url.clone())
        } else {
            SourceError::Http(e)
        }
    }

    async fn check_status(response: Response) -> SourceResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SourceError::Status { status, body })
    }
}

/// Total row count from a `Content-Range` header value such as
/// `0-24/3573` or `*/3573`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

#[async_trait]
impl DealSource for RestDealSource {
    fn describe(&self) -> String {
        self.endpoint()
    }

    async fn fetch(&self, query: &DealQuery) -> SourceResult<Vec<DealRecord>> {
        debug!("GET {} {:?}", self.endpoint(), query);

        let response = self
            .request(reqwest::Method::GET, query)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let body = response.text().await?;
        let rows: Vec<Map<String, Value>> = serde_json::from_str(&body)?;

        Ok(rows
            .iter()
            .map(|row| DealRecord::from_row(row, &self.config.fields))
            .collect())
    }

    async fn count(&self, query: &DealQuery) -> SourceResult<u64> {
        let query = query.filters_only();
        debug!("HEAD {} {:?}", self.endpoint(), query);

        let response = self
            .request(reqwest::Method::HEAD, &query)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .ok_or_else(|| SourceError::ContentRange("header not present".to_string()))?;
        let value = header
            .to_str()
            .map_err(|_| SourceError::ContentRange("header is not valid text".to_string()))?;

        parse_content_range(value).ok_or_else(|| SourceError::ContentRange(value.to_string()))
    }
}
