//! Deal data sources.
//!
//! A [`DealSource`] answers filtered, ordered and paged deal queries plus
//! exact counts. The hosted backend is reached through [`RestDealSource`];
//! local JSON exports are served by [`FileDealSource`].

pub mod file;
pub mod query;
pub mod rest;

pub use file::FileDealSource;
pub use query::{DealQuery, SortOrder};
pub use rest::{RestConfig, RestDealSource};

use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::analysis::StatusCounts;
use crate::models::{DealPage, DealRecord, StatusVocabulary};

/// Errors raised while talking to a data source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to backend at {0}")]
    Connect(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to decode deal rows: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected payload: {0}")]
    Payload(String),

    #[error("Missing or invalid Content-Range header: {0}")]
    ContentRange(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data source configuration: {0}")]
    Config(String),

    #[error("Fetched {fetched} of {expected} deals before the source stopped returning rows")]
    Incomplete { expected: u64, fetched: u64 },
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A store of deal records.
#[async_trait]
pub trait DealSource: Send + Sync {
    /// Human-readable location of the data, for logs and report metadata.
    fn describe(&self) -> String;

    /// Records matching `query`, in the requested order and page.
    async fn fetch(&self, query: &DealQuery) -> SourceResult<Vec<DealRecord>>;

    /// Number of records matching the filters of `query`, ignoring paging.
    async fn count(&self, query: &DealQuery) -> SourceResult<u64>;
}

/// Fetches every record matching `query`, oldest first, `page_size` rows at
/// a time.
///
/// The source may return fewer rows than requested per page (a backend row
/// cap), so paging continues from the number of rows actually received
/// until the exact count is reached. Running out of rows before that is an
/// [`SourceError::Incomplete`] error.
pub async fn fetch_all(
    source: &dyn DealSource,
    query: &DealQuery,
    page_size: usize,
) -> SourceResult<Vec<DealRecord>> {
    if page_size == 0 {
        return Err(SourceError::Config("page size must be at least 1".to_string()));
    }

    let base = query.filters_only();
    let expected = source.count(&base).await?;
    let ordered = base.ordered(SortOrder::Ascending);

    let mut records = Vec::new();
    while (records.len() as u64) < expected {
        let offset = records.len();
        let page = source.fetch(&ordered.clone().paged(offset, page_size)).await?;
        debug!("Fetched {} records at offset {}", page.len(), offset);

        if page.is_empty() {
            return Err(SourceError::Incomplete {
                expected,
                fetched: records.len() as u64,
            });
        }
        records.extend(page);
    }

    Ok(records)
}

/// Total and per-label counts for the vocabulary, queried concurrently.
pub async fn status_counts(
    source: &dyn DealSource,
    base: &DealQuery,
    vocabulary: &StatusVocabulary,
) -> SourceResult<StatusCounts> {
    let base = base.filters_only();
    let labels = vocabulary.labels();

    let per_label = labels.iter().map(|label| {
        let query = base.clone().with_status(*label);
        async move { source.count(&query).await }
    });

    let (total, counts) = futures::try_join!(source.count(&base), try_join_all(per_label))?;

    Ok(StatusCounts {
        total,
        by_status: labels
            .iter()
            .map(|label| label.to_string())
            .zip(counts)
            .collect(),
    })
}

/// One page of the most recent deals. Page numbers are 1-based; page 0 is
/// treated as page 1.
pub async fn fetch_page(
    source: &dyn DealSource,
    base: &DealQuery,
    page: usize,
    page_size: usize,
) -> SourceResult<DealPage> {
    let page = page.max(1);
    let Some(offset) = (page - 1).checked_mul(page_size) else {
        return Err(SourceError::Config(format!(
            "page {} is out of range for {} deals per page",
            page, page_size
        )));
    };

    let base = base.filters_only();
    let query = base
        .clone()
        .ordered(SortOrder::Descending)
        .paged(offset, page_size);

    let (deals, total) = futures::try_join!(source.fetch(&query), source.count(&base))?;

    Ok(DealPage {
        page,
        page_size,
        total,
        deals,
    })
}
