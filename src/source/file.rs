//! Deal source over a local JSON export.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use super::{DealQuery, DealSource, SourceError, SourceResult};
use crate::models::{DealRecord, FieldMap};

/// Deals loaded into memory from a JSON file.
///
/// Accepts either a top-level array of rows or an object whose `deals`
/// field holds the array.
#[derive(Debug, Clone)]
pub struct FileDealSource {
    origin: String,
    records: Vec<DealRecord>,
}

impl FileDealSource {
    /// Reads and parses an export file.
    pub fn load(path: &Path, fields: &FieldMap) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records = Self::parse(&content, fields)?;
        info!("Loaded {} deals from {}", records.len(), path.display());

        Ok(Self::from_records(path.display().to_string(), records))
    }

    pub fn from_records(origin: impl Into<String>, records: Vec<DealRecord>) -> Self {
        Self {
            origin: origin.into(),
            records,
        }
    }

    /// Parses export content into records. Rows that are not JSON objects
    /// are skipped.
    pub fn parse(content: &str, fields: &FieldMap) -> SourceResult<Vec<DealRecord>> {
        let value: Value = serde_json::from_str(content)?;

        let rows = match value {
            Value::Array(rows) => rows,
            Value::Object(mut object) => match object.remove("deals") {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(SourceError::Payload(
                        "object has no 'deals' array".to_string(),
                    ))
                }
            },
            _ => {
                return Err(SourceError::Payload(
                    "expected an array of deals or an object with a 'deals' array".to_string(),
                ))
            }
        };

        let total = rows.len();
        let records: Vec<DealRecord> = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|row| DealRecord::from_row(row, fields))
            .collect();

        if records.len() < total {
            warn!("Skipped {} rows that are not JSON objects", total - records.len());
        }

        Ok(records)
    }
}

#[async_trait]
impl DealSource for FileDealSource {
    fn describe(&self) -> String {
        self.origin.clone()
    }

    async fn fetch(&self, query: &DealQuery) -> SourceResult<Vec<DealRecord>> {
        Ok(query.apply(&self.records))
    }

    async fn count(&self, query: &DealQuery) -> SourceResult<u64> {
        Ok(self.records.iter().filter(|r| query.matches(r)).count() as u64)
    }
}
