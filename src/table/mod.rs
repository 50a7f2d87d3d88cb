//! Table client adapter.
//!
//! The manifest lives in a two-part-key table (partition, row). Everything
//! above this module talks to the table through [`TableClient`]; the only
//! production implementation is [`LibsqlTable`].

#[cfg(test)]
pub(crate) mod fake;
pub mod sql;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::TableError;

pub use sql::LibsqlTable;

/// Name of the table holding every manifest row.
pub const TABLE_NAME: &str = "deploy_manifest";

/// Partition shared by revision rows and current-pointer rows.
pub const MANIFEST_PARTITION: &str = "manifest";

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub partition_key: String,
    pub row_key: String,
    pub content: String,
    /// Assigned by the backend on write; `None` until stored.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TableRecord {
    /// A record in the manifest partition, not yet stored.
    pub fn manifest(row_key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            partition_key: MANIFEST_PARTITION.to_string(),
            row_key: row_key.into(),
            content: content.into(),
            timestamp: None,
        }
    }

    /// Server timestamp in epoch milliseconds, or 0 for unstored records.
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

/// Row-key predicate for [`TableClient::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    Eq(String),
    Ne(String),
}

impl RowFilter {
    pub fn matches(&self, row_key: &str) -> bool {
        match self {
            RowFilter::Eq(k) => k == row_key,
            RowFilter::Ne(k) => k != row_key,
        }
    }
}

/// Abstraction over the remote key-value table for testability.
/// Real implementation: `LibsqlTable`. Test double: `fake::FakeTable`.
///
/// None of these calls retry; retry policy belongs to the backend.
#[async_trait]
pub trait TableClient: Send + Sync {
    /// Create the table if it does not exist. Safe to call repeatedly.
    async fn ensure_table(&self) -> Result<(), TableError>;

    /// All rows in `partition` whose row key satisfies `filter`, in backend order.
    async fn query(&self, partition: &str, filter: &RowFilter)
    -> Result<Vec<TableRecord>, TableError>;

    /// Insert a new row; fails with [`TableError::Duplicate`] if the key exists.
    async fn insert_if_absent(&self, record: &TableRecord) -> Result<TableRecord, TableError>;

    /// Insert a row, overwriting any existing row with the same key.
    async fn insert_or_replace(&self, record: &TableRecord) -> Result<TableRecord, TableError>;
}
