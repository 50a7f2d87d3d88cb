use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database, Row, params};
use tracing::debug;

use super::{RowFilter, TABLE_NAME, TableClient, TableRecord};
use crate::config::Endpoint;
use crate::errors::TableError;

/// Timestamp expression evaluated by the database on every write.
const SERVER_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// `TableClient` backed by a libSQL database: a local file, `:memory:`, or a
/// remote server reached over HTTP/WebSocket.
pub struct LibsqlTable {
    // Kept alive for the lifetime of `conn`.
    _db: Database,
    conn: Connection,
}

impl LibsqlTable {
    /// Open a connection to `endpoint`. Does not touch the table.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, TableError> {
        let db = match endpoint {
            Endpoint::Local(path) => Builder::new_local(path)
                .build()
                .await
                .with_context(|| format!("Failed to open local database at {}", path.display())),
            Endpoint::Remote { url, auth_token } => {
                Builder::new_remote(url.clone(), auth_token.clone().unwrap_or_default())
                    .build()
                    .await
                    .with_context(|| format!("Failed to open remote database at {}", url))
            }
        }
        .map_err(TableError::Backend)?;

        let conn = db
            .connect()
            .context("Failed to connect to database")
            .map_err(TableError::Backend)?;
        debug!(?endpoint, "connected to table backend");
        Ok(Self { _db: db, conn })
    }

    /// In-memory database (for testing).
    pub async fn in_memory() -> Result<Self, TableError> {
        Self::connect(&Endpoint::Local(":memory:".into())).await
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<TableRecord>, TableError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .context("Failed to query manifest table")
            .map_err(TableError::Backend)?;
        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .context("Failed to read manifest row")
            .map_err(TableError::Backend)?
        {
            records.push(record_from_row(&row).map_err(TableError::Backend)?);
        }
        Ok(records)
    }
}

fn record_from_row(row: &Row) -> anyhow::Result<TableRecord> {
    let timestamp: String = row.get(3).context("Missing timestamp column")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .with_context(|| format!("Invalid server timestamp '{}'", timestamp))?
        .with_timezone(&Utc);
    Ok(TableRecord {
        partition_key: row.get(0).context("Missing partition_key column")?,
        row_key: row.get(1).context("Missing row_key column")?,
        content: row.get(2).context("Missing content column")?,
        timestamp: Some(timestamp),
    })
}

#[async_trait]
impl TableClient for LibsqlTable {
    async fn ensure_table(&self) -> Result<(), TableError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                partition_key TEXT NOT NULL,
                row_key TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            )"
        );
        self.conn
            .execute(&sql, ())
            .await
            .context("Failed to create manifest table")
            .map_err(TableError::Backend)?;
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        filter: &RowFilter,
    ) -> Result<Vec<TableRecord>, TableError> {
        let (op, key) = match filter {
            RowFilter::Eq(k) => ("=", k),
            RowFilter::Ne(k) => ("<>", k),
        };
        debug!(partition, op, row_key = %key, "querying manifest table");
        let sql = format!(
            "SELECT partition_key, row_key, content, timestamp FROM {TABLE_NAME}
             WHERE partition_key = ?1 AND row_key {op} ?2"
        );
        self.fetch_all(&sql, params![partition, key.as_str()]).await
    }

    async fn insert_if_absent(&self, record: &TableRecord) -> Result<TableRecord, TableError> {
        debug!(row_key = %record.row_key, "inserting manifest row");
        let sql = format!(
            "INSERT INTO {TABLE_NAME} (partition_key, row_key, content, timestamp)
             VALUES (?1, ?2, ?3, {SERVER_NOW})
             ON CONFLICT (partition_key, row_key) DO NOTHING
             RETURNING partition_key, row_key, content, timestamp"
        );
        let mut stored = self
            .fetch_all(
                &sql,
                params![
                    record.partition_key.as_str(),
                    record.row_key.as_str(),
                    record.content.as_str()
                ],
            )
            .await?;
        stored.pop().ok_or_else(|| TableError::Duplicate {
            partition: record.partition_key.clone(),
            row: record.row_key.clone(),
        })
    }

    async fn insert_or_replace(&self, record: &TableRecord) -> Result<TableRecord, TableError> {
        debug!(row_key = %record.row_key, "upserting manifest row");
        let sql = format!(
            "INSERT INTO {TABLE_NAME} (partition_key, row_key, content, timestamp)
             VALUES (?1, ?2, ?3, {SERVER_NOW})
             ON CONFLICT (partition_key, row_key)
             DO UPDATE SET content = excluded.content, timestamp = excluded.timestamp
             RETURNING partition_key, row_key, content, timestamp"
        );
        let mut stored = self
            .fetch_all(
                &sql,
                params![
                    record.partition_key.as_str(),
                    record.row_key.as_str(),
                    record.content.as_str()
                ],
            )
            .await?;
        stored
            .pop()
            .ok_or_else(|| TableError::Backend(anyhow!("Upsert of {} returned no row", record.row_key)))
    }
}
