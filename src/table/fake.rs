//! In-memory [`TableClient`] double with a controllable clock and failure
//! switches. Test-only.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use super::{RowFilter, TableClient, TableRecord};
use crate::errors::TableError;

#[derive(Default)]
pub(crate) struct FakeTable {
    pub rows: Mutex<Vec<TableRecord>>,
    clock: AtomicI64,
    table_created: AtomicBool,
    pub ensure_calls: AtomicUsize,
    /// Point queries report nothing, simulating a racing uploader.
    pub hide_point_lookups: AtomicBool,
    pub fail_queries: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_ensure: AtomicBool,
}

impl FakeTable {
    fn tick(&self) -> DateTime<Utc> {
        let secs = 1_700_000_000 + self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Store a row directly, bypassing every failure switch.
    pub fn insert_raw(&self, key: &str, content: &str) {
        let mut rec = TableRecord::manifest(key, content);
        rec.timestamp = Some(self.tick());
        self.rows.lock().unwrap().push(rec);
    }

    fn check_writable(&self) -> Result<(), TableError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TableError::Backend(anyhow::anyhow!("503 Service Unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl TableClient for FakeTable {
    async fn ensure_table(&self) -> Result<(), TableError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ensure.load(Ordering::SeqCst) {
            return Err(TableError::Backend(anyhow::anyhow!("401 Unauthorized")));
        }
        self.table_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        filter: &RowFilter,
    ) -> Result<Vec<TableRecord>, TableError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(TableError::Backend(anyhow::anyhow!("403 Forbidden")));
        }
        assert!(self.table_created.load(Ordering::SeqCst), "query before ensure_table");
        if matches!(filter, RowFilter::Eq(_)) && self.hide_point_lookups.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.partition_key == partition && filter.matches(&r.row_key))
            .cloned()
            .collect())
    }

    async fn insert_if_absent(&self, record: &TableRecord) -> Result<TableRecord, TableError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|r| r.partition_key == record.partition_key && r.row_key == record.row_key)
        {
            return Err(TableError::Duplicate {
                partition: record.partition_key.clone(),
                row: record.row_key.clone(),
            });
        }
        let mut stored = record.clone();
        stored.timestamp = Some(self.tick());
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn insert_or_replace(&self, record: &TableRecord) -> Result<TableRecord, TableError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|r| !(r.partition_key == record.partition_key && r.row_key == record.row_key));
        let mut stored = record.clone();
        stored.timestamp = Some(self.tick());
        rows.push(stored.clone());
        Ok(stored)
    }
}
