//! Revision manifest store.
//!
//! All rows live in the single [`MANIFEST_PARTITION`]: one immutable row per
//! uploaded revision plus one `<project>:current` pointer row per project whose
//! content is the active revision key.

pub mod types;

use tracing::{debug, info, warn};

use crate::errors::{ManifestError, TableError};
use crate::keys::{belongs_to, derive_current_key, is_current_key};
use crate::table::{MANIFEST_PARTITION, RowFilter, TableClient, TableRecord};

pub use types::RevisionListEntry;

pub struct ManifestStore<T: TableClient> {
    table: T,
}

impl<T: TableClient> ManifestStore<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Key of the currently active revision, or `None` if nothing was ever activated.
    pub async fn get_current(&self, project: &str) -> Result<Option<String>, ManifestError> {
        self.table.ensure_table().await?;
        let rows = self
            .table
            .query(MANIFEST_PARTITION, &RowFilter::Eq(derive_current_key(project)))
            .await?;
        Ok(rows.into_iter().next().map(|r| r.content))
    }

    /// Every uploaded revision of `project`, most recent first.
    ///
    /// The current-pointer row is never part of the result; its value only sets
    /// the `active` flag. Entries with equal timestamps keep backend order.
    pub async fn list_revisions(
        &self,
        project: &str,
    ) -> Result<Vec<RevisionListEntry>, ManifestError> {
        // get_current has already ensured the table.
        let current = self.get_current(project).await?;
        let mut rows = self
            .table
            .query(MANIFEST_PARTITION, &RowFilter::Ne(derive_current_key(project)))
            .await?;
        rows.retain(|r| belongs_to(&r.row_key, project) && !is_current_key(&r.row_key));
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!(project, count = rows.len(), current = ?current, "listed revisions");
        Ok(rows
            .into_iter()
            .map(|r| {
                let timestamp = r.timestamp_millis();
                let active = current.as_deref() == Some(r.row_key.as_str());
                RevisionListEntry {
                    revision: r.row_key,
                    timestamp,
                    active,
                }
            })
            .collect())
    }

    /// Store `content` under `key`. A key is uploaded at most once.
    ///
    /// The existence check and the insert are separate calls; a concurrent
    /// uploader that slips in between is caught by the backend's uniqueness
    /// constraint and reported the same way.
    pub async fn upload(&self, key: &str, content: &str) -> Result<TableRecord, ManifestError> {
        if is_current_key(key) {
            return Err(ManifestError::ReservedKey {
                key: key.to_string(),
            });
        }

        self.table.ensure_table().await?;
        let existing = self
            .table
            .query(MANIFEST_PARTITION, &RowFilter::Eq(key.to_string()))
            .await?;
        if !existing.is_empty() {
            warn!(key, "revision already in manifest");
            return Err(ManifestError::AlreadyUploaded {
                key: key.to_string(),
            });
        }

        match self
            .table
            .insert_if_absent(&TableRecord::manifest(key, content))
            .await
        {
            Ok(stored) => {
                info!(key, bytes = content.len(), "uploaded revision");
                Ok(stored)
            }
            Err(TableError::Duplicate { .. }) => {
                warn!(key, "revision inserted concurrently by another uploader");
                Err(ManifestError::AlreadyUploaded {
                    key: key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Point `project`'s current revision at `key`, which must already be uploaded.
    ///
    /// Returns once the pointer write has completed. Concurrent activations are
    /// last-write-wins.
    pub async fn activate(&self, project: &str, key: &str) -> Result<(), ManifestError> {
        let revisions = self.list_revisions(project).await?;
        if !revisions.iter().any(|entry| entry.revision == key) {
            warn!(project, key, "activation target not in manifest");
            return Err(ManifestError::UnknownRevision {
                key: key.to_string(),
            });
        }

        self.table
            .insert_or_replace(&TableRecord::manifest(derive_current_key(project), key))
            .await?;
        info!(project, key, "activated revision");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::fake::FakeTable;
    use std::sync::atomic::Ordering;

    fn store() -> ManifestStore<FakeTable> {
        ManifestStore::new(FakeTable::default())
    }

    fn keys(entries: &[RevisionListEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.revision.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_current_none_before_activation() {
        let s = store();
        assert_eq!(s.get_current("demo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_current_backend_failure_is_error() {
        let s = store();
        s.table().fail_queries.store(true, Ordering::SeqCst);
        let err = s.get_current("demo").await.unwrap_err();
        assert!(matches!(err, ManifestError::Backend(_)));
    }

    #[tokio::test]
    async fn test_upload_then_list_single_inactive() {
        let s = store();
        let stored = s.upload("demo:ab12cd34", "<html>v1</html>").await.unwrap();
        assert!(stored.timestamp.is_some());

        let list = s.list_revisions("demo").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].revision, "demo:ab12cd34");
        assert!(!list[0].active);
        assert_eq!(list[0].timestamp, stored.timestamp_millis());
    }

    #[tokio::test]
    async fn test_upload_same_key_twice_rejected() {
        let s = store();
        s.upload("demo:ab12cd34", "one").await.unwrap();
        let err = s.upload("demo:ab12cd34", "two").await.unwrap_err();
        match err {
            ManifestError::AlreadyUploaded { key } => assert_eq!(key, "demo:ab12cd34"),
            other => panic!("Expected AlreadyUploaded, got {:?}", other),
        }
        // First content is untouched.
        let rows = s.table().rows.lock().unwrap().clone();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "one");
    }

    #[tokio::test]
    async fn test_upload_race_duplicate_maps_to_already_uploaded() {
        let s = store();
        s.table().insert_raw("demo:ab12cd34", "from another process");
        s.table().hide_point_lookups.store(true, Ordering::SeqCst);

        let err = s.upload("demo:ab12cd34", "mine").await.unwrap_err();
        assert!(matches!(err, ManifestError::AlreadyUploaded { ref key } if key == "demo:ab12cd34"));
    }

    #[tokio::test]
    async fn test_upload_rejects_current_pointer_key() {
        let s = store();
        let err = s.upload("demo:current", "x").await.unwrap_err();
        assert!(matches!(err, ManifestError::ReservedKey { .. }));
        assert!(s.table().rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_most_recent_first() {
        let s = store();
        for key in ["demo:first", "demo:second", "demo:third"] {
            s.upload(key, "x").await.unwrap();
        }
        let list = s.list_revisions("demo").await.unwrap();
        assert_eq!(keys(&list), vec!["demo:third", "demo:second", "demo:first"]);
        assert!(list.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }

    #[tokio::test]
    async fn test_list_excludes_current_pointer_and_other_projects() {
        let s = store();
        s.upload("demo:aaaa1111", "x").await.unwrap();
        s.upload("other:bbbb2222", "y").await.unwrap();
        s.activate("demo", "demo:aaaa1111").await.unwrap();
        s.activate("other", "other:bbbb2222").await.unwrap();

        let list = s.list_revisions("demo").await.unwrap();
        assert_eq!(keys(&list), vec!["demo:aaaa1111"]);
        assert!(list.iter().all(|e| !e.revision.ends_with(":current")));
    }

    #[tokio::test]
    async fn test_activate_marks_entry_active() {
        let s = store();
        s.upload("demo:aaaa1111", "a").await.unwrap();
        s.upload("demo:bbbb2222", "b").await.unwrap();
        s.activate("demo", "demo:aaaa1111").await.unwrap();

        assert_eq!(
            s.get_current("demo").await.unwrap().as_deref(),
            Some("demo:aaaa1111")
        );
        let list = s.list_revisions("demo").await.unwrap();
        let active: Vec<_> = list.iter().filter(|e| e.active).map(|e| e.revision.as_str()).collect();
        assert_eq!(active, vec!["demo:aaaa1111"]);
    }

    #[tokio::test]
    async fn test_activate_replaces_pointer() {
        let s = store();
        s.upload("demo:aaaa1111", "a").await.unwrap();
        s.upload("demo:bbbb2222", "b").await.unwrap();
        s.activate("demo", "demo:aaaa1111").await.unwrap();
        s.activate("demo", "demo:bbbb2222").await.unwrap();

        assert_eq!(
            s.get_current("demo").await.unwrap().as_deref(),
            Some("demo:bbbb2222")
        );
        let pointers = s
            .table()
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.row_key == "demo:current")
            .count();
        assert_eq!(pointers, 1);
    }

    #[tokio::test]
    async fn test_activate_unknown_revision_leaves_pointer() {
        let s = store();
        s.upload("demo:aaaa1111", "a").await.unwrap();
        s.activate("demo", "demo:aaaa1111").await.unwrap();

        let err = s.activate("demo", "demo:nonexistent").await.unwrap_err();
        match err {
            ManifestError::UnknownRevision { key } => assert_eq!(key, "demo:nonexistent"),
            other => panic!("Expected UnknownRevision, got {:?}", other),
        }
        assert_eq!(
            s.get_current("demo").await.unwrap().as_deref(),
            Some("demo:aaaa1111")
        );
    }

    #[tokio::test]
    async fn test_activate_other_projects_revision_is_unknown() {
        let s = store();
        s.upload("other:aaaa1111", "a").await.unwrap();
        let err = s.activate("demo", "other:aaaa1111").await.unwrap_err();
        assert!(matches!(err, ManifestError::UnknownRevision { .. }));
        assert_eq!(s.get_current("demo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_activate_surfaces_pointer_write_failure() {
        let s = store();
        s.upload("demo:aaaa1111", "a").await.unwrap();
        s.upload("demo:bbbb2222", "b").await.unwrap();
        s.activate("demo", "demo:aaaa1111").await.unwrap();

        s.table().fail_writes.store(true, Ordering::SeqCst);
        let err = s.activate("demo", "demo:bbbb2222").await.unwrap_err();
        assert!(matches!(err, ManifestError::Backend(_)));

        s.table().fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(
            s.get_current("demo").await.unwrap().as_deref(),
            Some("demo:aaaa1111")
        );
    }

    #[tokio::test]
    async fn test_upload_write_failure_is_backend_error() {
        let s = store();
        s.table().fail_writes.store(true, Ordering::SeqCst);
        let err = s.upload("demo:aaaa1111", "a").await.unwrap_err();
        assert!(matches!(err, ManifestError::Backend(_)));
        assert!(s.table().rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_table_failure_surfaces_from_every_operation() {
        let s = store();
        s.table().insert_raw("demo:aaaa1111", "a");
        s.table().fail_ensure.store(true, Ordering::SeqCst);

        assert!(matches!(
            s.get_current("demo").await.unwrap_err(),
            ManifestError::Backend(_)
        ));
        assert!(matches!(
            s.list_revisions("demo").await.unwrap_err(),
            ManifestError::Backend(_)
        ));
        assert!(matches!(
            s.upload("demo:bbbb2222", "b").await.unwrap_err(),
            ManifestError::Backend(_)
        ));
        assert!(matches!(
            s.activate("demo", "demo:aaaa1111").await.unwrap_err(),
            ManifestError::Backend(_)
        ));
        assert_eq!(s.table().rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nested_project_rows_stay_out_of_listing_and_activation() {
        let s = store();
        s.upload("demo:aaaa1111", "a").await.unwrap();
        s.upload("demo:x:ab12cd34", "intruder").await.unwrap();

        let list = s.list_revisions("demo").await.unwrap();
        assert_eq!(keys(&list), vec!["demo:aaaa1111"]);

        let err = s.activate("demo", "demo:x:ab12cd34").await.unwrap_err();
        assert!(matches!(err, ManifestError::UnknownRevision { .. }));
        assert_eq!(s.get_current("demo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_ensures_table_once() {
        let s = store();
        s.list_revisions("demo").await.unwrap();
        assert_eq!(s.table().ensure_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_operation_ensures_table() {
        let s = store();
        s.get_current("demo").await.unwrap();
        let after_get = s.table().ensure_calls.load(Ordering::SeqCst);
        assert!(after_get >= 1);

        s.upload("demo:a", "x").await.unwrap();
        s.list_revisions("demo").await.unwrap();
        s.activate("demo", "demo:a").await.unwrap();
        assert!(s.table().ensure_calls.load(Ordering::SeqCst) > after_get);
    }
}
