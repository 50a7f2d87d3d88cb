use serde::Serialize;

/// One row of a revision listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionListEntry {
    /// Manifest key of the revision (`<project>:<token>`).
    pub revision: String,
    /// Server timestamp of the upload, epoch milliseconds.
    pub timestamp: i64,
    /// Whether the current pointer names this revision.
    pub active: bool,
}
