//! Deployment lifecycle phases.
//!
//! An orchestrator drives one [`DeploySession`] through the phases in order:
//!
//! | Phase             | Reads                                   | Writes                                 |
//! |-------------------|-----------------------------------------|----------------------------------------|
//! | `fetch_revisions` | `project`                               | `revisions`                            |
//! | `upload`          | `dist_dir`, revision override/hash      | `revision_data.uploaded_revision_key`  |
//! | `did_deploy`      | revision override/hash                  | —                                      |
//! | `will_activate`   | `project`                               | `revision_data.previous_revision_key`  |
//! | `activate`        | revision override/hash                  | `revision_data.activated_revision_key` |
//! | `did_activate`    | revision override/hash                  | —                                      |
//!
//! `will_activate` must run before `activate` so the previous pointer is
//! captured for rollback. A failed phase leaves earlier phases' effects in
//! place: an uploaded revision stays uploaded if its activation fails.

use std::path::PathBuf;
use tracing::info;

use crate::config::DeployConfig;
use crate::errors::{LifecycleError, ManifestError};
use crate::keys::{KEY_SEPARATOR, derive_revision_key};
use crate::manifest::{ManifestStore, RevisionListEntry};
use crate::table::{LibsqlTable, TableClient};

/// Options passed on the command line of the deploy invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Explicit revision token; wins over the revision hash.
    pub revision: Option<String>,
}

/// Revision identifiers gathered and produced during one run.
#[derive(Debug, Clone, Default)]
pub struct RevisionData {
    /// Revision hash supplied by the pipeline (commit or content hash).
    pub revision_key: Option<String>,
    pub uploaded_revision_key: Option<String>,
    pub previous_revision_key: Option<String>,
    pub activated_revision_key: Option<String>,
}

/// Per-run state threaded through every phase.
#[derive(Debug, Clone, Default)]
pub struct DeploySession {
    pub project: String,
    pub dist_dir: PathBuf,
    pub command_options: CommandOptions,
    pub revision_data: RevisionData,
    pub revisions: Vec<RevisionListEntry>,
}

impl DeploySession {
    pub fn new(project: impl Into<String>, dist_dir: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            dist_dir: dist_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.project_name(), config.dist_dir())
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.command_options.revision = revision;
        self
    }

    pub fn with_revision_key(mut self, revision_key: Option<String>) -> Self {
        self.revision_data.revision_key = revision_key;
        self
    }
}

pub struct Lifecycle<T: TableClient> {
    store: ManifestStore<T>,
    artifact: String,
}

impl Lifecycle<LibsqlTable> {
    /// Validate credentials, then connect. Missing credentials fail here,
    /// before any connection is attempted.
    pub async fn configure(config: &DeployConfig) -> Result<Self, LifecycleError> {
        let endpoint = config.endpoint()?;
        info!(%endpoint, project = %config.project_name(), "configuring manifest store");
        let table = LibsqlTable::connect(&endpoint)
            .await
            .map_err(ManifestError::from)?;
        Ok(Self::new(ManifestStore::new(table), config.artifact()))
    }
}

impl<T: TableClient> Lifecycle<T> {
    pub fn new(store: ManifestStore<T>, artifact: impl Into<String>) -> Self {
        Self {
            store,
            artifact: artifact.into(),
        }
    }

    pub fn store(&self) -> &ManifestStore<T> {
        &self.store
    }

    /// Manifest key for the session's revision.
    pub fn revision_key(&self, session: &DeploySession) -> Result<String, LifecycleError> {
        let revision = session
            .command_options
            .revision
            .as_deref()
            .filter(|r| !r.is_empty());
        match (revision, session.revision_data.revision_key.as_deref()) {
            (Some(rev), _) if rev.contains(KEY_SEPARATOR) => Err(LifecycleError::InvalidRevision {
                revision: rev.to_string(),
            }),
            (Some(rev), hash) => Ok(derive_revision_key(
                &session.project,
                Some(rev),
                hash.unwrap_or_default(),
            )),
            (None, Some(hash)) if !hash.is_empty() => {
                Ok(derive_revision_key(&session.project, None, hash))
            }
            _ => Err(LifecycleError::MissingRevisionKey),
        }
    }

    pub async fn fetch_revisions(&self, session: &mut DeploySession) -> Result<(), LifecycleError> {
        session.revisions = self.store.list_revisions(&session.project).await?;
        Ok(())
    }

    /// Read the artifact from `dist_dir` and store it under the session's key.
    pub async fn upload(&self, session: &mut DeploySession) -> Result<String, LifecycleError> {
        let key = self.revision_key(session)?;
        let path = session.dist_dir.join(&self.artifact);

        info!(artifact = %self.artifact, key = %key, "uploading artifact to manifest");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LifecycleError::ArtifactReadFailed {
                path: path.clone(),
                source,
            })?;

        self.store.upload(&key, &content).await?;
        session.revision_data.uploaded_revision_key = Some(key.clone());
        Ok(key)
    }

    /// Message announcing the uploaded revision.
    pub fn did_deploy(&self, session: &DeploySession) -> Result<String, LifecycleError> {
        let key = self.revision_key(session)?;
        let message = format!("deployed {} under {}", self.artifact, key);
        info!("{}", message);
        Ok(message)
    }

    /// Snapshot the current pointer for rollback.
    pub async fn will_activate(&self, session: &mut DeploySession) -> Result<(), LifecycleError> {
        let current = self.store.get_current(&session.project).await?;
        session.revision_data.previous_revision_key = current;
        Ok(())
    }

    pub async fn activate(&self, session: &mut DeploySession) -> Result<String, LifecycleError> {
        let key = self.revision_key(session)?;
        self.store.activate(&session.project, &key).await?;
        session.revision_data.activated_revision_key = Some(key.clone());
        Ok(key)
    }

    /// Message announcing the activated revision.
    pub fn did_activate(&self, session: &DeploySession) -> Result<String, LifecycleError> {
        let key = self.revision_key(session)?;
        let message = format!("Activated revision {}", key);
        info!("{}", message);
        Ok(message)
    }
}
