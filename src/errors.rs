//! Typed error hierarchy for the manifest manager.
//!
//! Four enums cover the four layers:
//! - `ConfigError` — credential and config-file failures, raised before any network call
//! - `TableError` — table backend failures from the client adapter
//! - `ManifestError` — manifest store rejections and backend failures
//! - `LifecycleError` — per-phase failures of the deployment lifecycle

use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Missing connection string or storage account / access key combination (missing: {})",
        .missing.join(", ")
    )]
    MissingCredentials { missing: Vec<&'static str> },

    #[error("Invalid project name '{name}': must be non-empty and must not contain ':'")]
    InvalidProjectName { name: String },

    #[error("Invalid connection string '{value}': {message}")]
    InvalidConnectionString { value: String, message: String },

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from the table client adapter.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Row {row} already exists in partition {partition}")]
    Duplicate { partition: String, row: String },

    #[error("Table backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Errors from the manifest store.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Key already in manifest - revision {key} already uploaded or collided")]
    AlreadyUploaded { key: String },

    #[error("Revision {key} not in manifest")]
    UnknownRevision { key: String },

    #[error("Key {key} is reserved for the current revision pointer")]
    ReservedKey { key: String },

    #[error("Table backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

impl From<TableError> for ManifestError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Backend(e) => ManifestError::Backend(e),
            // Duplicates are only meaningful next to a key; callers map them explicitly.
            dup @ TableError::Duplicate { .. } => ManifestError::Backend(dup.into()),
        }
    }
}

/// Errors from a single lifecycle phase.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to read artifact at {path}: {source}")]
    ArtifactReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No revision given and no revision key available to derive one")]
    MissingRevisionKey,

    #[error("Invalid revision '{revision}': must not contain ':'")]
    InvalidRevision { revision: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
