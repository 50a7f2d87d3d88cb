//! Layered configuration for the manifest manager.
//!
//! Settings are read from `.deploy/deploy.toml`, then overridden by
//! environment variables, then by CLI arguments.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "demo"
//! dist_dir = "dist"
//! artifact = "index.html"
//!
//! [storage]
//! connection_string = "file:.deploy/manifest.db"
//! # or a remote database:
//! # storage_account = "my-org-db"
//! # storage_access_key = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::errors::ConfigError;
use crate::keys::KEY_SEPARATOR;

pub const ENV_CONNECTION_STRING: &str = "DEPLOY_CONNECTION_STRING";
pub const ENV_STORAGE_ACCOUNT: &str = "DEPLOY_STORAGE_ACCOUNT";
pub const ENV_STORAGE_ACCESS_KEY: &str = "DEPLOY_STORAGE_ACCESS_KEY";

/// Directory (relative to the project) holding `deploy.toml`.
pub const CONFIG_DIR: &str = ".deploy";
pub const CONFIG_FILE: &str = "deploy.toml";

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
    /// Build output directory, relative to the project directory
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
    /// Artifact file inside `dist_dir` that gets uploaded
    #[serde(default = "default_artifact")]
    pub artifact: String,
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_artifact() -> String {
    "index.html".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            dist_dir: default_dist_dir(),
            artifact: default_artifact(),
        }
    }
}

/// Table storage credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_access_key: Option<String>,
}

impl fmt::Debug for StorageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSection")
            .field("connection_string", &self.connection_string.as_deref().map(mask))
            .field("storage_account", &self.storage_account)
            .field(
                "storage_access_key",
                &self.storage_access_key.as_ref().map(|_| "****"),
            )
            .finish()
    }
}

/// The complete deploy.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub storage: StorageSection,
}

impl DeployToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: PathBuf::from(CONFIG_FILE),
            source,
        })
    }

    /// Load `deploy.toml` from `config_dir`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let content = toml::to_string_pretty(self).context("Failed to serialize deploy.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let s = &self.storage;

        if s.connection_string.is_some()
            && (s.storage_account.is_some() || s.storage_access_key.is_some())
        {
            warnings.push(
                "Both connection_string and storage_account/storage_access_key are set; \
                 connection_string takes precedence"
                    .to_string(),
            );
        }
        if s.connection_string.is_none()
            && s.storage_account.is_some() != s.storage_access_key.is_some()
        {
            warnings.push(
                "storage_account and storage_access_key must be set together".to_string(),
            );
        }
        if self.project.artifact.trim().is_empty() {
            warnings.push("project.artifact is empty".to_string());
        }

        warnings
    }
}

/// Resolved storage credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ConnectionString(String),
    AccountKey { account: String, access_key: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ConnectionString(s) => {
                f.debug_tuple("ConnectionString").field(&mask(s)).finish()
            }
            Credentials::AccountKey { account, .. } => f
                .debug_struct("AccountKey")
                .field("account", account)
                .field("access_key", &"****")
                .finish(),
        }
    }
}

impl Credentials {
    /// Translate credentials into a database endpoint. Pure; no network.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        match self {
            Credentials::ConnectionString(s) => Endpoint::parse(s),
            Credentials::AccountKey {
                account,
                access_key,
            } => {
                let url = if account.contains("://") {
                    account.clone()
                } else {
                    format!("libsql://{}.turso.io", account)
                };
                Ok(Endpoint::Remote {
                    url,
                    auth_token: Some(access_key.clone()),
                })
            }
        }
    }
}

/// Where the manifest table lives.
#[derive(Clone, PartialEq, Eq)]
pub enum Endpoint {
    Local(PathBuf),
    Remote {
        url: String,
        auth_token: Option<String>,
    },
}

const REMOTE_SCHEMES: [&str; 5] = ["libsql", "https", "http", "wss", "ws"];

/// Query parameter carrying the remote auth token.
const AUTH_TOKEN_PARAM: &str = "authToken";

impl Endpoint {
    /// Parse a connection string.
    ///
    /// URLs with a remote scheme are remote databases; an `authToken` query
    /// parameter becomes the auth token. Anything else is a local path, with
    /// an optional `file:` prefix.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidConnectionString {
                value: value.to_string(),
                message: "empty connection string".to_string(),
            });
        }

        if !value.contains("://") {
            let path = value.strip_prefix("file:").unwrap_or(value);
            return Ok(Endpoint::Local(PathBuf::from(path)));
        }

        let invalid = |message: String| ConfigError::InvalidConnectionString {
            value: mask(value),
            message,
        };
        let mut url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
        if !REMOTE_SCHEMES.contains(&url.scheme()) {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }

        let mut auth_token = None;
        let mut rest = Vec::new();
        for (key, val) in url.query_pairs() {
            if key == AUTH_TOKEN_PARAM {
                if val.is_empty() {
                    return Err(invalid("authToken is empty".to_string()));
                }
                auth_token = Some(val.into_owned());
            } else {
                rest.push((key.into_owned(), val.into_owned()));
            }
        }
        if rest.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&rest);
        }

        Ok(Endpoint::Remote {
            url: url.to_string(),
            auth_token,
        })
    }

    /// Resolve a relative local path against `base`.
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            Endpoint::Local(p) if p.is_relative() && p != Path::new(":memory:") => {
                Endpoint::Local(base.join(p))
            }
            other => other,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Local(p) => write!(f, "{}", p.display()),
            Endpoint::Remote { url, auth_token } => {
                write!(f, "{}", mask(url))?;
                if auth_token.is_some() {
                    write!(f, " (token ****)")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({})", self)
    }
}

/// Redact the password and query string of a URL-shaped connection string.
/// Local paths carry no secrets and are returned unchanged.
fn mask(value: &str) -> String {
    if !value.contains("://") {
        return value.to_string();
    }
    match Url::parse(value) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            if url.query().is_some() {
                url.set_query(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "****".to_string(),
    }
}

/// Unified configuration that combines DeployToml with runtime settings.
///
/// It merges settings from:
/// 1. deploy.toml file
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Parsed deploy.toml configuration
    pub toml: DeployToml,
    /// CLI override for the project name
    pub cli_project: Option<String>,
    /// CLI override for the dist directory
    pub cli_dist_dir: Option<PathBuf>,
    /// CLI override for the connection string
    pub cli_connection_string: Option<String>,
}

impl DeployConfig {
    /// Create a DeployConfig from a project directory.
    pub fn new(project_dir: PathBuf) -> Result<Self, ConfigError> {
        let project_dir = project_dir
            .canonicalize()
            .map_err(|source| ConfigError::ReadFailed {
                path: project_dir.clone(),
                source,
            })?;
        let toml = DeployToml::load_or_default(&project_dir.join(CONFIG_DIR))?;
        Ok(Self {
            project_dir,
            toml,
            cli_project: None,
            cli_dist_dir: None,
            cli_connection_string: None,
        })
    }

    /// Create DeployConfig with CLI overrides.
    pub fn with_cli_args(
        project_dir: PathBuf,
        project: Option<String>,
        dist_dir: Option<PathBuf>,
        connection_string: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(project_dir)?;
        config.cli_project = project;
        config.cli_dist_dir = dist_dir;
        config.cli_connection_string = connection_string;
        Ok(config)
    }

    /// Path to deploy.toml.
    pub fn config_file(&self) -> PathBuf {
        self.project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Project name (CLI → file → directory name).
    pub fn project_name(&self) -> String {
        self.cli_project
            .clone()
            .or_else(|| self.toml.project.name.clone())
            .or_else(|| {
                self.project_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "app".to_string())
    }

    /// Absolute build output directory (CLI → file → default).
    pub fn dist_dir(&self) -> PathBuf {
        let dir = self
            .cli_dist_dir
            .clone()
            .unwrap_or_else(|| self.toml.project.dist_dir.clone());
        if dir.is_absolute() {
            dir
        } else {
            self.project_dir.join(dir)
        }
    }

    pub fn artifact(&self) -> &str {
        &self.toml.project.artifact
    }

    /// Resolve credentials (CLI → env → file). Fails before any network call
    /// when neither a connection string nor an account/key pair is present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let s = &self.toml.storage;

        let connection_string = self
            .cli_connection_string
            .clone()
            .or_else(|| from_env(ENV_CONNECTION_STRING))
            .or_else(|| s.connection_string.clone())
            .filter(|v| !v.is_empty());
        if let Some(cs) = connection_string {
            return Ok(Credentials::ConnectionString(cs));
        }

        let account = from_env(ENV_STORAGE_ACCOUNT)
            .or_else(|| s.storage_account.clone())
            .filter(|v| !v.is_empty());
        let access_key = from_env(ENV_STORAGE_ACCESS_KEY)
            .or_else(|| s.storage_access_key.clone())
            .filter(|v| !v.is_empty());

        match (account, access_key) {
            (Some(account), Some(access_key)) => Ok(Credentials::AccountKey {
                account,
                access_key,
            }),
            (account, access_key) => {
                let mut missing = Vec::new();
                if account.is_none() {
                    missing.push("storage_account");
                }
                if access_key.is_none() {
                    missing.push("storage_access_key");
                }
                if missing.len() == 2 {
                    missing.insert(0, "connection_string");
                }
                Err(ConfigError::MissingCredentials { missing })
            }
        }
    }

    /// Project name, rejected when it cannot prefix a manifest key
    /// unambiguously.
    pub fn checked_project_name(&self) -> Result<String, ConfigError> {
        let name = self.project_name();
        if name.is_empty() || name.contains(KEY_SEPARATOR) {
            return Err(ConfigError::InvalidProjectName { name });
        }
        Ok(name)
    }

    /// Endpoint for the resolved credentials, with local paths anchored at
    /// the project directory. Fails before any connection when the project
    /// name or the credentials are unusable.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        self.checked_project_name()?;
        Ok(self.credentials()?.endpoint()?.relative_to(&self.project_dir))
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
