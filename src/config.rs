//! Configuration System
//!
//! Layered configuration for storage, serving, walking and logging. Sources in
//! increasing precedence: built-in defaults, the global config file, the
//! workspace's `handlefs.toml`, and `HANDLEFS_*` environment variables.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::store::{IndexLocation, DEFAULT_STORE_NAME, SCHEMA_VERSION};
use crate::tree::walker::WalkerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use merge::DEFAULT_LISTEN;
pub use sources::environment::ENV_PREFIX;
pub use sources::workspace_file::WORKSPACE_CONFIG_FILE;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlefsConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub walker: WalkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the persisted index lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory. Relative paths are taken from the workspace root;
    /// unset means the platform data directory.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    #[serde(default = "default_store_name")]
    pub store_name: String,

    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            store_name: default_store_name(),
            version: default_version(),
        }
    }
}

impl StorageConfig {
    /// Store location for a workspace rooted at `workspace_root`.
    pub fn resolve_location(&self, workspace_root: &Path) -> IndexLocation {
        let path = match &self.store_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace_root.join(path),
            None => default_store_path(workspace_root),
        };
        IndexLocation {
            path,
            store_name: self.store_name.clone(),
            version: self.version,
        }
    }
}

/// Platform data directory, or `<workspace>/.handlefs/index` when there is none.
fn default_store_path(workspace_root: &Path) -> PathBuf {
    directories::ProjectDirs::from("", "", "handlefs")
        .map(|dirs| dirs.data_dir().join("index"))
        .unwrap_or_else(|| workspace_root.join(".handlefs").join("index"))
}

/// HTTP front end settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Reserved URL prefix answered from the granted root
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_listen")]
    pub listen: String,

    /// Origin that receives passthrough requests; 404 when unset
    #[serde(default)]
    pub upstream: Option<String>,
}

fn default_prefix() -> String {
    crate::serve::DEFAULT_PREFIX.to_string()
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            listen: default_listen(),
            upstream: None,
        }
    }
}

impl ServeConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ApiError> {
        self.listen
            .parse()
            .map_err(|e| ApiError::ConfigError(format!("Invalid listen address {:?}: {}", self.listen, e)))
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Serve(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Serve(msg) => write!(f, "Serve: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HandlefsConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.store_name.is_empty() {
            errors.push(ValidationError::Storage("store_name cannot be empty".to_string()));
        }
        if self.storage.store_name == "meta" {
            errors.push(ValidationError::Storage(
                "store_name 'meta' is reserved for the schema stamp".to_string(),
            ));
        }
        if self.storage.version == 0 {
            errors.push(ValidationError::Storage("version must be at least 1".to_string()));
        }
        if let Some(path) = &self.storage.store_path {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Storage("store_path cannot be empty".to_string()));
            }
        }

        if !self.serve.prefix.starts_with('/') {
            errors.push(ValidationError::Serve(format!(
                "prefix {:?} must start with '/'",
                self.serve.prefix
            )));
        }
        if self.serve.prefix == "/" {
            errors.push(ValidationError::Serve(
                "prefix '/' would intercept every request".to_string(),
            ));
        }
        if let Err(e) = self.serve.listen_addr() {
            errors.push(ValidationError::Serve(e.to_string()));
        }
        if let Some(upstream) = &self.serve.upstream {
            if reqwest::Url::parse(upstream).is_err() {
                errors.push(ValidationError::Serve(format!("upstream {:?} is not a URL", upstream)));
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            errors.push(ValidationError::Logging(format!(
                "format {:?} must be 'text' or 'json'",
                self.logging.format
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`HandlefsConfig`] from its layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the workspace at `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<HandlefsConfig, ApiError> {
        Self::load_layers(
            sources::global_file::global_config_path().as_deref(),
            workspace_root,
            None,
        )
    }

    /// Load configuration from a single file on top of the defaults.
    ///
    /// Environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<HandlefsConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = merge::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder, None);
        Self::finish(builder)
    }

    /// Path of the global config file, if a home directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        sources::global_file::global_config_path()
    }

    /// Write `config` as the workspace's `handlefs.toml`.
    ///
    /// An existing file is kept unless `force` is set.
    pub fn write_workspace_file(
        workspace_root: &Path,
        config: &HandlefsConfig,
        force: bool,
    ) -> Result<PathBuf, ApiError> {
        let path = sources::workspace_file::workspace_config_path(workspace_root);
        if path.exists() && !force {
            return Err(ApiError::AlreadyExists(path.display().to_string()));
        }
        let content = toml::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&path, content).map_err(|e| {
            ApiError::ConfigError(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    fn load_layers(
        global: Option<&Path>,
        workspace_root: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<HandlefsConfig, ApiError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder, global);
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root);
        let builder = sources::environment::add_to_builder(builder, env);
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<HandlefsConfig, ApiError> {
        let config: HandlefsConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
