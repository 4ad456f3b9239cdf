//! CLI route: single route table and run context. Dispatches to the workspace
//! facade, the interceptor and presentation.

use crate::cli::help::{command_name, is_mutating};
use crate::cli::output::CommandOutput;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation;
use crate::config::{ConfigLoader, HandlefsConfig};
use crate::error::{ApiError, HostError};
use crate::host::{ConsolePicker, DirectoryPicker, FixedPicker, Host, LocalDirectory, LocalHost};
use crate::serve::{self, Interception, Interceptor, ServerState};
use crate::store::IndexLocation;
use crate::tree::builder::TreeNode;
use crate::tree::entry::EntryKind;
use crate::workspace::Workspace;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: config, store location, host and the
/// async runtime every command runs on.
pub struct RunContext {
    workspace_root: PathBuf,
    config: HandlefsConfig,
    location: IndexLocation,
    host: Arc<dyn Host>,
    workspace: Workspace,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_host(&workspace_root, config, Arc::new(LocalHost::new()))
    }

    /// Create run context from an already loaded configuration and host.
    pub fn with_host(
        workspace_root: &Path,
        config: HandlefsConfig,
        host: Arc<dyn Host>,
    ) -> Result<Self, ApiError> {
        let location = config.storage.resolve_location(workspace_root);
        if let Some(parent) = location.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::StorageError(crate::error::StorageError::IoError(e)))?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start async runtime: {}", e)))?;

        let workspace = Workspace::new(Arc::clone(&host), location.clone())
            .with_walker_config(config.walker.clone());
        debug!(store = %location.path.display(), "Run context initialized");

        Ok(Self {
            workspace_root: workspace_root.to_path_buf(),
            config,
            location,
            host,
            workspace,
            runtime,
        })
    }

    pub fn config(&self) -> &HandlefsConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.runtime.block_on(self.execute_inner(command));
        info!(
            command = name,
            mutating = is_mutating(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis(),
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Grant { dir, yes } => self.handle_grant(dir.as_deref(), *yes).await,
            Commands::Status { format } => {
                let status = self.workspace.status().await?;
                match format {
                    OutputFormat::Json => Ok(to_json(&status)?.into()),
                    OutputFormat::Text => Ok(presentation::format_status_text(&status).into()),
                }
            }
            Commands::List { format } => {
                let snapshot = self.workspace.snapshot().await?;
                match format {
                    OutputFormat::Json => Ok(presentation::format_list_json(&snapshot)?.into()),
                    OutputFormat::Text => Ok(presentation::format_list_text(&snapshot).into()),
                }
            }
            Commands::Tree => match self.workspace.tree().await? {
                Some(tree) => Ok(presentation::format_tree(&tree).into()),
                None => Err(ApiError::NoRoot),
            },
            Commands::Create {
                parent,
                name,
                dir,
                strict,
            } => {
                let kind = if *dir {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                let outcome = if *strict {
                    self.workspace.create_new(parent, name, kind).await?
                } else {
                    self.workspace.create(parent, name, kind).await?
                };
                Ok(presentation::format_change("create", &outcome).into())
            }
            Commands::Remove { path, force } => {
                if !*force && !confirm(format!("Remove {} and everything below it?", path)).await? {
                    return Ok(CommandOutput::Text("Removal cancelled".to_string()));
                }
                let outcome = self.workspace.remove(path).await?;
                Ok(presentation::format_change("remove", &outcome).into())
            }
            Commands::Rename { path, new_name } => {
                let outcome = self.workspace.rename(path, new_name).await?;
                Ok(presentation::format_change("rename", &outcome).into())
            }
            Commands::Move { path, target_dir } => {
                let outcome = self.workspace.move_to(path, target_dir).await?;
                Ok(presentation::format_change("move", &outcome).into())
            }
            Commands::Cat { path } => Ok(CommandOutput::Raw(self.workspace.read_file(path).await?)),
            Commands::Write { path, from } => {
                let contents = read_input(from.as_deref())?;
                let outcome = self.workspace.write_file(path, &contents).await?;
                Ok(presentation::format_change("write", &outcome).into())
            }
            Commands::Fetch { url_path, head } => {
                match self.interceptor().intercept(url_path).await {
                    Interception::Respond(file) if *head => {
                        Ok(presentation::format_fetch_head(&file).into())
                    }
                    Interception::Respond(file) => Ok(CommandOutput::Raw(file.body)),
                    Interception::Passthrough => Ok(CommandOutput::Text(format!(
                        "passthrough: {} is not served from the workspace",
                        url_path
                    ))),
                }
            }
            Commands::Serve { listen, upstream } => {
                let mut serve_config = self.config.serve.clone();
                if let Some(listen) = listen {
                    serve_config.listen = listen.clone();
                }
                if upstream.is_some() {
                    serve_config.upstream = upstream.clone();
                }
                let addr = serve_config.listen_addr()?;
                let state = Arc::new(ServerState::new(self.interceptor(), serve_config.upstream));
                serve::serve(state, addr).await?;
                Ok(CommandOutput::Text("Server stopped".to_string()))
            }
            Commands::Init { force } => {
                let path =
                    ConfigLoader::write_workspace_file(&self.workspace_root, &self.config, *force)?;
                Ok(CommandOutput::Text(format!("Wrote {}", path.display())))
            }
        }
    }

    fn interceptor(&self) -> Interceptor {
        Interceptor::new(
            Arc::clone(&self.host),
            self.location.clone(),
            self.config.serve.prefix.clone(),
        )
        .with_walker_config(self.config.walker.clone())
    }

    async fn handle_grant(&self, dir: Option<&Path>, yes: bool) -> Result<CommandOutput, ApiError> {
        let picker: Box<dyn DirectoryPicker> = match (dir, yes) {
            (Some(dir), true) => Box::new(FixedPicker::new(Arc::new(LocalDirectory::open(dir)?))),
            (dir, _) => Box::new(ConsolePicker::new(dir.map(Path::to_path_buf))),
        };
        match self.workspace.grant(picker.as_ref()).await? {
            Some(root) => {
                let snapshot = self.workspace.snapshot().await?;
                let mut text = presentation::format_grant(&root);
                if let Some(tree) = TreeNode::fold(&snapshot) {
                    text.push_str(&format!("\n{} entries", tree.len()));
                }
                Ok(text.into())
            }
            None => Ok(CommandOutput::Text("Grant cancelled".to_string())),
        }
    }
}

async fn confirm(prompt: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
    })
    .await
    .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?
    .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))
}

fn read_input(from: Option<&Path>) -> Result<Vec<u8>, ApiError> {
    match from {
        Some(path) => std::fs::read(path).map_err(|e| HostError::Io(e).into()),
        None => {
            let mut contents = Vec::new();
            std::io::stdin()
                .read_to_end(&mut contents)
                .map_err(HostError::Io)?;
            Ok(contents)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to encode output: {}", e)))
}
