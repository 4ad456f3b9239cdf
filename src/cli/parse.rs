//! CLI parse: clap types for handlefs. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// handlefs - mirror, edit and serve a granted directory
#[derive(Parser, Debug)]
#[command(name = "handlefs")]
#[command(about = "Mirror, edit and serve a user-granted directory through capability handles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory (where handlefs.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable logging
    #[arg(long, short)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Grant access to a directory and make it the root
    Grant {
        /// Directory to grant (prompted for when omitted)
        dir: Option<PathBuf>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the stored root and a summary of its contents
    Status {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List every entry under the root
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the root as a tree
    Tree,
    /// Create a file or directory (reuses an existing one unless --strict)
    Create {
        /// Parent directory path, e.g. /src
        parent: String,
        name: String,
        /// Create a directory instead of a file
        #[arg(long)]
        dir: bool,
        /// Fail if the entry already exists
        #[arg(long)]
        strict: bool,
    },
    /// Remove an entry and everything below it
    Remove {
        path: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Rename an entry within its directory
    Rename { path: String, new_name: String },
    /// Move an entry into another directory
    Move { path: String, target_dir: String },
    /// Print a file's content
    Cat { path: String },
    /// Replace a file's content from a file or stdin
    Write {
        path: String,
        /// Read content from this file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Resolve a URL path the way the server would
    Fetch {
        /// URL path, e.g. /entries/index.html
        url_path: String,
        /// Print only the response summary
        #[arg(long)]
        head: bool,
    },
    /// Serve the root over HTTP under the reserved prefix
    Serve {
        /// Listen address (default from config)
        #[arg(long)]
        listen: Option<String>,
        /// Origin that receives requests not served from the root
        #[arg(long)]
        upstream: Option<String>,
    },
    /// Write the effective configuration to the workspace's handlefs.toml
    Init {
        /// Overwrite an existing handlefs.toml
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
