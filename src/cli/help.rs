//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::Commands;

/// Command name string for log fields (e.g. "grant", "serve").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Grant { .. } => "grant",
        Commands::Status { .. } => "status",
        Commands::List { .. } => "list",
        Commands::Tree => "tree",
        Commands::Create { .. } => "create",
        Commands::Remove { .. } => "remove",
        Commands::Rename { .. } => "rename",
        Commands::Move { .. } => "move",
        Commands::Cat { .. } => "cat",
        Commands::Write { .. } => "write",
        Commands::Fetch { .. } => "fetch",
        Commands::Serve { .. } => "serve",
        Commands::Init { .. } => "init",
    }
}

/// True for commands that change the granted directory.
pub fn is_mutating(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Create { .. }
            | Commands::Remove { .. }
            | Commands::Rename { .. }
            | Commands::Move { .. }
            | Commands::Write { .. }
    )
}
