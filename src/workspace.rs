//! Workspace domain: path-addressed operations over the granted root.

mod commands;
mod types;

pub use commands::Workspace;
pub use types::{ChangeOutcome, WorkspaceStatus};
