//! CLI output: what a command prints, and error mapping to the CLI surface.

use crate::error::{ApiError, MutationError};
use bytes::Bytes;
use std::io::Write;

/// Result of one command, written to stdout by the binary.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Text(String),
    /// File content, written without any conversion
    Raw(Bytes),
}

impl CommandOutput {
    pub fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        match self {
            CommandOutput::Text(text) => writeln!(out, "{}", text),
            CommandOutput::Raw(bytes) => out.write_all(bytes),
        }?;
        out.flush()
    }
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        CommandOutput::Text(text)
    }
}

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::MutationError(err @ MutationError::Incomplete { .. }) if err.left_partial_state() => {
            format!(
                "{}\nThe directory may now hold a partial copy next to the original. Nothing was rolled back.",
                e
            )
        }
        _ => e.to_string(),
    }
}
