//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; a single route table dispatches to the workspace
//! facade and the serving layer.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{map_error, CommandOutput};
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{
    format_change, format_fetch_head, format_grant, format_list_json, format_list_text,
    format_section_heading, format_status_text, format_tree,
};
pub use route::RunContext;
