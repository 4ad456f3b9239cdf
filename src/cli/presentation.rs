//! CLI presentation: text and json formatters per command.

use crate::error::ApiError;
use crate::serve::ServedFile;
use crate::store::{IndexRecord, RootRecord};
use crate::tree::builder::TreeNode;
use crate::tree::entry::{EntryKind, FlatIndex};
use crate::workspace::{ChangeOutcome, WorkspaceStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_grant(root: &RootRecord) -> String {
    format!(
        "Granted {} ({})\nRegistered at {}",
        root.name.bold(),
        root.token,
        root.granted_at.to_rfc3339()
    )
}

/// Format workspace status as human-readable text using comfy-table.
pub fn format_status_text(status: &WorkspaceStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Index store")));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.add_row(vec!["Path".to_string(), status.store_path.display().to_string()]);
    table.add_row(vec!["Collection".to_string(), status.store_name.clone()]);
    table.add_row(vec!["Schema version".to_string(), status.schema_version.to_string()]);
    table.add_row(vec!["Records".to_string(), status.records.to_string()]);
    out.push_str(&format!("{}\n\n", table));

    out.push_str(&format!("{}\n\n", format_section_heading("Root")));
    let Some(root) = &status.root else {
        out.push_str("No directory granted. Run `handlefs grant <DIR>`.\n");
        return out;
    };

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.add_row(vec!["Name".to_string(), root.name.clone()]);
    table.add_row(vec!["Token".to_string(), root.token.to_string()]);
    table.add_row(vec!["Granted".to_string(), root.granted_at.to_rfc3339()]);
    if let Some(walk) = &status.walk {
        table.add_row(vec!["Directories".to_string(), walk.directories.to_string()]);
        table.add_row(vec!["Files".to_string(), walk.files.to_string()]);
        if walk.failed_branches > 0 {
            table.add_row(vec![
                "Unreadable directories".to_string(),
                walk.failed_branches.to_string(),
            ]);
        }
    }
    out.push_str(&format!("{}\n", table));
    out
}

/// One row per entry: path, kind and declared media type.
pub fn format_list_text(index: &FlatIndex) -> String {
    if index.is_empty() {
        return "No directory granted.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Kind", "Type"]);
    for entry in index.iter() {
        let media = entry
            .handle
            .as_file()
            .map(|file| {
                file.content_type()
                    .unwrap_or_else(|| crate::serve::DEFAULT_CONTENT_TYPE.to_string())
            })
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![entry.path.clone(), entry.kind.to_string(), media]);
    }
    format!("{}", table)
}

pub fn format_list_json(index: &FlatIndex) -> Result<String, ApiError> {
    let records: Vec<IndexRecord> = index.iter().map(IndexRecord::from_entry).collect();
    serde_json::to_string_pretty(&records)
        .map_err(|e| ApiError::ConfigError(format!("Failed to encode listing: {}", e)))
}

/// Box-drawing tree, directories first.
pub fn format_tree(tree: &TreeNode) -> String {
    let mut out = format!("{}\n", tree.entry.display_name().blue().bold());
    let count = tree.children.len();
    for (i, child) in tree.children.iter().enumerate() {
        write_node(child, "", i + 1 == count, &mut out);
    }
    out.trim_end().to_string()
}

fn write_node(node: &TreeNode, prefix: &str, last: bool, out: &mut String) {
    let connector = if last { "└── " } else { "├── " };
    let label = match node.entry.kind {
        EntryKind::Directory => format!("{}/", node.entry.name.blue().bold()),
        EntryKind::File => node.entry.name.clone(),
    };
    out.push_str(&format!("{}{}{}\n", prefix, connector, label));

    let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        write_node(child, &child_prefix, i + 1 == count, out);
    }
}

/// Summary line for a create/remove/rename/move/write.
pub fn format_change(action: &str, outcome: &ChangeOutcome) -> String {
    match outcome {
        ChangeOutcome::Missing(path) => {
            format!("{} skipped: {} is not in the workspace", action, path.yellow())
        }
        ChangeOutcome::Unchanged(_) => format!("{}: nothing to do", action),
        ChangeOutcome::Applied { snapshot, transfer } => {
            let mut line = format!("{} {}", action.green(), "done");
            if let Some(transfer) = transfer {
                line.push_str(&format!(
                    " ({} files, {} directories, {} bytes copied)",
                    transfer.files, transfer.directories, transfer.bytes
                ));
            }
            line.push_str(&format!("\n{} entries under the root", snapshot.len()));
            line
        }
    }
}

pub fn format_fetch_head(file: &ServedFile) -> String {
    let mut line = format!(
        "200 {} {} ({} bytes)",
        file.path, file.content_type, file.body.len()
    );
    if file.injected {
        line.push_str(", console instrumentation inserted");
    }
    line
}
