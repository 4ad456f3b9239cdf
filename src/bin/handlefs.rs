//! `handlefs` executable.
//!
//! Command output goes to stdout; logs and error messages go to stderr.

use clap::Parser;
use handlefs::cli::{Cli, RunContext};
use handlefs::config::ConfigLoader;
use handlefs::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(workspace = %cli.workspace.display(), "handlefs starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Could not open the workspace store");
            eprintln!("{}", handlefs::cli::map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            let stdout = std::io::stdout();
            if let Err(e) = output.write_to(&mut stdout.lock()) {
                eprintln!("Failed to write output: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{}", handlefs::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Logging settings for this run.
///
/// Starts from the `[logging]` table of the explicit `--config` file, or of the
/// workspace's layered config when none is given. A config that fails to load
/// falls back to defaults here; the command itself reports the failure.
/// `--quiet`, `--verbose` and the `--log-*` flags are applied on top.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    config.enabled &= !cli.quiet;
    if cli.verbose {
        config.level = "debug".to_string();
        // A file-only sink would hide debug lines from the terminal.
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    config.level = cli.log_level.clone().unwrap_or(config.level);
    config.format = cli.log_format.clone().unwrap_or(config.format);
    config.output = cli.log_output.clone().unwrap_or(config.output);
    if cli.log_file.is_some() {
        config.file = cli.log_file.clone();
    }

    config
}
