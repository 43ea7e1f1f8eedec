//! Glacierdir CLI Binary
//!
//! Command-line inspection of a glacier working directory.

use anyhow::Context;
use clap::Parser;
use glacierdir::cli::{Cli, RunContext};
use glacierdir::config::ConfigLoader;
use glacierdir::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(Some(&build_logging_config(&cli))) {
        eprintln!("glacierdir: cannot set up logging: {}", e);
        process::exit(2);
    }
    info!(workspace = %cli.workspace.display(), "Starting");

    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {:#}", e);
            match e.downcast_ref::<glacierdir::WorkflowError>() {
                Some(workflow) => eprintln!("{}", glacierdir::cli::map_error(workflow)),
                None => eprintln!("{:#}", e),
            }
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .with_context(|| format!("Failed to load working directory {}", cli.workspace.display()))?;
    Ok(context.execute(&cli.command)?)
}

/// Logging settings of the loaded configuration, with command-line flags on top.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match cli.config.as_deref() {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    let overrides = [
        (&cli.log_level, &mut config.level),
        (&cli.log_format, &mut config.format),
        (&cli.log_output, &mut config.output),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.clone();
        }
    }
    if let Some(file) = &cli.log_file {
        config.file = file.clone();
    }
    config
}
