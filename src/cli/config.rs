//! Config command handlers

use crate::cli::{ConfigInitArgs, build_service};
use crate::config::ConduitConfig;
use anyhow::bail;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../conduit.example.toml");

/// Handle `conduit config init` command
pub fn handle_config_init(args: &ConfigInitArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        );
    }

    fs::write(&args.output, EXAMPLE_CONFIG)?;

    println!("✓ Configuration file created: {}", args.output.display());
    println!("  Edit this file to describe the APIs you integrate with.");

    Ok(())
}

/// Handle `conduit config export`: the configured endpoints as the JSON
/// document accepted by configuration import.
pub fn handle_config_export(config: &ConduitConfig) -> anyhow::Result<String> {
    let service = build_service(config)?;
    Ok(service.export_configuration()?)
}
