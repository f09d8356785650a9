//! # Validate Subcommand
//!
//! Checks an ADP manifest and/or an ACS container spec against the schema
//! set. Every violation is printed, not just the first. An ACS document
//! that passes the schema must also load into the typed container model.

use std::path::{Path, PathBuf};

use adp_core::ContainerSpec;
use adp_schema::{ACS_SCHEMA, ADP_SCHEMA};
use anyhow::Result;
use clap::Args;

use crate::SchemaSource;

/// Arguments for the `adp validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to an ADP manifest (agent.yaml).
    #[arg(long)]
    pub adp: Option<PathBuf>,

    /// Path to an ACS container spec (container.yaml).
    #[arg(long)]
    pub acs: Option<PathBuf>,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, schemas: &SchemaSource) -> Result<u8> {
    if args.adp.is_none() && args.acs.is_none() {
        println!("Nothing to validate. Provide --adp and/or --acs.");
        return Ok(1);
    }

    let validator = schemas.load()?;
    let mut passed = true;
    if let Some(ref path) = args.adp {
        let result = validator
            .validate_file(path, ADP_SCHEMA)
            .map_err(|e| e.messages());
        passed &= report("ADP", path, result);
    }
    if let Some(ref path) = args.acs {
        let result = validator
            .validate_file(path, ACS_SCHEMA)
            .map_err(|e| e.messages())
            .and_then(|()| load_container_model(path));
        passed &= report("ACS", path, result);
    }

    Ok(if passed { 0 } else { 1 })
}

fn load_container_model(path: &Path) -> Result<(), Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| vec![e.to_string()])?;
    let spec = ContainerSpec::from_yaml_str(&text).map_err(|e| vec![e.to_string()])?;
    tracing::debug!(base_image = %spec.base_image, "container spec model loaded");
    Ok(())
}

fn report(label: &str, path: &Path, result: Result<(), Vec<String>>) -> bool {
    match result {
        Ok(()) => {
            println!("OK: {label} valid: {}", path.display());
            true
        }
        Err(messages) => {
            println!("FAIL: {label} invalid: {}", path.display());
            for message in messages {
                println!("  - {message}");
            }
            false
        }
    }
}
