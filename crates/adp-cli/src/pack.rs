//! # Pack and Bundle Subcommands
//!
//! `adp pack` assembles an `.adpkg` archive from separately located inputs
//! and stamps build metadata. `adp bundle` packages a whole agent source
//! tree (one containing `adp/agent.yaml`) in either form.

use std::path::PathBuf;

use adp_pack::{AnyPackage, OpcPackage, Package, PackInputs, PackageFormat};
use anyhow::Result;
use clap::Args;

use crate::{report_failure, SchemaSource};

/// Arguments for the `adp pack` subcommand.
#[derive(Args, Debug)]
pub struct PackArgs {
    /// Path to the ADP manifest.
    #[arg(long)]
    pub agent: PathBuf,

    /// Path to the ACS container spec.
    #[arg(long)]
    pub acs: PathBuf,

    /// Source directory, stored under src/ when present.
    #[arg(long, default_value = "./src")]
    pub src: PathBuf,

    /// Evaluation directory, stored under eval/ when present.
    #[arg(long = "eval", default_value = "./eval")]
    pub eval_dir: PathBuf,

    /// Output .adpkg path.
    #[arg(long)]
    pub out: PathBuf,
}

/// Arguments for the `adp bundle` subcommand.
#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Agent source tree containing adp/agent.yaml.
    #[arg(long)]
    pub src: PathBuf,

    /// Output path: a directory for OCI, a file for OPC.
    #[arg(long)]
    pub out: PathBuf,

    /// Package form (oci or opc). Inferred from --out when omitted.
    #[arg(long)]
    pub format: Option<PackageFormat>,
}

/// Execute the pack subcommand.
pub fn run_pack(args: &PackArgs, schemas: &SchemaSource) -> Result<u8> {
    let validator = schemas.load()?;
    let inputs = PackInputs {
        agent: args.agent.clone(),
        acs: args.acs.clone(),
        src: args.src.clone(),
        eval: args.eval_dir.clone(),
    };
    match OpcPackage::pack(&inputs, &args.out, &validator) {
        Ok(pkg) => {
            println!("OK: created package {}", pkg.path().display());
            Ok(0)
        }
        Err(e) => report_failure("pack", e),
    }
}

/// Execute the bundle subcommand.
pub fn run_bundle(args: &BundleArgs, schemas: &SchemaSource) -> Result<u8> {
    let validator = schemas.load()?;
    let format = args
        .format
        .unwrap_or_else(|| PackageFormat::for_target(&args.out));
    tracing::debug!(%format, out = %args.out.display(), "bundling");

    match AnyPackage::create(format, &args.src, &args.out, &validator) {
        Ok(pkg) => {
            println!("OK: created {format} package {}", pkg.path().display());
            Ok(0)
        }
        Err(e) => report_failure("bundle", e),
    }
}
