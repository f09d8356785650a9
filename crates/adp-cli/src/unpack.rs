//! # Unpack Subcommand

use std::path::PathBuf;

use adp_pack::{AnyPackage, Package};
use anyhow::Result;
use clap::Args;

use crate::report_failure;

/// Arguments for the `adp unpack` subcommand.
#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// Package to extract (.adpkg file or OCI layout directory).
    #[arg(long)]
    pub pkg: PathBuf,

    /// Destination directory, created if absent.
    #[arg(long)]
    pub out: PathBuf,
}

/// Execute the unpack subcommand.
pub fn run_unpack(args: &UnpackArgs) -> Result<u8> {
    let result = AnyPackage::open(&args.pkg).and_then(|pkg| pkg.unpack(&args.out));
    match result {
        Ok(target) => {
            println!("OK: unpacked to {}", target.display());
            Ok(0)
        }
        Err(e) => report_failure("unpack", e),
    }
}
