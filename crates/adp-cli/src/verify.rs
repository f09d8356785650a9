//! # Verify Subcommand
//!
//! OCI layouts: every blob reachable from `index.json` must hash to its
//! name and match its descriptor's size. OPC archives: every entry must
//! decompress with a valid CRC and the manifest entry must be present.

use std::path::PathBuf;

use adp_pack::{AnyPackage, Package};
use anyhow::Result;
use clap::Args;

use crate::report_failure;

/// Arguments for the `adp verify` subcommand.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Package to verify (.adpkg file or OCI layout directory).
    #[arg(long)]
    pub pkg: PathBuf,
}

/// Execute the verify subcommand.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let result = AnyPackage::open(&args.pkg).and_then(|pkg| pkg.verify().map(|()| pkg));
    match result {
        Ok(pkg) => {
            println!(
                "OK: {} package integrity verified: {}",
                pkg.format(),
                pkg.path().display()
            );
            Ok(0)
        }
        Err(e) => report_failure("verify", e),
    }
}
