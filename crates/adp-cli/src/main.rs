//! # adp CLI entry point
//!
//! Parses command-line arguments, installs logging, resolves the schema
//! source, and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use adp_cli::inspect::{run_inspect, InspectArgs};
use adp_cli::pack::{run_bundle, run_pack, BundleArgs, PackArgs};
use adp_cli::unpack::{run_unpack, UnpackArgs};
use adp_cli::validate::{run_validate, ValidateArgs};
use adp_cli::verify::{run_verify, VerifyArgs};
use adp_cli::{SchemaSource, SCHEMA_DIR_ENV};

/// Agent Definition Protocol CLI
///
/// Validates ADP manifests and ACS container specs, and builds, unpacks,
/// inspects and verifies ADPKG packages.
#[derive(Parser, Debug)]
#[command(name = "adp", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding *.schema.json files.
    #[arg(long, global = true)]
    schemas: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate ADP and/or ACS files against schemas.
    Validate(ValidateArgs),

    /// Pack an ADPKG with manifest, container spec, source, and eval assets.
    Pack(PackArgs),

    /// Package an agent source tree as an OCI layout or ADPKG archive.
    Bundle(BundleArgs),

    /// Unpack a package into a directory.
    Unpack(UnpackArgs),

    /// Show identity and build metadata of a package.
    Inspect(InspectArgs),

    /// Check package integrity.
    Verify(VerifyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG overrides the -v level when set.
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("adp CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let schemas = SchemaSource::resolve(
        cli.schemas.as_deref(),
        std::env::var_os(SCHEMA_DIR_ENV),
        &cwd,
    );
    tracing::debug!(?schemas, "resolved schema source");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args, &schemas),
        Commands::Pack(args) => run_pack(&args, &schemas),
        Commands::Bundle(args) => run_bundle(&args, &schemas),
        Commands::Unpack(args) => run_unpack(&args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Verify(args) => run_verify(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("FAIL: {e:#}");
            ExitCode::from(1)
        }
    }
}
