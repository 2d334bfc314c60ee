//! # typegen CLI entry point
//!
//! Parses command-line arguments, resolves configuration and dispatches to
//! subcommand handlers. Failures exit with the code of the stage they
//! happened in.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use typegen_cli::build::{run_build, BuildArgs};
use typegen_cli::check::{run_check, CheckArgs};
use typegen_cli::config::{Overrides, Settings};
use typegen_cli::generate::{run_generate, GenerateArgs};
use typegen_cli::lock::{run_lock, LockArgs};
use typegen_cli::publish::{run_publish, PublishArgs};
use typegen_cli::stage::Stage;

/// Metadata-driven TypeScript binding generator.
///
/// Fetches a node's self-describing metadata, emits TypeScript declarations
/// for its types and modules, and keeps committed bindings from drifting.
#[derive(Parser, Debug)]
#[command(name = "typegen", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file (default: typegen.yaml at the project root).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Node JSON-RPC endpoint.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Namespace the bindings are generated for.
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Directory holding one subdirectory of bindings per namespace.
    #[arg(long, global = true)]
    target_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch metadata and write fresh bindings.
    Generate(GenerateArgs),

    /// Verify committed bindings against the cached metadata. Never writes.
    Check(CheckArgs),

    /// Verify the lock, compile and package the bindings.
    Build(BuildArgs),

    /// Build, then stage the package for publication.
    Publish(PublishArgs),

    /// Generate or verify the version lock file.
    Lock(LockArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level.
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let root = typegen_cli::find_project_root(&cwd).unwrap_or_else(|| {
        tracing::debug!("no typegen.yaml found above the current directory");
        cwd.clone()
    });
    tracing::debug!(root = %root.display(), "resolved project root");

    let flags = Overrides {
        config: cli.config,
        endpoint: cli.endpoint,
        namespace: cli.namespace,
        target_dir: cli.target_dir,
    };
    let settings = match Settings::load(&root, &flags, |k| std::env::var(k).ok()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{:#}", e.context(Stage::Config));
            return ExitCode::from(Stage::Config.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Generate(args) => run_generate(&args, &settings),
        Commands::Check(args) => run_check(&args, &settings),
        Commands::Build(args) => run_build(&args, &settings),
        Commands::Publish(args) => run_publish(&args, &settings),
        Commands::Lock(args) => run_lock(&args, &settings),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(Stage::of(&e).map_or(1, Stage::exit_code))
        }
    }
}
