//! # Publish Subcommand
//!
//! Build the package, copy it into `<dist_dir>/` and run the configured
//! publish command from there. The registry itself is out of reach; when
//! the publish command fails the staged copy is removed again.

use anyhow::{anyhow, Context, Result};
use clap::Args;

use typegen_codegen::load_committed;

use crate::build::{build_package, install_dir, run_command, write_files};
use crate::config::Settings;
use crate::stage::Stage;

/// Arguments for the `typegen publish` subcommand.
#[derive(Args, Debug, Default)]
pub struct PublishArgs {
    /// Skip the configured compile command.
    #[arg(long)]
    pub no_compile: bool,

    /// Stage the package without running the publish command.
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the publish subcommand.
pub fn run_publish(args: &PublishArgs, settings: &Settings) -> Result<u8> {
    let package = build_package(settings, !args.no_compile)?;
    let name = package
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", package.display()))
        .context(Stage::Publish)?;
    let staged = settings.dist_dir.join(name);

    let files = load_committed(&package)
        .with_context(|| format!("failed to read package {}", package.display()))
        .context(Stage::Publish)?;
    install_dir(&staged, |dir| write_files(dir, &files)).context(Stage::Publish)?;
    tracing::info!(staged = %staged.display(), files = files.len(), "staged package");

    match (&settings.publish_command, args.dry_run) {
        (Some(command), false) => {
            if let Err(e) = run_command(command, &staged) {
                let _ = std::fs::remove_dir_all(&staged);
                return Err(e.context(Stage::Publish));
            }
            println!("OK: published {}", staged.display());
        }
        (Some(_), true) => println!("OK: staged {} (dry run)", staged.display()),
        (None, _) => println!("OK: staged {}", staged.display()),
    }
    Ok(0)
}
