#![forbid(unsafe_code)]

mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tailpak::pak;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tailpak", version, about = "Attach files to the end of an executable")]
struct Cli {
    /// Debug-level logging.
    #[arg(long, short, global = true, env = "TAILPAK_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive wizard (terminal).
    Ui,

    /// Copy a base file and append every file of a directory plus a trailer.
    Pack {
        /// Base file, usually an executable.
        #[arg(long)]
        source: PathBuf,
        /// Output file.
        #[arg(long)]
        dest: PathBuf,
        /// Directory whose files get attached (recursive).
        #[arg(long)]
        data: PathBuf,
    },

    /// Recreate the attached files under a directory (wiped first).
    Extract {
        /// Output directory.
        #[arg(long)]
        dest: PathBuf,
        /// Packed file. Defaults to this executable.
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// List entries in a packed file.
    List {
        #[arg(long)]
        pak: PathBuf,
        /// Print offsets, sizes and hashes too.
        #[arg(long, default_value_t = false)]
        long: bool,
    },

    /// Verify trailer and payload hashes without extracting.
    Verify {
        #[arg(long)]
        pak: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env("TAILPAK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn run_pack(source: PathBuf, dest: PathBuf, data: PathBuf) -> pak::PakResult<()> {
    let report = pak::spawn_pack(source, dest, data).drain(|e| pak::log_event(&e))?;
    if !report.skipped.is_empty() {
        tracing::warn!(skipped = report.skipped.len(), "some files were not attached");
    }
    Ok(())
}

pub(crate) fn run_extract(dest: PathBuf, source: Option<PathBuf>) -> pak::PakResult<()> {
    let report = pak::spawn_extract(dest, source).drain(|e| pak::log_event(&e))?;
    if !report.failed.is_empty() {
        return Err(pak::PakError::Invalid(format!(
            "{} of {} files failed to extract",
            report.failed.len(),
            report.failed.len() + report.extracted.len()
        )));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let res = match cli.cmd {
        Command::Ui => ui::run(),
        Command::Pack { source, dest, data } => run_pack(source, dest, data),
        Command::Extract { dest, source } => run_extract(dest, source),
        Command::List { pak, long } => pak::list(&pak, long),
        Command::Verify { pak } => pak::verify_print(&pak),
    };

    if let Err(e) = res {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
