use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueHint};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Split multi-track GPX trip exports into one file per track",
    long_about = None
)]
struct Cli {
    /// GPX files to split
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    gpx_path: Vec<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Best effort across inputs: one bad file must not sink the run.
    for path in &cli.gpx_path {
        if !path.is_file() {
            error!("'{}' does not exist or is not a file", path.display());
            continue;
        }
        info!("reading '{}'", path.display());
        match trip_tools::split_gpx_file(path) {
            Ok(written) => info!("wrote {} track files", written.len()),
            Err(err) if err.is_invalid_input() => {
                error!("{}", err);
                error!("is this an exported trip from Backcountry Navigator?");
            }
            Err(err) => error!("{}", err),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
