use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueHint};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trip_tools::YearlyDistance;
use trip_tools::distance::{km_to_nautical_miles, total_km};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Total up per-year travelled distance from KML trip logs",
    long_about = None
)]
struct Cli {
    /// KML trip logs to measure
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    kml_path: Vec<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    for path in &cli.kml_path {
        if !path.is_file() {
            error!("'{}' does not exist or is not a file", path.display());
            continue;
        }
        info!("reading '{}'", path.display());
        match trip_tools::distances_by_year(path) {
            Ok(years) => print_report(&years),
            Err(err) => error!("{}", err),
        }
    }
}

fn print_report(years: &[YearlyDistance]) {
    for year in years {
        println!(
            "Distance for {}: {:.2}nm ({:.2} km)",
            year.year,
            km_to_nautical_miles(year.kilometers),
            year.kilometers
        );
    }
    let total = total_km(years);
    println!(
        "Total distance: {:.2}nm ({:.2} km)",
        km_to_nautical_miles(total),
        total
    );
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
