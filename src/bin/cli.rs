//! voyager CLI - batch analysis of ship logs against occurrence data
//!
//! Usage:
//!   voyager-cli analyse <logs> <occurrences> [--output <dir>] [--vessel-name <name>]
//!   voyager-cli coordinates <log> [--output <file>]
//!
//! `analyse` builds one voyage per position-log file, runs the evidence
//! cascade against the occurrence table, and writes one annotated table
//! per voyage. A voyage that fails is logged and skipped so the rest of
//! the batch completes.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info};
use voyager::{
    cache::records_for_voyage, io, occurrences::MatchStats, voyage::vessel_from_stem, MatchConfig,
    MemoryCache, OccurrenceMatcher, OccurrenceTable, Route, RouteConfig, Voyage,
};

#[derive(Parser)]
#[command(name = "voyager-cli")]
#[command(about = "Ship trajectory reconstruction and occurrence attribution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match occurrence records against every voyage in a log folder
    Analyse {
        /// Position log file or folder of `<vessel>_<years>.csv` logs
        logs: PathBuf,

        /// Tab-delimited occurrence table (DwC-A occurrence.txt layout)
        occurrences: PathBuf,

        /// Output directory for annotated tables
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Only process this vessel
        #[arg(short = 'n', long)]
        vessel_name: Option<String>,

        /// Known collector surname (repeatable)
        #[arg(short, long = "collector")]
        collectors: Vec<String>,

        /// Expedition label hint
        #[arg(short, long)]
        expedition: Option<String>,

        /// Stop after this many voyages
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export a voyage's normalised route coordinates as JSON
    Coordinates {
        /// Position log file
        log: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyse {
            logs,
            occurrences,
            output,
            vessel_name,
            collectors,
            expedition,
            limit,
        } => run_analyse(
            &logs,
            &occurrences,
            &output,
            vessel_name.as_deref(),
            collectors,
            expedition,
            limit,
        ),
        Commands::Coordinates { log, output } => run_coordinates(&log, output.as_deref()),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run_analyse(
    logs: &Path,
    occurrences: &Path,
    output: &Path,
    vessel_filter: Option<&str>,
    collectors: Vec<String>,
    expedition: Option<String>,
    limit: Option<usize>,
) -> voyager::Result<()> {
    fs::create_dir_all(output)?;

    let table = io::read_occurrences(occurrences)?;
    let cache = MemoryCache::new();

    let mut total = 0usize;
    let mut error_totals: BTreeMap<String, usize> = BTreeMap::new();
    let mut processed = 0usize;

    for log_file in log_files(logs)? {
        let Some(stem) = log_file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let vessel = vessel_from_stem(stem).unwrap_or_else(|| stem.to_lowercase());

        if vessel_filter.is_some_and(|filter| filter != vessel) {
            continue;
        }

        // A single bad voyage must not abort the batch
        match process_voyage(
            &log_file,
            &vessel,
            &table,
            &cache,
            &collectors,
            expedition.as_deref(),
            output,
        ) {
            Ok(stats) => {
                total += stats.total;
                for (flag, count) in stats.errors {
                    *error_totals.entry(flag).or_insert(0) += count;
                }
            }
            Err(err) => {
                error!("Skipping voyage {}: {}", vessel, err);
                continue;
            }
        }

        processed += 1;
        if limit.is_some_and(|limit| processed >= limit) {
            break;
        }
    }

    println!("Total: {}", total);
    for (flag, count) in error_totals {
        println!("{}: {}", flag, count);
    }

    Ok(())
}

fn process_voyage(
    log_file: &Path,
    vessel: &str,
    table: &OccurrenceTable,
    cache: &MemoryCache,
    collectors: &[String],
    expedition: Option<&str>,
    output: &Path,
) -> voyager::Result<MatchStats> {
    let positions = io::read_positions(log_file)?;
    let route = Route::from_positions(positions, &RouteConfig::default())?;

    // The first fleet logs cover two vessels under one expedition label
    let (vessel, expedition) = if vessel == "first_fleet" {
        ("supply+sirius".to_string(), Some("first fleet".to_string()))
    } else {
        (vessel.to_string(), expedition.map(str::to_string))
    };

    let mut voyage = Voyage::new(vessel, route).with_collectors(collectors.to_vec());
    if let Some(expedition) = expedition {
        voyage = voyage.with_expedition(expedition);
    }

    info!(
        "Analysing {} {} - {}",
        voyage.vessel,
        voyage.route.year_from(),
        voyage.route.year_to()
    );

    let candidates = records_for_voyage(
        cache,
        &table.records,
        &voyage.vessel,
        voyage.route.year_from(),
        voyage.route.year_to(),
    );

    let matcher = OccurrenceMatcher::for_voyage(&voyage, MatchConfig::default());
    let matches = matcher.run(&candidates);
    let stats = MatchStats::from_matches(&matches);

    let out_file = output.join(voyage.output_file_name());
    io::write_annotated(&out_file, &table.columns, &matches, &voyage.vessel)?;

    Ok(stats)
}

fn run_coordinates(log: &Path, output: Option<&Path>) -> voyager::Result<()> {
    let positions = io::read_positions(log)?;
    let route = Route::from_positions(positions, &RouteConfig::default())?;
    let coordinates = route.export_coordinates();

    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &coordinates)?;
            info!("Saved {} coordinates to {}", coordinates.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer(stdout.lock(), &coordinates)?;
            println!();
        }
    }

    Ok(())
}

/// Collect position log files: a folder's `*.csv` entries in sorted
/// order, or the single file given.
fn log_files(path: &Path) -> voyager::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();

    // Deterministic processing order
    files.sort();

    Ok(files)
}
