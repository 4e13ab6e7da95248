//! Fuelboard CLI - Fleet fuel log reports
//!
//! # Main Commands
//!
//! ```bash
//! fuelboard serve                          # Start HTTP server (port 3000)
//! fuelboard report fuel.csv                # Full report as JSON
//! fuelboard export fuel.csv --summary s.csv --detail d.csv
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! fuelboard parse fuel.csv                 # Raw rows as JSON
//! fuelboard normalize fuel.csv             # Derived records as JSON
//! ```
//!
//! Global options (`--diesel-tag`, `--month-first`, `--top-n`) override the
//! `FUELBOARD_*` environment variables.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fuelboard::{
    api::logs::LOG_BROADCASTER,
    config::{DateOrder, PipelineConfig},
    error::PipelineResult,
    export::{export_records, export_vehicle_summary},
    models::FuelCategory,
    parser::parse_file_auto,
    transform::{load_parsed, run_file, FilterParams, FuelReport},
    validation::parse_filter_params,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fuelboard")]
#[command(about = "Aggregate fleet fuel logs into consumption reports", long_about = None)]
struct Cli {
    /// Vehicle id fragment marking the diesel fleet
    #[arg(long, global = true)]
    diesel_tag: Option<String>,

    /// Read NN/NN/YYYY dates month first
    #[arg(long, global = true)]
    month_first: bool,

    /// Length of the top consumers list
    #[arg(long, global = true)]
    top_n: Option<usize>,

    /// Do not echo pipeline logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output raw rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize and derive records, output them as JSON
    Normalize {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: CSV to records to filtered report JSON
    Report {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the vehicle summary and detail records as CSV
    Export {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Vehicle summary CSV
        #[arg(long)]
        summary: PathBuf,

        /// Detail records CSV
        #[arg(long)]
        detail: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// First day kept (YYYY-MM-DD), needs --to
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day kept (YYYY-MM-DD), needs --from
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Keep only this category (repeatable)
    #[arg(long = "category")]
    categories: Vec<FuelCategory>,

    /// Keep only this vehicle (repeatable)
    #[arg(long = "vehicle")]
    vehicles: Vec<String>,

    /// JSON filter document; flags are applied on top of it
    #[arg(long)]
    filter_file: Option<PathBuf>,
}

impl FilterArgs {
    fn into_params(self) -> Result<FilterParams, Box<dyn std::error::Error>> {
        let mut params = match self.filter_file {
            Some(path) => parse_filter_params(&fs::read_to_string(path)?)?,
            None => FilterParams::default(),
        };

        if self.from.is_some() {
            params.date_from = self.from;
        }
        if self.to.is_some() {
            params.date_to = self.to;
        }
        params.categories.extend(self.categories);
        params.vehicle_ids.extend(self.vehicles);

        Ok(params)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        LOG_BROADCASTER.set_echo(false);
    }

    let result = match build_config(&cli) {
        Ok(config) => match cli.command {
            Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

            Commands::Normalize { input, output } => cmd_normalize(&input, output.as_deref(), &config),

            Commands::Report { input, filter, output } => {
                cmd_report(&input, filter, output.as_deref(), &config)
            }

            Commands::Export {
                input,
                filter,
                summary,
                detail,
            } => cmd_export(&input, filter, &summary, detail.as_deref(), &config),

            Commands::Serve { port } => cmd_serve(port, config).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Environment first, then CLI flags.
fn build_config(cli: &Cli) -> PipelineResult<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;

    if let Some(tag) = &cli.diesel_tag {
        config = config.with_diesel_tag(tag.as_str())?;
    }
    if cli.month_first {
        config = config.with_date_order(DateOrder::MonthFirst);
    }
    if let Some(top_n) = cli.top_n {
        config = config.with_top_n(top_n)?;
    }

    Ok(config)
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Parsing CSV: {}", input.display());

    let result = parse_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("Parsed {} rows", result.rows.len());

    let json = serde_json::to_string_pretty(&json!({
        "encoding": result.encoding,
        "delimiter": result.delimiter.to_string(),
        "headers": result.headers,
        "rows": result.rows,
    }))?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_normalize(
    input: &Path,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Normalizing: {}", input.display());

    let source = load_parsed(parse_file_auto(input)?, config);
    let stats = &source.stats;

    eprintln!("   Kept: {} of {}", stats.kept_rows, stats.raw_rows);
    eprintln!(
        "   Dropped: {} (invalid date: {}, missing vehicle id: {})",
        stats.dropped_invalid_date + stats.dropped_missing_vehicle_id,
        stats.dropped_invalid_date,
        stats.dropped_missing_vehicle_id
    );
    eprintln!("   Ambiguous dates: {}", stats.ambiguous_dates);

    let json = serde_json::to_string_pretty(source.records.as_ref())?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_report(
    input: &Path,
    filter: FilterArgs,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_report(input, filter, config)?;

    let json = serde_json::to_string_pretty(&report)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_export(
    input: &Path,
    filter: FilterArgs,
    summary: &Path,
    detail: Option<&Path>,
    config: &PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = build_report(input, filter, config)?;

    export_vehicle_summary(summary, &report.per_vehicle)?;
    eprintln!("Vehicle summary written to: {}", summary.display());

    if let Some(path) = detail {
        export_records(path, &report.records)?;
        eprintln!("{} records written to: {}", report.records.len(), path.display());
    }

    Ok(())
}

fn build_report(
    input: &Path,
    filter: FilterArgs,
    config: &PipelineConfig,
) -> Result<FuelReport, Box<dyn std::error::Error>> {
    eprintln!("Processing: {}", input.display());
    let params = filter.into_params()?;
    Ok(run_file(input, &params, config, None)?)
}

async fn cmd_serve(port: u16, config: PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    fuelboard::server::start_server(port, config).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
