//! `ml-ingest` command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use ml_ingest::config::{IngestionConfig, SourceConfig};
use ml_ingest::datasource::{DataSource, SourceRequest};
use ml_ingest::ingestion::{IngestionManager, Partition};
use ml_ingest::logging::{init_logging, level_for_verbosity, LogFormat};
use ml_ingest::summary::{summarize, write_summary_artifacts};
use ml_ingest::Result;

/// Load tables through pluggable sources and split them into reproducible train/test artifacts.
#[derive(Parser, Debug)]
#[command(name = "ml-ingest", version, about)]
struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the 3-row demonstration table through the resolved driver
    Sample(SampleArgs),
    /// Load a source, persist raw/train/test artifacts, and print partition sizes
    Ingest(IngestArgs),
    /// Print a persisted partition
    Show(ShowArgs),
    /// Summarize the raw partition and write summary artifacts
    Summary(SummaryArgs),
}

/// Where the ingestion artifacts live.
#[derive(Args, Debug, Clone)]
struct ArtifactArgs {
    /// Ingestion config file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Artifact directory
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Artifact format (a registered extension such as csv, json, pkl, joblib)
    #[arg(long)]
    format: Option<String>,
}

impl ArtifactArgs {
    fn load(&self) -> Result<IngestionConfig> {
        let mut cfg = match &self.config {
            Some(path) => IngestionConfig::from_json_file(path)?,
            None => IngestionConfig::default(),
        };
        if let Some(dir) = &self.artifacts {
            cfg.artifact_dir = dir.clone();
        }
        if let Some(format) = &self.format {
            cfg.artifact_format = format.clone();
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct SampleArgs {
    /// Destination location
    location: String,

    /// Explicit source kind (defaults to the location's extension)
    #[arg(long)]
    kind: Option<String>,

    /// Source config (JSON) passed to the driver
    #[arg(long)]
    source_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Source location (falls back to the config's ingest_location)
    location: Option<String>,

    #[command(flatten)]
    artifacts: ArtifactArgs,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// raw, train or test
    partition: String,

    /// Rows to print (all when omitted)
    #[arg(long)]
    rows: Option<usize>,

    #[command(flatten)]
    artifacts: ArtifactArgs,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    /// Output directory for summary artifacts
    #[arg(long, default_value = "summary")]
    out: PathBuf,

    #[command(flatten)]
    artifacts: ArtifactArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(level_for_verbosity(cli.verbose), cli.log_format) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Sample(args) => run_sample(args),
        Commands::Ingest(args) => run_ingest(args),
        Commands::Show(args) => run_show(args),
        Commands::Summary(args) => run_summary(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let config = match &args.source_config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| ml_ingest::Error::Config {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
            SourceConfig::from_json_str(&text)?
        }
        None => SourceConfig::default(),
    };
    let request = SourceRequest {
        kind: args.kind,
        location: Some(args.location),
        config,
    };
    let table = DataSource::new().write_sample(&request)?;
    print!("{table}");
    Ok(())
}

fn run_ingest(args: IngestArgs) -> Result<()> {
    let config = args.artifacts.load()?;
    let mut manager = IngestionManager::new(config, DataSource::new());
    if let Some(location) = args.location {
        manager.set_ingest_location(location);
    }
    let parts = manager.run()?;
    for partition in Partition::ALL {
        println!(
            "{partition}: {} rows -> {}",
            parts.get(partition).row_count(),
            manager.partition_path(partition).display()
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let partition: Partition = args.partition.parse()?;
    let manager = IngestionManager::new(args.artifacts.load()?, DataSource::new());
    let table = manager.get_model_data(partition)?;
    match args.rows {
        Some(n) => print!("{}", table.head(n)),
        None => print!("{table}"),
    }
    Ok(())
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    let source = DataSource::new();
    let manager = IngestionManager::new(args.artifacts.load()?, source.clone());
    let raw = manager.get_model_data(Partition::Raw)?;
    let summary = summarize(&raw);
    println!("rows={} columns={}", summary.shape.rows, summary.shape.columns);
    print!("{}", summary.describe);
    for path in write_summary_artifacts(&summary, &args.out, &source)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}
