//! onnprep - MGnify abundance table preprocessing CLI
//!
//! Checks input tables, converts them to npz batches and merges batches.

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use onn_preprocess::archive::merge_directory;
use onn_preprocess::data::{check_files, DataLoader};
use onn_preprocess::error::Result;
use onn_preprocess::pipeline::{run_convert, PrepConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the failing-table listing written by `check`.
const ERROR_LIST: &str = "error_files.tsv";

/// Convert MGnify abundance tables to ontology-aware training arrays
#[derive(Parser)]
#[command(name = "onnprep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML configuration; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (Error, Warn, Info, Debug, Trace)
    #[arg(long, global = true, default_value = "Info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by subcommands that read tables.
#[derive(Args, Debug)]
struct InputArgs {
    /// Directory of `<biome>/<table>` files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of header lines in each table
    #[arg(long)]
    header: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every table and list the failing ones
    Check {
        #[command(flatten)]
        io: InputArgs,
    },

    /// Convert one batch of tables (or all of them) into an npz archive
    Convert {
        #[command(flatten)]
        io: InputArgs,

        /// Directory holding species_tree and biome_tree
        #[arg(short, long)]
        tree_dir: Option<PathBuf>,

        /// Conversion parameter cache
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Worker threads (0 = all cores)
        #[arg(short = 'p', long)]
        n_jobs: Option<usize>,

        /// Batch to convert; all tables when omitted
        #[arg(short, long)]
        batch_index: Option<usize>,

        /// Tables per batch
        #[arg(short = 's', long)]
        batch_size: Option<usize>,
    },

    /// Concatenate batch_<n>.npz archives into merged_matrices.npz
    Merge {
        /// Directory of batch archives
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (defaults to the input directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a configuration file with default settings
    ExampleConfig {
        /// Output path for the YAML file
        #[arg(short, long, default_value = "prep.yaml")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = cli.log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!(
            "Warning: Invalid log level '{}' provided. Defaulting to Info.",
            cli.log_level
        );
        log::LevelFilter::Info
    });
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Check { io } => cmd_check(apply_io(config, io)),

        Commands::Convert {
            io,
            tree_dir,
            cache,
            n_jobs,
            batch_index,
            batch_size,
        } => {
            let mut config = apply_io(config, io);
            if let Some(dir) = tree_dir {
                config.tree_dir = dir;
            }
            if let Some(path) = cache {
                config.cache_path = path;
            }
            if let Some(n) = n_jobs {
                config.n_jobs = n;
            }
            if batch_index.is_some() {
                config.batch_index = batch_index;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            cmd_convert(&config)
        }

        Commands::Merge { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            cmd_merge(&input, &output)
        }

        Commands::ExampleConfig { output } => cmd_example_config(&config, &output),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<PrepConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            PrepConfig::load(path)
        }
        None => Ok(PrepConfig::default()),
    }
}

fn apply_io(mut config: PrepConfig, io: InputArgs) -> PrepConfig {
    if let Some(dir) = io.input {
        config.input_dir = dir;
    }
    if let Some(dir) = io.output {
        config.output_dir = dir;
    }
    if let Some(header) = io.header {
        config.table.header = header;
    }
    config
}

/// Validate tables and write the failing ones to `error_files.tsv`
fn cmd_check(config: PrepConfig) -> Result<()> {
    let loader = DataLoader::discover(&config.input_dir)?;
    for (biome, count) in loader.sample_counts() {
        info!("{}: {} tables", biome, count);
    }

    let report = check_files(loader.files(), &config.table);
    fs::create_dir_all(&config.output_dir)?;
    let path = config.output_dir.join(ERROR_LIST);
    report.write_error_list(&path)?;

    eprint!("{}", report);
    if report.is_clean() {
        eprintln!("All tables passed");
    } else {
        warn!("{} failing tables listed in {:?}", report.issues.len(), path);
    }
    Ok(())
}

fn cmd_convert(config: &PrepConfig) -> Result<()> {
    let path = run_convert(config)?;
    eprintln!("Done! Wrote {:?}", path);
    Ok(())
}

fn cmd_merge(input: &Path, output: &Path) -> Result<()> {
    let path = merge_directory(input, output)?;
    eprintln!("Done! Wrote {:?}", path);
    Ok(())
}

fn cmd_example_config(config: &PrepConfig, output_path: &Path) -> Result<()> {
    let yaml = config.to_yaml()?;
    fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);
    Ok(())
}
