use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use json_projection_core::{flatten, project, Manifest, Rule};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "json-projection")]
#[command(about = "Project JSON documents through declarative mapping rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a document through a rule catalog
    Project {
        /// Input data file
        data: PathBuf,

        /// Rule catalog file (a JSON list of rules)
        #[arg(short, long)]
        rules: PathBuf,

        /// Output file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Flatten a document to its `path = value` pairs
    Flatten {
        /// Input data file
        data: PathBuf,
    },

    /// Show the manifest a rule catalog produces for a document
    Manifest {
        /// Input data file
        data: PathBuf,

        /// Rule catalog file (a JSON list of rules)
        #[arg(short, long)]
        rules: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Project {
            data,
            rules,
            output,
            format,
        } => {
            let data = read_json(&data)?;
            let rules = read_rules(&rules)?;

            let projection = project(&data, &rules)
                .map_err(|e| anyhow::Error::from(e).context("Projection failed"))?;

            write_json(&projection, output.as_ref(), format)?;
        }

        Commands::Flatten { data } => {
            let data = read_json(&data)?;
            let mut stdout = io::stdout().lock();
            for (path, value) in flatten(&data) {
                writeln!(stdout, "{path} = {value}")?;
            }
        }

        Commands::Manifest { data, rules } => {
            let data = read_json(&data)?;
            let rules = read_rules(&rules)?;
            let manifest = Manifest::build(&data, &rules);

            let mut stdout = io::stdout().lock();
            for (path, value) in &manifest.entries {
                writeln!(stdout, "{path} = {value}")?;
            }
            for filter in &manifest.filters {
                writeln!(stdout, "filter {:?} at {}", filter.kind, filter.path)?;
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse JSON from: {}", path.display()))
}

fn read_rules(path: &Path) -> Result<Vec<Rule>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse rule catalog from: {}", path.display()))
}

fn write_json(value: &Value, output: Option<&PathBuf>, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    match output {
        Some(path) => {
            fs::write(path, rendered + "\n")
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
