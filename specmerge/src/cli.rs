use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "specmerge")]
#[command(about = "Merges official and aggregator phone spec scrapes into one upload-ready record")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/specmerge.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Alternate configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for per-device details, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge one device and print the merged record as JSON
    Merge {
        /// Manufacturer scrape (JSON)
        #[arg(long, value_name = "FILE")]
        official: PathBuf,

        /// Aggregator scrape (JSON)
        #[arg(long, value_name = "FILE")]
        unofficial: PathBuf,

        /// Previously stored row for the same device (JSON)
        #[arg(long, value_name = "FILE")]
        existing: Option<PathBuf>,

        #[arg(long)]
        brand: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Print the upload row instead of the full merged record
        #[arg(long)]
        row: bool,
    },

    /// Merge every device in a job file
    Batch {
        /// JSON array of jobs, or an object with a "devices" array
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Write upload rows to this zstd JSONL file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the batch summary as JSON
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,

        /// Concurrent merges (overrides config)
        #[arg(short = 'j', long, value_name = "N")]
        concurrency: Option<usize>,

        /// Status for written rows (overrides config)
        #[arg(long)]
        status: Option<String>,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Batch { concurrency: Some(n), .. }) = &self.command {
            if *n == 0 {
                return Err("Concurrency must be greater than 0".to_string());
            }
            if *n > 64 {
                return Err("Concurrency cannot exceed 64 to avoid overwhelming image hosts".to_string());
            }
        }

        if !self.init && self.command.is_none() {
            return Err("A subcommand is required (merge or batch), or use --init".to_string());
        }

        Ok(())
    }
}
