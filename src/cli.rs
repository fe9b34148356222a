use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use quire::FormatFamily;

#[derive(Parser)]
#[command(name = "quire")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recover .docx and .doc documents from raw disk images and memory dumps", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Carve documents out of an image and write them with a report
    Recover {
        /// Disk image, memory dump or extracted fragment
        input: PathBuf,

        /// Base output directory (overrides the config file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        max_files: Option<usize>,

        #[arg(long)]
        window_size: Option<usize>,

        #[arg(long)]
        overlap: Option<usize>,

        #[arg(long)]
        max_block: Option<u64>,

        /// Write straight into the output directory instead of a fresh run directory
        #[arg(long)]
        no_run_dir: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count windows holding a signature and its marker
    Scan {
        input: PathBuf,

        #[arg(long, default_value = "docx", value_parser = parse_family)]
        family: FormatFamily,

        /// Write every hit window to this directory
        #[arg(long)]
        fragments: Option<PathBuf>,

        #[arg(long)]
        window_size: Option<usize>,

        #[arg(long)]
        overlap: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Analyze documents already on disk
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_family(value: &str) -> Result<FormatFamily, String> {
    FormatFamily::from_extension(value)
        .ok_or_else(|| format!("unknown family '{}' (expected docx or doc)", value))
}

pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn for_source(source_size: u64, message: &str) -> Self {
        let bar = ProgressBar::new(source_size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .expect("invalid progress bar template - this is a bug")
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}
