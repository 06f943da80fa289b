#![forbid(unsafe_code)]
//! # Coverage Metrics CLI
//!
//! Command-line interface for the `coverage_metrics` crate.
//!
//! ## Commands
//! - `merge`: attach collapsed NER labels to a post corpus.
//! - `metrics`: compute windowed post/word shares and their percent changes
//!   for one window width and write all result tables.
//!
//! ## Example
//! ```bash
//! cargo run --release -- merge --posts posts.csv --ner ner.json --out merged.csv
//! cargo run --release -- metrics merged.csv rtsi.csv 7 --out-dir results
//! ```
//!
//! See `--help` for all available options.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use coverage_metrics::{
    ExportFormat, LabelDictionary, MetricsOptions, PipelineError, WindowWidth, run_merge,
    run_metrics,
};
use log::error;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Optional JSON label dictionary ({"label": ["pattern", ...]}); built-in labels otherwise
    #[arg(long, global = true)]
    labels: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach NER country labels to posts
    Merge {
        /// Post corpus (CSV with ID, date, text)
        #[arg(long)]
        posts: PathBuf,

        /// NER output (JSON object keyed by post ID)
        #[arg(long)]
        ner: PathBuf,

        /// Output CSV for the labeled corpus
        #[arg(long)]
        out: PathBuf,
    },
    /// Compute time-sliced coverage metrics and percent changes
    Metrics {
        /// Labeled post corpus (CSV)
        posts: PathBuf,

        /// External index series (CSV)
        index: PathBuf,

        /// Window width in days (>= 1)
        #[arg(allow_negative_numbers = true)]
        window_width: i64,

        /// Directory receiving the <width>days/ result folder
        #[arg(long, default_value = "metrics_percent_results")]
        out_dir: PathBuf,

        /// Output format for export (csv, tsv)
        #[arg(long, default_value = "csv")]
        export_format: ExportFormat,

        /// Date column of the index file
        #[arg(long, default_value = "date")]
        index_date_col: String,

        /// Value column of the index file
        #[arg(long, default_value = "close")]
        index_value_col: String,
    },
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    match cli.command {
        Command::Merge { posts, ner, out } => {
            let dictionary = LabelDictionary::load(cli.labels.as_deref())?;
            let summary = run_merge(&posts, &ner, &out, &dictionary)?;
            println!(
                "Merged labels into {} posts ({} labeled). Results saved to {}",
                summary.posts,
                summary.posts_with_labels,
                out.display()
            );
        }
        Command::Metrics {
            posts,
            index,
            window_width,
            out_dir,
            export_format,
            index_date_col,
            index_value_col,
        } => {
            // Reject the width before touching any file.
            let window_width = WindowWidth::new(window_width)?;
            let opts = MetricsOptions {
                window_width,
                out_dir,
                export_format,
                index_date_column: index_date_col,
                index_value_column: index_value_col,
            };
            let dictionary = LabelDictionary::load(cli.labels.as_deref())?;
            let report = run_metrics(&posts, &index, &dictionary, &opts)?;
            println!(
                "Calculated {} windows of {} day(s); wrote {} files to {}",
                report.windows,
                opts.window_width,
                report.written.len(),
                opts.out_dir.display()
            );
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("Error: {}", e);
        eprintln!("Error: {e}");
        if let PipelineError::Usage(_) = e {
            eprintln!(
                "Usage: coverage_metrics metrics <POSTS> <INDEX> <WINDOW_WIDTH>  (WINDOW_WIDTH >= 1)"
            );
        }
        process::exit(e.exit_code());
    }
}
