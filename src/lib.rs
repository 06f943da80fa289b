#![forbid(unsafe_code)]
//! # Coverage metrics
//!
//! Batch pipeline measuring how much attention media posts pay to countries
//! over time. Posts are labeled with the country groups they mention, split
//! into subcorpora by publisher, counted in fixed-width windows over the span
//! of an external index (RTSI), normalized against per-window totals and
//! turned into period-over-period percent changes.
//!
//! Two entry points exist: [`run_merge`] attaches NER labels to posts and
//! [`run_metrics`] computes and writes all metric tables for one window width.

pub mod error;
pub mod io;
pub mod labels;
pub mod merge;
pub mod model;
pub mod partition;
pub mod pct;
pub mod reshape;
pub mod window;

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

pub use error::{PipelineError, Result};
pub use io::{ExportFormat, csv_safe_cell};
pub use labels::LabelDictionary;
pub use merge::{MergeSummary, NerOutput, merge_labels};
pub use model::{IndexPoint, IndexSeries, Post};
pub use partition::{PublisherGroup, Subcorpora, classify_publisher, partition};
pub use pct::{MetricsTable, pct_change};
pub use reshape::{GroupTable, reshape, reshape_by_group};
pub use window::{Window, WindowWidth, aggregate};

/// Options of a metrics run.
#[derive(Debug, Clone)]
pub struct MetricsOptions {
    pub window_width: WindowWidth,
    pub out_dir: PathBuf,
    pub export_format: ExportFormat,
    pub index_date_column: String,
    pub index_value_column: String,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            window_width: WindowWidth::default(),
            out_dir: PathBuf::from("metrics_percent_results"),
            export_format: ExportFormat::Csv,
            index_date_column: "date".to_string(),
            index_value_column: "close".to_string(),
        }
    }
}

/// What a metrics run produced.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub windows: usize,
    pub unassigned_posts: usize,
    pub posts_outside_index: usize,
    pub written: Vec<PathBuf>,
}

/// Computes the unified table of every subcorpus, control first.
pub fn compute_metrics(
    subcorpora: &Subcorpora,
    index: &IndexSeries,
    labels: &[String],
    width: WindowWidth,
) -> Vec<MetricsTable> {
    PublisherGroup::ALL
        .iter()
        .map(|&group| {
            let corpus = subcorpora.get(group);
            let windows = window::aggregate(corpus, index, labels, width);
            debug!(
                "{}: {} posts in {} windows",
                group.as_str(),
                corpus.len(),
                windows.len()
            );
            MetricsTable::from_windows(group, labels, &windows)
        })
        .collect()
}

/// Loads posts and index, computes every table and writes them under
/// `<out_dir>/<width>days/`. Nothing is written unless every stage succeeds.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use coverage_metrics::{LabelDictionary, MetricsOptions, WindowWidth, run_metrics};
///
/// let labels = LabelDictionary::builtin().unwrap();
/// let opts = MetricsOptions {
///     window_width: WindowWidth::new(7).unwrap(),
///     ..MetricsOptions::default()
/// };
/// let report = run_metrics(Path::new("posts.csv"), Path::new("rtsi.csv"), &labels, &opts).unwrap();
/// println!("{} windows", report.windows);
/// ```
pub fn run_metrics(
    posts_path: &Path,
    index_path: &Path,
    dictionary: &LabelDictionary,
    opts: &MetricsOptions,
) -> Result<MetricsReport> {
    let width = opts.window_width;
    info!("Calculating values for a time slice of {width} day(s)");
    let instant = Instant::now();

    let labels = dictionary.labels();
    let posts = io::load_posts(posts_path, &labels)?;
    let index = io::load_index(
        index_path,
        &opts.index_date_column,
        &opts.index_value_column,
    )?;
    info!(
        "Loaded {} posts and {} index values in {:?}",
        posts.len(),
        index.points().len(),
        instant.elapsed()
    );

    let posts_outside_index = window::posts_outside_span(&posts, &index);
    if posts_outside_index > 0 {
        info!("{posts_outside_index} posts fall outside the index span and are not counted");
    }

    let subcorpora = partition(posts);
    if subcorpora.unassigned > 0 {
        warn!(
            "{} posts come from unknown publishers and are excluded",
            subcorpora.unassigned
        );
    }

    let tables = compute_metrics(&subcorpora, &index, &labels, width);
    let by_group = reshape_by_group(&tables);
    let windows = tables.first().map(|t| t.rows.len()).unwrap_or(0);

    let written = io::write_results(&opts.out_dir, width, opts.export_format, &tables, &by_group)?;
    info!(
        "Wrote {} files for {} windows in {:?}",
        written.len(),
        windows,
        instant.elapsed()
    );

    Ok(MetricsReport {
        windows,
        unassigned_posts: subcorpora.unassigned,
        posts_outside_index,
        written,
    })
}

/// Merges NER output into the post corpus and writes the labeled corpus to `out_path`.
pub fn run_merge(
    posts_path: &Path,
    ner_path: &Path,
    out_path: &Path,
    dictionary: &LabelDictionary,
) -> Result<MergeSummary> {
    let instant = Instant::now();
    let posts = io::load_posts(posts_path, &[])?;
    let ner = io::load_ner(ner_path)?;
    info!(
        "Merging {} NER records into {} posts",
        ner.len(),
        posts.len()
    );

    let (merged, summary) = merge_labels(posts, &ner, dictionary);
    io::write_posts(out_path, &merged, &dictionary.labels())?;
    info!(
        "{} of {} posts carry labels ({} mentions resolved, {} unresolved) in {:?}",
        summary.posts_with_labels,
        summary.posts,
        summary.resolved_mentions,
        summary.unresolved_mentions,
        instant.elapsed()
    );
    Ok(summary)
}
