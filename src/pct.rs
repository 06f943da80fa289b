//! Period-over-period percent change and the table that carries it.
//!
//! Division by zero is resolved after the fact: NaN becomes `0` ("no change")
//! and either infinity becomes `100` ("change from a zero baseline"). The
//! first element has no predecessor and also resolves to `0`.
//!
//! Absolute shares are not changes, so an undefined share (empty window, or
//! mentions in posts without tokens) is reported as `0`, never `100`.

use chrono::NaiveDate;

use crate::partition::PublisherGroup;
use crate::window::Window;

/// Replacement for NaN results.
pub const NAN_FILL: f64 = 0.0;
/// Replacement for positive and negative infinity.
pub const INF_FILL: f64 = 100.0;

/// Maps NaN to [`NAN_FILL`] and ±infinity to [`INF_FILL`].
pub fn remap(value: f64) -> f64 {
    if value.is_nan() {
        NAN_FILL
    } else if value.is_infinite() {
        INF_FILL
    } else {
        value
    }
}

/// Absolute share as reported: any non-finite value becomes `0`.
pub fn fill_share(value: f64) -> f64 {
    if value.is_finite() { value } else { NAN_FILL }
}

/// Percent change before remapping. Element 0 is NaN.
///
/// NaN inputs are padded with the last defined value before differencing, so
/// an undefined window compares against the most recent defined one.
pub fn raw_pct_change(series: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(series.len());
    let mut last_defined: Option<f64> = None;
    let mut previous: Option<f64> = None;
    for &value in series {
        let current = if value.is_nan() {
            last_defined.unwrap_or(f64::NAN)
        } else {
            last_defined = Some(value);
            value
        };
        out.push(match previous {
            Some(prev) => (current - prev) / prev * 100.0,
            None => f64::NAN,
        });
        previous = Some(current);
    }
    out
}

/// Percent change with the NaN/infinity remapping applied; never yields
/// NaN or infinity and always starts with `0`.
pub fn pct_change(series: &[f64]) -> Vec<f64> {
    raw_pct_change(series).into_iter().map(remap).collect()
}

/// Per-group columns of one window row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMetrics {
    pub label: String,
    pub post_count: u64,
    pub post_share: f64,
    pub word_share: f64,
    pub post_share_pct: f64,
    pub word_share_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub date: NaiveDate,
    pub rtsi: f64,
    pub rtsi_pct: f64,
    /// Same order as [`MetricsTable::labels`].
    pub groups: Vec<GroupMetrics>,
}

/// Unified absolute and percent-change table of one subcorpus.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub status: PublisherGroup,
    pub labels: Vec<String>,
    pub rows: Vec<MetricsRow>,
}

impl MetricsTable {
    /// Builds the table from aggregated windows.
    ///
    /// Each series is differenced on its own, left to right, from the raw
    /// shares; the absolute shares are then filled with [`fill_share`].
    pub fn from_windows(status: PublisherGroup, labels: &[String], windows: &[Window]) -> Self {
        let index_values: Vec<f64> = windows.iter().map(|w| w.last_index_value).collect();
        let rtsi_pct = pct_change(&index_values);

        let per_group: Vec<(Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> = (0..labels.len())
            .map(|g| {
                let posts: Vec<f64> = windows.iter().map(|w| w.groups[g].post_share).collect();
                let words: Vec<f64> = windows.iter().map(|w| w.groups[g].word_share).collect();
                let posts_pct = pct_change(&posts);
                let words_pct = pct_change(&words);
                (posts, words, posts_pct, words_pct)
            })
            .collect();

        let rows = windows
            .iter()
            .enumerate()
            .map(|(i, window)| MetricsRow {
                date: window.date,
                rtsi: remap(window.last_index_value),
                rtsi_pct: rtsi_pct[i],
                groups: labels
                    .iter()
                    .enumerate()
                    .map(|(g, label)| {
                        let (posts, words, posts_pct, words_pct) = &per_group[g];
                        GroupMetrics {
                            label: label.clone(),
                            post_count: window.groups[g].post_count,
                            post_share: fill_share(posts[i]),
                            word_share: fill_share(words[i]),
                            post_share_pct: posts_pct[i],
                            word_share_pct: words_pct[i],
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            status,
            labels: labels.to_vec(),
            rows,
        }
    }
}
