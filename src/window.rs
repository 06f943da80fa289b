//! Fixed-width time windows and per-window, per-group counts.
//!
//! Windows are laid out over the span of the external index series, left
//! aligned at its first date. The last window is clipped at the day after the
//! final index date and may therefore be shorter than the configured width.
//! Posts outside that span never reach any window.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::model::{IndexSeries, Post};

/// Window width in days; always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowWidth(u32);

impl WindowWidth {
    pub fn new(days: i64) -> Result<Self> {
        if days < 1 {
            return Err(PipelineError::Usage(format!(
                "invalid window width {days}; expected a number of days >= 1"
            )));
        }
        u32::try_from(days)
            .map(WindowWidth)
            .map_err(|_| PipelineError::Usage(format!("window width {days} is too large")))
    }

    pub fn days(self) -> u32 {
        self.0
    }
}

impl Default for WindowWidth {
    fn default() -> Self {
        WindowWidth(1)
    }
}

impl std::fmt::Display for WindowWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WindowSpan {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Counts for one group inside one window.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWindowRecord {
    pub label: String,
    /// Distinct posts with at least one mention of the group.
    pub post_count: u64,
    /// Tokens in those posts.
    pub word_count: u64,
    /// Sum of the group's mention column, so one post may add several.
    pub mention_count: u64,
    /// `post_count / total_posts`; NaN or infinite when the window is empty.
    pub post_share: f64,
    /// `mention_count / total_words`; NaN or infinite when the window has no words.
    pub word_share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub span: WindowSpan,
    /// Date of the index observation used for `last_index_value`.
    pub date: NaiveDate,
    pub last_index_value: f64,
    pub total_posts: u64,
    pub total_words: u64,
    pub groups: Vec<GroupWindowRecord>,
}

/// Splits the index span into consecutive windows of `width` days.
///
/// A width past the end of the calendar yields a single window over the span.
pub fn window_spans(index: &IndexSeries, width: WindowWidth) -> Vec<WindowSpan> {
    let step = Duration::days(i64::from(width.days()));
    let final_date = index.last_date().succ_opt().unwrap_or(NaiveDate::MAX);
    let mut spans = Vec::new();
    let mut start = index.first_date();
    while start < final_date {
        let end = start
            .checked_add_signed(step)
            .map_or(final_date, |d| d.min(final_date));
        spans.push(WindowSpan { start, end });
        start = end;
    }
    spans
}

/// Computes totals and group counts for every window of the index span.
///
/// Windows, and the groups inside each window, are independent of each other
/// and are aggregated in parallel; the result is in chronological order.
pub fn aggregate(
    corpus: &[Post],
    index: &IndexSeries,
    labels: &[String],
    width: WindowWidth,
) -> Vec<Window> {
    let mut sorted: Vec<&Post> = corpus.iter().collect();
    sorted.sort_by_key(|p| p.timestamp);

    let spans = window_spans(index, width);
    spans
        .par_iter()
        .map(|span| aggregate_window(&sorted, index, labels, *span))
        .collect()
}

fn aggregate_window(
    sorted: &[&Post],
    index: &IndexSeries,
    labels: &[String],
    span: WindowSpan,
) -> Window {
    let lo = sorted.partition_point(|p| p.date() < span.start);
    let hi = sorted.partition_point(|p| p.date() < span.end);
    let in_window = &sorted[lo..hi];

    let total_posts = in_window.len() as u64;
    let total_words: u64 = in_window.iter().map(|p| p.word_count()).sum();

    // The first window always holds the first index date, so a carried
    // value exists for every later window.
    let (date, last_index_value) = match index.last_before(span.end) {
        Some(point) if span.contains(point.date) => (point.date, point.value),
        Some(point) => (span.start, point.value),
        None => (span.start, f64::NAN),
    };

    let groups = labels
        .par_iter()
        .map(|label| {
            let mut post_count = 0u64;
            let mut word_count = 0u64;
            let mut mention_count = 0u64;
            for post in in_window.iter().filter(|p| p.mentions(label) >= 1) {
                post_count += 1;
                word_count += post.word_count();
                mention_count += u64::from(post.mentions(label));
            }
            GroupWindowRecord {
                label: label.clone(),
                post_count,
                word_count,
                mention_count,
                post_share: post_count as f64 / total_posts as f64,
                word_share: mention_count as f64 / total_words as f64,
            }
        })
        .collect();

    log::debug!(
        "window {}..{}: {} posts, {} words",
        span.start,
        span.end,
        total_posts,
        total_words
    );

    Window {
        span,
        date,
        last_index_value,
        total_posts,
        total_words,
        groups,
    }
}

/// Number of posts whose date lies outside every window.
pub fn posts_outside_span(corpus: &[Post], index: &IndexSeries) -> usize {
    let first = index.first_date();
    let last = index.last_date();
    corpus
        .iter()
        .filter(|p| p.date() < first || p.date() > last)
        .count()
}
