//! Pivots unified subcorpus tables into one table per group.

use chrono::NaiveDate;
use serde::Serialize;

use crate::partition::PublisherGroup;
use crate::pct::MetricsTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub date: NaiveDate,
    pub rtsi_pct: f64,
    pub rtsi: f64,
    pub country: String,
    /// Percent change of the post share.
    pub post: f64,
    /// Absolute post share.
    pub abs_posts: f64,
    /// Percent change of the word share.
    pub word: f64,
    pub status: u8,
}

/// All windows of one group within one subcorpus.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTable {
    pub country: String,
    pub status: PublisherGroup,
    pub rows: Vec<GroupRow>,
}

/// Splits one unified table into a table per group, in label order.
pub fn reshape(table: &MetricsTable) -> Vec<GroupTable> {
    table
        .labels
        .iter()
        .enumerate()
        .map(|(g, label)| GroupTable {
            country: label.clone(),
            status: table.status,
            rows: table
                .rows
                .iter()
                .map(|row| {
                    let metrics = &row.groups[g];
                    GroupRow {
                        date: row.date,
                        rtsi_pct: row.rtsi_pct,
                        rtsi: row.rtsi,
                        country: label.clone(),
                        post: metrics.post_share_pct,
                        abs_posts: metrics.post_share,
                        word: metrics.word_share_pct,
                        status: table.status.status(),
                    }
                })
                .collect(),
        })
        .collect()
}

/// Groups the per-group tables of every subcorpus under their label.
///
/// Each entry holds one table per input table, in input order, so every
/// group appears exactly once per subcorpus.
pub fn reshape_by_group(tables: &[MetricsTable]) -> Vec<(String, Vec<GroupTable>)> {
    let mut out: Vec<(String, Vec<GroupTable>)> = Vec::new();
    for table in tables {
        for group_table in reshape(table) {
            match out.iter_mut().find(|(label, _)| *label == group_table.country) {
                Some((_, tables)) => tables.push(group_table),
                None => out.push((group_table.country.clone(), vec![group_table])),
            }
        }
    }
    out
}
