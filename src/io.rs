//! Reading input tables and writing result tables.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::{PipelineError, Result};
use crate::merge::{NerOutput, NerRecord};
use crate::model::{IndexPoint, IndexSeries, Post, parse_id, parse_timestamp};
use crate::partition::classify_publisher;
use crate::pct::MetricsTable;
use crate::reshape::{GroupRow, GroupTable};
use crate::window::WindowWidth;

/// Delimiter of written tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Tsv,
}

impl ExportFormat {
    pub fn delimiter(self) -> u8 {
        match self {
            ExportFormat::Csv => b',',
            ExportFormat::Tsv => b'\t',
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
        }
    }
}

/// Neutralizes cells that spreadsheet software would evaluate as formulas.
pub fn csv_safe_cell(cell: String) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell,
    }
}

fn fmt_f64(v: f64) -> String {
    format!("{v:?}")
}

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> PipelineError + '_ {
    move |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn column(headers: &StringRecord, path: &Path, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| PipelineError::Schema {
            path: path.to_path_buf(),
            message: format!("missing required column '{name}'"),
        })
}

fn line_of(record: &StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(fallback as u64 + 2)
}

fn parse_count(cell: &str) -> std::result::Result<u32, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(0);
    }
    if let Ok(n) = cell.parse::<u32>() {
        return Ok(n);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_nan() => Ok(0),
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => Ok(f as u32),
        _ => Err(format!("invalid mention count '{cell}'")),
    }
}

/// Loads the post corpus. `ID`, `date`, `text` and one column per label are required.
pub fn load_posts(path: &Path, labels: &[String]) -> Result<Vec<Post>> {
    let mut rdr = ReaderBuilder::new()
        .from_path(path)
        .map_err(csv_err(path))?;
    let headers = rdr.headers().map_err(csv_err(path))?.clone();

    let id_col = column(&headers, path, "ID")?;
    let date_col = column(&headers, path, "date")?;
    let text_col = column(&headers, path, "text")?;
    let label_cols = labels
        .iter()
        .map(|l| column(&headers, path, l).map(|i| (l.clone(), i)))
        .collect::<Result<Vec<_>>>()?;

    let mut posts = Vec::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err(path))?;
        let line = line_of(&record, n);
        let parse_err = |message: String| PipelineError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        let raw_id = record.get(id_col).unwrap_or_default().trim().to_string();
        let id = parse_id(&raw_id).map_err(parse_err)?;
        let timestamp = parse_timestamp(record.get(date_col).unwrap_or_default()).map_err(parse_err)?;
        let text = record.get(text_col).unwrap_or_default().to_string();
        let mut group_flags = BTreeMap::new();
        for (label, col) in &label_cols {
            let count = parse_count(record.get(*col).unwrap_or_default()).map_err(parse_err)?;
            group_flags.insert(label.clone(), count);
        }

        posts.push(Post {
            id,
            publisher_id: raw_id,
            timestamp,
            text,
            group_flags,
        });
    }
    Ok(posts)
}

/// Loads the external index from the named date and value columns.
pub fn load_index(path: &Path, date_column: &str, value_column: &str) -> Result<IndexSeries> {
    let mut rdr = ReaderBuilder::new()
        .from_path(path)
        .map_err(csv_err(path))?;
    let headers = rdr.headers().map_err(csv_err(path))?.clone();
    let date_col = column(&headers, path, date_column)?;
    let value_col = column(&headers, path, value_column)?;

    let mut points = Vec::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err(path))?;
        let line = line_of(&record, n);
        let parse_err = |message: String| PipelineError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        let date = parse_timestamp(record.get(date_col).unwrap_or_default())
            .map_err(parse_err)?
            .date();
        let raw_value = record.get(value_col).unwrap_or_default().trim();
        let value = raw_value
            .parse::<f64>()
            .map_err(|e| parse_err(format!("invalid value '{raw_value}': {e}")))?;
        points.push(IndexPoint { date, value });
    }

    IndexSeries::new(points).map_err(|message| PipelineError::Schema {
        path: path.to_path_buf(),
        message,
    })
}

/// Loads NER output: a JSON object keyed by post id.
pub fn load_ner(path: &Path) -> Result<NerOutput> {
    let raw = fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: HashMap<String, NerRecord> =
        serde_json::from_str(&raw).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(NerOutput::from_records(records))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes labeled posts in the layout [`load_posts`] reads, with dates as epoch seconds.
pub fn write_posts(path: &Path, posts: &[Post], labels: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    let mut wtr = WriterBuilder::new().from_path(path).map_err(csv_err(path))?;

    let mut header = vec!["ID".to_string(), "date".to_string(), "text".to_string()];
    header.extend(labels.iter().cloned());
    header.push("status".to_string());
    wtr.write_record(&header).map_err(csv_err(path))?;

    for post in posts {
        let mut row = vec![
            post.publisher_id.clone(),
            post.timestamp.and_utc().timestamp().to_string(),
            post.text.clone(),
        ];
        row.extend(labels.iter().map(|l| post.mentions(l).to_string()));
        row.push(
            classify_publisher(&post.publisher_id)
                .map(|g| g.status().to_string())
                .unwrap_or_default(),
        );
        wtr.write_record(&row).map_err(csv_err(path))?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Which columns of a [`MetricsTable`] to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Absolute and percent-change columns of every group.
    PctChange,
    /// Absolute post shares only.
    Posts,
    /// Absolute word shares only.
    Words,
}

impl TableKind {
    fn file_stem(self) -> &'static str {
        match self {
            TableKind::PctChange => "pct_change_all",
            TableKind::Posts => "pst_all",
            TableKind::Words => "wrd_all",
        }
    }
}

fn table_records(table: &MetricsTable, kind: TableKind) -> (Vec<String>, Vec<Vec<String>>) {
    let mut header = vec!["date".to_string(), "rtsi".to_string(), "rtsi_pct".to_string()];
    for label in &table.labels {
        match kind {
            TableKind::PctChange => header.extend([
                format!("{label}_post_pct"),
                format!("{label}_psts"),
                format!("{label}_word_pct"),
                format!("{label}_wrds"),
            ]),
            TableKind::Posts => header.push(format!("{label}_psts")),
            TableKind::Words => header.push(format!("{label}_wrds")),
        }
    }
    header.push("status".to_string());

    let status = table.status.status().to_string();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.date.to_string(), fmt_f64(row.rtsi), fmt_f64(row.rtsi_pct)];
            for g in &row.groups {
                match kind {
                    TableKind::PctChange => cells.extend([
                        fmt_f64(g.post_share_pct),
                        fmt_f64(g.post_share),
                        fmt_f64(g.word_share_pct),
                        fmt_f64(g.word_share),
                    ]),
                    TableKind::Posts => cells.push(fmt_f64(g.post_share)),
                    TableKind::Words => cells.push(fmt_f64(g.word_share)),
                }
            }
            cells.push(status.clone());
            cells
        })
        .collect();
    (header, rows)
}

/// Writes one subcorpus table, e.g. `control_pst_all_7.csv`.
pub fn write_table(
    dir: &Path,
    table: &MetricsTable,
    kind: TableKind,
    width: WindowWidth,
    format: ExportFormat,
) -> Result<PathBuf> {
    let path = dir.join(format!(
        "{}_{}_{}.{}",
        table.status.as_str(),
        kind.file_stem(),
        width,
        format.extension()
    ));
    let mut wtr = WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_path(&path)
        .map_err(csv_err(&path))?;
    let (header, rows) = table_records(table, kind);
    wtr.write_record(&header).map_err(csv_err(&path))?;
    for row in rows {
        wtr.write_record(&row).map_err(csv_err(&path))?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Writes one group table, e.g. `countries/usa_free_7.csv`.
pub fn write_group_table(
    dir: &Path,
    table: &GroupTable,
    width: WindowWidth,
    format: ExportFormat,
) -> Result<PathBuf> {
    let path = dir.join(format!(
        "{}_{}_{}.{}",
        table.country,
        table.status.as_str(),
        width,
        format.extension()
    ));
    let mut wtr = WriterBuilder::new()
        .delimiter(format.delimiter())
        .from_path(&path)
        .map_err(csv_err(&path))?;
    for row in &table.rows {
        let safe = GroupRow {
            country: csv_safe_cell(row.country.clone()),
            ..row.clone()
        };
        wtr.serialize(&safe).map_err(csv_err(&path))?;
    }
    wtr.flush().map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Writes every table of one run under `<out_dir>/<width>days/`.
pub fn write_results(
    out_dir: &Path,
    width: WindowWidth,
    format: ExportFormat,
    tables: &[MetricsTable],
    by_group: &[(String, Vec<GroupTable>)],
) -> Result<Vec<PathBuf>> {
    let run_dir = out_dir.join(format!("{width}days"));
    let countries_dir = run_dir.join("countries");
    create_dir(&countries_dir)?;

    let mut written = Vec::new();
    for table in tables {
        for kind in [TableKind::PctChange, TableKind::Posts, TableKind::Words] {
            written.push(write_table(&run_dir, table, kind, width, format)?);
        }
    }
    for (_, group_tables) in by_group {
        for table in group_tables {
            written.push(write_group_table(&countries_dir, table, width, format)?);
        }
    }
    Ok(written)
}
