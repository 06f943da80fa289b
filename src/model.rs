//! Records shared by every pipeline stage.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A single social-media post.
///
/// `publisher_id` keeps the raw `ID` cell (its prefix identifies the source
/// account), `id` is the same value with `_` separators removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub publisher_id: String,
    pub timestamp: NaiveDateTime,
    pub text: String,
    /// Mention count per group label. Missing labels count as 0.
    pub group_flags: BTreeMap<String, u32>,
}

impl Post {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Number of whitespace-delimited tokens in `text`.
    pub fn word_count(&self) -> u64 {
        self.text.split_whitespace().count() as u64
    }

    pub fn mentions(&self, label: &str) -> u32 {
        self.group_flags.get(label).copied().unwrap_or(0)
    }
}

/// Strips `_` separators so that `-26284064_1234` and `-262840641234` compare equal.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().replace('_', "")
}

/// Parses a post identifier into its numeric form.
pub fn parse_id(raw: &str) -> Result<i64, String> {
    let cleaned = normalize_id(raw);
    cleaned
        .parse::<i64>()
        .map_err(|e| format!("invalid ID '{raw}': {e}"))
}

/// Accepts seconds since the epoch, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`
/// or a bare `YYYY-MM-DD`.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let s = raw.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| format!("timestamp out of range: {secs}"));
    }
    if let Ok(secs) = s.parse::<f64>() {
        if secs.is_finite() {
            return DateTime::from_timestamp(secs.trunc() as i64, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| format!("timestamp out of range: {secs}"));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|_| format!("unrecognized date '{raw}'"))
}

/// One observation of the external index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily external index series, ascending by date without duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSeries {
    points: Vec<IndexPoint>,
}

impl IndexSeries {
    /// Sorts the observations and rejects empty input and duplicate dates.
    pub fn new(mut points: Vec<IndexPoint>) -> Result<Self, String> {
        if points.is_empty() {
            return Err("index series is empty".to_string());
        }
        points.sort_by_key(|p| p.date);
        if let Some(pair) = points.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(format!("duplicate index date {}", pair[0].date));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Last observation strictly before `end`.
    pub fn last_before(&self, end: NaiveDate) -> Option<IndexPoint> {
        let idx = self.points.partition_point(|p| p.date < end);
        idx.checked_sub(1).map(|i| self.points[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, d).unwrap()
    }

    #[test]
    fn timestamps_in_several_formats() {
        let epoch = parse_timestamp("1646092800").unwrap();
        assert_eq!(epoch.date(), day(1));
        let iso = parse_timestamp("2022-03-01 13:45:00").unwrap();
        assert_eq!(iso.date(), day(1));
        assert_eq!(parse_timestamp("2022-03-02").unwrap().date(), day(2));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn ids_lose_separators() {
        assert_eq!(parse_id("-26284064_1234").unwrap(), -262840641234);
        assert!(parse_id("abc").is_err());
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        let post = Post {
            id: 1,
            publisher_id: "1".into(),
            timestamp: parse_timestamp("2022-03-01").unwrap(),
            text: "  один\tдва\nтри  ".into(),
            group_flags: BTreeMap::new(),
        };
        assert_eq!(post.word_count(), 3);
        assert_eq!(post.mentions("usa"), 0);
    }

    #[test]
    fn index_series_sorted_and_unique() {
        let series = IndexSeries::new(vec![
            IndexPoint { date: day(3), value: 3.0 },
            IndexPoint { date: day(1), value: 1.0 },
        ])
        .unwrap();
        assert_eq!(series.first_date(), day(1));
        assert_eq!(series.last_date(), day(3));
        assert_eq!(series.last_before(day(3)).unwrap().value, 1.0);
        assert!(series.last_before(day(1)).is_none());

        let dup = IndexSeries::new(vec![
            IndexPoint { date: day(1), value: 1.0 },
            IndexPoint { date: day(1), value: 2.0 },
        ]);
        assert!(dup.is_err());
        assert!(IndexSeries::new(Vec::new()).is_err());
    }
}
