//! Integration tests for `coverage_metrics`.
//
// This suite verifies:
// - Library runs (merge, metrics) writing the expected tables
// - Window layout, status tagging and the NaN/infinity fill in written files
// - CLI behavior including usage errors and export formats
//
// Notes:
// - Every test writes into its own temp dir; no global CWD change.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;
use tempfile::tempdir;

use coverage_metrics::{
    ExportFormat, LabelDictionary, MetricsOptions, PipelineError, WindowWidth, run_merge,
    run_metrics,
};

// --------------------- helpers ---------------------

/// Create a file with content in a temp dir.
fn write_file(dir: &assert_fs::TempDir, name: &str, content: &str) -> PathBuf {
    let f = dir.child(name);
    f.write_str(content).unwrap();
    f.path().to_path_buf()
}

/// Seconds since the epoch of 2022-03-<day> 10:00 UTC.
fn ts(day: u32) -> i64 {
    1_646_092_800 + i64::from(day - 1) * 86_400 + 36_000
}

/// Daily index for March 1..=days with value 100 + day.
fn index_csv(days: u32) -> String {
    let mut s = String::from("date,open,close\n");
    for d in 1..=days {
        s.push_str(&format!("2022-03-{d:02},0,{}\n", 100 + d));
    }
    s
}

fn small_dictionary() -> LabelDictionary {
    LabelDictionary::from_pairs(vec![
        ("usa", vec!["сша", "америк"]),
        ("china", vec!["китай"]),
        ("ukraine", vec!["украин"]),
    ])
    .unwrap()
}

/// Labeled corpus over three weeks with posts of both publisher groups.
fn labeled_posts_csv() -> String {
    let rows = [
        ("-26284064_1", 1, "США и Китай", 1, 1, 0),
        ("-26284064_2", 2, "про погоду", 0, 0, 0),
        ("-40316705_3", 9, "Америка Америка", 2, 0, 0),
        ("-76982440_4", 3, "Украина сегодня", 0, 0, 1),
        ("-25232578_5", 16, "Китай растет", 0, 1, 0),
        ("-25232578_6", 17, "без стран", 0, 0, 0),
        ("-99999999_7", 5, "чужой паблик США", 1, 0, 0),
        ("-26284064_8", 40, "после индекса США", 1, 0, 0),
    ];
    let mut s = String::from("ID,date,text,usa,china,ukraine\n");
    for (id, day, text, usa, china, ukraine) in rows {
        s.push_str(&format!("{id},{},{text},{usa},{china},{ukraine}\n", ts(day)));
    }
    s
}

fn read_table(p: &Path, delimiter: u8) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(p)
        .unwrap();
    let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

fn column(header: &[String], rows: &[Vec<String>], name: &str) -> Vec<f64> {
    let i = header.iter().position(|h| h == name).unwrap();
    rows.iter().map(|r| r[i].parse().unwrap()).collect()
}

fn opts(out_dir: &Path, width: i64) -> MetricsOptions {
    MetricsOptions {
        window_width: WindowWidth::new(width).unwrap(),
        out_dir: out_dir.to_path_buf(),
        ..MetricsOptions::default()
    }
}

/// Run CLI successfully with a specific working directory.
fn run_cli_ok_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("coverage_metrics").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().success()
}

/// Run CLI expecting failure with a specific working directory.
fn run_cli_fail_in(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = assert_cmd::Command::cargo_bin("coverage_metrics").unwrap();
    cmd.current_dir(dir);
    cmd.args(args).assert().failure()
}

// --------------------- library tests ---------------------

#[test]
fn lib_metrics_writes_every_table() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(21));
    let out = td.path().join("results");

    let report = run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 7)).unwrap();
    assert_eq!(report.windows, 3);
    assert_eq!(report.unassigned_posts, 1);
    assert_eq!(report.posts_outside_index, 1);
    // 2 subcorpora x 3 unified tables + 3 groups x 2 subcorpora
    assert_eq!(report.written.len(), 12);

    let run_dir = out.join("7days");
    for name in [
        "control_pct_change_all_7.csv",
        "control_pst_all_7.csv",
        "control_wrd_all_7.csv",
        "free_pct_change_all_7.csv",
        "free_pst_all_7.csv",
        "free_wrd_all_7.csv",
    ] {
        assert!(run_dir.join(name).is_file(), "missing {name}");
    }
    for country in ["usa", "china", "ukraine"] {
        for status in ["control", "free"] {
            let p = run_dir.join("countries").join(format!("{country}_{status}_7.csv"));
            assert!(p.is_file(), "missing {}", p.display());
        }
    }
}

#[test]
fn lib_group_tables_have_canonical_columns_and_status() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(21));
    let out = td.path().join("results");
    run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 7)).unwrap();

    let countries = out.join("7days").join("countries");
    let (header, rows) = read_table(&countries.join("usa_control_7.csv"), b',');
    assert_eq!(
        header,
        vec!["date", "rtsi_pct", "rtsi", "country", "post", "abs_posts", "word", "status"]
    );
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r[3] == "usa" && r[7] == "0"));
    assert_eq!(column(&header, &rows, "rtsi"), vec![107.0, 114.0, 121.0]);
    // week 1: 1 of 2 posts, week 2: 1 of 1, week 3: empty
    assert_eq!(column(&header, &rows, "abs_posts"), vec![0.5, 1.0, 0.0]);
    assert_eq!(column(&header, &rows, "post"), vec![0.0, 100.0, 0.0]);

    let (_, free_rows) = read_table(&countries.join("usa_free_7.csv"), b',');
    assert_eq!(free_rows.len(), 3);
    assert!(free_rows.iter().all(|r| r[7] == "1"));
}

#[test]
fn lib_word_shares_use_mentions_over_all_words() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(21));
    let out = td.path().join("results");
    run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 7)).unwrap();

    let (header, rows) = read_table(&out.join("7days").join("control_wrd_all_7.csv"), b',');
    // week 1: 1 usa mention over 3 + 2 words; week 2: 2 mentions over 2 words
    let usa = column(&header, &rows, "usa_wrds");
    assert!((usa[0] - 0.2).abs() < 1e-12);
    assert_eq!(usa[1], 1.0);
    assert_eq!(usa[2], 0.0);
    assert_eq!(header.last().map(String::as_str), Some("status"));

    let (header, rows) = read_table(&out.join("7days").join("control_pct_change_all_7.csv"), b',');
    let word_pct = column(&header, &rows, "usa_word_pct");
    assert!((word_pct[1] - 400.0).abs() < 1e-9);
    assert!(column(&header, &rows, "rtsi_pct").iter().all(|v| v.is_finite()));
}

#[test]
fn lib_mentions_in_posts_without_words_report_zero_share() {
    let td = assert_fs::TempDir::new().unwrap();
    let csv = format!(
        "ID,date,text,usa,china,ukraine\n-26284064_1,{},,1,0,0\n-76982440_2,{},Китай,0,1,0\n",
        ts(1),
        ts(2)
    );
    let posts = write_file(&td, "posts.csv", &csv);
    let index = write_file(&td, "rtsi.csv", &index_csv(2));
    let out = td.path().join("results");
    run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 1)).unwrap();

    let (header, rows) = read_table(&out.join("1days").join("control_wrd_all_1.csv"), b',');
    assert_eq!(column(&header, &rows, "usa_wrds"), vec![0.0, 0.0]);
    let (header, rows) = read_table(&out.join("1days").join("control_pst_all_1.csv"), b',');
    assert_eq!(column(&header, &rows, "usa_psts"), vec![1.0, 0.0]);
}

#[test]
fn lib_short_final_window() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(10));
    let out = td.path().join("results");
    let report = run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 3)).unwrap();
    assert_eq!(report.windows, 4);

    let (header, rows) = read_table(&out.join("3days").join("free_pst_all_3.csv"), b',');
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3][0], "2022-03-10");
    assert_eq!(column(&header, &rows, "rtsi"), vec![103.0, 106.0, 109.0, 110.0]);
}

#[test]
fn lib_invalid_width_is_a_usage_error() {
    for width in [0, -1] {
        let err = WindowWidth::new(width).unwrap_err();
        assert!(matches!(err, PipelineError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }
    assert_eq!(WindowWidth::new(7).unwrap().days(), 7);
}

#[test]
fn lib_missing_group_column_is_a_load_error() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", "ID,date,text,usa\n-26284064_1,1646092800,a,1\n");
    let index = write_file(&td, "rtsi.csv", &index_csv(3));
    let out = td.path().join("results");
    let err = run_metrics(&posts, &index, &small_dictionary(), &opts(&out, 1)).unwrap_err();
    assert!(matches!(err, PipelineError::Schema { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(!out.exists());
}

#[test]
fn lib_merge_then_metrics() {
    let td = assert_fs::TempDir::new().unwrap();
    let raw = format!(
        "ID,date,text\n-26284064_1,{},США и Китай\n-76982440_2,{},Киев ждет\n-26284064_3,{},тишина\n",
        ts(2),
        ts(1),
        ts(4)
    );
    let posts = write_file(&td, "raw.csv", &raw);
    let ner = write_file(
        &td,
        "ner.json",
        r#"{
            "-26284064_1": {"GPE_COUNTRY": ["США", "Китай", "Марс"]},
            "-76982440_2": {"GPE_COUNTRY": ["Украина", "Украины"]}
        }"#,
    );
    let merged = td.path().join("merged").join("posts.csv");
    let dict = small_dictionary();

    let summary = run_merge(&posts, &ner, &merged, &dict).unwrap();
    assert_eq!(summary.posts, 3);
    assert_eq!(summary.posts_with_labels, 2);
    assert_eq!(summary.unresolved_mentions, 1);

    let (header, rows) = read_table(&merged, b',');
    assert_eq!(header, vec!["ID", "date", "text", "usa", "china", "ukraine", "status"]);
    // sorted by date: Meduza post first
    assert_eq!(rows[0][0], "-76982440_2");
    assert_eq!(rows[0][5], "2");
    assert_eq!(rows[0][6], "1");
    assert_eq!(rows[1][3..7], ["1", "1", "0", "0"]);

    let index = write_file(&td, "rtsi.csv", &index_csv(4));
    let out = td.path().join("results");
    let report = run_metrics(&merged, &index, &dict, &opts(&out, 2)).unwrap();
    assert_eq!(report.windows, 2);
    assert_eq!(report.unassigned_posts, 0);
}

#[test]
fn lib_tsv_export() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(7));
    let out = td.path().join("results");
    let mut o = opts(&out, 7);
    o.export_format = ExportFormat::Tsv;
    run_metrics(&posts, &index, &small_dictionary(), &o).unwrap();

    let p = out.join("7days").join("countries").join("china_free_7.tsv");
    let (header, rows) = read_table(&p, b'\t');
    assert_eq!(header.len(), 8);
    assert_eq!(rows.len(), 1);
}

// --------------------- CLI tests ---------------------

#[test]
fn cli_zero_width_is_a_usage_error() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(7));
    run_cli_fail_in(
        td.path(),
        &[
            "metrics",
            posts.to_str().unwrap(),
            index.to_str().unwrap(),
            "0",
        ],
    )
    .code(2)
    .stderr(predicate::str::contains("invalid window width"));
    assert!(!td.path().join("metrics_percent_results").exists());
}

#[test]
fn cli_negative_width_is_a_usage_error() {
    let td = assert_fs::TempDir::new().unwrap();
    run_cli_fail_in(td.path(), &["metrics", "posts.csv", "rtsi.csv", "-2"]).code(2);
}

#[test]
fn cli_missing_width_fails() {
    let td = tempdir().unwrap();
    run_cli_fail_in(td.path(), &["metrics", "posts.csv", "rtsi.csv"]);
}

#[test]
fn cli_nonexistent_input_fails() {
    let td = tempdir().unwrap();
    let bad = td.path().join("does_not_exist_here.csv");
    run_cli_fail_in(
        td.path(),
        &["metrics", bad.to_str().unwrap(), bad.to_str().unwrap(), "7"],
    )
    .code(1)
    .stderr(predicate::str::contains("does_not_exist_here"));
}

#[test]
fn cli_metrics_default_out_dir() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(&td, "posts.csv", &labeled_posts_csv());
    let index = write_file(&td, "rtsi.csv", &index_csv(21));
    let labels = write_file(
        &td,
        "labels.json",
        r#"{"usa": ["сша"], "china": ["китай"], "ukraine": ["украин"]}"#,
    );

    run_cli_ok_in(
        td.path(),
        &[
            "--labels",
            labels.to_str().unwrap(),
            "metrics",
            posts.to_str().unwrap(),
            index.to_str().unwrap(),
            "7",
        ],
    )
    .stdout(predicate::str::contains("Calculated 3 windows"));

    let countries = td
        .path()
        .join("metrics_percent_results")
        .join("7days")
        .join("countries");
    let files = fs::read_dir(&countries).unwrap().count();
    assert_eq!(files, 6);
}

#[test]
fn cli_merge() {
    let td = assert_fs::TempDir::new().unwrap();
    let posts = write_file(
        &td,
        "raw.csv",
        &format!("ID,date,text\n-25232578_1,{},Китай\n", ts(1)),
    );
    let ner = write_file(&td, "ner.json", r#"{"-25232578_1": {"GPE_COUNTRY": ["Китай"]}}"#);
    let out = td.path().join("merged.csv");

    run_cli_ok_in(
        td.path(),
        &[
            "merge",
            "--posts",
            posts.to_str().unwrap(),
            "--ner",
            ner.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
    )
    .stdout(predicate::str::contains("1 labeled"));

    let (header, rows) = read_table(&out, b',');
    let china = header.iter().position(|h| h == "china").unwrap();
    assert_eq!(rows[0][china], "1");
}
