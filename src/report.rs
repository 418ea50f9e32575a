//! Presentation of review results: console table and CSV.
//!
//! The CSV is UTF-8 with a byte-order mark so spreadsheet applications pick
//! the right encoding for non-ASCII slide text. Column order and header
//! names are fixed; [`read_csv`] accepts exactly what [`to_csv_bytes`]
//! writes, with or without the BOM.

use crate::error::ReviewError;
use crate::issue::{Issue, IssueType, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Column headers shared by the table and the CSV.
pub const COLUMNS: [&str; 5] = ["Page", "Issue Type", "Severity", "Description", "Suggestion"];

const BOM: &str = "\u{FEFF}";

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Page")]
    page: u32,
    #[serde(rename = "Issue Type")]
    issue_type: String,
    #[serde(rename = "Severity")]
    severity: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Suggestion", default)]
    suggestion: String,
}

impl From<&Issue> for CsvRow {
    fn from(issue: &Issue) -> Self {
        Self {
            page: issue.page,
            issue_type: issue.issue_type.as_str().to_string(),
            severity: issue.severity.as_str().to_string(),
            description: issue.description.clone(),
            suggestion: issue.suggestion.clone(),
        }
    }
}

impl From<CsvRow> for Issue {
    fn from(row: CsvRow) -> Self {
        Self {
            page: row.page,
            issue_type: IssueType::parse_lenient(&row.issue_type),
            severity: Severity::parse_lenient(&row.severity),
            description: row.description,
            suggestion: row.suggestion,
        }
    }
}

/// Serialize issues to CSV bytes (BOM, header row, one row per issue).
pub fn to_csv_bytes(issues: &[Issue]) -> Result<Vec<u8>, ReviewError> {
    let mut buf = BOM.as_bytes().to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        if issues.is_empty() {
            writer.write_record(COLUMNS)?;
        }
        for issue in issues {
            writer.serialize(CsvRow::from(issue))?;
        }
        writer.flush().map_err(csv::Error::from)?;
    }
    Ok(buf)
}

/// Parse CSV produced by [`to_csv_bytes`].
pub fn read_csv(bytes: &[u8]) -> Result<Vec<Issue>, ReviewError> {
    let body = bytes.strip_prefix(BOM.as_bytes()).unwrap_or(bytes);
    let mut reader = csv::Reader::from_reader(body);
    reader
        .deserialize::<CsvRow>()
        .map(|row| Ok(Issue::from(row?)))
        .collect()
}

/// Write issues as a CSV file.
///
/// Atomic: the bytes go to a sibling temp file which is then renamed over
/// the target, so readers never see a partial file.
pub fn write_csv(path: &Path, issues: &[Issue]) -> Result<(), ReviewError> {
    let bytes = to_csv_bytes(issues)?;
    let write_err = |source: std::io::Error| ReviewError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    std::fs::write(&tmp_path, &bytes).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;

    info!("Wrote {} issues to {}", issues.len(), path.display());
    Ok(())
}

/// Render issues as a pipe-delimited table, one row per issue.
pub fn render_table(issues: &[Issue]) -> String {
    let rows: Vec<[String; 5]> = issues
        .iter()
        .map(|i| {
            [
                i.page.to_string(),
                i.issue_type.to_string(),
                i.severity.to_string(),
                cell(&i.description),
                cell(&i.suggestion),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(|h| h.chars().count());
    for row in &rows {
        for (w, value) in widths.iter_mut().zip(row) {
            *w = (*w).max(value.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &COLUMNS.map(String::from), &widths);
    out.push('|');
    for w in &widths {
        out.push_str(&"-".repeat(w + 2));
        out.push('|');
    }
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    out.push('|');
    for (value, &w) in cells.iter().zip(widths) {
        let pad = w - value.chars().count();
        out.push(' ');
        out.push_str(value);
        out.push_str(&" ".repeat(pad + 1));
        out.push('|');
    }
    out.push('\n');
}

/// Table cells are single-line; pipes would break the column layout.
fn cell(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Issue> {
        vec![
            Issue {
                page: 7,
                issue_type: IssueType::Typo,
                severity: Severity::Low,
                description: "\"Recieve\" is misspelled, twice".into(),
                suggestion: "Receive".into(),
            },
            Issue {
                page: 8,
                issue_type: IssueType::Logic,
                severity: Severity::High,
                description: "売上の合計が\n前ページと一致しない".into(),
                suggestion: String::new(),
            },
        ]
    }

    #[test]
    fn csv_starts_with_bom_and_header() {
        let bytes = to_csv_bytes(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("\u{FEFF}Page,Issue Type,Severity,Description,Suggestion\n"));
        assert_eq!(text.matches("Recieve").count(), 1);
    }

    #[test]
    fn csv_round_trip_preserves_fields() {
        let issues = sample();
        let back = read_csv(&to_csv_bytes(&issues).unwrap()).unwrap();
        assert_eq!(back, issues);
    }

    #[test]
    fn empty_csv_still_has_header() {
        let bytes = to_csv_bytes(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "\u{FEFF}Page,Issue Type,Severity,Description,Suggestion\n"
        );
        assert!(read_csv(&to_csv_bytes(&[]).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn read_csv_without_bom() {
        let csv = "Page,Issue Type,Severity,Description,Suggestion\n3,FORMAT,Medium,Misaligned,Align left\n";
        let issues = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(issues[0].page, 3);
        assert_eq!(issues[0].issue_type, IssueType::Format);
        assert_eq!(issues[0].severity, Severity::Medium);
    }

    #[test]
    fn read_csv_rejects_non_integer_page() {
        let csv = "Page,Issue Type,Severity,Description,Suggestion\nseven,typo,low,x,y\n";
        assert!(matches!(read_csv(csv.as_bytes()), Err(ReviewError::Csv(_))));
    }

    #[test]
    fn write_csv_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("review_issues.csv");
        write_csv(&path, &sample()).unwrap();
        assert!(!path.with_extension("csv.tmp").exists());
        let back = read_csv(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn table_has_header_and_one_row_per_issue() {
        let table = render_table(&sample());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("| Page | Issue Type | Severity | Description"));
        assert!(lines[1].starts_with("|------|"));
        assert!(lines[2].starts_with("| 7    | typo       | low      |"));
        assert!(lines[3].contains("売上の合計が 前ページと一致しない"));
    }

    #[test]
    fn table_escapes_pipes() {
        let issue = Issue::unparsed(1, "a | b");
        assert!(render_table(&[issue]).contains("a \\| b"));
    }
}
