//! Plain-text output for the terminal.

use chrono::DateTime;
use locsync_core::contract::{FileMetadata, ScoreResponse};
use locsync_core::pool::PoolReport;
use locsync_core::segments::KeyValue;
use locsync_core::session::Session;
use locsync_core::status::ProjectStatus;

/// One-line tally printed after `push` and `pull`.
pub fn summary(command: &str, report: &PoolReport, session: &Session) -> String {
    format!(
        "{command}: {} transferred, {} skipped, {} failed (run {})",
        report.transferred,
        session.skipped(),
        report.failed,
        session.run_id()
    )
}

/// Left-aligned columns separated by two spaces.
pub fn table(header: &[String], rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    let mut out = String::new();
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// `YYYY-MM-DD HH:MM:SS` in UTC for a millisecond epoch timestamp; empty when out of range.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn header(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

pub fn file_list_table(files: &[FileMetadata]) -> String {
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|file| {
            let tags: Vec<&str> = file.tags.iter().map(|t| t.name.as_str()).collect();
            vec![
                file.file_id.to_string(),
                file.filename.clone(),
                file.version.clone(),
                tags.join(", "),
                format_timestamp(file.update),
                if file.enabled { "ENABLED" } else { "DISABLED" }.to_string(),
            ]
        })
        .collect();
    table(&header(&["ID", "NAME", "VERSION", "TAG", "UPDATED_ON", "STATUS"]), &rows)
}

/// Overall score line followed by the per-category breakdown.
pub fn score_table(score: &ScoreResponse) -> String {
    let rows: Vec<Vec<String>> = score
        .breakdown
        .iter()
        .map(|b| {
            vec![
                b.category.clone(),
                b.issue_count.to_string(),
                format!("{:.2}", b.score),
                b.enabled.to_string(),
            ]
        })
        .collect();
    let mut out = format!("score: {:.2}\n", score.document_score);
    if !rows.is_empty() {
        out.push_str(&table(&header(&["#CATEGORY", "#ISSUES", "#SCORE", "#ENABLED"]), &rows));
    }
    out
}

pub fn status_table(status: &ProjectStatus) -> String {
    let rows: Vec<Vec<String>> = status.rows.iter().map(|row| row.cells()).collect();
    table(&status.header, &rows)
}

pub fn key_value_table(value: &KeyValue) -> String {
    let row = vec![
        value.file_name.clone(),
        value.file_version.clone(),
        value.key.clone(),
        value.value.clone(),
        value.reference.clone(),
        format_timestamp(value.last_saved),
    ];
    table(
        &header(&["#FILE", "#VERSION", "#KEY", "#VALUE", "#REF", "#LAST SAVED"]),
        &[row],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_core::contract::{ScoreBreakdown, Tag};

    #[test]
    fn table_pads_every_column_to_its_widest_cell() {
        let header = vec!["#AUDIENCES".to_string(), "#WORDS".to_string()];
        let rows = vec![vec!["fr-fr".to_string(), "1200".to_string()]];
        assert_eq!(table(&header, &rows), "#AUDIENCES  #WORDS\nfr-fr       1200\n");
    }

    #[test]
    fn timestamps_are_rendered_in_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn file_list_table_shows_tags_date_and_status() {
        let files = vec![
            FileMetadata {
                file_id: 7,
                filename: "app.json".into(),
                version: "2.0".into(),
                enabled: true,
                tags: vec![
                    Tag { tag_id: 1, name: "web".into() },
                    Tag { tag_id: 2, name: "ios".into() },
                ],
                update: 1_700_000_000_000,
                ..FileMetadata::default()
            },
            FileMetadata {
                file_id: 8,
                filename: "menu.json".into(),
                ..FileMetadata::default()
            },
        ];
        let rendered = file_list_table(&files);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("ID"));
        assert!(lines[0].ends_with("STATUS"));
        assert!(lines[1].contains("web, ios"));
        assert!(lines[1].contains("2023-11-14 22:13:20"));
        assert!(lines[1].ends_with("ENABLED"));
        assert!(lines[2].ends_with("DISABLED"));
    }

    #[test]
    fn score_table_lists_the_breakdown() {
        let score = ScoreResponse {
            snapshot_time: 0,
            document_score: 87.5,
            breakdown: vec![ScoreBreakdown {
                category: "Grammar".into(),
                issue_count: 2,
                score: 90.0,
                enabled: true,
            }],
        };
        let rendered = score_table(&score);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "score: 87.50");
        assert!(lines[1].starts_with("#CATEGORY"));
        assert_eq!(lines[2], "Grammar    2        90.00   true");
    }

    #[test]
    fn key_value_table_lists_the_segment() {
        let value = KeyValue {
            file_name: "app.json".into(),
            file_version: String::new(),
            key: "/nav/home".into(),
            value: "Accueil".into(),
            reference: "menu".into(),
            last_saved: 1,
        };
        let rendered = key_value_table(&value);
        assert!(rendered.starts_with("#FILE"));
        assert!(rendered.lines().nth(1).unwrap().contains("Accueil"));
    }
}
