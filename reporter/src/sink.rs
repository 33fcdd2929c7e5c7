use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;

use crate::report::ReportRow;

pub const REPORT_HEADER: [&str; 5] = [
    "#",
    "Developer Name",
    "Project",
    "Latest Activity",
    "Activity Timestamp",
];

pub fn report_filename(date: NaiveDate) -> String {
    format!("gitlab_activity_report_{date}.csv")
}

/// Renders the rows to CSV: header line, then one line per row. Output is
/// byte-identical for identical input.
pub fn render_csv(rows: &[ReportRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        let sequence = row.sequence_number.to_string();
        writer.write_record([
            sequence.as_str(),
            row.developer_name.as_str(),
            row.project_name.as_str(),
            row.activity_label.as_str(),
            row.activity_timestamp.as_str(),
        ])?;
    }
    Ok(writer.into_inner()?)
}

/// Writes the date-stamped report file and returns its path.
pub fn write_report(rows: &[ReportRow], dir: &Path, date: NaiveDate) -> anyhow::Result<PathBuf> {
    let path = dir.join(report_filename(date));
    let bytes = render_csv(rows)?;
    fs::write(&path, bytes)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "Report saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sequence_number: usize, developer_name: &str, activity_label: &str) -> ReportRow {
        ReportRow {
            sequence_number,
            developer_name: developer_name.to_string(),
            project_name: "demo".to_string(),
            activity_label: activity_label.to_string(),
            activity_timestamp: "2024-01-06T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn header_comes_first_even_for_an_empty_report() {
        let bytes = render_csv(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "#,Developer Name,Project,Latest Activity,Activity Timestamp\n"
        );
    }

    #[test]
    fn rows_follow_in_order() {
        let bytes = render_csv(&[row(1, "Alice", "Commented"), row(2, "Bob", "No Activity")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1,Alice,demo,Commented,2024-01-06T09:00:00Z");
        assert_eq!(lines[2], "2,Bob,demo,No Activity,2024-01-06T09:00:00Z");
    }

    #[test]
    fn embedded_delimiters_are_quoted() {
        let bytes = render_csv(&[row(1, "Lastname, Firstname", "Pushed")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"Lastname, Firstname\""));
    }

    #[test]
    fn rendering_is_deterministic() {
        let rows = vec![row(1, "Alice", "Commented"), row(2, "Bob", "No Activity")];
        assert_eq!(render_csv(&rows).unwrap(), render_csv(&rows).unwrap());
    }

    #[test]
    fn filename_carries_the_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert_eq!(report_filename(date), "gitlab_activity_report_2024-01-06.csv");
    }

    #[test]
    fn write_report_creates_the_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();

        let path = write_report(&[row(1, "Alice", "Commented")], dir.path(), date).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "gitlab_activity_report_2024-01-06.csv"
        );
        let written = fs::read(&path).unwrap();
        assert_eq!(written, render_csv(&[row(1, "Alice", "Commented")]).unwrap());
    }
}
