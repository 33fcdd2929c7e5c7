use crate::aggregator::ActivityRecord;

pub const NO_ACTIVITY_LABEL: &str = "No Activity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub sequence_number: usize,
    pub developer_name: String,
    pub project_name: String,
    pub activity_label: String,
    pub activity_timestamp: String,
}

/// Turns activity records into report rows. Traversal order is kept
/// as-is, numbering is 1-based, nothing is dropped or merged.
pub fn build_report(records: &[ActivityRecord]) -> Vec<ReportRow> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let (activity_label, activity_timestamp) = match &record.latest_event {
                Some(event) => (capitalize(&event.action_name), event.created_at.clone()),
                None => (NO_ACTIVITY_LABEL.to_string(), String::new()),
            };
            ReportRow {
                sequence_number: index + 1,
                developer_name: record.member.display_name.clone(),
                project_name: record.project.name.clone(),
                activity_label,
                activity_timestamp,
            }
        })
        .collect()
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
