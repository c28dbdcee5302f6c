use crate::menu::Navigation;
use crate::types::job::{TargetType, format_start_time, target_text};
use crate::types::page::StatusCell;

use serde_json::Value;

/// One entry of `jobs.list_jobs`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct RecentJob {
    pub jid: String,
    pub function: String,
    /// Target as shown to humans (see `target_text`).
    pub target: String,
    /// Formatted start time, or the raw value when it could not be parsed.
    pub start_time: String,
}

impl RecentJob {
    fn from_entry(jid: &str, info: &Value) -> Self {
        let text = |key: &str| info.get(key).and_then(Value::as_str);
        let target_type = TargetType::parse(text("Target-type").unwrap_or_default());
        let target = match info.get("Target") {
            Some(Value::Array(items)) => items
                .iter()
                .map(crate::util::payload_text)
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => crate::util::payload_text(other),
            None => String::new(),
        };

        Self {
            jid: jid.to_string(),
            function: text("Function").unwrap_or_default().to_string(),
            target: target_text(&target_type, &target),
            start_time: format_start_time(text("StartTime")),
        }
    }
}

/// Dashboard housekeeping calls that never show up in the jobs panel.
const HIDDEN_FUNCTIONS: &[&str] = &[
    "saltutil.find_job",
    "saltutil.running",
    "runner.jobs.active",
    "runner.jobs.list_job",
    "runner.jobs.list_jobs",
    "wheel.key.list_all",
];

/// Newest first, housekeeping calls removed, at most `max` entries.
///
/// `None` when the payload is not a JSON object.
pub(crate) fn recent_jobs_from_value(value: &Value, max: usize) -> Option<Vec<RecentJob>> {
    let map = value.as_object()?;
    let mut jobs = map
        .iter()
        .map(|(jid, info)| RecentJob::from_entry(jid, info))
        .filter(|job| !HIDDEN_FUNCTIONS.contains(&job.function.as_str()))
        .collect::<Vec<_>>();
    // jids are timestamps
    jobs.sort_by(|a, b| b.jid.cmp(&a.jid));
    jobs.truncate(max);
    Some(jobs)
}

/// One row of the jobs panel.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct RecentJobRow {
    pub job: RecentJob,
    /// `(loading)`, `n active`, `done` or `(error)`.
    pub status: StatusCell,
    pub link: Navigation,
}

/// Side panel listing the most recent jobs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct JobsPanel {
    pub rows: Vec<RecentJobRow>,
    /// Shown instead of rows when the job list could not be loaded.
    pub error: Option<String>,
}

impl JobsPanel {
    pub fn row(&self, jid: &str) -> Option<&RecentJobRow> {
        self.rows.iter().find(|r| r.job.jid == jid)
    }
}
