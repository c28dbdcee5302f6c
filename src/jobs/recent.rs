use crate::menu::Navigation;
use crate::types::active::ActiveJobsSnapshot;
use crate::types::page::StatusCell;
use crate::types::recent::{JobsPanel, RecentJobRow, recent_jobs_from_value};
use crate::{JobStatus, Result, util};

use serde_json::Value;

/// Number of jobs listed by the jobs panel.
pub(crate) const MAX_RECENT_JOBS: usize = 7;

/// Fill the jobs panel from a `jobs.list_jobs` answer. Every row starts `(loading)`.
///
/// Returns `false` when the panel shows an error instead.
pub fn render_recent_jobs(panel: &mut JobsPanel, payload: Result<Value>) -> bool {
    let jobs = match &payload {
        Ok(value) => {
            recent_jobs_from_value(value, MAX_RECENT_JOBS).ok_or_else(|| util::payload_text(value))
        }
        Err(e) => Err(e.to_string()),
    };

    let jobs = match jobs {
        Ok(jobs) => jobs,
        Err(raw) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("job list fetch failed");

            panel.rows.clear();
            panel.error = Some(raw);
            return false;
        }
    };

    panel.error = None;
    panel.rows = jobs
        .into_iter()
        .map(|job| RecentJobRow {
            link: Navigation::Path(format!("job?id={}", util::encode_uri_component(&job.jid))),
            status: StatusCell::new(JobStatus::Loading.to_string()),
            job,
        })
        .collect();

    #[cfg(feature = "tracing")]
    tracing::debug!(jobs = panel.rows.len(), "job list rendered");

    true
}

/// Set the status of every panel row from a `jobs.active` answer.
///
/// A failed answer marks every row `(error)` with the raw payload as tooltip.
pub fn apply_recent_active(panel: &mut JobsPanel, payload: Result<Value>) {
    let snapshot = match &payload {
        Ok(value) => ActiveJobsSnapshot::from_value(value).ok_or_else(|| util::payload_text(value)),
        Err(e) => Err(e.to_string()),
    };

    for row in &mut panel.rows {
        row.status = match &snapshot {
            Ok(snapshot) => {
                let status = match snapshot.get(&row.job.jid) {
                    Some(active) => JobStatus::Active(active.active_count()),
                    None => JobStatus::Done,
                };
                StatusCell::new(status.to_string())
            }
            Err(raw) => StatusCell {
                text: JobStatus::Error.to_string(),
                tooltip: Some(raw.clone()),
            },
        };
    }
}
