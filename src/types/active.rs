use serde_json::Value;
use std::collections::BTreeMap;

/// One `(minion, pid)` pair from the `Running` list of an active job.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct RunningMinion {
    pub minion: String,
    pub pid: u32,
}

/// A job that is still running somewhere.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ActiveJob {
    pub jid: String,
    pub function: Option<String>,
    pub target: Option<String>,
    /// Flattened `Running` list.
    pub running: Vec<RunningMinion>,
    entries: usize,
}

impl ActiveJob {
    /// Number of entries in the `Running` list (each entry is a `{minion: pid}` map).
    pub fn active_count(&self) -> usize {
        self.entries
    }
}

/// Result of `jobs.active`: jobs that are still running, keyed by job id.
///
/// A job id missing from the snapshot has completed on every minion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ActiveJobsSnapshot {
    jobs: BTreeMap<String, ActiveJob>,
}

impl ActiveJobsSnapshot {
    /// `None` when the payload is not a JSON object.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let jobs = map
            .iter()
            .map(|(jid, info)| (jid.clone(), decode_active_job(jid, info)))
            .collect();
        Some(Self { jobs })
    }

    pub fn get(&self, jid: &str) -> Option<&ActiveJob> {
        self.jobs.get(jid)
    }

    pub fn contains(&self, jid: &str) -> bool {
        self.jobs.contains_key(jid)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveJob> {
        self.jobs.values()
    }
}

fn decode_active_job(jid: &str, info: &Value) -> ActiveJob {
    let entries = info
        .get("Running")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut running = Vec::new();
    for entry in entries {
        let Some(pairs) = entry.as_object() else {
            continue;
        };
        for (minion, pid) in pairs {
            // pids are sometimes serialized as strings
            let pid = pid
                .as_u64()
                .or_else(|| pid.as_str().and_then(|s| s.trim().parse().ok()))
                .and_then(|p| u32::try_from(p).ok());
            if let Some(pid) = pid {
                running.push(RunningMinion {
                    minion: minion.clone(),
                    pid,
                });
            }
        }
    }

    ActiveJob {
        jid: jid.to_string(),
        function: info
            .get("Function")
            .and_then(Value::as_str)
            .map(str::to_string),
        target: info.get("Target").map(crate::util::payload_text),
        running,
        entries: entries.len(),
    }
}
