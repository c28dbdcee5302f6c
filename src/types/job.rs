use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Salt target type (`tgt_type`).
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum TargetType {
    #[default]
    Glob,
    List,
    Grain,
    GrainPcre,
    Pillar,
    PillarPcre,
    Pcre,
    Compound,
    Nodegroup,
    Ipcidr,
    Range,
    Other(String),
}

impl TargetType {
    pub fn parse(s: &str) -> Self {
        match s {
            "glob" | "" => TargetType::Glob,
            "list" => TargetType::List,
            "grain" => TargetType::Grain,
            "grain_pcre" => TargetType::GrainPcre,
            "pillar" => TargetType::Pillar,
            "pillar_pcre" => TargetType::PillarPcre,
            "pcre" => TargetType::Pcre,
            "compound" => TargetType::Compound,
            "nodegroup" => TargetType::Nodegroup,
            "ipcidr" => TargetType::Ipcidr,
            "range" => TargetType::Range,
            other => TargetType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetType::Glob => "glob",
            TargetType::List => "list",
            TargetType::Grain => "grain",
            TargetType::GrainPcre => "grain_pcre",
            TargetType::Pillar => "pillar",
            TargetType::PillarPcre => "pillar_pcre",
            TargetType::Pcre => "pcre",
            TargetType::Compound => "compound",
            TargetType::Nodegroup => "nodegroup",
            TargetType::Ipcidr => "ipcidr",
            TargetType::Range => "range",
            TargetType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human readable target: the bare pattern for `glob` and `list`, `<type> <pattern>` otherwise.
pub fn target_text(target_type: &TargetType, target: &str) -> String {
    match target_type {
        TargetType::Glob | TargetType::List => target.to_string(),
        other => format!("{} {target}", other.as_str()),
    }
}

/// One minion's answer to a job.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct MinionResult {
    pub success: bool,
    pub retcode: Option<i64>,
    pub ret: Value,
}

impl MinionResult {
    pub fn new(success: bool, retcode: Option<i64>, ret: Value) -> Self {
        Self {
            success,
            retcode,
            ret,
        }
    }

    /// `true` iff the minion reported success with retcode 0.
    pub fn is_ok(&self) -> bool {
        self.success && self.retcode == Some(0)
    }

    fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self {
                success: false,
                retcode: None,
                ret: value.clone(),
            };
        };
        Self {
            success: map.get("success").and_then(Value::as_bool).unwrap_or(false),
            retcode: map.get("retcode").and_then(Value::as_i64),
            ret: map.get("return").cloned().unwrap_or(Value::Null),
        }
    }
}

/// Snapshot of one job as returned by `jobs.list_job`.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct JobDescriptor {
    pub jid: String,
    pub target_type: TargetType,
    pub target: String,
    pub function: String,
    pub arguments: Vec<Value>,
    pub start_time: Option<String>,
    pub user: Option<String>,
    /// Targeted minions. Absent for wheel/runner jobs.
    pub minions: Option<Vec<String>>,
    pub result: BTreeMap<String, MinionResult>,
}

impl JobDescriptor {
    pub fn new(jid: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            function: function.into(),
            ..Default::default()
        }
    }

    /// `true` when every targeted minion has answered.
    ///
    /// Without a `Minions` list the result set is the whole universe, so the job counts as
    /// complete.
    pub fn is_complete(&self) -> bool {
        match &self.minions {
            Some(minions) => self.result.len() == minions.len(),
            None => true,
        }
    }

    /// Minions shown in the response table: `Minions` when present, otherwise the result keys.
    pub fn minion_universe(&self) -> Vec<String> {
        match &self.minions {
            Some(minions) => minions.clone(),
            None => self.result.keys().cloned().collect(),
        }
    }

    /// `<function> <args...>` in the same notation the command box accepts.
    pub fn command_text(&self) -> String {
        let mut text = self.function.clone();
        text.push_str(&crate::types::command::format_arguments(&self.arguments));
        text
    }

    /// `<command text> on <target text>`.
    pub fn summary_text(&self) -> String {
        format!(
            "{} on {}",
            self.command_text(),
            target_text(&self.target_type, &self.target)
        )
    }
}

/// Classified job-detail payload.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum JobDetail {
    Job(JobDescriptor),
    Failed {
        message: String,
        start_time: Option<String>,
    },
}

impl JobDetail {
    /// `None` when the payload is not a JSON object.
    pub(crate) fn from_value(jid: &str, value: &Value) -> Option<Self> {
        let map = value.as_object()?;

        if let Some(err) = map.get("Error") {
            return Some(JobDetail::Failed {
                message: crate::util::payload_text(err),
                start_time: get_string(map, "StartTime"),
            });
        }

        let result = match map.get("Result").and_then(Value::as_object) {
            Some(results) => results
                .iter()
                .map(|(minion, r)| (minion.clone(), MinionResult::from_value(r)))
                .collect(),
            None => BTreeMap::new(),
        };

        let minions = map.get("Minions").and_then(Value::as_array).map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        Some(JobDetail::Job(JobDescriptor {
            jid: jid.to_string(),
            target_type: get_string(map, "Target-type")
                .map(|v| TargetType::parse(&v))
                .unwrap_or_default(),
            target: target_pattern(map.get("Target")),
            function: get_string(map, "Function").unwrap_or_default(),
            arguments: map
                .get("Arguments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            start_time: get_string(map, "StartTime"),
            user: get_string(map, "User"),
            minions,
            result,
        }))
    }
}

// `list` jobs store the target as an array.
fn target_pattern(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(crate::util::payload_text)
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn get_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Lifecycle of a job as shown by the job view.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum JobStatus {
    /// Waiting for the active-jobs poll.
    #[default]
    Loading,
    /// The job still runs on this many minion entries.
    Active(usize),
    Done,
    /// The active-jobs poll failed; terminal for the view.
    Error,
}

impl JobStatus {
    /// `Done` and `Error` never change again for a view.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Loading => f.write_str("(loading)"),
            JobStatus::Active(n) => write!(f, "{n} active"),
            JobStatus::Done => f.write_str("done"),
            JobStatus::Error => f.write_str("(error)"),
        }
    }
}

/// Format a master `StartTime` (`2024, Jan 05 10:11:12.123456`) as `2024-01-05 10:11:12`.
///
/// Unknown formats are shown as-is.
pub fn format_start_time(start_time: Option<&str>) -> String {
    let Some(raw) = start_time else {
        return String::new();
    };
    match chrono::NaiveDateTime::parse_from_str(raw.trim(), "%Y, %b %d %H:%M:%S%.f") {
        Ok(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}
