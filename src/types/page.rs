use crate::menu::Navigation;
use crate::types::command::Command;

use std::fmt;

/// A status text with an optional tooltip (used for the raw payload of a failed poll).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct StatusCell {
    pub text: String,
    pub tooltip: Option<String>,
}

impl StatusCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
        }
    }
}

/// State of one minion row in the response table.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RowState {
    Ok,
    Failed { retcode: Option<i64> },
    NoResponse,
    /// No answer yet, but the minion still runs the job.
    Active,
}

/// Inline action on a minion row (`info`, `term`, `kill`, `signal`).
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct RowAction {
    pub label: &'static str,
    pub command: Command,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct MinionRow {
    pub minion: String,
    pub state: RowState,
    pub output: Option<String>,
    pub actions: Vec<RowAction>,
}

impl MinionRow {
    pub fn action(&self, label: &str) -> Option<&RowAction> {
        self.actions.iter().find(|a| a.label == label)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ResponseSummary {
    pub total: usize,
    pub responded: usize,
    pub failed: usize,
    /// Live job status (`(loading)`, `n active`, `done`, `(error)`).
    pub status: StatusCell,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct ResponseTable {
    pub summary: ResponseSummary,
    pub rows: Vec<MinionRow>,
}

/// Content of the output region.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum OutputPanel {
    #[default]
    Empty,
    /// Inline error showing the raw payload of a failed fetch.
    Error(String),
    /// Plain message, e.g. `<error> (<jid>)`.
    Message(String),
    Responses(ResponseTable),
}

impl OutputPanel {
    pub fn responses(&self) -> Option<&ResponseTable> {
        match self {
            OutputPanel::Responses(table) => Some(table),
            _ => None,
        }
    }

    pub fn row(&self, minion: &str) -> Option<&MinionRow> {
        self.responses()?.rows.iter().find(|r| r.minion == minion)
    }

    /// The live status cell, present only after a successful job render.
    pub fn status_mut(&mut self) -> Option<&mut StatusCell> {
        match self {
            OutputPanel::Responses(table) => Some(&mut table.summary.status),
            _ => None,
        }
    }

    pub fn row_mut(&mut self, minion: &str) -> Option<&mut MinionRow> {
        match self {
            OutputPanel::Responses(table) => table.rows.iter_mut().find(|r| r.minion == minion),
            _ => None,
        }
    }
}

/// Mount points of the job view.
///
/// Every accessor returns `None` once the surface is gone (e.g. the user navigated away), and
/// handlers treat that as "nothing to update".
pub trait JobSurface {
    fn output(&mut self) -> Option<&mut OutputPanel>;
    fn function(&mut self) -> Option<&mut String>;
    fn time(&mut self) -> Option<&mut String>;
    /// Bind the close control.
    fn wire_close(&mut self, target: Navigation);
}

/// In-memory job page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobPage {
    attached: bool,
    output: OutputPanel,
    function: String,
    time: String,
    close: Option<Navigation>,
}

impl Default for JobPage {
    fn default() -> Self {
        Self::new()
    }
}

impl JobPage {
    pub fn new() -> Self {
        Self {
            attached: true,
            output: OutputPanel::Empty,
            function: String::new(),
            time: String::new(),
            close: None,
        }
    }

    /// Simulate navigation away: later handler calls become no-ops.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn output_panel(&self) -> &OutputPanel {
        &self.output
    }

    pub fn function_text(&self) -> &str {
        &self.function
    }

    pub fn time_text(&self) -> &str {
        &self.time
    }

    pub fn close_target(&self) -> Option<&Navigation> {
        self.close.as_ref()
    }
}

impl JobSurface for JobPage {
    fn output(&mut self) -> Option<&mut OutputPanel> {
        self.attached.then_some(&mut self.output)
    }

    fn function(&mut self) -> Option<&mut String> {
        self.attached.then_some(&mut self.function)
    }

    fn time(&mut self) -> Option<&mut String> {
        self.attached.then_some(&mut self.time)
    }

    fn wire_close(&mut self, target: Navigation) {
        if self.attached {
            self.close = Some(target);
        }
    }
}

impl fmt::Display for JobPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.function)?;
        if !self.time.is_empty() {
            writeln!(f, "started {}", self.time)?;
        }
        match &self.output {
            OutputPanel::Empty => Ok(()),
            OutputPanel::Error(payload) => writeln!(f, "error: {payload}"),
            OutputPanel::Message(msg) => writeln!(f, "{msg}"),
            OutputPanel::Responses(table) => {
                let s = &table.summary;
                write!(
                    f,
                    "{} of {} minions responded, {} failed, {}",
                    s.responded, s.total, s.failed, s.status.text
                )?;
                if let Some(tooltip) = &s.status.tooltip {
                    write!(f, " [{tooltip}]")?;
                }
                writeln!(f)?;
                for row in &table.rows {
                    let state = match &row.state {
                        RowState::Ok => "ok".to_string(),
                        RowState::Failed { retcode: Some(rc) } => format!("failed (retcode {rc})"),
                        RowState::Failed { retcode: None } => "failed".to_string(),
                        RowState::NoResponse => "(no response)".to_string(),
                        RowState::Active => "(active)".to_string(),
                    };
                    write!(f, "{}: {state}", row.minion)?;
                    for action in &row.actions {
                        write!(f, " [{}]", action.label)?;
                    }
                    writeln!(f)?;
                    if let Some(output) = &row.output {
                        for line in output.lines() {
                            writeln!(f, "    {line}")?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
