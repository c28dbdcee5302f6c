use crate::menu::{DropDownMenu, Navigation};
use crate::types::recent::JobsPanel;

use std::fmt;

/// What is known about a minion on the pillars page.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MinionState {
    /// Listed as accepted key; pillar data not in yet.
    Accepted,
    Online,
    /// Accepted key, but the minion did not answer the pillar query.
    Offline,
}

/// Pillar summary of one minion (data API).
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct MinionPillars {
    pub minion: String,
    pub state: MinionState,
    /// Number of top-level pillar keys; `None` when offline or when the answer was an error.
    pub pillar_count: Option<usize>,
    /// Raw answer when it was not a pillar dictionary.
    pub error: Option<String>,
}

/// One row of the pillars table.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PillarRow {
    pub minion: String,
    pub state: MinionState,
    /// `no pillars`, `1 pillar`, `n pillars` or empty.
    pub pillar_info: String,
    /// Sort key of the pillar column (`-1` for errors).
    pub sort_key: i64,
    pub error: Option<String>,
    pub menu: DropDownMenu,
    /// Where clicking the row leads.
    pub link: Navigation,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct MinionTable {
    pub rows: Vec<PillarRow>,
    /// Error row shown instead of minions when the key list could not be loaded.
    pub error: Option<String>,
}

impl MinionTable {
    pub fn row(&self, minion: &str) -> Option<&PillarRow> {
        self.rows.iter().find(|r| r.minion == minion)
    }

    pub fn row_mut(&mut self, minion: &str) -> Option<&mut PillarRow> {
        self.rows.iter_mut().find(|r| r.minion == minion)
    }
}

/// Mount points of the pillars view. `None` means the page is gone.
pub trait PillarsSurface {
    fn minion_table(&mut self) -> Option<&mut MinionTable>;
    fn message(&mut self) -> Option<&mut String>;

    /// Side panel with the most recent jobs. Surfaces without one keep the default.
    fn jobs_panel(&mut self) -> Option<&mut JobsPanel> {
        None
    }
}

/// In-memory pillars page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PillarsPage {
    attached: bool,
    table: MinionTable,
    message: String,
    jobs: JobsPanel,
}

impl Default for PillarsPage {
    fn default() -> Self {
        Self::new()
    }
}

impl PillarsPage {
    pub fn new() -> Self {
        Self {
            attached: true,
            table: MinionTable::default(),
            message: String::new(),
            jobs: JobsPanel::default(),
        }
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn table(&self) -> &MinionTable {
        &self.table
    }

    pub fn message_text(&self) -> &str {
        &self.message
    }

    pub fn jobs(&self) -> &JobsPanel {
        &self.jobs
    }
}

impl PillarsSurface for PillarsPage {
    fn minion_table(&mut self) -> Option<&mut MinionTable> {
        self.attached.then_some(&mut self.table)
    }

    fn message(&mut self) -> Option<&mut String> {
        self.attached.then_some(&mut self.message)
    }

    fn jobs_panel(&mut self) -> Option<&mut JobsPanel> {
        self.attached.then_some(&mut self.jobs)
    }
}

impl fmt::Display for PillarsPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.table.error {
            writeln!(f, "error: {err}")?;
            return self.fmt_jobs(f);
        }
        for row in &self.table.rows {
            let state = match row.state {
                MinionState::Accepted => "accepted",
                MinionState::Online => "online",
                MinionState::Offline => "offline",
            };
            write!(f, "{:<32} {state:<8} {}", row.minion, row.pillar_info)?;
            if let Some(err) = &row.error {
                write!(f, " error: {err}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{}", self.message)?;
        self.fmt_jobs(f)
    }
}

impl PillarsPage {
    fn fmt_jobs(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.jobs.error {
            return writeln!(f, "jobs: error: {err}");
        }
        for row in &self.jobs.rows {
            writeln!(
                f,
                "{:<22} {:<24} {:<20} {:<20} {}",
                row.job.jid, row.job.function, row.job.target, row.job.start_time, row.status.text
            )?;
        }
        Ok(())
    }
}
