//! saltview is a Rust SDK for Salt dashboards: render a job's detail (re-run targets, per-minion
//! results, live active-job status with terminate/kill/signal actions) and a pillar overview of
//! all accepted minions, over the local salt CLI or salt-api.
//!
//! Views write into a surface (`JobPage`, `PillarsPage`, or your own `JobSurface` /
//! `PillarsSurface` implementation) and a menu builder. Fetch failures never panic; they are
//! rendered inline so every failure leaves a visible marker.
//!
//! ## Quick start
//! ```no_run
//! use saltview::{DropDownMenu, JobPage, SaltView};
//!
//! async fn show_job(jid: &str) -> Result<(), saltview::Error> {
//!     let view = SaltView::connect_cli().await?;
//!     let mut page = JobPage::new();
//!     let mut menu = DropDownMenu::new();
//!     if let Some(mut handle) = view.jobs().open(jid, &mut page, &mut menu).await? {
//!         view.jobs()
//!             .watch(&mut handle, &mut page, &mut menu, std::time::Duration::from_secs(60))
//!             .await?;
//!     }
//!     println!("{page}");
//!     Ok(())
//! }
//! ```
//!
//! ## Job status
//! The status cell of a job view reads `(loading)`, `n active`, `done` or `(error)`. `done` and
//! `(error)` are terminal: later polls never move a view back.
//!
//! ## Backends
//! Default backend: `salt`, `salt-run` and `salt-key` binaries (feature=`backend-cli`).
//! Alternative backend: salt-api with token authentication (feature=`backend-http`, requires
//! `rt-tokio`). Any other transport can implement `SaltApi` and use `SaltView::with_api`.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::dbg_macro)]

#[cfg(all(feature = "rt-async-io", feature = "rt-tokio"))]
compile_error!("features `rt-async-io` and `rt-tokio` are mutually exclusive; enable exactly one.");

#[cfg(not(any(feature = "rt-async-io", feature = "rt-tokio")))]
compile_error!(
    "missing runtime feature: enable one of `rt-async-io` or `rt-tokio` (default enables `rt-async-io`)."
);

#[cfg(all(feature = "backend-http", not(feature = "rt-tokio")))]
compile_error!("feature `backend-http` requires `rt-tokio`.");

mod api;
#[cfg(feature = "blocking")]
mod blocking_api;
mod capabilities;
mod error;
mod jobs;
mod menu;
mod options;
mod pillars;
mod runtime;
mod types;
mod util;

pub use crate::types::active::{ActiveJob, ActiveJobsSnapshot, RunningMinion};
pub use crate::types::command::{Command, SIGNAL_PLACEHOLDER};
pub use crate::types::job::{
    JobDescriptor, JobStatus, MinionResult, TargetType, format_start_time, target_text,
};
pub use crate::types::page::{
    JobPage, JobSurface, MinionRow, OutputPanel, ResponseSummary, ResponseTable, RowAction,
    RowState, StatusCell,
};
pub use crate::types::pillars::{
    MinionPillars, MinionState, MinionTable, PillarRow, PillarsPage, PillarsSurface,
};
pub use crate::types::recent::{JobsPanel, RecentJob, RecentJobRow};

pub use crate::api::SaltApi;
pub use crate::capabilities::Capabilities;
pub use crate::error::{Error, Result};
pub use crate::menu::{DropDownMenu, MenuAction, MenuBuilder, MenuItem, MenuItemId, Navigation};
pub use crate::options::{HttpCredentials, SaltViewOptions};
pub use crate::runtime::BoxFuture;

#[cfg(feature = "blocking")]
pub use crate::blocking_api::{BlockingJobs, BlockingPillars, BlockingSaltView};

pub use crate::jobs::recent::{apply_recent_active, render_recent_jobs};
pub use crate::jobs::rerun::{RerunTargets, derive_rerun_targets};
pub use crate::jobs::view::{apply_active_jobs, render_job_detail};
pub use crate::jobs::{JobViewHandle, Jobs, KillFamily};
pub use crate::pillars::{Pillars, apply_pillars, render_key_list};

use std::sync::Arc;

/// Primary entrypoint for Salt job and pillar views.
#[derive(Clone, Debug)]
pub struct SaltView {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    opts: SaltViewOptions,
    api: Arc<dyn SaltApi>,
}

impl SaltView {
    /// Use the salt CLI on this host (feature=`backend-cli`).
    #[cfg(feature = "backend-cli")]
    pub async fn connect_cli() -> Result<Self> {
        Self::connect_cli_with(SaltViewOptions::default()).await
    }

    /// Use the salt CLI with custom options (timeouts, binaries, polling).
    #[cfg(feature = "backend-cli")]
    pub async fn connect_cli_with(opts: SaltViewOptions) -> Result<Self> {
        let api = api::cli::CliApi::connect(&opts).await?;
        Ok(Self::with_api(opts, api))
    }

    /// Log in to salt-api (feature=`backend-http`).
    #[cfg(feature = "backend-http")]
    pub async fn connect_http(credentials: HttpCredentials) -> Result<Self> {
        Self::connect_http_with(SaltViewOptions::default(), credentials).await
    }

    /// Log in to salt-api with custom options.
    #[cfg(feature = "backend-http")]
    pub async fn connect_http_with(
        opts: SaltViewOptions,
        credentials: HttpCredentials,
    ) -> Result<Self> {
        let api = api::http::HttpApi::connect(&opts, credentials).await?;
        Ok(Self::with_api(opts, api))
    }

    /// Use a custom backend.
    pub fn with_api(opts: SaltViewOptions, api: impl SaltApi + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                opts,
                api: Arc::new(api),
            }),
        }
    }

    pub fn options(&self) -> &SaltViewOptions {
        &self.inner.opts
    }

    /// Probe backend capabilities conservatively.
    pub async fn capabilities(&self) -> Capabilities {
        capabilities::probe(self).await
    }

    /// Access job view and dispatch APIs.
    pub fn jobs(&self) -> Jobs {
        Jobs::new(self.inner.clone())
    }

    /// Access pillar overview APIs.
    pub fn pillars(&self) -> Pillars {
        Pillars::new(self.inner.clone())
    }
}
