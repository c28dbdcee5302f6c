use crate::menu::MenuBuilder;
use crate::types::active::ActiveJobsSnapshot;
use crate::types::job::JobDetail;
use crate::types::page::JobSurface;
use crate::types::recent::{RecentJob, recent_jobs_from_value};
use crate::{Command, Error, JobDescriptor, JobStatus, Result, util};

use futures_util::FutureExt;
use futures_util::future::Either;
use serde_json::Value;
use std::future::Future;
use std::{sync::Arc, time::Duration};

pub(crate) mod recent;
pub(crate) mod rerun;
pub(crate) mod view;

pub use view::{JobViewHandle, KillFamily};

#[derive(Clone, Debug)]
/// Job detail view and job dispatch APIs.
pub struct Jobs {
    inner: Arc<crate::Inner>,
}

impl Jobs {
    pub(crate) fn new(inner: Arc<crate::Inner>) -> Self {
        Self { inner }
    }

    /// Enter the job view for `jid`.
    ///
    /// The job detail and the active-jobs list are fetched concurrently. The detail is always
    /// rendered first; the active-jobs answer is applied afterwards and only when the detail
    /// described a job. Fetch failures are rendered into `surface`, so the returned error only
    /// covers invalid input.
    pub async fn open<S, M>(
        &self,
        jid: &str,
        surface: &mut S,
        menu: &mut M,
    ) -> Result<Option<JobViewHandle>>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        let jid = util::validate_jid(jid)?;

        #[cfg(feature = "tracing")]
        tracing::info!(%jid, "open job view");

        let api = &self.inner.api;
        let detail = api.job_detail(jid.clone());
        let active = api.active_jobs();

        let handle = match futures_util::future::select(detail, active).await {
            Either::Left((detail, active)) => {
                finish_open(surface, menu, &jid, detail, active).await
            }
            Either::Right((active, detail)) => {
                let detail = detail.await;
                finish_open(
                    surface,
                    menu,
                    &jid,
                    detail,
                    futures_util::future::ready(active),
                )
                .await
            }
        };
        Ok(handle)
    }

    /// Like `open`, taking the page query string (`id=<url-encoded jid>`).
    pub async fn open_from_query<S, M>(
        &self,
        query: &str,
        surface: &mut S,
        menu: &mut M,
    ) -> Result<Option<JobViewHandle>>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        let Some(jid) = util::query_param(query, "id")? else {
            return Err(Error::invalid_input("query has no id parameter"));
        };
        self.open(&jid, surface, menu).await
    }

    /// Poll the active-jobs list once and reconcile the view.
    ///
    /// Views in a terminal state are left alone and no request is made.
    pub async fn refresh_active<S, M>(
        &self,
        handle: &mut JobViewHandle,
        surface: &mut S,
        menu: &mut M,
    ) -> JobStatus
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        if handle.status().is_terminal() {
            return handle.status().clone();
        }
        let payload = self.inner.api.active_jobs().await;
        view::apply_active_jobs(surface, menu, handle, payload);
        handle.status().clone()
    }

    /// Keep polling the active-jobs list until the view reaches `done` or `(error)`, or return
    /// `Error::JobTimeout`.
    ///
    /// Polling starts at `SaltViewOptions::active_poll_initial` and backs off (with jitter) up
    /// to `active_poll_max`.
    pub async fn watch<S, M>(
        &self,
        handle: &mut JobViewHandle,
        surface: &mut S,
        menu: &mut M,
        timeout: Duration,
    ) -> Result<JobStatus>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        if timeout == Duration::from_secs(0) {
            return Err(Error::invalid_input("timeout must be > 0"));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(jid = %handle.jid(), ?timeout, "watch start");

        let opts = &self.inner.opts;
        let mut jitter = poll_jitter_seed(handle.jid());
        let mut poll_interval =
            apply_jitter(opts.active_poll_initial, opts.active_poll_max, &mut jitter);
        let mut deadline = crate::runtime::sleep(timeout).fuse();

        loop {
            if handle.status().is_terminal() {
                #[cfg(feature = "tracing")]
                tracing::debug!(jid = %handle.jid(), status = %handle.status(), "watch done");

                return Ok(handle.status().clone());
            }

            let mut poll_timer = crate::runtime::sleep(poll_interval).fuse();
            futures_util::select! {
                _ = deadline => {
                    return Err(Error::JobTimeout { jid: handle.jid().to_string(), timeout });
                }
                _ = poll_timer => {}
            }

            self.refresh_active(handle, surface, menu).await;
            poll_interval = next_poll_interval(poll_interval, opts.active_poll_max, &mut jitter);
        }
    }

    /// Dispatch `command` as a new asynchronous job and return its job id when the backend
    /// reports one.
    ///
    /// Commands still carrying `<signalnumber>` are rejected; see `Command::with_signal`.
    pub async fn run(&self, command: &Command) -> Result<Option<String>> {
        command.parse()?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            target_type = %command.target_type,
            target = %command.target,
            command = %command.text,
            "dispatch command"
        );

        let jid = self.inner.api.run_command(command.clone()).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(jid = jid.as_deref().unwrap_or(""), "command dispatched");

        Ok(jid)
    }

    /// Fetch and decode one job (no view involved).
    pub async fn detail(&self, jid: &str) -> Result<JobDescriptor> {
        let jid = util::validate_jid(jid)?;
        let value = self.inner.api.job_detail(jid.clone()).await?;
        match JobDetail::from_value(&jid, &value) {
            Some(JobDetail::Job(job)) => Ok(job),
            Some(JobDetail::Failed { message, .. }) => Err(Error::JobError { jid, message }),
            None => Err(Error::parse_error(
                "job detail is not an object",
                value.to_string(),
            )),
        }
    }

    /// The most recent jobs of the master's job cache, newest first, without the dashboard's own
    /// housekeeping calls.
    pub async fn recent(&self) -> Result<Vec<RecentJob>> {
        let value = self.inner.api.list_jobs().await?;
        recent_jobs_from_value(&value, recent::MAX_RECENT_JOBS).ok_or_else(|| {
            Error::parse_error("job list payload is not an object", value.to_string())
        })
    }

    /// Fetch the currently running jobs.
    pub async fn active(&self) -> Result<ActiveJobsSnapshot> {
        let value = self.inner.api.active_jobs().await?;
        ActiveJobsSnapshot::from_value(&value).ok_or_else(|| {
            Error::parse_error("active jobs payload is not an object", value.to_string())
        })
    }
}

async fn finish_open<S, M>(
    surface: &mut S,
    menu: &mut M,
    jid: &str,
    detail: Result<Value>,
    active: impl Future<Output = Result<Value>>,
) -> Option<JobViewHandle>
where
    S: JobSurface + ?Sized,
    M: MenuBuilder + ?Sized,
{
    let mut handle = view::render_job_detail(surface, menu, jid, detail)?;
    let payload = active.await;
    view::apply_active_jobs(surface, menu, &mut handle, payload);
    Some(handle)
}

fn next_poll_interval(current: Duration, max: Duration, seed: &mut u64) -> Duration {
    let doubled = current.saturating_mul(2);
    let base = if doubled > max { max } else { doubled };
    apply_jitter(base, max, seed)
}

fn apply_jitter(base: Duration, max: Duration, seed: &mut u64) -> Duration {
    if base >= max {
        return base;
    }

    let base_us = duration_to_micros_saturating(base);
    let max_us = duration_to_micros_saturating(max);

    let amplitude = base_us / 10;
    if amplitude == 0 {
        return base;
    }

    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let jitter = *seed % amplitude.saturating_add(1);

    let us = std::cmp::min(base_us.saturating_add(jitter), max_us);
    Duration::from_micros(us)
}

fn duration_to_micros_saturating(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

// Spread concurrent watchers of different jobs apart.
fn poll_jitter_seed(jid: &str) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for b in jid.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }

    let nanos = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => u64::from(d.subsec_nanos()),
        Err(_) => 0,
    };

    hash ^ nanos ^ u64::from(std::process::id())
}
