use crate::{
    ActiveJobsSnapshot, Capabilities, Command, JobDescriptor, JobStatus, JobSurface, JobViewHandle,
    Jobs, MenuBuilder, MinionPillars, Pillars, PillarsSurface, RecentJob, Result, SaltApi, SaltView,
    SaltViewOptions,
};

use std::time::Duration;

/// Blocking wrapper for `SaltView` (feature=`blocking`).
///
/// This is a convenience API for environments where a synchronous interface is preferred.
/// Internally it uses the selected runtime (`rt-async-io` or `rt-tokio`) to drive the async
/// implementation.
#[derive(Clone, Debug)]
pub struct BlockingSaltView {
    inner: SaltView,
}

impl BlockingSaltView {
    /// Use the salt CLI on this host (blocking).
    #[cfg(feature = "backend-cli")]
    pub fn connect_cli() -> Result<Self> {
        let inner = crate::runtime::block_on_result(SaltView::connect_cli())?;
        Ok(Self { inner })
    }

    /// Use the salt CLI with custom options (blocking).
    #[cfg(feature = "backend-cli")]
    pub fn connect_cli_with(opts: SaltViewOptions) -> Result<Self> {
        let inner = crate::runtime::block_on_result(SaltView::connect_cli_with(opts))?;
        Ok(Self { inner })
    }

    /// Log in to salt-api (blocking).
    #[cfg(feature = "backend-http")]
    pub fn connect_http(credentials: crate::HttpCredentials) -> Result<Self> {
        let inner = crate::runtime::block_on_result(SaltView::connect_http(credentials))?;
        Ok(Self { inner })
    }

    /// Wrap a custom backend.
    pub fn with_api(opts: SaltViewOptions, api: impl SaltApi + 'static) -> Self {
        Self {
            inner: SaltView::with_api(opts, api),
        }
    }

    /// Probe backend capabilities conservatively (blocking).
    pub fn capabilities(&self) -> Result<Capabilities> {
        crate::runtime::block_on_result(async { Ok(self.inner.capabilities().await) })
    }

    /// Access job APIs (blocking wrappers).
    pub fn jobs(&self) -> BlockingJobs {
        BlockingJobs {
            inner: self.inner.jobs(),
        }
    }

    /// Access pillar APIs (blocking wrappers).
    pub fn pillars(&self) -> BlockingPillars {
        BlockingPillars {
            inner: self.inner.pillars(),
        }
    }
}

/// Blocking wrapper for `Jobs`.
#[derive(Clone, Debug)]
pub struct BlockingJobs {
    inner: Jobs,
}

impl BlockingJobs {
    pub fn open<S, M>(&self, jid: &str, surface: &mut S, menu: &mut M) -> Result<Option<JobViewHandle>>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        crate::runtime::block_on_result(self.inner.open(jid, surface, menu))
    }

    pub fn open_from_query<S, M>(
        &self,
        query: &str,
        surface: &mut S,
        menu: &mut M,
    ) -> Result<Option<JobViewHandle>>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        crate::runtime::block_on_result(self.inner.open_from_query(query, surface, menu))
    }

    pub fn refresh_active<S, M>(
        &self,
        handle: &mut JobViewHandle,
        surface: &mut S,
        menu: &mut M,
    ) -> Result<JobStatus>
    where
        S: JobSurface + ?Sized,
        M: MenuBuilder + ?Sized,
    {
        crate::runtime::block_on_result(async {
            Ok(self.inner.refresh_active(handle, surface, menu).await)
        })
    }

    pub fn watch<S, M>(
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
        crate::runtime::block_on_result(self.inner.watch(handle, surface, menu, timeout))
    }

    pub fn run(&self, command: &Command) -> Result<Option<String>> {
        crate::runtime::block_on_result(self.inner.run(command))
    }

    pub fn detail(&self, jid: &str) -> Result<JobDescriptor> {
        crate::runtime::block_on_result(self.inner.detail(jid))
    }

    pub fn active(&self) -> Result<ActiveJobsSnapshot> {
        crate::runtime::block_on_result(self.inner.active())
    }

    pub fn recent(&self) -> Result<Vec<RecentJob>> {
        crate::runtime::block_on_result(self.inner.recent())
    }
}

/// Blocking wrapper for `Pillars`.
#[derive(Clone, Debug)]
pub struct BlockingPillars {
    inner: Pillars,
}

impl BlockingPillars {
    pub fn open<S>(&self, surface: &mut S) -> Result<()>
    where
        S: PillarsSurface + ?Sized,
    {
        crate::runtime::block_on_result(async {
            self.inner.open(surface).await;
            Ok(())
        })
    }

    pub fn list(&self) -> Result<Vec<MinionPillars>> {
        crate::runtime::block_on_result(self.inner.list())
    }
}
