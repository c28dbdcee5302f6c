/// Probe capabilities conservatively (never guess true).
pub(crate) async fn probe(view: &crate::SaltView) -> Capabilities {
    let api = &view.inner.api;
    let (active, keys) = futures_util::future::join(api.active_jobs(), api.key_list_all()).await;

    let can_read_jobs = active
        .as_ref()
        .is_ok_and(|v| crate::types::active::ActiveJobsSnapshot::from_value(v).is_some());

    let can_read_keys = keys
        .as_ref()
        .is_ok_and(|v| crate::pillars::parse_key_list(v).is_some());

    #[cfg(feature = "tracing")]
    tracing::debug!(can_read_jobs, can_read_keys, "capabilities probed");

    Capabilities {
        can_read_jobs,
        can_read_keys,
    }
}

/// Runtime capabilities derived from conservative probing.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Capabilities {
    /// Whether runner calls (`jobs.active`, `jobs.list_job`) are likely to work.
    pub can_read_jobs: bool,
    /// Whether the key list (and therefore the pillars view) is likely to work.
    pub can_read_keys: bool,
}
