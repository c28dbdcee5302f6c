use crate::JobDescriptor;

/// Minion subsets worth offering as one-click re-run targets.
///
/// Each set keeps the order of the job's `Minions` list; `None` means the menu item is not
/// offered.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct RerunTargets {
    /// Every targeted minion; only when more than one minion was targeted.
    pub all_minions: Option<Vec<String>>,
    /// Failed plus non-responding minions; only when both kinds are present, otherwise one of
    /// the two sets below already covers it.
    pub unsuccessful: Option<Vec<String>>,
    /// Minions that answered with a non-OK result.
    pub failed: Option<Vec<String>>,
    /// Minions without an answer.
    pub non_responding: Option<Vec<String>>,
}

/// Derive re-run candidates from a job snapshot. Jobs without a `Minions` list get none.
pub fn derive_rerun_targets(job: &JobDescriptor) -> RerunTargets {
    let Some(minions) = job.minions.as_deref() else {
        return RerunTargets::default();
    };

    let mut unsuccessful = Vec::new();
    let mut failed = Vec::new();
    let mut non_responding = Vec::new();

    for minion in minions {
        match job.result.get(minion) {
            None => {
                non_responding.push(minion.clone());
                unsuccessful.push(minion.clone());
            }
            Some(result) if !result.is_ok() => {
                failed.push(minion.clone());
                unsuccessful.push(minion.clone());
            }
            Some(_) => {}
        }
    }

    let mixed = !failed.is_empty() && !non_responding.is_empty();

    RerunTargets {
        all_minions: (minions.len() > 1).then(|| minions.to_vec()),
        unsuccessful: mixed.then_some(unsuccessful),
        failed: (!failed.is_empty()).then_some(failed),
        non_responding: (!non_responding.is_empty()).then_some(non_responding),
    }
}
