use crate::runtime::BoxFuture;
use crate::{Command, Result};

use serde_json::Value;
use std::sync::Arc;

#[cfg(feature = "backend-cli")]
pub(crate) mod cli;
#[cfg(feature = "backend-http")]
pub(crate) mod http;

/// Access to a Salt master.
///
/// Every call yields the normalized JSON document the master returned; decoding and rendering
/// happen in the views. Implement this to plug in another transport or a test double.
pub trait SaltApi: std::fmt::Debug + Send + Sync {
    /// Detail of one job (runner `jobs.list_job`).
    fn job_detail(&self, jid: String) -> BoxFuture<'_, Result<Value>>;

    /// Jobs currently running, keyed by job id (runner `jobs.active`).
    fn active_jobs(&self) -> BoxFuture<'_, Result<Value>>;

    /// Jobs in the master's job cache, keyed by job id (runner `jobs.list_jobs`).
    fn list_jobs(&self) -> BoxFuture<'_, Result<Value>>;

    /// Minion keys by acceptance state (wheel `key.list_all`).
    fn key_list_all(&self) -> BoxFuture<'_, Result<Value>>;

    /// Obfuscated pillar data of every minion that answered (`pillar.obfuscate` on `*`).
    fn pillar_obfuscate(&self) -> BoxFuture<'_, Result<Value>>;

    /// Start `command` as an asynchronous job. Returns the job id when the master reports one.
    fn run_command(&self, command: Command) -> BoxFuture<'_, Result<Option<String>>>;
}

impl<T: SaltApi + ?Sized> SaltApi for Arc<T> {
    fn job_detail(&self, jid: String) -> BoxFuture<'_, Result<Value>> {
        (**self).job_detail(jid)
    }

    fn active_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        (**self).active_jobs()
    }

    fn list_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        (**self).list_jobs()
    }

    fn key_list_all(&self) -> BoxFuture<'_, Result<Value>> {
        (**self).key_list_all()
    }

    fn pillar_obfuscate(&self) -> BoxFuture<'_, Result<Value>> {
        (**self).pillar_obfuscate()
    }

    fn run_command(&self, command: Command) -> BoxFuture<'_, Result<Option<String>>> {
        (**self).run_command(command)
    }
}
