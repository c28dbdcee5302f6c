use crate::api::SaltApi;
use crate::runtime::BoxFuture;
use crate::types::job::TargetType;
use crate::{Command, Error, Result, SaltViewOptions};

use futures_lite::io::{AsyncRead, AsyncReadExt};
use futures_util::FutureExt;
use serde_json::Value;

use std::process::Stdio;
use std::time::Duration;

const STDERR_MAX_BYTES: usize = 8 * 1024;

/// Backend driving the `salt`, `salt-run` and `salt-key` binaries on the master host.
#[derive(Debug)]
pub(crate) struct CliApi {
    salt_bin: String,
    salt_run_bin: String,
    salt_key_bin: String,
    timeout: Duration,
    max_payload_bytes: usize,
}

impl CliApi {
    /// Check that `salt-run` can be started and build the backend.
    pub(crate) async fn connect(opts: &SaltViewOptions) -> Result<Self> {
        if opts.max_payload_bytes == 0 {
            return Err(Error::invalid_input("max_payload_bytes must be > 0"));
        }
        if opts.call_timeout == Duration::from_secs(0) {
            return Err(Error::invalid_input("call_timeout must be > 0"));
        }

        let api = Self {
            salt_bin: opts.salt_bin.clone(),
            salt_run_bin: opts.salt_run_bin.clone(),
            salt_key_bin: opts.salt_key_bin.clone(),
            timeout: opts.call_timeout,
            max_payload_bytes: opts.max_payload_bytes,
        };

        let out = api
            .capture(&api.salt_run_bin, &["--version".to_string()], "salt-run")
            .await?;
        if !out.status.success() {
            return Err(Error::BackendUnavailable {
                backend: "salt-cli",
                detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            version = %String::from_utf8_lossy(&out.stdout).trim(),
            "salt cli backend ready"
        );

        Ok(api)
    }

    async fn run_json(
        &self,
        program: &str,
        args: &[String],
        action: &'static str,
    ) -> Result<Value> {
        #[cfg(feature = "tracing")]
        let started = std::time::Instant::now();

        let out = self.capture(program, args, action).await?;
        if out.stdout_truncated {
            return Err(Error::parse_error(
                format!("{action} output exceeds {} bytes", self.max_payload_bytes),
                String::from_utf8_lossy(&out.stdout),
            ));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        let parsed = parse_json_document(&stdout);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            action,
            exit_code = out.status.code(),
            bytes = out.stdout.len(),
            elapsed = ?started.elapsed(),
            "salt cli call"
        );

        // salt exits non-zero when some minions fail but still prints the full answer.
        if let Some(value) = parsed {
            return Ok(value);
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            let text = if stderr.trim().is_empty() {
                stdout.as_ref()
            } else {
                stderr.as_ref()
            };
            if let Some(err) = classify_salt_failure(action, text) {
                return Err(err);
            }
            return Err(Error::process_error(action, out.status.code(), text));
        }

        Err(Error::parse_error(
            format!("{action} json parse"),
            stdout.as_ref(),
        ))
    }

    async fn capture(
        &self,
        program: &str,
        args: &[String],
        action: &'static str,
    ) -> Result<Captured> {
        let mut cmd = async_process::Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Error::BackendUnavailable {
                    backend: "salt-cli",
                    detail: format!("{program} not found"),
                };
            }
            Error::IoError {
                context: format!("spawn {program} failed: {e}"),
            }
        })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill_child(&mut child).await;
            return Err(Error::IoError {
                context: format!("{program} output not captured"),
            });
        };

        let mut deadline = crate::runtime::sleep(self.timeout).fuse();
        let mut reads = Box::pin(futures_util::future::join(
            read_limited(stdout, self.max_payload_bytes),
            read_limited(stderr, STDERR_MAX_BYTES),
        ))
        .fuse();

        let reads = futures_util::select! {
            _ = deadline => None,
            r = reads => Some(r),
        };
        let Some((stdout, stderr)) = reads else {
            kill_child(&mut child).await;
            return Err(Error::Timeout {
                action,
                timeout: self.timeout,
            });
        };

        let (stdout, stdout_truncated) = stdout.map_err(|e| Error::IoError {
            context: format!("read {program} stdout: {e}"),
        })?;
        let (stderr, _) = stderr.map_err(|e| Error::IoError {
            context: format!("read {program} stderr: {e}"),
        })?;

        let status = futures_util::select! {
            _ = deadline => None,
            s = Box::pin(child.status()).fuse() => Some(s),
        };
        let Some(status) = status else {
            kill_child(&mut child).await;
            return Err(Error::Timeout {
                action,
                timeout: self.timeout,
            });
        };
        let status = status.map_err(|e| Error::IoError {
            context: format!("wait {program}: {e}"),
        })?;

        Ok(Captured {
            status,
            stdout,
            stdout_truncated,
            stderr,
        })
    }

    async fn dispatch(&self, command: Command) -> Result<Option<String>> {
        let args = dispatch_args(&command)?;
        let out = self.capture(&self.salt_bin, &args, "salt").await?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        if let Some(jid) = parse_job_id(&stdout) {
            return Ok(Some(jid));
        }

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            let text = if stderr.trim().is_empty() {
                stdout.as_ref()
            } else {
                stderr.as_ref()
            };
            if let Some(err) = classify_salt_failure("salt", text) {
                return Err(err);
            }
            return Err(Error::process_error("salt", out.status.code(), text));
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(stdout = %stdout.trim(), "salt --async printed no job id");

        Ok(None)
    }
}

impl SaltApi for CliApi {
    fn job_detail(&self, jid: String) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args = job_detail_args(jid);
            self.run_json(&self.salt_run_bin, &args, "jobs.list_job")
                .await
        })
    }

    fn active_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args = ["--out=json".to_string(), "jobs.active".to_string()];
            self.run_json(&self.salt_run_bin, &args, "jobs.active").await
        })
    }

    fn list_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args = ["--out=json".to_string(), "jobs.list_jobs".to_string()];
            self.run_json(&self.salt_run_bin, &args, "jobs.list_jobs").await
        })
    }

    fn key_list_all(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args = ["--out=json".to_string(), "--list=all".to_string()];
            self.run_json(&self.salt_key_bin, &args, "key.list_all")
                .await
        })
    }

    fn pillar_obfuscate(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let args = [
                "--out=json".to_string(),
                "--static".to_string(),
                "*".to_string(),
                "pillar.obfuscate".to_string(),
            ];
            self.run_json(&self.salt_bin, &args, "pillar.obfuscate")
                .await
        })
    }

    fn run_command(&self, command: Command) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(self.dispatch(command))
    }
}

struct Captured {
    status: std::process::ExitStatus,
    stdout: Vec<u8>,
    stdout_truncated: bool,
    stderr: Vec<u8>,
}

async fn kill_child(child: &mut async_process::Child) {
    let _ = child.kill();
    let _ = child.status().await;
}

// Keeps draining past `cap` so the child never blocks on a full pipe.
async fn read_limited<R: AsyncRead + Unpin>(
    mut reader: R,
    cap: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut truncated = false;
    let mut tmp = [0u8; 4096];
    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            return Ok((out, truncated));
        }
        if out.len().saturating_add(n) > cap {
            truncated = true;
        }
        push_limited(&mut out, &tmp[..n], cap);
    }
}

fn push_limited(out: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    if out.len() >= cap {
        return;
    }
    let remaining = cap.saturating_sub(out.len());
    let n = std::cmp::min(chunk.len(), remaining);
    out.extend_from_slice(&chunk[..n]);
}

// Tolerates log lines printed around the document. Candidates start at a line beginning.
fn parse_json_document(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    trimmed
        .char_indices()
        .filter(|&(i, c)| {
            matches!(c, '{' | '[') && (i == 0 || trimmed[..i].ends_with('\n'))
        })
        .find_map(|(i, _)| {
            serde_json::Deserializer::from_str(&trimmed[i..])
                .into_iter::<Value>()
                .next()
                .and_then(|r| r.ok())
        })
}

// `--` keeps a jid from being read as a salt-run option.
fn job_detail_args(jid: String) -> Vec<String> {
    vec![
        "--out=json".to_string(),
        "--".to_string(),
        "jobs.list_job".to_string(),
        jid,
    ]
}

fn classify_salt_failure(action: &'static str, text: &str) -> Option<Error> {
    let lower = text.to_ascii_lowercase();

    if lower.contains("authentication error")
        || lower.contains("authentication failure")
        || lower.contains("permission denied")
        || lower.contains("not permitted")
        || lower.contains("unable to run command")
    {
        return Some(Error::PermissionDenied {
            action,
            detail: text.trim().to_string(),
        });
    }

    if lower.contains("master could not be accessed")
        || lower.contains("salt master is not responding")
        || lower.contains("connection refused")
    {
        return Some(Error::BackendUnavailable {
            backend: "salt-master",
            detail: text.trim().to_string(),
        });
    }

    None
}

fn target_flag(target_type: &TargetType) -> Result<Option<&'static str>> {
    let flag = match target_type {
        TargetType::Glob => None,
        TargetType::List => Some("-L"),
        TargetType::Grain => Some("-G"),
        TargetType::GrainPcre => Some("-P"),
        TargetType::Pillar => Some("-I"),
        TargetType::PillarPcre => Some("-J"),
        TargetType::Pcre => Some("-E"),
        TargetType::Compound => Some("-C"),
        TargetType::Nodegroup => Some("-N"),
        TargetType::Ipcidr => Some("-S"),
        TargetType::Range => Some("-R"),
        TargetType::Other(other) => {
            return Err(Error::invalid_input(format!(
                "target type {other} is not supported by the salt CLI"
            )));
        }
    };
    Ok(flag)
}

fn dispatch_args(command: &Command) -> Result<Vec<String>> {
    let parsed = command.parse()?;
    let target = command.target.trim();
    if target.starts_with('-') {
        return Err(Error::invalid_input(format!("invalid target: {target}")));
    }
    if parsed.fun.starts_with('-') {
        return Err(Error::invalid_input(format!(
            "invalid function name: {}",
            parsed.fun
        )));
    }

    let mut args = vec!["--async".to_string()];
    if let Some(flag) = target_flag(&command.target_type)? {
        args.push(flag.to_string());
    }
    args.push(target.to_string());
    args.push("--".to_string());
    args.push(parsed.fun);
    for arg in &parsed.args {
        args.push(cli_value(arg));
    }
    for (key, value) in &parsed.kwargs {
        args.push(format!("{key}={}", cli_value(value)));
    }
    Ok(args)
}

fn cli_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// `salt --async` prints "Executed command with job ID: <jid>".
fn parse_job_id(stdout: &str) -> Option<String> {
    let (_, rest) = stdout.split_once("job ID:")?;
    let jid = rest.split_whitespace().next()?;
    Some(jid.to_string())
}
