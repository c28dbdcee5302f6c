use crate::api::SaltApi;
use crate::runtime::BoxFuture;
use crate::{Command, Error, HttpCredentials, Result, SaltViewOptions};

use serde::Serialize;
use serde_json::{Map, Value};

use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

/// Backend talking to salt-api (rest_cherrypy) with token authentication.
pub(crate) struct HttpApi {
    client: reqwest::Client,
    base: String,
    credentials: HttpCredentials,
    token: RwLock<String>,
    timeout: Duration,
    max_payload_bytes: usize,
}

impl fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpApi")
            .field("base", &self.base)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Login<'a> {
    username: &'a str,
    password: &'a str,
    eauth: &'a str,
}

#[derive(Clone, Debug, Default, Serialize)]
struct LowState {
    client: &'static str,
    fun: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tgt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tgt_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arg: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kwarg: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jid: Option<String>,
}

impl LowState {
    fn runner(fun: &str) -> Self {
        Self {
            client: "runner",
            fun: fun.to_string(),
            ..Default::default()
        }
    }
}

impl HttpApi {
    /// Log in and build the backend.
    pub(crate) async fn connect(opts: &SaltViewOptions, credentials: HttpCredentials) -> Result<Self> {
        let base = credentials.url.trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(Error::invalid_input("salt-api url must not be empty"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::invalid_input(format!(
                "salt-api url must start with http:// or https://: {base}"
            )));
        }
        if opts.call_timeout == Duration::from_secs(0) {
            return Err(Error::invalid_input("call_timeout must be > 0"));
        }

        let client = reqwest::Client::builder()
            .timeout(opts.call_timeout)
            .connect_timeout(opts.call_timeout)
            .build()
            .map_err(|e| Error::IoError {
                context: format!("build http client: {e}"),
            })?;

        let api = Self {
            client,
            base,
            credentials,
            token: RwLock::new(String::new()),
            timeout: opts.call_timeout,
            max_payload_bytes: opts.max_payload_bytes,
        };
        api.login().await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %api.base, user = %api.credentials.username, "salt-api login ok");

        Ok(api)
    }

    async fn login(&self) -> Result<()> {
        let body = Login {
            username: &self.credentials.username,
            password: &self.credentials.password,
            eauth: &self.credentials.eauth,
        };
        let resp = self
            .client
            .post(format!("{}/login", self.base))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error("login", e))?;

        let value = self.read_response("login", resp).await?;
        let token = value
            .pointer("/return/0/token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parse_error("salt-api login has no token", value.to_string()))?;

        match self.token.write() {
            Ok(mut guard) => *guard = token.to_string(),
            Err(poisoned) => *poisoned.into_inner() = token.to_string(),
        }
        Ok(())
    }

    fn current_token(&self) -> String {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Run one lowstate chunk and return `return[0]`. An expired token is renewed once.
    async fn call(&self, lowstate: &LowState, action: &'static str) -> Result<Value> {
        #[cfg(feature = "tracing")]
        let started = std::time::Instant::now();

        let mut renewed = false;
        let value = loop {
            let resp = self
                .client
                .post(format!("{}/", self.base))
                .header(reqwest::header::ACCEPT, "application/json")
                .header("X-Auth-Token", self.current_token())
                .json(&[lowstate])
                .send()
                .await
                .map_err(|e| self.map_send_error(action, e))?;

            if resp.status() == reqwest::StatusCode::UNAUTHORIZED && !renewed {
                #[cfg(feature = "tracing")]
                tracing::debug!(action, "salt-api token rejected, logging in again");

                renewed = true;
                self.login().await?;
                continue;
            }
            break self.read_response(action, resp).await?;
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(action, elapsed = ?started.elapsed(), "salt-api call");

        value
            .pointer("/return/0")
            .cloned()
            .ok_or_else(|| Error::parse_error(format!("{action} has no return"), value.to_string()))
    }

    async fn read_response(&self, action: &'static str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::PermissionDenied {
                action,
                detail: format!("salt-api answered {status}"),
            });
        }

        let declared_too_large = resp
            .content_length()
            .is_some_and(|len| exceeds_limit(len, self.max_payload_bytes));
        if declared_too_large && status.is_success() {
            return Err(self.too_large(action, &[]));
        }

        let (body, truncated) = self.read_limited(action, resp).await?;
        if !status.is_success() {
            return Err(Error::http_error(
                action,
                status.as_u16(),
                String::from_utf8_lossy(&body),
            ));
        }
        if truncated {
            return Err(self.too_large(action, &body));
        }

        serde_json::from_slice::<Value>(&body).map_err(|_| {
            Error::parse_error(format!("{action} json parse"), String::from_utf8_lossy(&body))
        })
    }

    // Never buffers more than `max_payload_bytes`.
    async fn read_limited(
        &self,
        action: &'static str,
        mut resp: reqwest::Response,
    ) -> Result<(Vec<u8>, bool)> {
        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| self.map_send_error(action, e))?
        {
            if !push_bounded(&mut body, &chunk, self.max_payload_bytes) {
                return Ok((body, true));
            }
        }
        Ok((body, false))
    }

    fn too_large(&self, action: &'static str, head: &[u8]) -> Error {
        Error::parse_error(
            format!("{action} response exceeds {} bytes", self.max_payload_bytes),
            String::from_utf8_lossy(&head[..head.len().min(512)]),
        )
    }

    fn map_send_error(&self, action: &'static str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            return Error::Timeout {
                action,
                timeout: self.timeout,
            };
        }
        if e.is_connect() {
            return Error::BackendUnavailable {
                backend: "salt-api",
                detail: e.to_string(),
            };
        }
        Error::IoError {
            context: format!("{action}: {e}"),
        }
    }

    async fn dispatch(&self, command: Command) -> Result<Option<String>> {
        let lowstate = dispatch_lowstate(&command)?;
        let value = self.call(&lowstate, "local_async").await?;
        Ok(value.get("jid").and_then(Value::as_str).map(str::to_string))
    }
}

fn dispatch_lowstate(command: &Command) -> Result<LowState> {
    let parsed = command.parse()?;
    Ok(LowState {
        client: "local_async",
        fun: parsed.fun,
        tgt: Some(command.target.trim().to_string()),
        tgt_type: Some(command.target_type.as_str().to_string()),
        arg: Some(parsed.args),
        kwarg: (!parsed.kwargs.is_empty()).then_some(parsed.kwargs),
        jid: None,
    })
}

impl SaltApi for HttpApi {
    fn job_detail(&self, jid: String) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let lowstate = LowState {
                jid: Some(jid),
                ..LowState::runner("jobs.list_job")
            };
            self.call(&lowstate, "jobs.list_job").await
        })
    }

    fn active_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.call(&LowState::runner("jobs.active"), "jobs.active")
                .await
        })
    }

    fn list_jobs(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.call(&LowState::runner("jobs.list_jobs"), "jobs.list_jobs")
                .await
        })
    }

    fn key_list_all(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let lowstate = LowState {
                client: "wheel",
                fun: "key.list_all".to_string(),
                ..Default::default()
            };
            let value = self.call(&lowstate, "key.list_all").await?;
            value
                .pointer("/data/return")
                .cloned()
                .ok_or_else(|| Error::parse_error("key.list_all has no data.return", value.to_string()))
        })
    }

    fn pillar_obfuscate(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let lowstate = LowState {
                client: "local",
                fun: "pillar.obfuscate".to_string(),
                tgt: Some("*".to_string()),
                ..Default::default()
            };
            self.call(&lowstate, "pillar.obfuscate").await
        })
    }

    fn run_command(&self, command: Command) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(self.dispatch(command))
    }
}

fn exceeds_limit(len: u64, cap: usize) -> bool {
    usize::try_from(len).map_or(true, |len| len > cap)
}

// Returns false once `chunk` does not fit; `out` then holds exactly `cap` bytes.
fn push_bounded(out: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let remaining = cap.saturating_sub(out.len());
    if chunk.len() > remaining {
        out.extend_from_slice(&chunk[..remaining]);
        return false;
    }
    out.extend_from_slice(chunk);
    true
}
