use std::time::Duration;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by saltview APIs.
///
/// Failures that happen while a view is being populated are rendered into the page instead (see
/// `JobPage`/`PillarsPage`); this type covers the data APIs, input validation and dispatch.
///
/// This error model is designed to be:
/// - **Classifiable** (callers can branch on variants),
/// - **Diagnosable** (includes context like `jid`, `action`, `backend`),
/// - **Bounded** (payload snippets are truncated to avoid unbounded memory/log growth).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Input validation failure (e.g. empty job id, unfilled signal placeholder).
    #[error("invalid input: {context}")]
    InvalidInput { context: String },

    /// The master refused the request (eauth failure, ACL, HTTP 401/403).
    #[error("permission denied for {action}: {detail}")]
    PermissionDenied {
        action: &'static str,
        detail: String,
    },

    /// The master answered with an object carrying an `Error` field (e.g. unknown job id).
    #[error("job {jid}: {message}")]
    JobError { jid: String, message: String },

    /// Timed out while waiting for a job to leave the active-jobs list.
    #[error("job timeout for {jid}: {timeout:?}")]
    JobTimeout { jid: String, timeout: Duration },

    /// Timed out while performing a backend call (`salt-run`, HTTP request, etc).
    #[error("timeout for {action}: {timeout:?}")]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },

    /// A backend is unavailable in the current environment (missing binary, unreachable
    /// salt-api, feature disabled).
    #[error("backend unavailable ({backend}): {detail}")]
    BackendUnavailable {
        backend: &'static str,
        detail: String,
    },

    /// salt-api answered with a non-success status.
    ///
    /// `body` is truncated to avoid unbounded output.
    #[error("http error {status} for {action}: {body}")]
    HttpError {
        action: &'static str,
        status: u16,
        body: String,
    },

    /// Generic I/O or runtime error with context.
    #[error("io error: {context}")]
    IoError { context: String },

    /// Failed to parse a backend payload.
    ///
    /// `sample` is truncated to avoid unbounded output.
    #[error("parse error: {context}; sample={sample}")]
    ParseError { context: String, sample: String },

    /// A salt command failed (non-zero exit without a usable JSON document).
    ///
    /// `stderr` is truncated to avoid unbounded output.
    #[error("process error: {command} (exit={exit_code:?}): {stderr}")]
    ProcessError {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl Error {
    pub(crate) fn invalid_input(context: impl Into<String>) -> Self {
        Self::InvalidInput {
            context: context.into(),
        }
    }

    pub(crate) fn parse_error(context: impl Into<String>, sample: impl AsRef<str>) -> Self {
        Self::ParseError {
            context: context.into(),
            sample: truncate_for_error(sample.as_ref(), 512).into_owned(),
        }
    }

    #[cfg(feature = "backend-cli")]
    pub(crate) fn process_error(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl AsRef<str>,
    ) -> Self {
        Self::ProcessError {
            command: command.into(),
            exit_code,
            stderr: truncate_for_error(stderr.as_ref(), 8 * 1024).into_owned(),
        }
    }

    #[cfg(feature = "backend-http")]
    pub(crate) fn http_error(action: &'static str, status: u16, body: impl AsRef<str>) -> Self {
        Self::HttpError {
            action,
            status,
            body: truncate_for_error(body.as_ref(), 2 * 1024).into_owned(),
        }
    }
}

pub(crate) fn truncate_for_error(input: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if input.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(input);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(input[..end].to_string())
}
