use std::time::Duration;

/// Configuration options for `SaltView`.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SaltViewOptions {
    /// Timeout for a single backend call (one `salt-run` invocation or one HTTP request).
    pub call_timeout: Duration,

    /// Initial polling interval for `Jobs::watch`.
    pub active_poll_initial: Duration,

    /// Maximum polling interval for `Jobs::watch`.
    pub active_poll_max: Duration,

    /// `salt` binary used by the CLI backend.
    pub salt_bin: String,

    /// `salt-run` binary used by the CLI backend.
    pub salt_run_bin: String,

    /// `salt-key` binary used by the CLI backend.
    pub salt_key_bin: String,

    /// Upper bound for a single JSON document read from a backend.
    ///
    /// Default: 16 MiB.
    pub max_payload_bytes: usize,
}

impl Default for SaltViewOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            active_poll_initial: Duration::from_secs(1),
            active_poll_max: Duration::from_secs(10),
            salt_bin: "salt".to_string(),
            salt_run_bin: "salt-run".to_string(),
            salt_key_bin: "salt-key".to_string(),
            max_payload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Login settings for the salt-api backend (feature=`backend-http`).
#[derive(Clone, Eq, PartialEq)]
#[non_exhaustive]
pub struct HttpCredentials {
    /// Base URL of salt-api, e.g. `https://salt.example.com:8000`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// External auth backend (`pam`, `ldap`, `file`, ...).
    pub eauth: String,
}

impl HttpCredentials {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        eauth: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            eauth: eauth.into(),
        }
    }

    /// Read `SALT_API_URL`, `SALT_API_USER`, `SALT_API_PASSWORD` and `SALT_API_EAUTH`
    /// (default: `pam`).
    pub fn from_env() -> crate::Result<Self> {
        let url = required_env("SALT_API_URL")?;
        let username = required_env("SALT_API_USER")?;
        let password = required_env("SALT_API_PASSWORD")?;
        let eauth = env("SALT_API_EAUTH").unwrap_or_else(|| "pam".to_string());
        Ok(Self::new(url, username, password, eauth))
    }
}

impl std::fmt::Debug for HttpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("eauth", &self.eauth)
            .finish()
    }
}

fn env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn required_env(name: &'static str) -> crate::Result<String> {
    env(name).ok_or_else(|| crate::Error::invalid_input(format!("{name} must be set")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let creds = HttpCredentials::new("https://salt:8000", "admin", "hunter2", "pam");
        let out = format!("{creds:?}");
        assert!(out.contains("admin"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn poll_interval_defaults_are_ordered() {
        let opts = SaltViewOptions::default();
        assert!(opts.active_poll_initial <= opts.active_poll_max);
        assert!(opts.call_timeout > Duration::from_secs(0));
    }
}
