// crates/client/src/config.rs
//! Client configuration: endpoint bases, timeouts and polling cadence.

use std::time::Duration;

/// Default API base of a local backend.
const DEFAULT_API_BASE: &str = "http://localhost:8089/api/";

/// Per-request timeout. The backend never hangs a healthy request this long;
/// anything slower is treated as a transport failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Delay between status-poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Endpoint and timing configuration shared by the session, the manifest
/// client and the status poller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base of the manifest API, trailing slash guaranteed
    /// (e.g. `https://pwa.empresa.com/api/`).
    pub api_base: String,
    /// Base of the auth endpoints (`login/`, `token/refresh/`), trailing
    /// slash guaranteed. Defaults to `{api_base}auth/`.
    pub auth_base: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl ClientConfig {
    /// Build a config for the given API base, deriving the auth base from it.
    pub fn new(api_base: impl Into<String>) -> Self {
        let api_base = with_trailing_slash(api_base.into());
        let auth_base = format!("{api_base}auth/");
        Self {
            api_base,
            auth_base,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Read configuration from the environment, falling back to defaults.
    ///
    /// - `MANIFESTO_API_BASE` — manifest API base URL
    /// - `MANIFESTO_AUTH_BASE` — auth base URL (default `{api_base}auth/`)
    /// - `MANIFESTO_POLL_INTERVAL_MS` — poll cadence in milliseconds
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("MANIFESTO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        );
        if let Ok(auth_base) = std::env::var("MANIFESTO_AUTH_BASE") {
            config.auth_base = with_trailing_slash(auth_base);
        }
        if let Some(ms) = std::env::var("MANIFESTO_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        config
    }

    /// Set the poll cadence. A zero interval would make `tokio::time::interval`
    /// panic inside the poll task, so it falls back to the default.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

fn with_trailing_slash(mut base: String) -> String {
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}
