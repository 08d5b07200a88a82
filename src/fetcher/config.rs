//! HTTP client configuration and backoff schedule

use std::time::Duration;

/// Default SODA endpoint (City of Chicago "Crimes - 2001 to Present")
pub const DEFAULT_ENDPOINT: &str = "https://data.cityofchicago.org/resource/ijzp-q8t2.json";

/// Default per-request timeout.
/// Large `$limit` pages can take minutes to render server-side.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of retries after an HTTP 429
pub const DEFAULT_RETRIES: u32 = 4;

/// Default base backoff; the n-th retry waits `2^n` times this
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Upper bound for a single backoff sleep
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Environment variables consulted for an app token, in precedence order
pub const APP_TOKEN_ENV_VARS: [&str; 2] = ["SOC_APP_TOKEN", "SOCRATA_APP_TOKEN"];

/// Header carrying the Socrata application token
pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// HTTP settings, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Timeout applied to every attempt
    pub timeout: Duration,
    /// Retries after HTTP 429 before giving up
    pub retries: u32,
    /// Base of the exponential backoff schedule
    pub base_backoff: Duration,
    /// Value of the `User-Agent` header
    pub user_agent: String,
    /// Optional application token, resolved once at startup
    pub app_token: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retries: DEFAULT_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            user_agent: default_user_agent(),
            app_token: None,
        }
    }
}

impl HttpSettings {
    /// Set the application token
    pub fn with_app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

/// `socrata-downloader/<crate version>`
pub fn default_user_agent() -> String {
    format!("socrata-downloader/{}", env!("CARGO_PKG_VERSION"))
}

/// Resolve the app token from the first non-empty variable in [`APP_TOKEN_ENV_VARS`].
///
/// `lookup` abstracts `std::env::var` so callers and tests can inject values.
pub fn resolve_app_token<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    APP_TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty())
}

/// Backoff before retry number `attempt` (0-based): `2^attempt * base`, capped
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor)
        .min(Duration::from_millis(MAX_BACKOFF_MS))
}
