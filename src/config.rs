use std::env;
use std::time::Duration;

use anyhow::Context;

pub const CTGOV_BASE: &str = "https://clinicaltrials.gov/api/v2";

const BASE_ENV: &str = "CTGOV_MCP_BASE";
const TIMEOUT_ENV: &str = "CTGOV_MCP_TIMEOUT_SECS";
const REQUEST_TIMEOUT_ENV: &str = "CTGOV_MCP_REQUEST_TIMEOUT_SECS";
const MAX_RETRIES_ENV: &str = "CTGOV_MCP_MAX_RETRIES";
const NO_CACHE_ENV: &str = "CTGOV_MCP_NO_CACHE";

const DEFAULT_DEADLINE_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct Settings {
    /// ClinicalTrials.gov API v2 base URL.
    pub ctgov_base: String,
    /// Caller-level deadline applied to each tool invocation.
    pub deadline: Duration,
    /// Timeout for a single upstream HTTP request.
    pub request_timeout: Duration,
    /// Retries for transient upstream failures, per request.
    pub max_retries: u32,
    /// Bypass the in-memory response cache.
    pub no_cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ctgov_base: CTGOV_BASE.to_string(),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            no_cache: false,
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let ctgov_base = env::var(BASE_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| CTGOV_BASE.to_string());

        let deadline_secs = parse_env(TIMEOUT_ENV, DEFAULT_DEADLINE_SECS)?;
        let request_timeout_secs = parse_env(REQUEST_TIMEOUT_ENV, DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let max_retries = parse_env(MAX_RETRIES_ENV, DEFAULT_MAX_RETRIES)?;
        let no_cache = parse_env(NO_CACHE_ENV, false)?;

        if deadline_secs == 0 {
            anyhow::bail!("{TIMEOUT_ENV} must be greater than zero");
        }
        if request_timeout_secs == 0 {
            anyhow::bail!("{REQUEST_TIMEOUT_ENV} must be greater than zero");
        }

        Ok(Self {
            ctgov_base,
            deadline: Duration::from_secs(deadline_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_retries,
            no_cache,
        })
    }

    /// `--no-cache` can only turn caching off.
    pub fn with_cache_disabled(mut self, disabled: bool) -> Self {
        self.no_cache |= disabled;
        self
    }

    pub fn with_deadline_secs(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs.filter(|v| *v > 0) {
            self.deadline = Duration::from_secs(secs);
        }
        self
    }
}

fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_api() {
        let settings = Settings::default();
        assert_eq!(settings.ctgov_base, CTGOV_BASE);
        assert_eq!(settings.deadline, Duration::from_secs(120));
        assert_eq!(settings.max_retries, 3);
    }

    #[test]
    fn deadline_override_ignores_zero() {
        let settings = Settings::default().with_deadline_secs(Some(0));
        assert_eq!(settings.deadline, Duration::from_secs(120));
        let settings = Settings::default().with_deadline_secs(Some(15));
        assert_eq!(settings.deadline, Duration::from_secs(15));
    }

    #[test]
    fn cache_flag_only_disables() {
        assert!(!Settings::default().no_cache);
        assert!(Settings::default().with_cache_disabled(true).no_cache);
        let settings = Settings {
            no_cache: true,
            ..Settings::default()
        };
        assert!(settings.with_cache_disabled(false).no_cache);
    }

    #[test]
    fn parse_env_falls_back_when_unset() {
        let value: u64 = parse_env("CTGOV_MCP_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
