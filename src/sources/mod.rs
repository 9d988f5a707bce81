//! Upstream HTTP plumbing shared by source clients.

use std::time::Duration;

use http_cache_reqwest::{Cache, CacheMode, HttpCache, HttpCacheOptions, MokaManager};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;

use crate::config::Settings;
use crate::error::TrialsError;

pub mod clinicaltrials;
pub mod rate_limit;

const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const EXCERPT_MAX_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    pub no_cache: bool,
}

impl ClientOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            request_timeout: settings.request_timeout,
            max_retries: settings.max_retries,
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            no_cache: settings.no_cache,
        }
    }
}

/// Builds the pooled client every request goes through: in-memory response
/// cache outermost (`NoStore` when caching is off), bounded exponential-backoff
/// retries for transient failures inside it.
pub fn build_client(options: &ClientOptions) -> Result<ClientWithMiddleware, TrialsError> {
    let client = reqwest::Client::builder()
        .timeout(options.request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("ctgov-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(TrialsError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(options.min_backoff, options.max_backoff)
        .build_with_max_retries(options.max_retries);

    Ok(ClientBuilder::new(client)
        .with(Cache(HttpCache {
            mode: cache_mode(options.no_cache),
            manager: MokaManager::default(),
            options: HttpCacheOptions::default(),
        }))
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

fn cache_mode(no_cache: bool) -> CacheMode {
    if no_cache {
        CacheMode::NoStore
    } else {
        CacheMode::Default
    }
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, TrialsError> {
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if body.len().saturating_add(chunk.len()) > MAX_BODY_BYTES {
            return Err(TrialsError::UpstreamUnavailable {
                reason: format!("{api} response exceeded {MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "<empty body>".to_string();
    }
    if collapsed.chars().count() <= EXCERPT_MAX_CHARS {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(EXCERPT_MAX_CHARS).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_excerpt_collapses_whitespace() {
        assert_eq!(
            body_excerpt(b"incorrect  format:\n  pageSize"),
            "incorrect format: pageSize"
        );
    }

    #[test]
    fn body_excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let excerpt = body_excerpt(long.as_bytes());
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 1);
        assert!(excerpt.ends_with('…'));
    }

    #[test]
    fn body_excerpt_marks_empty_body() {
        assert_eq!(body_excerpt(b"   "), "<empty body>");
    }

    #[test]
    fn cache_mode_follows_settings() {
        assert_eq!(cache_mode(true), CacheMode::NoStore);
        assert_eq!(cache_mode(false), CacheMode::Default);
        let options = ClientOptions::from_settings(&Settings::default().with_cache_disabled(true));
        assert!(options.no_cache);
    }
}
