use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

fn min_interval_for_host(host: &str) -> Option<Duration> {
    match host {
        "clinicaltrials.gov" | "www.clinicaltrials.gov" => Some(Duration::from_millis(300)),
        _ => None,
    }
}

fn next_slots() -> &'static Mutex<HashMap<String, Instant>> {
    static SLOTS: OnceLock<Mutex<HashMap<String, Instant>>> = OnceLock::new();
    SLOTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Spaces consecutive requests to paced hosts. Unknown hosts pass through.
pub async fn wait_for_url_str(url: &str) {
    let Some(host) = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return;
    };
    let Some(interval) = min_interval_for_host(&host) else {
        return;
    };

    let wait_until = {
        let mut slots = next_slots().lock().await;
        let now = Instant::now();
        let slot = slots.get(&host).copied().filter(|t| *t > now).unwrap_or(now);
        slots.insert(host.clone(), slot + interval);
        slot
    };

    if wait_until > Instant::now() {
        debug!(host, "pacing upstream request");
        tokio::time::sleep_until(wait_until).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_registry_host_is_paced() {
        assert!(min_interval_for_host("clinicaltrials.gov").is_some());
        assert!(min_interval_for_host("127.0.0.1").is_none());
    }

    #[tokio::test]
    async fn unpaced_host_returns_immediately() {
        let start = std::time::Instant::now();
        wait_for_url_str("http://127.0.0.1:9/studies").await;
        wait_for_url_str("http://127.0.0.1:9/studies").await;
        assert!(start.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn paced_host_spaces_requests() {
        let start = Instant::now();
        wait_for_url_str("https://clinicaltrials.gov/api/v2/studies").await;
        wait_for_url_str("https://clinicaltrials.gov/api/v2/studies").await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
