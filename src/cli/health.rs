use std::sync::OnceLock;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::Settings;
use crate::error::TrialsError;

/// One registry endpoint the tools rely on.
struct Endpoint {
    name: &'static str,
    path_and_query: &'static str,
    used_by: &'static str,
}

const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        name: "Studies search",
        path_and_query: "/studies?format=json&query.term=cancer&pageSize=1&fields=NCTId",
        used_by: "search, detail and phase-analysis tools",
    },
    Endpoint {
        name: "Field statistics",
        path_and_query: "/stats/field/values?fields=Phase",
        used_by: "registry-wide get_field_statistics",
    },
    Endpoint {
        name: "Study count",
        path_and_query: "/stats/size",
        used_by: "registry-wide get_field_statistics percentages",
    },
    Endpoint {
        name: "Version",
        path_and_query: "/version",
        used_by: "connectivity diagnostics only",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub endpoint: String,
    pub ok: bool,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl EndpointStatus {
    fn status_cell(&self) -> String {
        match (self.ok, self.http_status, self.failure.as_deref()) {
            (true, _, _) => "ok".to_string(),
            (false, Some(code), _) => format!("HTTP {code}"),
            (false, None, Some(failure)) => failure.to_string(),
            (false, None, None) => "error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub base_url: String,
    pub reachable: usize,
    pub endpoints: Vec<EndpointStatus>,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.reachable == self.endpoints.len()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# ClinicalTrials.gov Health Check\n\nBase URL: `{}`\n\n",
            self.base_url
        );
        out.push_str("| Endpoint | Status | Latency | Degraded |\n");
        out.push_str("|----------|--------|---------|----------|\n");
        for status in &self.endpoints {
            out.push_str(&format!(
                "| {} | {} | {}ms | {} |\n",
                status.endpoint,
                status.status_cell(),
                status.elapsed_ms,
                status.degraded.as_deref().unwrap_or("-"),
            ));
        }
        out.push_str(&format!(
            "\n{}/{} endpoints reachable\n",
            self.reachable,
            self.endpoints.len()
        ));
        out
    }
}

fn check_client() -> Result<reqwest::Client, TrialsError> {
    static CHECK_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    if let Some(client) = CHECK_CLIENT.get() {
        return Ok(client.clone());
    }
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("ctgov-mcp-health/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(TrialsError::HttpClientInit)?;
    Ok(CHECK_CLIENT.get_or_init(|| client).clone())
}

async fn check_endpoint(
    client: &reqwest::Client,
    base: &str,
    endpoint: &Endpoint,
) -> EndpointStatus {
    let started = Instant::now();
    let sent = client
        .get(format!("{base}{}", endpoint.path_and_query))
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await;
    let elapsed_ms = started.elapsed().as_millis();

    let (http_status, failure) = match sent {
        Ok(resp) if resp.status().is_success() => (None, None),
        Ok(resp) => (Some(resp.status().as_u16()), None),
        Err(err) if err.is_timeout() => (None, Some("timeout".to_string())),
        Err(err) if err.is_connect() => (None, Some("connect failed".to_string())),
        Err(err) => (None, Some(err.to_string())),
    };
    let ok = http_status.is_none() && failure.is_none();
    EndpointStatus {
        endpoint: endpoint.name.to_string(),
        ok,
        elapsed_ms,
        http_status,
        failure,
        degraded: (!ok).then(|| endpoint.used_by.to_string()),
    }
}

/// Checks the registry endpoints concurrently, bypassing cache and retries.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be created.
pub async fn check(settings: &Settings) -> Result<HealthReport, TrialsError> {
    let client = check_client()?;
    let base = settings.ctgov_base.trim_end_matches('/');
    let endpoints = futures::future::join_all(
        ENDPOINTS
            .iter()
            .map(|endpoint| check_endpoint(&client, base, endpoint)),
    )
    .await;
    let reachable = endpoints.iter().filter(|e| e.ok).count();
    Ok(HealthReport {
        base_url: base.to_string(),
        reachable,
        endpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn markdown_names_degraded_tools() {
        let report = HealthReport {
            base_url: "https://clinicaltrials.gov/api/v2".into(),
            reachable: 1,
            endpoints: vec![
                EndpointStatus {
                    endpoint: "Studies search".into(),
                    ok: true,
                    elapsed_ms: 12,
                    http_status: None,
                    failure: None,
                    degraded: None,
                },
                EndpointStatus {
                    endpoint: "Field statistics".into(),
                    ok: false,
                    elapsed_ms: 10_000,
                    http_status: None,
                    failure: Some("timeout".into()),
                    degraded: Some("registry-wide get_field_statistics".into()),
                },
            ],
        };
        let md = report.to_markdown();
        assert!(md.contains("| Studies search | ok | 12ms | - |"));
        assert!(md.contains("| Field statistics | timeout | 10000ms | registry-wide"));
        assert!(md.contains("1/2 endpoints reachable"));
        assert!(!report.all_healthy());
    }

    #[tokio::test]
    async fn check_reports_failing_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"studies": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"apiVersion": "2"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stats/size"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"totalStudies": 500000})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stats/field/values"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let settings = Settings {
            ctgov_base: format!("{}/", server.uri()),
            ..Settings::default()
        };
        let report = check(&settings).await.unwrap();
        assert_eq!(report.endpoints.len(), 4);
        assert_eq!(report.reachable, 3);
        let stats = report
            .endpoints
            .iter()
            .find(|e| e.endpoint == "Field statistics")
            .unwrap();
        assert_eq!(stats.http_status, Some(500));
        assert!(stats.degraded.is_some());
        assert!(!report.base_url.ends_with('/'));
    }
}
