use std::borrow::Cow;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Settings;
use crate::error::TrialsError;
use crate::sources::ClientOptions;

const CTGOV_API: &str = "clinicaltrials.gov";

/// Upstream page size ceiling for `GET /studies`.
pub const CTGOV_MAX_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct ClinicalTrialsClient {
    client: reqwest_middleware::ClientWithMiddleware,
    base: Cow<'static, str>,
}

#[derive(Debug, Clone, Default)]
pub struct CtGovSearchParams {
    /// ClinicalTrials.gov Essie expression sent as `query.term`.
    pub query_term: Option<String>,
    /// Identifier batch sent as `filter.ids`.
    pub nct_ids: Vec<String>,
    /// Piece names sent as the `fields` hint.
    pub fields: Vec<String>,
    pub page_token: Option<String>,
    pub page_size: usize,
    pub count_total: bool,
}

/// One page of raw, nested study records.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovSearchResponse {
    #[serde(default)]
    pub studies: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
    pub total_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovFieldValueStats {
    pub field: Option<String>,
    pub piece: String,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub missing_studies_count: u64,
    pub unique_values_count: Option<u64>,
    #[serde(default)]
    pub top_values: Vec<CtGovTopValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovTopValue {
    pub value: serde_json::Value,
    pub studies_count: u64,
}

/// `GET /stats/size`; only the study count is used.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtGovRegistrySize {
    pub total_studies: u64,
}

/// The page-at-a-time seam the pagination aggregator drives.
#[async_trait]
pub trait StudySource: Send + Sync {
    async fn search_page(
        &self,
        params: &CtGovSearchParams,
    ) -> Result<CtGovSearchResponse, TrialsError>;
}

fn classify_failure(status: StatusCode, bytes: &[u8]) -> TrialsError {
    let excerpt = crate::sources::body_excerpt(bytes);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        TrialsError::UpstreamUnavailable {
            reason: format!("HTTP {status} after retries: {excerpt}"),
        }
    } else {
        TrialsError::UpstreamRejected {
            status: status.as_u16(),
            reason: excerpt,
        }
    }
}

impl ClinicalTrialsClient {
    pub fn new(settings: &Settings) -> Result<Self, TrialsError> {
        Ok(Self {
            client: crate::sources::build_client(&ClientOptions::from_settings(settings))?,
            base: Cow::Owned(settings.ctgov_base.clone()),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String) -> Result<Self, TrialsError> {
        let options = ClientOptions {
            request_timeout: std::time::Duration::from_secs(5),
            max_retries: 2,
            min_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(5),
            no_cache: false,
        };
        Ok(Self {
            client: crate::sources::build_client(&options)?,
            base: Cow::Owned(base),
        })
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        req: reqwest_middleware::RequestBuilder,
    ) -> Result<T, TrialsError> {
        crate::sources::rate_limit::wait_for_url_str(url).await;
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = crate::sources::read_limited_body(resp, CTGOV_API).await?;
        if !status.is_success() {
            return Err(classify_failure(status, &bytes));
        }
        serde_json::from_slice(&bytes).map_err(|source| {
            let excerpt = crate::sources::body_excerpt(&bytes);
            TrialsError::UpstreamUnavailable {
                reason: format!("invalid JSON from {CTGOV_API}: {source} ({excerpt})"),
            }
        })
    }

    pub async fn search(
        &self,
        params: &CtGovSearchParams,
    ) -> Result<CtGovSearchResponse, TrialsError> {
        let url = self.endpoint("studies");

        let mut req = self.client.get(&url).query(&[("format", "json")]);
        if let Some(v) = params
            .query_term
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            req = req.query(&[("query.term", v)]);
        }
        if !params.nct_ids.is_empty() {
            let ids = params.nct_ids.join(",");
            req = req.query(&[("filter.ids", ids.as_str())]);
        }
        if !params.fields.is_empty() {
            let fields = params.fields.join(",");
            req = req.query(&[("fields", fields.as_str())]);
        }
        if params.count_total {
            req = req.query(&[("countTotal", "true")]);
        }
        if let Some(v) = params
            .page_token
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            req = req.query(&[("pageToken", v)]);
        }

        let page_size = params.page_size.clamp(1, CTGOV_MAX_PAGE_SIZE).to_string();
        req = req.query(&[("pageSize", page_size.as_str())]);

        debug!(
            page_size = params.page_size,
            has_token = params.page_token.is_some(),
            ids = params.nct_ids.len(),
            "ctgov search request"
        );
        self.get_json(&url, req).await
    }

    /// Registry-wide value statistics from `GET /stats/field/values`.
    pub async fn field_value_stats(
        &self,
        fields: &[String],
    ) -> Result<Vec<CtGovFieldValueStats>, TrialsError> {
        let url = self.endpoint("stats/field/values");
        let mut req = self.client.get(&url);
        if !fields.is_empty() {
            let fields = fields.join(",");
            req = req.query(&[("fields", fields.as_str())]);
        }
        self.get_json(&url, req).await
    }

    /// Number of studies in the registry, the denominator for registry-wide percentages.
    pub async fn registry_size(&self) -> Result<CtGovRegistrySize, TrialsError> {
        let url = self.endpoint("stats/size");
        let req = self.client.get(&url);
        self.get_json(&url, req).await
    }
}

#[async_trait]
impl StudySource for ClinicalTrialsClient {
    async fn search_page(
        &self,
        params: &CtGovSearchParams,
    ) -> Result<CtGovSearchResponse, TrialsError> {
        self.search(params).await
    }
}
