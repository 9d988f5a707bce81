//! MCP tool surface over stdio.
//!
//! Every tool delegates to [`TrialService`]. Successful calls return pretty
//! JSON text; failures return an error result whose text is the serialized
//! `ToolError` object.

use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::entities::query::SearchCriteria;
use crate::entities::trial::TrialService;
use crate::error::TrialsError;

pub mod params;

use params::*;

const INSTRUCTIONS: &str = "Read-only access to ClinicalTrials.gov. \
Search tools return compact records (NCTId, BriefTitle, Phase, OverallStatus, ...) and accept \
an optional `fields` list; call get_available_fields to see valid names. Values inside one \
list are OR'd, different criteria are AND'd. Use search_trials_nct_ids_only for cheap \
discovery, then get_trial_details or get_trial_details_batched for full records. \
analyze_trial_phases and get_field_statistics summarise value distributions. \
Failures come back as JSON objects with error_kind, message and optional details.";

/// Pretty JSON body for a tool outcome, plus whether it reports an error.
fn tool_payload<T: Serialize>(
    tool: &str,
    result: Result<T, TrialsError>,
) -> Result<(String, bool), McpError> {
    let (body, is_error) = match result {
        Ok(value) => (serde_json::to_string_pretty(&value), false),
        Err(err) => {
            warn!(tool, error_kind = err.error_kind(), "{err}");
            (serde_json::to_string_pretty(&err.to_tool_error()), true)
        }
    };
    let body = body.map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok((body, is_error))
}

fn tool_result<T: Serialize>(
    tool: &str,
    result: Result<T, TrialsError>,
) -> Result<CallToolResult, McpError> {
    let (body, is_error) = tool_payload(tool, result)?;
    let content = vec![Content::text(body)];
    Ok(if is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    })
}

#[derive(Clone)]
pub struct TrialsMcpServer {
    service: TrialService,
    tool_router: ToolRouter<Self>,
}

impl TrialsMcpServer {
    pub fn new(service: TrialService) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl TrialsMcpServer {
    #[tool(
        description = "Search clinical trials by condition or disease. Returns up to max_studies compact trial records."
    )]
    async fn search_trials_by_condition(
        &self,
        Parameters(p): Parameters<ConditionSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_by_condition(p.conditions, p.max_studies, p.fields.unwrap_or_default())
            .await;
        tool_result("search_trials_by_condition", result)
    }

    #[tool(description = "Search clinical trials by intervention (drug, device, procedure).")]
    async fn search_trials_by_intervention(
        &self,
        Parameters(p): Parameters<InterventionSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_by_intervention(p.interventions, p.max_studies, p.fields.unwrap_or_default())
            .await;
        tool_result("search_trials_by_intervention", result)
    }

    #[tool(description = "Search clinical trials by lead sponsor or collaborator.")]
    async fn search_trials_by_sponsor(
        &self,
        Parameters(p): Parameters<SponsorSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_by_sponsor(p.sponsors, p.max_studies, p.fields.unwrap_or_default())
            .await;
        tool_result("search_trials_by_sponsor", result)
    }

    #[tool(
        description = "Search clinical trials by study acronym. Substring match by default; set exact_match for equality."
    )]
    async fn search_trials_by_acronym(
        &self,
        Parameters(p): Parameters<AcronymSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_by_acronym(
                p.acronyms,
                p.exact_match.unwrap_or(false),
                p.max_studies,
                p.fields.unwrap_or_default(),
            )
            .await;
        tool_result("search_trials_by_acronym", result)
    }

    #[tool(description = "Fetch trials by NCT identifier. Results follow the input order.")]
    async fn search_trials_by_nct_ids(
        &self,
        Parameters(p): Parameters<NctIdsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_by_nct_ids(p.nct_ids, p.fields.unwrap_or_default())
            .await;
        tool_result("search_trials_by_nct_ids", result)
    }

    #[tool(
        description = "Search clinical trials with any mix of conditions, interventions, sponsors, free-text terms and NCT identifiers."
    )]
    async fn search_trials_combined(
        &self,
        Parameters(p): Parameters<CombinedSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.service.search_combined(SearchCriteria::from(p)).await;
        tool_result("search_trials_combined", result)
    }

    #[tool(
        description = "Lightweight discovery search returning only identifiers, titles and status (default max 100)."
    )]
    async fn search_trials_nct_ids_only(
        &self,
        Parameters(p): Parameters<NctIdsOnlyParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .search_nct_ids_only(SearchCriteria::from(p))
            .await;
        tool_result("search_trials_nct_ids_only", result)
    }

    #[tool(description = "Get the full record of one trial by NCT identifier.")]
    async fn get_trial_details(
        &self,
        Parameters(p): Parameters<TrialDetailsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .get_trial_details(&p.nct_id, p.fields.unwrap_or_default())
            .await;
        tool_result("get_trial_details", result)
    }

    #[tool(
        description = "Get full records for many trials, fetched in batches. Reports identifiers that were not found."
    )]
    async fn get_trial_details_batched(
        &self,
        Parameters(p): Parameters<BatchedDetailsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .get_trial_details_batched(p.nct_ids, p.batch_size, p.fields.unwrap_or_default())
            .await;
        tool_result("get_trial_details_batched", result)
    }

    #[tool(description = "Phase distribution over trials matching the given criteria.")]
    async fn analyze_trial_phases(
        &self,
        Parameters(p): Parameters<PhaseAnalysisParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .service
            .analyze_trial_phases(SearchCriteria::from(p))
            .await;
        tool_result("analyze_trial_phases", result)
    }

    #[tool(
        description = "Value distributions for fields selected by name and/or type. With criteria, counts cover matching trials; without, registry-wide counts."
    )]
    async fn get_field_statistics(
        &self,
        Parameters(p): Parameters<FieldStatisticsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.service.get_field_statistics(p.into()).await;
        tool_result("get_field_statistics", result)
    }

    #[tool(description = "List the field names accepted by the fields parameters, grouped by category.")]
    async fn get_available_fields(
        &self,
        Parameters(p): Parameters<AvailableFieldsParams>,
    ) -> Result<CallToolResult, McpError> {
        let catalog = TrialService::available_fields(p.category.as_deref());
        tool_result("get_available_fields", Ok::<_, TrialsError>(catalog))
    }
}

#[tool_handler]
impl ServerHandler for TrialsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

/// Serves the tools over stdin/stdout until the client disconnects.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be built or the transport fails.
pub async fn run_stdio(settings: Settings) -> anyhow::Result<()> {
    let service = TrialService::new(&settings)?;
    info!(
        base = %settings.ctgov_base,
        deadline_secs = settings.deadline.as_secs(),
        no_cache = settings.no_cache,
        "starting MCP server on stdio"
    );
    let running = TrialsMcpServer::new(service)
        .serve(rmcp::transport::stdio())
        .await?;
    running.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_for(mock: &MockServer) -> TrialsMcpServer {
        server_with_cache(mock, false)
    }

    fn server_with_cache(mock: &MockServer, no_cache: bool) -> TrialsMcpServer {
        let settings = Settings {
            ctgov_base: mock.uri(),
            max_retries: 0,
            no_cache,
            ..Settings::default()
        };
        TrialsMcpServer::new(TrialService::new(&settings).unwrap())
    }

    async fn mount_cacheable_search(mock: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/studies"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=600")
                    .set_body_json(serde_json::json!({
                        "studies": [{"protocolSection": {
                            "identificationModule": {"nctId": "NCT04280705", "briefTitle": "ACTT"}}}],
                        "totalCount": 1
                    })),
            )
            .expect(expected_calls)
            .mount(mock)
            .await;
    }

    fn condition_params() -> ConditionSearchParams {
        ConditionSearchParams {
            conditions: vec!["COVID-19".into()],
            max_studies: Some(5),
            fields: None,
        }
    }

    #[tokio::test]
    async fn no_cache_server_fetches_every_call() {
        let mock = MockServer::start().await;
        mount_cacheable_search(&mock, 2).await;

        let server = server_with_cache(&mock, true);
        for _ in 0..2 {
            let result = server
                .search_trials_by_condition(Parameters(condition_params()))
                .await
                .unwrap();
            assert_ne!(result.is_error, Some(true));
        }
    }

    #[tokio::test]
    async fn cached_server_reuses_fresh_response() {
        let mock = MockServer::start().await;
        mount_cacheable_search(&mock, 1).await;

        let server = server_with_cache(&mock, false);
        for _ in 0..2 {
            let result = server
                .search_trials_by_condition(Parameters(condition_params()))
                .await
                .unwrap();
            assert_ne!(result.is_error, Some(true));
        }
    }

    #[test]
    fn errors_serialize_as_tool_error_objects() {
        let (body, is_error) = tool_payload::<()>(
            "get_trial_details",
            Err(TrialsError::InvalidCriteria("no criteria".into())),
        )
        .unwrap();
        assert!(is_error);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["error_kind"], "InvalidCriteria");
        assert_eq!(value["message"], "Invalid search criteria: no criteria");
    }

    #[test]
    fn info_enables_tools() {
        let info = TrialsMcpServer {
            service: TrialService::new(&Settings::default()).unwrap(),
            tool_router: TrialsMcpServer::tool_router(),
        }
        .get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("get_available_fields"));
    }

    #[test]
    fn router_registers_every_tool() {
        let names: Vec<String> = TrialsMcpServer::tool_router()
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for expected in [
            "search_trials_by_condition",
            "search_trials_by_intervention",
            "search_trials_by_sponsor",
            "search_trials_by_acronym",
            "search_trials_by_nct_ids",
            "search_trials_combined",
            "search_trials_nct_ids_only",
            "get_trial_details",
            "get_trial_details_batched",
            "analyze_trial_phases",
            "get_field_statistics",
            "get_available_fields",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
        assert_eq!(names.len(), 12);
    }

    #[tokio::test]
    async fn combined_search_without_criteria_is_an_error_result() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock)
            .await;

        let server = server_for(&mock);
        let result = server
            .search_trials_combined(Parameters(CombinedSearchParams::default()))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn phase_tool_returns_distribution() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "studies": [
                    {"protocolSection": {
                        "identificationModule": {"nctId": "NCT00000001"},
                        "designModule": {"phases": ["PHASE2"]}}},
                    {"protocolSection": {
                        "identificationModule": {"nctId": "NCT00000002"},
                        "designModule": {"phases": ["PHASE1"]}}},
                    {"protocolSection": {
                        "identificationModule": {"nctId": "NCT00000003"},
                        "designModule": {"phases": ["PHASE1"]}}}
                ],
                "totalCount": 3
            })))
            .mount(&mock)
            .await;

        let server = server_for(&mock);
        let service = server.service.clone();
        let report = service
            .analyze_trial_phases(SearchCriteria::from(PhaseAnalysisParams {
                conditions: Some(vec!["cancer".into()]),
                max_studies: Some(3),
                ..Default::default()
            }))
            .await;
        let (body, is_error) = tool_payload("analyze_trial_phases", report).unwrap();
        assert!(!is_error);
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let values = value["fields"][0]["values"].as_array().unwrap();
        assert_eq!(values[0]["value"], "PHASE1");
        assert_eq!(values[0]["count"], 2);
        assert_eq!(values[1]["value"], "PHASE2");
    }
}
