use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::config::Settings;
use crate::entities::fields::{
    self, DETAIL_FIELDS, DISCOVERY_FIELDS, FieldCatalog, FieldSpec, FieldType, MINIMAL_FIELDS,
};
use crate::entities::paginate::collect_studies;
use crate::entities::query::{
    self, MAX_STUDIES_LIMIT, SearchCriteria, StudyQuery, build_query, looks_like_nct_id,
    normalize_nct_ids, validate_max_studies,
};
use crate::entities::stats::{self, StatisticsReport};
use crate::error::TrialsError;
use crate::sources::clinicaltrials::ClinicalTrialsClient;
use crate::transform::trial::{ProjectedRecord, project, project_all, study_nct_id};

pub const DEFAULT_PHASE_MAX_STUDIES: usize = 1000;
pub const DEFAULT_STATS_MAX_STUDIES: usize = 1000;
pub const DEFAULT_DISCOVERY_MAX_STUDIES: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const MAX_BATCH_SIZE: usize = 100;
const ID_LOOKUP_CHUNK: usize = 100;
const BATCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    pub has_more: bool,
    pub retrieved_at: String,
    pub results: Vec<ProjectedRecord>,
}

impl SearchResponse {
    fn new(results: Vec<ProjectedRecord>, total: Option<u32>, has_more: bool) -> Self {
        Self {
            count: results.len(),
            total,
            has_more,
            retrieved_at: retrieved_at(),
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchDetailsResponse {
    pub requested: usize,
    pub returned: usize,
    pub batches: usize,
    pub missing: Vec<String>,
    pub retrieved_at: String,
    pub results: Vec<ProjectedRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct FieldStatisticsRequest {
    pub field_names: Vec<String>,
    pub field_types: Vec<String>,
    pub criteria: SearchCriteria,
}

fn retrieved_at() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn require_values(name: &str, values: &[String]) -> Result<(), TrialsError> {
    if values.iter().all(|v| v.trim().is_empty()) {
        return Err(TrialsError::InvalidCriteria(format!(
            "At least one {name} value is required"
        )));
    }
    Ok(())
}

/// Piece names sent upstream so the response carries what projection needs.
fn upstream_fields(specs: &[&FieldSpec], extra: &[&str]) -> Vec<String> {
    let mut out = vec!["NCTId".to_string()];
    let names = specs.iter().map(|s| s.name).chain(extra.iter().copied());
    for name in names {
        if !out.iter().any(|v| v == name) {
            out.push(name.to_string());
        }
    }
    out
}

struct IdLookup {
    studies: Vec<Value>,
    missing: Vec<String>,
    batches: usize,
}

#[derive(Clone)]
pub struct TrialService {
    client: ClinicalTrialsClient,
    deadline: Duration,
}

impl TrialService {
    pub fn new(settings: &Settings) -> Result<Self, TrialsError> {
        Ok(Self {
            client: ClinicalTrialsClient::new(settings)?,
            deadline: settings.deadline,
        })
    }

    pub fn with_client(client: ClinicalTrialsClient, deadline: Duration) -> Self {
        Self { client, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn within_deadline<T, F>(&self, fut: F) -> Result<T, TrialsError>
    where
        F: Future<Output = Result<T, TrialsError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(TrialsError::Timeout {
                seconds: self.deadline.as_millis().div_ceil(1000) as u64,
            }),
        }
    }

    async fn run_search(
        &self,
        criteria: &SearchCriteria,
        default_max: usize,
        default_fields: &[&str],
    ) -> Result<SearchResponse, TrialsError> {
        let cap = validate_max_studies(criteria.max_studies.unwrap_or(default_max))?;
        let projection = fields::resolve_projection(&criteria.fields, default_fields)?;
        let built = build_query(criteria)?;
        let extra: &[&str] = if built.acronym_filter.is_some() {
            &["Acronym"]
        } else {
            &[]
        };
        let hint = upstream_fields(&projection, extra);

        let aggregated = self
            .within_deadline(collect_studies(
                &self.client,
                &built.query,
                &hint,
                cap,
                |study: &Value| {
                    built
                        .acronym_filter
                        .as_ref()
                        .is_none_or(|filter| filter.matches(study))
                },
            ))
            .await?;

        let mut studies = aggregated.studies;
        if let StudyQuery::Identifiers(ids) = &built.query {
            order_by_ids(&mut studies, ids);
        }
        // An upstream total counts pre-filter matches, which would mislead.
        let total = match built.acronym_filter {
            Some(_) => None,
            None => aggregated.total_count,
        };
        debug!(
            pages = aggregated.pages,
            returned = studies.len(),
            "search complete"
        );
        Ok(SearchResponse::new(
            project_all(&studies, &projection),
            total,
            aggregated.has_more,
        ))
    }

    pub async fn search_by_condition(
        &self,
        conditions: Vec<String>,
        max_studies: Option<usize>,
        fields: Vec<String>,
    ) -> Result<SearchResponse, TrialsError> {
        info!(?conditions, ?max_studies, "search_trials_by_condition");
        require_values("condition", &conditions)?;
        let criteria = SearchCriteria {
            conditions,
            max_studies,
            fields,
            ..Default::default()
        };
        self.run_search(&criteria, query::DEFAULT_MAX_STUDIES, MINIMAL_FIELDS)
            .await
    }

    pub async fn search_by_intervention(
        &self,
        interventions: Vec<String>,
        max_studies: Option<usize>,
        fields: Vec<String>,
    ) -> Result<SearchResponse, TrialsError> {
        info!(?interventions, ?max_studies, "search_trials_by_intervention");
        require_values("intervention", &interventions)?;
        let criteria = SearchCriteria {
            interventions,
            max_studies,
            fields,
            ..Default::default()
        };
        self.run_search(&criteria, query::DEFAULT_MAX_STUDIES, MINIMAL_FIELDS)
            .await
    }

    pub async fn search_by_sponsor(
        &self,
        sponsors: Vec<String>,
        max_studies: Option<usize>,
        fields: Vec<String>,
    ) -> Result<SearchResponse, TrialsError> {
        info!(?sponsors, ?max_studies, "search_trials_by_sponsor");
        require_values("sponsor", &sponsors)?;
        let criteria = SearchCriteria {
            sponsors,
            max_studies,
            fields,
            ..Default::default()
        };
        self.run_search(&criteria, query::DEFAULT_MAX_STUDIES, MINIMAL_FIELDS)
            .await
    }

    pub async fn search_by_acronym(
        &self,
        acronyms: Vec<String>,
        exact_match: bool,
        max_studies: Option<usize>,
        fields: Vec<String>,
    ) -> Result<SearchResponse, TrialsError> {
        info!(?acronyms, exact_match, ?max_studies, "search_trials_by_acronym");
        require_values("acronym", &acronyms)?;
        let criteria = SearchCriteria {
            acronyms,
            exact_acronym: exact_match,
            max_studies,
            fields,
            ..Default::default()
        };
        self.run_search(&criteria, query::DEFAULT_MAX_STUDIES, MINIMAL_FIELDS)
            .await
    }

    pub async fn search_combined(
        &self,
        criteria: SearchCriteria,
    ) -> Result<SearchResponse, TrialsError> {
        info!(
            conditions = criteria.conditions.len(),
            interventions = criteria.interventions.len(),
            sponsors = criteria.sponsors.len(),
            terms = criteria.terms.len(),
            nct_ids = criteria.nct_ids.len(),
            "search_trials_combined"
        );
        self.run_search(&criteria, query::DEFAULT_MAX_STUDIES, MINIMAL_FIELDS)
            .await
    }

    /// Identifier discovery: a lightweight projection and a larger default cap.
    pub async fn search_nct_ids_only(
        &self,
        criteria: SearchCriteria,
    ) -> Result<SearchResponse, TrialsError> {
        info!(max_studies = ?criteria.max_studies, "search_trials_nct_ids_only");
        let criteria = SearchCriteria {
            fields: Vec::new(),
            ..criteria
        };
        self.run_search(&criteria, DEFAULT_DISCOVERY_MAX_STUDIES, DISCOVERY_FIELDS)
            .await
    }

    async fn lookup_ids(
        &self,
        ids: &[String],
        batch_size: usize,
        hint: &[String],
    ) -> Result<IdLookup, TrialsError> {
        let client = &self.client;
        let chunks: Vec<Vec<String>> = ids.chunks(batch_size).map(<[String]>::to_vec).collect();
        let batches = chunks.len();

        let mut pending = stream::iter(chunks.into_iter().map(|chunk| async move {
            let cap = chunk.len();
            let query = StudyQuery::Identifiers(chunk);
            collect_studies(client, &query, hint, cap, |_: &Value| true)
                .await
                .map(|aggregated| aggregated.studies)
        }))
        .buffered(BATCH_CONCURRENCY);

        let mut by_id: HashMap<String, Value> = HashMap::new();
        while let Some(result) = pending.next().await {
            for study in result? {
                if let Some(id) = study_nct_id(&study) {
                    by_id.entry(id).or_insert(study);
                }
            }
        }

        let mut studies = Vec::with_capacity(by_id.len());
        let mut missing = Vec::new();
        for id in ids {
            match by_id.remove(id) {
                Some(study) => studies.push(study),
                None => missing.push(id.clone()),
            }
        }
        Ok(IdLookup {
            studies,
            missing,
            batches,
        })
    }

    pub async fn search_by_nct_ids(
        &self,
        nct_ids: Vec<String>,
        fields: Vec<String>,
    ) -> Result<SearchResponse, TrialsError> {
        info!(count = nct_ids.len(), "search_trials_by_nct_ids");
        let ids = normalize_nct_ids(&nct_ids)?;
        if ids.is_empty() {
            return Err(TrialsError::InvalidCriteria(
                "At least one NCT identifier is required".into(),
            ));
        }
        if ids.len() > MAX_STUDIES_LIMIT {
            return Err(TrialsError::InvalidCriteria(format!(
                "At most {MAX_STUDIES_LIMIT} NCT identifiers may be requested at once"
            )));
        }
        let projection = fields::resolve_projection(&fields, MINIMAL_FIELDS)?;
        let hint = upstream_fields(&projection, &[]);

        let found = self
            .within_deadline(self.lookup_ids(&ids, ID_LOOKUP_CHUNK, &hint))
            .await?;
        Ok(SearchResponse::new(
            project_all(&found.studies, &projection),
            None,
            false,
        ))
    }

    pub async fn get_trial_details(
        &self,
        nct_id: &str,
        fields: Vec<String>,
    ) -> Result<ProjectedRecord, TrialsError> {
        info!(nct_id, "get_trial_details");
        let nct_id = nct_id.trim();
        if nct_id.is_empty() {
            return Err(TrialsError::InvalidCriteria(
                "An NCT identifier is required. Example: NCT04280705".into(),
            ));
        }
        if !looks_like_nct_id(nct_id) {
            return Err(TrialsError::NotFound {
                nct_id: nct_id.to_string(),
                suggestion: format!(
                    "NCT identifiers look like NCT followed by 8 digits. Try searching: search_trials_combined with terms [\"{nct_id}\"]"
                ),
            });
        }
        let nct_id = nct_id.to_ascii_uppercase();
        let projection = fields::resolve_projection(&fields, DETAIL_FIELDS)?;
        let hint = upstream_fields(&projection, &[]);

        let query = StudyQuery::Identifiers(vec![nct_id.clone()]);
        let aggregated = self
            .within_deadline(collect_studies(&self.client, &query, &hint, 1, |_: &Value| true))
            .await?;

        match aggregated.studies.first() {
            Some(study) => Ok(project(study, &projection)),
            None => Err(TrialsError::NotFound {
                suggestion: format!(
                    "Check the identifier or try: search_trials_by_nct_ids with [\"{nct_id}\"]"
                ),
                nct_id,
            }),
        }
    }

    pub async fn get_trial_details_batched(
        &self,
        nct_ids: Vec<String>,
        batch_size: Option<usize>,
        fields: Vec<String>,
    ) -> Result<BatchDetailsResponse, TrialsError> {
        info!(count = nct_ids.len(), ?batch_size, "get_trial_details_batched");
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(TrialsError::InvalidCriteria(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        let ids = normalize_nct_ids(&nct_ids)?;
        if ids.is_empty() {
            return Err(TrialsError::InvalidCriteria(
                "At least one NCT identifier is required".into(),
            ));
        }
        let projection = fields::resolve_projection(&fields, DETAIL_FIELDS)?;
        let hint = upstream_fields(&projection, &[]);

        let found = self
            .within_deadline(self.lookup_ids(&ids, batch_size, &hint))
            .await?;
        let results = project_all(&found.studies, &projection);
        Ok(BatchDetailsResponse {
            requested: ids.len(),
            returned: results.len(),
            batches: found.batches,
            missing: found.missing,
            retrieved_at: retrieved_at(),
            results,
        })
    }

    async fn local_statistics(
        &self,
        criteria: &SearchCriteria,
        default_max: usize,
        specs: &[&'static FieldSpec],
    ) -> Result<StatisticsReport, TrialsError> {
        let cap = validate_max_studies(criteria.max_studies.unwrap_or(default_max))?;
        let built = build_query(criteria)?;
        let hint = upstream_fields(specs, &[]);
        let aggregated = self
            .within_deadline(collect_studies(
                &self.client,
                &built.query,
                &hint,
                cap,
                |study: &Value| {
                    built
                        .acronym_filter
                        .as_ref()
                        .is_none_or(|filter| filter.matches(study))
                },
            ))
            .await?;
        debug!(
            records = aggregated.studies.len(),
            pages = aggregated.pages,
            "computing statistics"
        );
        Ok(stats::compute(&aggregated.studies, specs))
    }

    /// Phase distribution over the trials matching `criteria`.
    pub async fn analyze_trial_phases(
        &self,
        criteria: SearchCriteria,
    ) -> Result<StatisticsReport, TrialsError> {
        info!(max_studies = ?criteria.max_studies, "analyze_trial_phases");
        let phase = fields::named(&["Phase"]);
        self.local_statistics(&criteria, DEFAULT_PHASE_MAX_STUDIES, &phase)
            .await
    }

    /// Value distributions for the named fields and/or every field of the
    /// named types. Without search criteria the registry-wide statistics are
    /// used instead of a local aggregation.
    pub async fn get_field_statistics(
        &self,
        request: FieldStatisticsRequest,
    ) -> Result<StatisticsReport, TrialsError> {
        info!(
            field_names = ?request.field_names,
            field_types = ?request.field_types,
            "get_field_statistics"
        );
        let mut specs = fields::resolve_names(&request.field_names)?;
        for spec in fields::resolve_types(&request.field_types)? {
            if !specs.iter().any(|s| s.name == spec.name) {
                specs.push(spec);
            }
        }
        let named_nothing = request.field_names.iter().all(|v| v.trim().is_empty())
            && request.field_types.iter().all(|v| v.trim().is_empty());
        if named_nothing {
            specs = fields::FIELDS
                .iter()
                .filter(|spec| spec.field_type == FieldType::Enum)
                .collect();
        }
        if specs.is_empty() {
            return Err(TrialsError::InvalidCriteria(
                "No known fields match the requested field types".into(),
            ));
        }

        if request.criteria.has_any() {
            return self
                .local_statistics(&request.criteria, DEFAULT_STATS_MAX_STUDIES, &specs)
                .await;
        }

        let pieces: Vec<String> = specs.iter().map(|s| s.name.to_string()).collect();
        let (upstream, size) = self
            .within_deadline(async {
                futures::try_join!(
                    self.client.field_value_stats(&pieces),
                    self.client.registry_size()
                )
            })
            .await?;
        Ok(stats::from_registry_stats(
            &upstream,
            size.total_studies as usize,
        ))
    }

    pub fn available_fields(category: Option<&str>) -> FieldCatalog {
        fields::catalog(category)
    }
}

fn order_by_ids(studies: &mut [Value], ids: &[String]) {
    let rank = |study: &Value| {
        study_nct_id(study)
            .and_then(|id| ids.iter().position(|v| *v == id))
            .unwrap_or(usize::MAX)
    };
    studies.sort_by_key(rank);
}
