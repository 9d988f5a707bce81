use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::entities::query::SearchCriteria;
use crate::entities::trial::FieldStatisticsRequest;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConditionSearchParams {
    /// Conditions or diseases, e.g. ["COVID-19", "long covid"]; values are OR'd
    pub conditions: Vec<String>,
    /// Maximum number of trials to return, 1-1000 (default: 50)
    #[serde(default)]
    pub max_studies: Option<usize>,
    /// Field names to include in each record (default: NCTId, BriefTitle, Acronym, InterventionName, Condition, Phase, LeadSponsorName, CollaboratorName, HasResults)
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InterventionSearchParams {
    /// Drugs, devices or procedures, e.g. ["pembrolizumab"]; values are OR'd
    pub interventions: Vec<String>,
    /// Maximum number of trials to return, 1-1000 (default: 50)
    #[serde(default)]
    pub max_studies: Option<usize>,
    /// Field names to include in each record
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SponsorSearchParams {
    /// Sponsor or collaborator organisations, e.g. ["Pfizer"]; values are OR'd
    pub sponsors: Vec<String>,
    /// Maximum number of trials to return, 1-1000 (default: 50)
    #[serde(default)]
    pub max_studies: Option<usize>,
    /// Field names to include in each record
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AcronymSearchParams {
    /// Study acronyms, e.g. ["TETON"]
    pub acronyms: Vec<String>,
    /// Maximum number of trials to return, 1-1000 (default: 50)
    #[serde(default)]
    pub max_studies: Option<usize>,
    /// Field names to include in each record
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// Require the acronym to equal a value (case-insensitive) instead of containing it (default: false)
    #[serde(default)]
    pub exact_match: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NctIdsParams {
    /// NCT identifiers, e.g. ["NCT04280705"]; results keep this order
    pub nct_ids: Vec<String>,
    /// Field names to include in each record
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CombinedSearchParams {
    /// Conditions or diseases; OR'd within the list
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    /// Interventions; OR'd within the list
    #[serde(default)]
    pub interventions: Option<Vec<String>>,
    /// Sponsors; OR'd within the list
    #[serde(default)]
    pub sponsors: Option<Vec<String>>,
    /// Free-text terms matched anywhere in the record
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    /// NCT identifiers, OR'd with the other criteria
    #[serde(default)]
    pub nct_ids: Option<Vec<String>>,
    /// Maximum number of trials to return, 1-1000 (default: 50)
    #[serde(default)]
    pub max_studies: Option<usize>,
    /// Field names to include in each record
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl From<CombinedSearchParams> for SearchCriteria {
    fn from(p: CombinedSearchParams) -> Self {
        SearchCriteria {
            conditions: p.conditions.unwrap_or_default(),
            interventions: p.interventions.unwrap_or_default(),
            sponsors: p.sponsors.unwrap_or_default(),
            terms: p.terms.unwrap_or_default(),
            nct_ids: p.nct_ids.unwrap_or_default(),
            max_studies: p.max_studies,
            fields: p.fields.unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct NctIdsOnlyParams {
    /// Conditions or diseases
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    /// Interventions
    #[serde(default)]
    pub interventions: Option<Vec<String>>,
    /// Sponsors
    #[serde(default)]
    pub sponsors: Option<Vec<String>>,
    /// Free-text terms
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    /// Maximum number of trials to return, 1-1000 (default: 100)
    #[serde(default)]
    pub max_studies: Option<usize>,
}

impl From<NctIdsOnlyParams> for SearchCriteria {
    fn from(p: NctIdsOnlyParams) -> Self {
        SearchCriteria {
            conditions: p.conditions.unwrap_or_default(),
            interventions: p.interventions.unwrap_or_default(),
            sponsors: p.sponsors.unwrap_or_default(),
            terms: p.terms.unwrap_or_default(),
            max_studies: p.max_studies,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TrialDetailsParams {
    /// NCT identifier, e.g. "NCT04280705"
    pub nct_id: String,
    /// Field names to include (default: the detail field set)
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BatchedDetailsParams {
    /// NCT identifiers; output keeps this order and lists identifiers that were not found
    pub nct_ids: Vec<String>,
    /// Identifiers per upstream request, 1-100 (default: 10)
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Field names to include (default: the detail field set)
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PhaseAnalysisParams {
    /// Conditions or diseases
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    /// Interventions
    #[serde(default)]
    pub interventions: Option<Vec<String>>,
    /// Sponsors
    #[serde(default)]
    pub sponsors: Option<Vec<String>>,
    /// Maximum number of trials to analyse, 1-1000 (default: 1000)
    #[serde(default)]
    pub max_studies: Option<usize>,
}

impl From<PhaseAnalysisParams> for SearchCriteria {
    fn from(p: PhaseAnalysisParams) -> Self {
        SearchCriteria {
            conditions: p.conditions.unwrap_or_default(),
            interventions: p.interventions.unwrap_or_default(),
            sponsors: p.sponsors.unwrap_or_default(),
            max_studies: p.max_studies,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FieldStatisticsParams {
    /// Field names to summarise, e.g. ["Phase", "OverallStatus"]
    #[serde(default)]
    pub field_names: Option<Vec<String>>,
    /// Field types to summarise: ENUM, STRING, DATE, INTEGER, NUMBER or BOOLEAN
    #[serde(default)]
    pub field_types: Option<Vec<String>>,
    /// Restrict to trials matching these conditions (omit all criteria for registry-wide counts)
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
    /// Restrict to trials matching these interventions
    #[serde(default)]
    pub interventions: Option<Vec<String>>,
    /// Restrict to trials with these sponsors
    #[serde(default)]
    pub sponsors: Option<Vec<String>>,
    /// Restrict to trials matching these free-text terms
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    /// Maximum number of matching trials to aggregate, 1-1000 (default: 1000)
    #[serde(default)]
    pub max_studies: Option<usize>,
}

impl From<FieldStatisticsParams> for FieldStatisticsRequest {
    fn from(p: FieldStatisticsParams) -> Self {
        FieldStatisticsRequest {
            field_names: p.field_names.unwrap_or_default(),
            field_types: p.field_types.unwrap_or_default(),
            criteria: SearchCriteria {
                conditions: p.conditions.unwrap_or_default(),
                interventions: p.interventions.unwrap_or_default(),
                sponsors: p.sponsors.unwrap_or_default(),
                terms: p.terms.unwrap_or_default(),
                max_studies: p.max_studies,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AvailableFieldsParams {
    /// Field category such as "design" or "eligibility" (default: all categories)
    #[serde(default)]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_lists_default_to_empty_criteria() {
        let params: CombinedSearchParams =
            serde_json::from_value(serde_json::json!({"conditions": ["asthma"]})).unwrap();
        let criteria = SearchCriteria::from(params);
        assert_eq!(criteria.conditions, vec!["asthma"]);
        assert!(criteria.sponsors.is_empty());
        assert!(criteria.max_studies.is_none());
        assert!(criteria.fields.is_empty());
    }

    #[test]
    fn acronym_params_require_acronyms() {
        let err = serde_json::from_value::<AcronymSearchParams>(serde_json::json!({
            "exact_match": true
        }));
        assert!(err.is_err());
    }

    #[test]
    fn statistics_params_split_fields_and_criteria() {
        let params: FieldStatisticsParams = serde_json::from_value(serde_json::json!({
            "field_types": ["ENUM"],
            "sponsors": ["Pfizer"],
            "max_studies": 200
        }))
        .unwrap();
        let request = FieldStatisticsRequest::from(params);
        assert!(request.field_names.is_empty());
        assert_eq!(request.field_types, vec!["ENUM"]);
        assert_eq!(request.criteria.sponsors, vec!["Pfizer"]);
        assert_eq!(request.criteria.max_studies, Some(200));
        assert!(request.criteria.has_any());
    }

    #[test]
    fn schema_carries_field_descriptions() {
        let schema = schemars::schema_for!(BatchedDetailsParams);
        let text = serde_json::to_string(&schema).unwrap();
        assert!(text.contains("Identifiers per upstream request"));
    }
}
