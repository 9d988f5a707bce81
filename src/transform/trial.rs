use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::fields::{self, FieldSpec};

/// Flat `{field name: value}` view of a study. `NCTId` always leads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectedRecord(Map<String, Value>);

impl ProjectedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn nct_id(&self) -> Option<&str> {
        self.0.get("NCTId").and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<ProjectedRecord> for Value {
    fn from(record: ProjectedRecord) -> Self {
        Value::Object(record.0)
    }
}

/// Identifier of a raw or projected study, uppercased.
pub fn study_nct_id(study: &Value) -> Option<String> {
    let spec = fields::lookup("NCTId")?;
    fields::resolve(study, spec)
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_ascii_uppercase)
}

fn project_field(study: &Value, spec: &FieldSpec) -> Option<Value> {
    let values = fields::resolve(study, spec);
    if values.is_empty() {
        return None;
    }
    if spec.is_list() {
        Some(Value::Array(values.into_iter().cloned().collect()))
    } else {
        values.into_iter().next().cloned()
    }
}

/// Flattens `study` onto `fields`. Absent fields are left out.
pub fn project(study: &Value, fields: &[&FieldSpec]) -> ProjectedRecord {
    let mut out = Map::new();
    if let Some(nct_id) = study_nct_id(study) {
        out.insert("NCTId".to_string(), Value::String(nct_id));
    }
    for spec in fields.iter().filter(|spec| spec.name != "NCTId") {
        if let Some(value) = project_field(study, spec) {
            out.insert(spec.name.to_string(), value);
        }
    }
    ProjectedRecord(out)
}

pub fn project_all(studies: &[Value], fields: &[&FieldSpec]) -> Vec<ProjectedRecord> {
    studies.iter().map(|study| project(study, fields)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::fields::{DETAIL_FIELDS, MINIMAL_FIELDS, named};
    use serde_json::json;

    fn sample_study() -> Value {
        json!({
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT04708782",
                    "briefTitle": "Study of Inhaled Treprostinil in IPF",
                    "acronym": "TETON"
                },
                "statusModule": {"overallStatus": "COMPLETED"},
                "conditionsModule": {"conditions": ["Idiopathic Pulmonary Fibrosis"]},
                "designModule": {"phases": ["PHASE3"]},
                "armsInterventionsModule": {
                    "interventions": [
                        {"type": "DRUG", "name": "Treprostinil"},
                        {"type": "DRUG", "name": "Placebo"}
                    ]
                },
                "sponsorCollaboratorsModule": {
                    "leadSponsor": {"name": "United Therapeutics", "class": "INDUSTRY"}
                }
            },
            "hasResults": true
        })
    }

    #[test]
    fn minimal_projection_flattens_nested_record() {
        let record = project(&sample_study(), &named(MINIMAL_FIELDS));
        assert_eq!(record.nct_id(), Some("NCT04708782"));
        assert_eq!(record.get("Acronym"), Some(&json!("TETON")));
        assert_eq!(
            record.get("InterventionName"),
            Some(&json!(["Treprostinil", "Placebo"]))
        );
        assert_eq!(record.get("Phase"), Some(&json!(["PHASE3"])));
        assert_eq!(record.get("HasResults"), Some(&json!(true)));
        assert!(record.get("CollaboratorName").is_none());
    }

    #[test]
    fn nct_id_leads_even_when_not_requested() {
        let record = project(&sample_study(), &named(&["BriefTitle"]));
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["NCTId", "BriefTitle"]);
    }

    #[test]
    fn projection_is_idempotent() {
        let specs = named(DETAIL_FIELDS);
        let once = project(&sample_study(), &specs);
        let twice = project(&Value::from(once.clone()), &specs);
        assert_eq!(once, twice);
    }

    #[test]
    fn record_without_sections_projects_to_nothing() {
        let record = project(&json!({}), &named(MINIMAL_FIELDS));
        assert!(record.is_empty());
    }

    #[test]
    fn study_nct_id_normalizes_case() {
        let study = json!({"protocolSection": {"identificationModule": {"nctId": " nct04708782 "}}});
        assert_eq!(study_nct_id(&study).as_deref(), Some("NCT04708782"));
        assert_eq!(
            study_nct_id(&json!({"NCTId": "NCT01234567"})).as_deref(),
            Some("NCT01234567")
        );
    }
}
