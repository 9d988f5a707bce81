//! Known ClinicalTrials.gov fields and how to reach them inside a study record.
//!
//! Every field a caller may name is listed in [`FIELDS`] with the JSON path
//! that leads to it in the v2 study document. `*` in a path descends into each
//! element of an array, which makes the field list-valued. Names are the
//! upstream "piece" names, so the same strings double as the `fields` hint on
//! search requests.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::error::TrialsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Enum,
    String,
    Date,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    pub const ALL: &'static [FieldType] = &[
        FieldType::Enum,
        FieldType::String,
        FieldType::Date,
        FieldType::Integer,
        FieldType::Number,
        FieldType::Boolean,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Enum => "ENUM",
            FieldType::String => "STRING",
            FieldType::Date => "DATE",
            FieldType::Integer => "INTEGER",
            FieldType::Number => "NUMBER",
            FieldType::Boolean => "BOOLEAN",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    #[serde(skip)]
    pub path: &'static [&'static str],
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(skip)]
    pub category: &'static str,
}

impl FieldSpec {
    pub fn is_list(&self) -> bool {
        self.path.contains(&"*")
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldCategory {
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATEGORIES: &[FieldCategory] = &[
    FieldCategory {
        name: "identification",
        description: "Basic trial identification and titles",
    },
    FieldCategory {
        name: "status",
        description: "Trial status and timeline information",
    },
    FieldCategory {
        name: "conditions",
        description: "Medical conditions and keywords",
    },
    FieldCategory {
        name: "design",
        description: "Study design and methodology",
    },
    FieldCategory {
        name: "interventions",
        description: "Treatments and interventions being studied",
    },
    FieldCategory {
        name: "arms",
        description: "Study arm and group information",
    },
    FieldCategory {
        name: "outcomes",
        description: "Primary and secondary outcome measures",
    },
    FieldCategory {
        name: "eligibility",
        description: "Patient eligibility and inclusion criteria",
    },
    FieldCategory {
        name: "locations",
        description: "Study locations and facilities",
    },
    FieldCategory {
        name: "sponsors",
        description: "Sponsoring organizations and collaborators",
    },
    FieldCategory {
        name: "descriptions",
        description: "Detailed study descriptions and summaries",
    },
    FieldCategory {
        name: "contacts",
        description: "Study contact information",
    },
    FieldCategory {
        name: "results",
        description: "Study results availability",
    },
];

macro_rules! field {
    ($name:literal, $category:literal, $ty:ident, [$($seg:literal),+ $(,)?]) => {
        FieldSpec {
            name: $name,
            path: &[$($seg),+],
            field_type: FieldType::$ty,
            category: $category,
        }
    };
}

pub const FIELDS: &[FieldSpec] = &[
    // identification
    field!("NCTId", "identification", String, ["protocolSection", "identificationModule", "nctId"]),
    field!("BriefTitle", "identification", String, ["protocolSection", "identificationModule", "briefTitle"]),
    field!("OfficialTitle", "identification", String, ["protocolSection", "identificationModule", "officialTitle"]),
    field!("Acronym", "identification", String, ["protocolSection", "identificationModule", "acronym"]),
    field!("OrgStudyId", "identification", String, ["protocolSection", "identificationModule", "orgStudyIdInfo", "id"]),
    field!("SecondaryId", "identification", String, ["protocolSection", "identificationModule", "secondaryIdInfos", "*", "id"]),
    // status
    field!("OverallStatus", "status", Enum, ["protocolSection", "statusModule", "overallStatus"]),
    field!("StatusVerifiedDate", "status", Date, ["protocolSection", "statusModule", "statusVerifiedDate"]),
    field!("StudyFirstPostDate", "status", Date, ["protocolSection", "statusModule", "studyFirstPostDateStruct", "date"]),
    field!("LastUpdatePostDate", "status", Date, ["protocolSection", "statusModule", "lastUpdatePostDateStruct", "date"]),
    field!("StartDate", "status", Date, ["protocolSection", "statusModule", "startDateStruct", "date"]),
    field!("PrimaryCompletionDate", "status", Date, ["protocolSection", "statusModule", "primaryCompletionDateStruct", "date"]),
    field!("CompletionDate", "status", Date, ["protocolSection", "statusModule", "completionDateStruct", "date"]),
    // conditions
    field!("Condition", "conditions", String, ["protocolSection", "conditionsModule", "conditions", "*"]),
    field!("Keyword", "conditions", String, ["protocolSection", "conditionsModule", "keywords", "*"]),
    // design
    field!("StudyType", "design", Enum, ["protocolSection", "designModule", "studyType"]),
    field!("Phase", "design", Enum, ["protocolSection", "designModule", "phases", "*"]),
    field!("DesignAllocation", "design", Enum, ["protocolSection", "designModule", "designInfo", "allocation"]),
    field!("DesignInterventionModel", "design", Enum, ["protocolSection", "designModule", "designInfo", "interventionModel"]),
    field!("DesignPrimaryPurpose", "design", Enum, ["protocolSection", "designModule", "designInfo", "primaryPurpose"]),
    field!("DesignMasking", "design", Enum, ["protocolSection", "designModule", "designInfo", "maskingInfo", "masking"]),
    field!("EnrollmentCount", "design", Integer, ["protocolSection", "designModule", "enrollmentInfo", "count"]),
    field!("EnrollmentType", "design", Enum, ["protocolSection", "designModule", "enrollmentInfo", "type"]),
    // interventions
    field!("InterventionType", "interventions", Enum, ["protocolSection", "armsInterventionsModule", "interventions", "*", "type"]),
    field!("InterventionName", "interventions", String, ["protocolSection", "armsInterventionsModule", "interventions", "*", "name"]),
    field!("InterventionDescription", "interventions", String, ["protocolSection", "armsInterventionsModule", "interventions", "*", "description"]),
    field!("InterventionOtherName", "interventions", String, ["protocolSection", "armsInterventionsModule", "interventions", "*", "otherNames", "*"]),
    // arms
    field!("ArmGroupLabel", "arms", String, ["protocolSection", "armsInterventionsModule", "armGroups", "*", "label"]),
    field!("ArmGroupType", "arms", Enum, ["protocolSection", "armsInterventionsModule", "armGroups", "*", "type"]),
    field!("ArmGroupDescription", "arms", String, ["protocolSection", "armsInterventionsModule", "armGroups", "*", "description"]),
    field!("ArmGroupInterventionName", "arms", String, ["protocolSection", "armsInterventionsModule", "armGroups", "*", "interventionNames", "*"]),
    // outcomes
    field!("PrimaryOutcomeMeasure", "outcomes", String, ["protocolSection", "outcomesModule", "primaryOutcomes", "*", "measure"]),
    field!("PrimaryOutcomeDescription", "outcomes", String, ["protocolSection", "outcomesModule", "primaryOutcomes", "*", "description"]),
    field!("PrimaryOutcomeTimeFrame", "outcomes", String, ["protocolSection", "outcomesModule", "primaryOutcomes", "*", "timeFrame"]),
    field!("SecondaryOutcomeMeasure", "outcomes", String, ["protocolSection", "outcomesModule", "secondaryOutcomes", "*", "measure"]),
    field!("SecondaryOutcomeDescription", "outcomes", String, ["protocolSection", "outcomesModule", "secondaryOutcomes", "*", "description"]),
    field!("SecondaryOutcomeTimeFrame", "outcomes", String, ["protocolSection", "outcomesModule", "secondaryOutcomes", "*", "timeFrame"]),
    // eligibility
    field!("EligibilityCriteria", "eligibility", String, ["protocolSection", "eligibilityModule", "eligibilityCriteria"]),
    field!("HealthyVolunteers", "eligibility", Boolean, ["protocolSection", "eligibilityModule", "healthyVolunteers"]),
    field!("Sex", "eligibility", Enum, ["protocolSection", "eligibilityModule", "sex"]),
    field!("MinimumAge", "eligibility", String, ["protocolSection", "eligibilityModule", "minimumAge"]),
    field!("MaximumAge", "eligibility", String, ["protocolSection", "eligibilityModule", "maximumAge"]),
    field!("StdAge", "eligibility", Enum, ["protocolSection", "eligibilityModule", "stdAges", "*"]),
    // locations
    field!("LocationFacility", "locations", String, ["protocolSection", "contactsLocationsModule", "locations", "*", "facility"]),
    field!("LocationCity", "locations", String, ["protocolSection", "contactsLocationsModule", "locations", "*", "city"]),
    field!("LocationState", "locations", String, ["protocolSection", "contactsLocationsModule", "locations", "*", "state"]),
    field!("LocationCountry", "locations", String, ["protocolSection", "contactsLocationsModule", "locations", "*", "country"]),
    field!("LocationStatus", "locations", Enum, ["protocolSection", "contactsLocationsModule", "locations", "*", "status"]),
    // sponsors
    field!("LeadSponsorName", "sponsors", String, ["protocolSection", "sponsorCollaboratorsModule", "leadSponsor", "name"]),
    field!("LeadSponsorClass", "sponsors", Enum, ["protocolSection", "sponsorCollaboratorsModule", "leadSponsor", "class"]),
    field!("CollaboratorName", "sponsors", String, ["protocolSection", "sponsorCollaboratorsModule", "collaborators", "*", "name"]),
    field!("CollaboratorClass", "sponsors", Enum, ["protocolSection", "sponsorCollaboratorsModule", "collaborators", "*", "class"]),
    field!("ResponsiblePartyType", "sponsors", Enum, ["protocolSection", "sponsorCollaboratorsModule", "responsibleParty", "type"]),
    // descriptions
    field!("BriefSummary", "descriptions", String, ["protocolSection", "descriptionModule", "briefSummary"]),
    field!("DetailedDescription", "descriptions", String, ["protocolSection", "descriptionModule", "detailedDescription"]),
    // contacts
    field!("CentralContactName", "contacts", String, ["protocolSection", "contactsLocationsModule", "centralContacts", "*", "name"]),
    field!("CentralContactPhone", "contacts", String, ["protocolSection", "contactsLocationsModule", "centralContacts", "*", "phone"]),
    field!("CentralContactEMail", "contacts", String, ["protocolSection", "contactsLocationsModule", "centralContacts", "*", "email"]),
    field!("OverallOfficialName", "contacts", String, ["protocolSection", "contactsLocationsModule", "overallOfficials", "*", "name"]),
    // results
    field!("HasResults", "results", Boolean, ["hasResults"]),
    field!("ResultsFirstSubmitDate", "results", Date, ["protocolSection", "statusModule", "resultsFirstSubmitDate"]),
    field!("ResultsFirstPostDate", "results", Date, ["protocolSection", "statusModule", "resultsFirstPostDateStruct", "date"]),
];

/// Standardized minimal projection used when a search names no fields.
pub const MINIMAL_FIELDS: &[&str] = &[
    "NCTId",
    "BriefTitle",
    "Acronym",
    "InterventionName",
    "Condition",
    "Phase",
    "LeadSponsorName",
    "CollaboratorName",
    "HasResults",
];

/// Richer default for single- and batched-detail lookups.
pub const DETAIL_FIELDS: &[&str] = &[
    "NCTId",
    "BriefTitle",
    "OfficialTitle",
    "Acronym",
    "OverallStatus",
    "Phase",
    "Condition",
    "Keyword",
    "EligibilityCriteria",
    "PrimaryCompletionDate",
    "ArmGroupLabel",
    "ArmGroupType",
    "ArmGroupDescription",
    "PrimaryOutcomeMeasure",
    "SecondaryOutcomeMeasure",
    "InterventionType",
    "InterventionName",
    "InterventionDescription",
    "InterventionOtherName",
    "BriefSummary",
    "DetailedDescription",
    "LocationFacility",
    "LeadSponsorName",
    "CollaboratorName",
    "LastUpdatePostDate",
    "HasResults",
];

/// Lightweight set for identifier discovery.
pub const DISCOVERY_FIELDS: &[&str] = &["NCTId", "BriefTitle", "OverallStatus"];

const NAMED_SETS: &[(&str, &[&str])] = &[
    ("minimal", MINIMAL_FIELDS),
    ("detail", DETAIL_FIELDS),
    ("discovery", DISCOVERY_FIELDS),
];

/// Checks the schema table once at startup.
pub fn validate_schema() -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for spec in FIELDS {
        if !seen.insert(spec.name.to_ascii_lowercase()) {
            anyhow::bail!("duplicate field name in schema: {}", spec.name);
        }
        if spec.path.is_empty() || spec.path.iter().any(|seg| seg.trim().is_empty()) {
            anyhow::bail!("field {} has an empty accessor path segment", spec.name);
        }
        if spec.path.first() == Some(&"*") {
            anyhow::bail!("field {} has a malformed accessor path", spec.name);
        }
        if !CATEGORIES.iter().any(|c| c.name == spec.category) {
            anyhow::bail!("field {} uses unknown category {}", spec.name, spec.category);
        }
    }
    for (set, names) in NAMED_SETS {
        for name in *names {
            if lookup(name).is_none() {
                anyhow::bail!("{set} field set references unknown field {name}");
            }
        }
    }
    Ok(())
}

pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    let name = name.trim();
    FIELDS
        .iter()
        .find(|spec| spec.name == name)
        .or_else(|| FIELDS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name)))
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn suggestion_for(name: &str) -> String {
    let needle = name.trim().to_ascii_lowercase();
    let closest = FIELDS
        .iter()
        .map(|spec| (edit_distance(&needle, &spec.name.to_ascii_lowercase()), spec.name))
        .min_by_key(|(distance, _)| *distance)
        .filter(|(distance, _)| *distance <= 3);
    match closest {
        Some((_, name)) => format!(
            "Did you mean \"{name}\"? Use get_available_fields to list valid field names."
        ),
        None => "Use get_available_fields to list valid field names.".to_string(),
    }
}

fn unknown_field(name: &str) -> TrialsError {
    TrialsError::InvalidFieldName {
        field: name.trim().to_string(),
        suggestion: suggestion_for(name),
    }
}

/// Resolves caller-supplied field names, dropping blanks and repeats.
pub fn resolve_names(names: &[String]) -> Result<Vec<&'static FieldSpec>, TrialsError> {
    let mut out: Vec<&'static FieldSpec> = Vec::new();
    for raw in names {
        if raw.trim().is_empty() {
            continue;
        }
        let spec = lookup(raw).ok_or_else(|| unknown_field(raw))?;
        if !out.iter().any(|s| s.name == spec.name) {
            out.push(spec);
        }
    }
    Ok(out)
}

/// Every known field whose type is one of `types`.
pub fn resolve_types(types: &[String]) -> Result<Vec<&'static FieldSpec>, TrialsError> {
    let mut wanted = Vec::new();
    for raw in types {
        if raw.trim().is_empty() {
            continue;
        }
        let ty = FieldType::from_name(raw).ok_or_else(|| {
            TrialsError::InvalidCriteria(format!(
                "Unknown field type '{}'. Expected one of: ENUM, STRING, DATE, INTEGER, NUMBER, BOOLEAN",
                raw.trim()
            ))
        })?;
        if !wanted.contains(&ty) {
            wanted.push(ty);
        }
    }
    Ok(FIELDS
        .iter()
        .filter(|spec| wanted.contains(&spec.field_type))
        .collect())
}

pub fn named(names: &[&str]) -> Vec<&'static FieldSpec> {
    names.iter().filter_map(|name| lookup(name)).collect()
}

/// Caller's field list, or `default` when the caller named none.
pub fn resolve_projection(
    requested: &[String],
    default: &[&str],
) -> Result<Vec<&'static FieldSpec>, TrialsError> {
    let resolved = resolve_names(requested)?;
    if resolved.is_empty() {
        Ok(named(default))
    } else {
        Ok(resolved)
    }
}

fn collect_path<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    match path.split_first() {
        None => match value {
            Value::Null => {}
            Value::Array(items) => out.extend(items.iter().filter(|v| !v.is_null())),
            other => out.push(other),
        },
        Some((&"*", rest)) => {
            if let Some(items) = value.as_array() {
                for item in items {
                    collect_path(item, rest, out);
                }
            }
        }
        Some((key, rest)) => {
            if let Some(next) = value.get(*key) {
                collect_path(next, rest, out);
            }
        }
    }
}

/// All values of `spec` in `record`, in source order.
///
/// Falls back to a flat top-level key named after the field, which is the
/// shape of an already-projected record.
pub fn resolve<'a>(record: &'a Value, spec: &FieldSpec) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_path(record, spec.path, &mut out);
    if out.is_empty() {
        if let Some(flat) = record.get(spec.name) {
            collect_path(flat, &[], &mut out);
        }
    }
    out
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<&'static FieldSpec>,
}

#[derive(Debug, Serialize)]
pub struct FieldCatalog {
    /// Default projection of the search tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_fields: Option<&'static [&'static str]>,
    /// Projection of identifier discovery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_fields: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_fields: Option<&'static [&'static str]>,
    pub categories: Vec<CategoryListing>,
}

fn listing(category: &FieldCategory) -> CategoryListing {
    CategoryListing {
        name: category.name,
        description: category.description,
        fields: FIELDS
            .iter()
            .filter(|spec| spec.category == category.name)
            .collect(),
    }
}

/// Field catalogue, narrowed to one category when it names a known one.
pub fn catalog(category: Option<&str>) -> FieldCatalog {
    let wanted = category
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|name| {
            CATEGORIES
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
        });

    match wanted {
        Some(category) => FieldCatalog {
            search_fields: None,
            discovery_fields: None,
            detail_fields: None,
            categories: vec![listing(category)],
        },
        None => FieldCatalog {
            search_fields: Some(MINIMAL_FIELDS),
            discovery_fields: Some(DISCOVERY_FIELDS),
            detail_fields: Some(DETAIL_FIELDS),
            categories: CATEGORIES.iter().map(listing).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_table_is_valid() {
        validate_schema().unwrap();
    }

    #[test]
    fn list_fields_are_detected_from_path() {
        assert!(lookup("InterventionName").unwrap().is_list());
        assert!(lookup("Phase").unwrap().is_list());
        assert!(!lookup("BriefTitle").unwrap().is_list());
        assert!(!lookup("HasResults").unwrap().is_list());
    }

    #[test]
    fn lookup_falls_back_to_case_insensitive_match() {
        assert_eq!(lookup("nctid").unwrap().name, "NCTId");
        assert_eq!(lookup(" Phase ").unwrap().name, "Phase");
        assert!(lookup("NotAField").is_none());
    }

    #[test]
    fn resolve_names_rejects_unknown_with_suggestion() {
        let err = resolve_names(&["BriefTitle".into(), "Phaze".into()]).unwrap_err();
        match err {
            TrialsError::InvalidFieldName { field, suggestion } => {
                assert_eq!(field, "Phaze");
                assert!(suggestion.contains("\"Phase\""));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn resolve_names_dedupes_and_skips_blanks() {
        let specs =
            resolve_names(&["Phase".into(), " ".into(), "phase".into(), "NCTId".into()]).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Phase", "NCTId"]);
    }

    #[test]
    fn resolve_types_selects_matching_fields() {
        let specs = resolve_types(&["boolean".into()]).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["HealthyVolunteers", "HasResults"]);
        assert!(resolve_types(&["NUMBER".into()]).unwrap().is_empty());
    }

    #[test]
    fn resolve_types_rejects_unknown_type() {
        let err = resolve_types(&["FLOAT".into()]).unwrap_err();
        assert_eq!(err.error_kind(), "InvalidCriteria");
    }

    #[test]
    fn resolve_projection_uses_default_when_empty() {
        let specs = resolve_projection(&[], MINIMAL_FIELDS).unwrap();
        assert_eq!(specs.len(), MINIMAL_FIELDS.len());
        assert_eq!(specs[0].name, "NCTId");
    }

    #[test]
    fn resolve_walks_nested_arrays() {
        let record = json!({
            "protocolSection": {
                "armsInterventionsModule": {
                    "interventions": [
                        {"name": "Treprostinil", "otherNames": ["Tyvaso", "Remodulin"]},
                        {"name": "Placebo"},
                        {"otherNames": ["Sugar pill"]}
                    ]
                }
            }
        });
        let names = resolve(&record, lookup("InterventionName").unwrap());
        assert_eq!(names, vec![&json!("Treprostinil"), &json!("Placebo")]);
        let others = resolve(&record, lookup("InterventionOtherName").unwrap());
        assert_eq!(others.len(), 3);
    }

    #[test]
    fn resolve_tolerates_missing_sections() {
        let record = json!({"protocolSection": {"designModule": null}});
        assert!(resolve(&record, lookup("Phase").unwrap()).is_empty());
        assert!(resolve(&json!({}), lookup("LeadSponsorName").unwrap()).is_empty());
    }

    #[test]
    fn resolve_reads_flat_projected_shape() {
        let flat = json!({"Phase": ["PHASE2", "PHASE3"], "BriefTitle": "A study"});
        assert_eq!(resolve(&flat, lookup("Phase").unwrap()).len(), 2);
        assert_eq!(
            resolve(&flat, lookup("BriefTitle").unwrap()),
            vec![&json!("A study")]
        );
    }

    #[test]
    fn catalog_narrows_to_known_category() {
        let catalog = catalog(Some("Sponsors"));
        assert_eq!(catalog.categories.len(), 1);
        assert_eq!(catalog.categories[0].name, "sponsors");
        assert!(catalog.search_fields.is_none());
    }

    #[test]
    fn catalog_keys_name_their_field_sets() {
        let value = serde_json::to_value(catalog(None)).unwrap();
        assert_eq!(value["search_fields"], json!(MINIMAL_FIELDS));
        assert_eq!(value["discovery_fields"], json!(DISCOVERY_FIELDS));
        assert_eq!(value["detail_fields"], json!(DETAIL_FIELDS));
        assert!(value.get("default_fields").is_none());
        assert!(value.get("minimal_fields").is_none());
    }

    #[test]
    fn catalog_lists_everything_for_unknown_category() {
        let catalog = catalog(Some("bogus"));
        assert_eq!(catalog.categories.len(), CATEGORIES.len());
        let listed: usize = catalog.categories.iter().map(|c| c.fields.len()).sum();
        assert_eq!(listed, FIELDS.len());
    }
}
