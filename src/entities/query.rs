//! Turns structured search criteria into a ClinicalTrials.gov Essie expression.
//!
//! Values inside one criterion are OR'd and criteria are AND'd:
//! `AREA[ConditionSearch]("a" OR "b") AND AREA[InterventionSearch]("c")`.
//! Identifier lists either travel as `filter.ids` on their own or are OR'd
//! onto the expression.

use serde_json::Value;

use crate::entities::fields;
use crate::error::TrialsError;

pub const DEFAULT_MAX_STUDIES: usize = 50;
pub const MAX_STUDIES_LIMIT: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub conditions: Vec<String>,
    pub interventions: Vec<String>,
    pub sponsors: Vec<String>,
    pub terms: Vec<String>,
    pub acronyms: Vec<String>,
    pub nct_ids: Vec<String>,
    /// Acronyms must equal (case-insensitively) rather than contain the value.
    pub exact_acronym: bool,
    pub max_studies: Option<usize>,
    pub fields: Vec<String>,
}

impl SearchCriteria {
    pub fn has_any(&self) -> bool {
        [
            &self.conditions,
            &self.interventions,
            &self.sponsors,
            &self.terms,
            &self.acronyms,
            &self.nct_ids,
        ]
        .iter()
        .any(|values| values.iter().any(|v| !v.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyQuery {
    /// Sent as `query.term`.
    Expression(String),
    /// Sent as `filter.ids`.
    Identifiers(Vec<String>),
}

/// Client-side acronym check applied to every fetched record.
#[derive(Debug, Clone)]
pub struct AcronymFilter {
    needles: Vec<String>,
    exact: bool,
}

impl AcronymFilter {
    pub fn new(acronyms: &[String], exact: bool) -> Self {
        Self {
            needles: acronyms.iter().map(|v| v.to_ascii_uppercase()).collect(),
            exact,
        }
    }

    pub fn matches(&self, record: &Value) -> bool {
        let Some(spec) = fields::lookup("Acronym") else {
            return false;
        };
        fields::resolve(record, spec)
            .into_iter()
            .filter_map(Value::as_str)
            .map(|acronym| acronym.trim().to_ascii_uppercase())
            .any(|acronym| {
                self.needles.iter().any(|needle| {
                    if self.exact {
                        acronym == *needle
                    } else {
                        acronym.contains(needle.as_str())
                    }
                })
            })
    }
}

#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub query: StudyQuery,
    pub acronym_filter: Option<AcronymFilter>,
}

pub fn validate_max_studies(value: usize) -> Result<usize, TrialsError> {
    if value == 0 || value > MAX_STUDIES_LIMIT {
        return Err(TrialsError::InvalidCriteria(format!(
            "max_studies must be between 1 and {MAX_STUDIES_LIMIT}"
        )));
    }
    Ok(value)
}

pub fn looks_like_nct_id(value: &str) -> bool {
    let v = value.trim().as_bytes();
    if v.len() != 11 {
        return false;
    }
    if !v[0..3].eq_ignore_ascii_case(b"NCT") {
        return false;
    }
    v[3..].iter().all(|b| b.is_ascii_digit())
}

/// Trims, uppercases, and dedupes identifiers, keeping first-seen order.
pub fn normalize_nct_ids(ids: &[String]) -> Result<Vec<String>, TrialsError> {
    let mut out: Vec<String> = Vec::new();
    for raw in ids {
        let id = raw.trim();
        if id.is_empty() {
            continue;
        }
        if !looks_like_nct_id(id) {
            return Err(TrialsError::InvalidCriteria(format!(
                "'{id}' is not a valid NCT identifier (expected NCT followed by 8 digits)"
            )));
        }
        let id = id.to_ascii_uppercase();
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

fn clean_values(values: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn phrase(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

const ACRONYM_SUBSTRING_AREAS: &[&str] = &["Acronym", "BriefTitle", "OfficialTitle"];

fn or_group(area: Option<&str>, values: &[&str]) -> String {
    let inner = values
        .iter()
        .map(|v| phrase(v))
        .collect::<Vec<_>>()
        .join(" OR ");
    match area {
        Some(area) => format!("AREA[{area}]({inner})"),
        None => format!("({inner})"),
    }
}

pub fn build_query(criteria: &SearchCriteria) -> Result<BuiltQuery, TrialsError> {
    let nct_ids = normalize_nct_ids(&criteria.nct_ids)?;
    let acronyms = clean_values(&criteria.acronyms);

    let mut groups: Vec<String> = Vec::new();
    let conditions = clean_values(&criteria.conditions);
    if !conditions.is_empty() {
        groups.push(or_group(Some("ConditionSearch"), &conditions));
    }
    let interventions = clean_values(&criteria.interventions);
    if !interventions.is_empty() {
        groups.push(or_group(Some("InterventionSearch"), &interventions));
    }
    let sponsors = clean_values(&criteria.sponsors);
    if !sponsors.is_empty() {
        groups.push(or_group(Some("SponsorSearch"), &sponsors));
    }
    if !acronyms.is_empty() {
        if criteria.exact_acronym {
            groups.push(or_group(Some("Acronym"), &acronyms));
        } else {
            // Upstream matching is word-based, so a fragment of a longer
            // acronym is not found; the filter below enforces containment.
            let areas = ACRONYM_SUBSTRING_AREAS
                .iter()
                .map(|area| or_group(Some(area), &acronyms))
                .collect::<Vec<_>>()
                .join(" OR ");
            groups.push(format!("({areas})"));
        }
    }
    let terms = clean_values(&criteria.terms);
    if !terms.is_empty() {
        groups.push(or_group(None, &terms));
    }

    let acronym_filter = (!acronyms.is_empty()).then(|| {
        let owned: Vec<String> = acronyms.iter().map(|v| v.to_string()).collect();
        AcronymFilter::new(&owned, criteria.exact_acronym)
    });

    let query = match (groups.is_empty(), nct_ids.is_empty()) {
        (true, true) => {
            return Err(TrialsError::InvalidCriteria(
                "At least one of conditions, interventions, sponsors, terms, acronyms, or nct_ids is required"
                    .into(),
            ));
        }
        (true, false) => StudyQuery::Identifiers(nct_ids),
        (false, true) => StudyQuery::Expression(groups.join(" AND ")),
        (false, false) => StudyQuery::Expression(format!(
            "({}) OR AREA[NCTId]({})",
            groups.join(" AND "),
            nct_ids.join(" OR ")
        )),
    };

    Ok(BuiltQuery {
        query,
        acronym_filter,
    })
}
