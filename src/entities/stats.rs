//! Value distributions over a set of study records.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::entities::fields::{self, FieldSpec, FieldType};
use crate::sources::clinicaltrials::CtGovFieldValueStats;

pub const NOT_REPORTED: &str = "Not reported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsScope {
    /// Computed locally over the records a query returned.
    ResultSet,
    /// Reported by the registry across every study it holds.
    Registry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDistribution {
    pub field: String,
    pub field_type: FieldType,
    /// List fields count once per element, so counts may sum past the
    /// number of records.
    pub list_valued: bool,
    pub records_considered: usize,
    pub not_reported: usize,
    pub unique_values: usize,
    pub values: Vec<ValueCount>,
}

impl FieldDistribution {
    pub fn count_of(&self, value: &str) -> Option<usize> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub scope: StatsScope,
    pub total_records: usize,
    pub fields: Vec<FieldDistribution>,
}

impl StatisticsReport {
    pub fn field(&self, name: &str) -> Option<&FieldDistribution> {
        self.fields.iter().find(|f| f.field == name)
    }
}

/// Keeps first-seen order so ties sort stably.
#[derive(Default)]
struct Tally {
    order: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Tally {
    fn add(&mut self, key: String, by: usize) {
        match self.index.get(&key) {
            Some(&slot) => self.order[slot].1 += by,
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key, by));
            }
        }
    }

    fn into_sorted(mut self) -> Vec<(String, usize)> {
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order
    }
}

pub(crate) fn normalize_enum_key(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
            prev_sep = false;
            continue;
        }
        if matches!(ch, ' ' | ',' | '-' | '_') && !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

fn value_key(value: &Value, field_type: FieldType) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if field_type == FieldType::Enum {
                Some(normalize_enum_key(s)).filter(|k| !k.is_empty())
            } else {
                Some(s.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn percent(count: usize, of: usize) -> f64 {
    if of == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / of as f64).round() / 100.0
}

fn distribution(records: &[Value], spec: &FieldSpec) -> FieldDistribution {
    let mut tally = Tally::default();
    let mut not_reported = 0;

    for record in records {
        let mut keys = fields::resolve(record, spec)
            .into_iter()
            .filter_map(|v| value_key(v, spec.field_type))
            .peekable();
        if keys.peek().is_none() {
            not_reported += 1;
            tally.add(NOT_REPORTED.to_string(), 1);
            continue;
        }
        if spec.is_list() {
            for key in keys {
                tally.add(key, 1);
            }
        } else if let Some(key) = keys.next() {
            tally.add(key, 1);
        }
    }

    let records_considered = records.len();
    let sorted = tally.into_sorted();
    let unique_values = sorted.iter().filter(|(v, _)| v != NOT_REPORTED).count();
    FieldDistribution {
        field: spec.name.to_string(),
        field_type: spec.field_type,
        list_valued: spec.is_list(),
        records_considered,
        not_reported,
        unique_values,
        values: sorted
            .into_iter()
            .map(|(value, count)| ValueCount {
                percent: percent(count, records_considered),
                value,
                count,
            })
            .collect(),
    }
}

/// Counts values of each field over `records`.
pub fn compute(records: &[Value], specs: &[&FieldSpec]) -> StatisticsReport {
    StatisticsReport {
        scope: StatsScope::ResultSet,
        total_records: records.len(),
        fields: specs
            .iter()
            .map(|spec| distribution(records, spec))
            .collect(),
    }
}

/// Reshapes `GET /stats/field/values` output into the local report form.
///
/// `total_studies` is the registry size. Upstream only lists the top values
/// and counts a multi-valued study once per value, so neither sum is a study
/// count; percentages are shares of `total_studies`.
pub fn from_registry_stats(
    stats: &[CtGovFieldValueStats],
    total_studies: usize,
) -> StatisticsReport {
    let fields: Vec<FieldDistribution> = stats
        .iter()
        .map(|entry| {
            let spec = fields::lookup(&entry.piece);
            let field_type = spec
                .map(|s| s.field_type)
                .or_else(|| entry.field_type.as_deref().and_then(FieldType::from_name))
                .unwrap_or(FieldType::String);

            let mut tally = Tally::default();
            for top in &entry.top_values {
                if let Some(key) = value_key(&top.value, field_type) {
                    tally.add(key, top.studies_count as usize);
                }
            }
            let not_reported = entry.missing_studies_count as usize;
            if not_reported > 0 {
                tally.add(NOT_REPORTED.to_string(), not_reported);
            }
            let sorted = tally.into_sorted();
            let observed = sorted.iter().filter(|(v, _)| v != NOT_REPORTED).count();

            FieldDistribution {
                field: spec
                    .map(|s| s.name.to_string())
                    .unwrap_or_else(|| entry.piece.clone()),
                field_type,
                list_valued: spec.is_some_and(FieldSpec::is_list),
                records_considered: total_studies,
                not_reported,
                unique_values: entry
                    .unique_values_count
                    .map(|v| v as usize)
                    .unwrap_or(observed),
                values: sorted
                    .into_iter()
                    .map(|(value, count)| ValueCount {
                        percent: percent(count, total_studies),
                        value,
                        count,
                    })
                    .collect(),
            }
        })
        .collect();

    StatisticsReport {
        scope: StatsScope::Registry,
        total_records: total_studies,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::fields::lookup;
    use crate::sources::clinicaltrials::CtGovTopValue;
    use serde_json::json;

    fn with_status(status: Option<&str>) -> Value {
        match status {
            Some(status) => json!({"protocolSection": {"statusModule": {"overallStatus": status}}}),
            None => json!({"protocolSection": {"statusModule": {}}}),
        }
    }

    fn with_phases(phases: &[&str]) -> Value {
        json!({"protocolSection": {"designModule": {"phases": phases}}})
    }

    #[test]
    fn scalar_counts_sum_to_record_count() {
        let records = vec![
            with_status(Some("RECRUITING")),
            with_status(Some("COMPLETED")),
            with_status(Some("RECRUITING")),
            with_status(None),
        ];
        let report = compute(&records, &[lookup("OverallStatus").unwrap()]);
        let dist = report.field("OverallStatus").unwrap();

        assert_eq!(report.total_records, 4);
        assert_eq!(dist.values[0].value, "RECRUITING");
        assert_eq!(dist.values[0].count, 2);
        assert_eq!(dist.values[0].percent, 50.0);
        assert_eq!(dist.not_reported, 1);
        assert_eq!(dist.count_of(NOT_REPORTED), Some(1));
        assert_eq!(dist.unique_values, 2);
        let sum: usize = dist.values.iter().map(|v| v.count).sum();
        assert_eq!(sum, 4);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let records = vec![
            with_status(Some("COMPLETED")),
            with_status(Some("RECRUITING")),
        ];
        let report = compute(&records, &[lookup("OverallStatus").unwrap()]);
        let values: Vec<_> = report.fields[0]
            .values
            .iter()
            .map(|v| v.value.as_str())
            .collect();
        assert_eq!(values, vec!["COMPLETED", "RECRUITING"]);
    }

    #[test]
    fn enum_values_are_normalized() {
        let records = vec![
            with_status(Some("Active, not recruiting")),
            with_status(Some("ACTIVE_NOT_RECRUITING")),
        ];
        let report = compute(&records, &[lookup("OverallStatus").unwrap()]);
        assert_eq!(report.fields[0].count_of("ACTIVE_NOT_RECRUITING"), Some(2));
    }

    #[test]
    fn list_fields_count_each_element() {
        let records = vec![
            with_phases(&["PHASE1", "PHASE2"]),
            with_phases(&["PHASE2"]),
            with_phases(&[]),
        ];
        let report = compute(&records, &[lookup("Phase").unwrap()]);
        let dist = &report.fields[0];
        assert!(dist.list_valued);
        assert_eq!(dist.count_of("PHASE2"), Some(2));
        assert_eq!(dist.count_of("PHASE1"), Some(1));
        assert_eq!(dist.count_of(NOT_REPORTED), Some(1));
        assert_eq!(dist.values[0].value, "PHASE2");
    }

    #[test]
    fn booleans_are_bucketed_by_literal() {
        let records = vec![
            json!({"hasResults": true}),
            json!({"hasResults": false}),
            json!({"hasResults": true}),
        ];
        let report = compute(&records, &[lookup("HasResults").unwrap()]);
        assert_eq!(report.fields[0].count_of("true"), Some(2));
        assert_eq!(report.fields[0].count_of("false"), Some(1));
    }

    #[test]
    fn empty_record_set_yields_empty_distribution() {
        let report = compute(&[], &[lookup("Phase").unwrap()]);
        assert_eq!(report.total_records, 0);
        assert!(report.fields[0].values.is_empty());
    }

    #[test]
    fn percentages_round_to_two_decimals() {
        let records = vec![
            with_status(Some("RECRUITING")),
            with_status(Some("COMPLETED")),
            with_status(Some("COMPLETED")),
        ];
        let report = compute(&records, &[lookup("OverallStatus").unwrap()]);
        assert_eq!(report.fields[0].values[0].percent, 66.67);
        assert_eq!(report.fields[0].values[1].percent, 33.33);
    }

    #[test]
    fn registry_stats_are_reshaped() {
        let stats = vec![CtGovFieldValueStats {
            field: Some("protocolSection.designModule.phases".into()),
            piece: "Phase".into(),
            field_type: Some("ENUM".into()),
            missing_studies_count: 10,
            unique_values_count: Some(2),
            top_values: vec![
                CtGovTopValue {
                    value: json!("PHASE2"),
                    studies_count: 30,
                },
                CtGovTopValue {
                    value: json!("PHASE1"),
                    studies_count: 60,
                },
            ],
        }];
        let report = from_registry_stats(&stats, 100);
        assert_eq!(report.scope, StatsScope::Registry);
        let dist = report.field("Phase").unwrap();
        assert_eq!(dist.values[0].value, "PHASE1");
        assert_eq!(dist.values[0].percent, 60.0);
        assert_eq!(dist.not_reported, 10);
        assert_eq!(dist.unique_values, 2);
        assert_eq!(report.total_records, 100);
    }

    #[test]
    fn registry_percentages_use_study_count() {
        let stats = vec![
            CtGovFieldValueStats {
                field: Some("protocolSection.designModule.phases".into()),
                piece: "Phase".into(),
                field_type: Some("ENUM".into()),
                missing_studies_count: 10,
                unique_values_count: Some(2),
                top_values: vec![
                    CtGovTopValue {
                        value: json!("PHASE1"),
                        studies_count: 60,
                    },
                    CtGovTopValue {
                        value: json!("PHASE2"),
                        studies_count: 50,
                    },
                ],
            },
            CtGovFieldValueStats {
                field: Some("protocolSection.statusModule.overallStatus".into()),
                piece: "OverallStatus".into(),
                field_type: Some("ENUM".into()),
                missing_studies_count: 0,
                unique_values_count: Some(14),
                top_values: vec![CtGovTopValue {
                    value: json!("COMPLETED"),
                    studies_count: 40,
                }],
            },
        ];
        let report = from_registry_stats(&stats, 100);
        assert_eq!(report.total_records, 100);

        let phase = report.field("Phase").unwrap();
        assert!(phase.list_valued);
        assert_eq!(phase.records_considered, 100);
        assert_eq!(phase.values[0].percent, 60.0);
        assert_eq!(phase.values[1].percent, 50.0);
        assert_eq!(phase.count_of(NOT_REPORTED), Some(10));

        let status = report.field("OverallStatus").unwrap();
        assert_eq!(status.records_considered, 100);
        assert_eq!(status.unique_values, 14);
        assert_eq!(status.values[0].percent, 40.0);
    }

    #[test]
    fn normalize_enum_key_collapses_separators() {
        assert_eq!(normalize_enum_key("Phase 1/Phase 2"), "PHASE_1PHASE_2");
        assert_eq!(normalize_enum_key(" early - phase 1 "), "EARLY_PHASE_1");
    }
}
