use serde_json::Value;
use tracing::{debug, warn};

use crate::entities::query::StudyQuery;
use crate::error::TrialsError;
use crate::sources::clinicaltrials::{CTGOV_MAX_PAGE_SIZE, CtGovSearchParams, StudySource};

/// Hard stop for token chains that never terminate.
pub const MAX_PAGES: usize = 200;

#[derive(Debug, Default)]
pub struct Aggregated {
    pub studies: Vec<Value>,
    pub total_count: Option<u32>,
    /// More matching records existed beyond the cap.
    pub has_more: bool,
    pub pages: usize,
}

/// Follows page tokens until `cap` records pass `keep` or the upstream runs dry.
///
/// Each page asks for no more than what is still needed, so a cap smaller
/// than one page costs a single request.
pub async fn collect_studies<S, F>(
    source: &S,
    query: &StudyQuery,
    fields: &[String],
    cap: usize,
    keep: F,
) -> Result<Aggregated, TrialsError>
where
    S: StudySource + ?Sized,
    F: Fn(&Value) -> bool + Sync,
{
    let mut out = Aggregated::default();
    if cap == 0 {
        return Ok(out);
    }

    let (query_term, nct_ids) = match query {
        StudyQuery::Expression(expr) => (Some(expr.clone()), Vec::new()),
        StudyQuery::Identifiers(ids) => (None, ids.clone()),
    };
    let mut page_token: Option<String> = None;

    loop {
        if out.pages >= MAX_PAGES {
            warn!(pages = out.pages, "page limit reached; stopping pagination");
            out.has_more = true;
            break;
        }

        let remaining = cap - out.studies.len();
        let params = CtGovSearchParams {
            query_term: query_term.clone(),
            nct_ids: nct_ids.clone(),
            fields: fields.to_vec(),
            page_token: page_token.clone(),
            page_size: remaining.min(CTGOV_MAX_PAGE_SIZE),
            count_total: out.pages == 0,
        };
        let resp = source.search_page(&params).await?;
        out.pages += 1;
        if out.total_count.is_none() {
            out.total_count = resp.total_count;
        }

        let page_len = resp.studies.len();
        let mut consumed = 0;
        for study in resp.studies {
            consumed += 1;
            if !keep(&study) {
                continue;
            }
            out.studies.push(study);
            if out.studies.len() >= cap {
                break;
            }
        }
        let next_token = resp
            .next_page_token
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        debug!(
            page = out.pages,
            page_len,
            collected = out.studies.len(),
            has_next = next_token.is_some(),
            "ctgov page aggregated"
        );

        if out.studies.len() >= cap {
            out.has_more = consumed < page_len || next_token.is_some();
            break;
        }
        if page_len == 0 {
            break;
        }
        match next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(out)
}
