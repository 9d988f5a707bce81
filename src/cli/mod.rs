//! Top-level CLI parsing and command execution.

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::entities::query::SearchCriteria;
use crate::entities::stats::StatisticsReport;
use crate::entities::trial::{
    BatchDetailsResponse, FieldStatisticsRequest, SearchResponse, TrialService,
};
use crate::transform::trial::ProjectedRecord;

pub mod health;
pub mod list;

#[derive(Parser, Debug)]
#[command(
    name = "ctgov-mcp",
    about = "Search, retrieve, and analyze ClinicalTrials.gov studies from the command line or as an MCP server",
    version,
    after_help = "Note: acronym substring matching is applied client-side after a broad registry query."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON instead of Markdown
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable HTTP caching (always fetch fresh data)
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Deadline in seconds for the whole command (overrides CTGOV_MCP_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CriteriaArgs {
    /// Condition or disease (repeatable; values are OR'd)
    #[arg(short = 'c', long = "condition")]
    pub conditions: Vec<String>,

    /// Intervention or drug (repeatable; values are OR'd)
    #[arg(short = 'i', long = "intervention")]
    pub interventions: Vec<String>,

    /// Lead sponsor or collaborator (repeatable; values are OR'd)
    #[arg(short = 's', long = "sponsor")]
    pub sponsors: Vec<String>,

    /// General search term (repeatable; values are OR'd)
    #[arg(short = 't', long = "term")]
    pub terms: Vec<String>,

    /// NCT identifier to include (repeatable)
    #[arg(long = "nct-id")]
    pub nct_ids: Vec<String>,

    /// Maximum number of studies to retrieve (1-1000)
    #[arg(short = 'n', long = "max")]
    pub max_studies: Option<usize>,
}

impl CriteriaArgs {
    fn into_criteria(self) -> SearchCriteria {
        SearchCriteria {
            conditions: self.conditions,
            interventions: self.interventions,
            sponsors: self.sponsors,
            terms: self.terms,
            nct_ids: self.nct_ids,
            max_studies: self.max_studies,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search trials by any combination of criteria
    #[command(after_help = "\
EXAMPLES:
  ctgov-mcp search -c \"COVID-19\" -n 10
  ctgov-mcp search -c melanoma -i pembrolizumab -f NCTId -f Phase
  ctgov-mcp search -a TETON --exact
  ctgov-mcp search -s Pfizer --ids-only -n 100

See also: ctgov-mcp list fields")]
    Search {
        #[command(flatten)]
        criteria: CriteriaArgs,

        /// Study acronym (repeatable)
        #[arg(short = 'a', long = "acronym")]
        acronyms: Vec<String>,

        /// Require acronyms to match exactly (case-insensitive)
        #[arg(long)]
        exact: bool,

        /// Return identifiers, titles, and status only
        #[arg(long = "ids-only")]
        ids_only: bool,

        /// Field to include in each record (repeatable; default: minimal set)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    /// Get one trial by NCT identifier
    #[command(after_help = "\
EXAMPLES:
  ctgov-mcp get NCT04280705
  ctgov-mcp get NCT04280705 -f BriefSummary -f EligibilityCriteria")]
    Get {
        /// ClinicalTrials.gov identifier (e.g., NCT04280705)
        nct_id: String,
        /// Field to include (repeatable; default: detail set)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    /// Get many trials by NCT identifier, fetched in batches
    Batch {
        /// Comma-separated NCT identifiers
        ids: String,
        /// Identifiers per upstream request (1-100)
        #[arg(long = "batch-size")]
        batch_size: Option<usize>,
        /// Field to include (repeatable; default: detail set)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    /// Phase distribution over matching trials
    Phases {
        #[command(flatten)]
        criteria: CriteriaArgs,
    },
    /// Value distributions for fields, over matching trials or the whole registry
    #[command(after_help = "\
EXAMPLES:
  ctgov-mcp stats -f OverallStatus -f Phase
  ctgov-mcp stats --type ENUM -c \"breast cancer\" -n 500")]
    Stats {
        /// Field name (repeatable)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
        /// Field type: ENUM, STRING, DATE, INTEGER, NUMBER, BOOLEAN (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        #[command(flatten)]
        criteria: CriteriaArgs,
    },
    /// List known field names, optionally for one category
    Fields {
        /// Category (identification, status, design, ...)
        category: Option<String>,
    },
    /// Command and field reference
    List {
        /// Optional topic (commands, fields, or a field category)
        topic: Option<String>,
    },
    /// Check ClinicalTrials.gov API connectivity
    Health,
    /// Run MCP server over stdio
    Mcp,
    /// Alias for `mcp`
    Serve,
    /// Show version
    Version,
}

fn version_output() -> String {
    let cargo_version = env!("CARGO_PKG_VERSION");
    let git_tag = option_env!("CTGOV_MCP_BUILD_GIT_TAG");
    let git = option_env!("CTGOV_MCP_BUILD_GIT_SHA").unwrap_or("unknown");
    let build = option_env!("CTGOV_MCP_BUILD_DATE").unwrap_or("unknown");
    let version = git_tag
        .filter(|t| t.starts_with('v') && !t.contains('-'))
        .map(|t| &t[1..])
        .unwrap_or(cargo_version);
    format!("ctgov-mcp {version} (git {git}, build {build})")
}

fn parse_id_list(value: &str) -> Vec<String> {
    value
        .split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn record_markdown(record: &ProjectedRecord) -> String {
    let mut out = String::new();
    let id = record.nct_id().unwrap_or("(no identifier)");
    match record.get("BriefTitle").map(display_value) {
        Some(title) => out.push_str(&format!("## {id}: {title}\n\n")),
        None => out.push_str(&format!("## {id}\n\n")),
    }
    for key in record.keys().filter(|k| *k != "NCTId" && *k != "BriefTitle") {
        if let Some(value) = record.get(key) {
            let text = display_value(value);
            if text.contains('\n') {
                out.push_str(&format!("- {key}:\n\n{}\n\n", text.trim()));
            } else {
                out.push_str(&format!("- {key}: {text}\n"));
            }
        }
    }
    out
}

fn search_markdown(resp: &SearchResponse) -> String {
    let mut out = String::from("# Trial search\n\n");
    if resp.results.is_empty() {
        out.push_str("No trials matched.\n");
        return out;
    }
    for (idx, record) in resp.results.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&record_markdown(record));
    }
    let total = resp
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unknown".into());
    out.push_str(&format!(
        "\nReturned {} (total matching: {total}{})\n",
        resp.count,
        if resp.has_more { ", more available" } else { "" }
    ));
    out
}

fn batch_markdown(resp: &BatchDetailsResponse) -> String {
    let mut out = format!(
        "# Batch: trial ({} of {})\n\n",
        resp.returned, resp.requested
    );
    for (idx, record) in resp.results.iter().enumerate() {
        if idx > 0 {
            out.push_str("\n---\n\n");
        }
        out.push_str(&record_markdown(record));
    }
    if !resp.missing.is_empty() {
        out.push_str(&format!("\nNot found: {}\n", resp.missing.join(", ")));
    }
    out
}

fn stats_markdown(report: &StatisticsReport) -> String {
    let mut out = format!(
        "# Field statistics\n\nRecords considered: {}\n",
        report.total_records
    );
    for dist in &report.fields {
        out.push_str(&format!(
            "\n## {} ({})\n\n",
            dist.field,
            dist.field_type.as_str()
        ));
        if dist.values.is_empty() {
            out.push_str("No values.\n");
            continue;
        }
        out.push_str("| Value | Count | Percent |\n");
        out.push_str("|-------|-------|---------|\n");
        for value in &dist.values {
            out.push_str(&format!(
                "| {} | {} | {:.2}% |\n",
                value.value, value.count, value.percent
            ));
        }
        if dist.list_valued {
            out.push_str("\nList field: a trial may count under several values.\n");
        }
    }
    out
}

fn to_pretty<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<String> {
    let settings = settings
        .with_deadline_secs(cli.timeout)
        .with_cache_disabled(cli.no_cache);
    let json = cli.json;
    debug!(command = ?cli.command, no_cache = settings.no_cache, "running command");

    match cli.command {
        Commands::Search {
            criteria,
            acronyms,
            exact,
            ids_only,
            fields,
        } => {
            let service = TrialService::new(&settings)?;
            let criteria = SearchCriteria {
                acronyms,
                exact_acronym: exact,
                fields,
                ..criteria.into_criteria()
            };
            let resp = if ids_only {
                service.search_nct_ids_only(criteria).await?
            } else {
                service.search_combined(criteria).await?
            };
            if json {
                to_pretty(&resp)
            } else {
                Ok(search_markdown(&resp))
            }
        }
        Commands::Get { nct_id, fields } => {
            let service = TrialService::new(&settings)?;
            let record = service.get_trial_details(&nct_id, fields).await?;
            if json {
                to_pretty(&record)
            } else {
                Ok(record_markdown(&record))
            }
        }
        Commands::Batch {
            ids,
            batch_size,
            fields,
        } => {
            let service = TrialService::new(&settings)?;
            let resp = service
                .get_trial_details_batched(parse_id_list(&ids), batch_size, fields)
                .await?;
            if json {
                to_pretty(&resp)
            } else {
                Ok(batch_markdown(&resp))
            }
        }
        Commands::Phases { criteria } => {
            let service = TrialService::new(&settings)?;
            let report = service
                .analyze_trial_phases(criteria.into_criteria())
                .await?;
            if json {
                to_pretty(&report)
            } else {
                Ok(stats_markdown(&report))
            }
        }
        Commands::Stats {
            fields,
            types,
            criteria,
        } => {
            let service = TrialService::new(&settings)?;
            let report = service
                .get_field_statistics(FieldStatisticsRequest {
                    field_names: fields,
                    field_types: types,
                    criteria: criteria.into_criteria(),
                })
                .await?;
            if json {
                to_pretty(&report)
            } else {
                Ok(stats_markdown(&report))
            }
        }
        Commands::Fields { category } => {
            if json {
                to_pretty(&TrialService::available_fields(category.as_deref()))
            } else {
                Ok(list::render_fields(category.as_deref()))
            }
        }
        Commands::List { topic } => list::render(topic.as_deref()),
        Commands::Health => {
            let report = health::check(&settings).await?;
            if json {
                to_pretty(&report)
            } else {
                Ok(report.to_markdown())
            }
        }
        Commands::Mcp | Commands::Serve => {
            anyhow::bail!("MCP/serve commands should not go through CLI run()")
        }
        Commands::Version => Ok(version_output()),
    }
}

/// Parses `args` and runs the command against `settings`.
///
/// # Errors
///
/// Returns an error when CLI args cannot be parsed or when command execution fails.
pub async fn execute(mut args: Vec<String>, settings: Settings) -> anyhow::Result<String> {
    if args.is_empty() {
        args.push("ctgov-mcp".to_string());
    }
    let cli = Cli::try_parse_from(args)?;
    run(cli, settings).await
}
