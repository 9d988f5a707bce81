use crate::entities::fields::{self, CATEGORIES, FieldCatalog};

pub fn render(topic: Option<&str>) -> anyhow::Result<String> {
    match topic.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(list_all()),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "commands" | "command" => Ok(list_commands()),
            "fields" | "field" => Ok(render_fields(None)),
            "stats" | "statistics" => Ok(list_stats()),
            other if CATEGORIES.iter().any(|c| c.name == other) => Ok(render_fields(Some(other))),
            other => {
                let categories = CATEGORIES
                    .iter()
                    .map(|c| format!("- {}", c.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                anyhow::bail!(
                    "Unknown topic: {other}\n\nValid topics:\n- commands\n- fields\n- stats\n{categories}"
                )
            }
        },
    }
}

fn list_all() -> String {
    let mut out = list_commands();
    out.push('\n');
    out.push_str(&list_stats());
    out.push_str("\n## Field categories\n\n");
    for category in CATEGORIES {
        out.push_str(&format!(
            "- `{}` - {}\n",
            category.name, category.description
        ));
    }
    out.push_str("\nRun `ctgov-mcp list <category>` to see the fields in one category.\n");
    out
}

fn list_commands() -> String {
    r#"# ctgov-mcp

## Commands

- `search [criteria]` - search trials; criteria within one flag are OR'd, across flags AND'd
- `search -a <acronym> [--exact]` - acronym search (substring by default)
- `search [criteria] --ids-only` - identifiers, titles, and status only (default max 100)
- `get <nct_id>` - one trial with the detail field set
- `batch <id,id,...> [--batch-size <N>]` - many trials, fetched in batches
- `phases [criteria]` - phase distribution over matching trials
- `stats [-f <field>] [--type <TYPE>] [criteria]` - field value distributions
- `fields [category]` - field names accepted by `-f`
- `health` - ClinicalTrials.gov connectivity check
- `mcp` / `serve` - run the MCP server over stdio

## Criteria flags

- `-c, --condition <text>`
- `-i, --intervention <text>`
- `-s, --sponsor <text>`
- `-t, --term <text>`
- `--nct-id <NCT########>`
- `-n, --max <1-1000>`
- `-f, --field <FieldName>`

## Global flags

- `--json`
- `--no-cache`
- `--timeout <seconds>`
"#
    .to_string()
}

fn list_stats() -> String {
    r#"## Statistics

- With criteria, counts are computed over the matching trials (up to `--max`, default 1000).
- Without criteria, counts come from registry-wide statistics.
- Trials lacking a value are counted under "Not reported".
- List fields (e.g. Phase, Condition) count each element, so counts can exceed the number of trials.
"#
    .to_string()
}

fn catalog_markdown(catalog: &FieldCatalog) -> String {
    let mut out = String::from("# Fields\n\n");
    if let Some(search) = catalog.search_fields {
        out.push_str(&format!("Default search fields: {}\n", search.join(", ")));
    }
    if let Some(discovery) = catalog.discovery_fields {
        out.push_str(&format!("Identifier discovery fields: {}\n", discovery.join(", ")));
    }
    if let Some(detail) = catalog.detail_fields {
        out.push_str(&format!("Detail fields: {}\n", detail.join(", ")));
    }
    for category in &catalog.categories {
        out.push_str(&format!(
            "\n## {}\n\n{}\n\n| Field | Type | List |\n|-------|------|------|\n",
            category.name, category.description
        ));
        for spec in &category.fields {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                spec.name,
                spec.field_type.as_str(),
                if spec.is_list() { "yes" } else { "no" }
            ));
        }
    }
    out
}

pub fn render_fields(category: Option<&str>) -> String {
    catalog_markdown(&fields::catalog(category))
}
