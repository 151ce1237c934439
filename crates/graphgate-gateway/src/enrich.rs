//! Progressive enrichment of result items with navigation metadata.
//!
//! Each disclosure level adds underscore-prefixed keys on top of the level
//! below it. Keys already present on an item are left alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use graphgate_query::budget::continuation_hint;
use graphgate_query::{Budgeter, PageInfo};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureLevel {
    Minimal,
    Standard,
    Detailed,
    Exploratory,
}

impl DisclosureLevel {
    pub const ALL: [DisclosureLevel; 4] = [
        Self::Minimal,
        Self::Standard,
        Self::Detailed,
        Self::Exploratory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
            Self::Exploratory => "exploratory",
        }
    }
}

impl FromStr for DisclosureLevel {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| GatewayError::InvalidDisclosureLevel(s.to_string()))
    }
}

impl fmt::Display for DisclosureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Metadata Tables ──────────────────────────────────────────────

fn namespace_to_type(namespace: &str) -> Option<&'static str> {
    let t = match namespace.to_lowercase().as_str() {
        "hgnc" | "ncbigene" => "gene",
        "mesh" | "doid" | "mondo" => "disease",
        "drugbank" | "chebi" | "pubchem.compound" => "drug",
        "go" => "go_term",
        "reactome" | "wikipathways" => "pathway",
        _ => return None,
    };
    Some(t)
}

fn entity_description(result_type: &str) -> Option<&'static str> {
    let d = match result_type {
        "gene" => "Gene entity from biomedical knowledge graph",
        "disease" => "Disease entity from biomedical knowledge graph",
        "drug" => "Drug/chemical entity from biomedical knowledge graph",
        "pathway" => "Biological pathway entity from biomedical knowledge graph",
        "go_term" => "Gene Ontology term",
        _ => return None,
    };
    Some(d)
}

fn next_steps_standard(result_type: &str) -> Option<&'static [&'static str]> {
    let steps: &'static [&'static str] = match result_type {
        "gene" => &[
            "Find diseases: Query gene-disease associations",
            "Find pathways: Query gene-pathway memberships",
        ],
        "disease" => &[
            "Find genes: Query disease-gene associations",
            "Find drugs: Query disease treatments",
        ],
        "drug" => &[
            "Find targets: Query drug-target interactions",
            "Find indications: Query drug-disease indications",
        ],
        "pathway" => &[
            "Find genes: Query pathway member genes",
            "Find diseases: Query pathway-disease associations",
        ],
        _ => return None,
    };
    Some(steps)
}

fn next_steps_detailed(result_type: &str) -> Option<&'static [&'static str]> {
    let steps: &'static [&'static str] = match result_type {
        "gene" => &[
            "Find diseases: Query gene-disease associations",
            "Find pathways: Query gene-pathway memberships",
            "Find drugs: Query drugs targeting this gene",
            "Find GO terms: Query gene ontology annotations",
        ],
        "disease" => &[
            "Find genes: Query disease-gene associations",
            "Find drugs: Query disease treatments",
            "Find phenotypes: Query disease phenotypes",
            "Find trials: Query clinical trials",
        ],
        "drug" => &[
            "Find targets: Query drug-target interactions",
            "Find indications: Query drug-disease indications",
            "Find side effects: Query adverse drug reactions",
            "Find trials: Query clinical trials",
        ],
        "pathway" => &[
            "Find genes: Query pathway member genes",
            "Find diseases: Query pathway-disease associations",
            "Find drugs: Query pathway-targeting drugs",
        ],
        _ => return None,
    };
    Some(steps)
}

fn workflows(result_type: &str) -> &'static [&'static str] {
    match result_type {
        "gene" => &[
            "Disease research: gene → pathways → diseases (find disease modules)",
            "Drug discovery: gene → drugs → side effects (assess therapeutic options)",
        ],
        "disease" => &[
            "Mechanism: disease → genes → pathways (understand biology)",
            "Treatment: disease → drugs → targets (find interventions)",
        ],
        "drug" => &[
            "Safety: drug → side effects (assess risks)",
            "Mechanism: drug → targets → pathways (understand action)",
        ],
        "pathway" => &["Analysis: pathway → genes → diseases (find disease pathways)"],
        _ => &[],
    }
}

fn common_queries(result_type: &str) -> &'static [&'static str] {
    match result_type {
        "gene" => &[
            "Find diseases associated with gene",
            "Find pathways containing gene",
            "Find drugs targeting gene",
        ],
        "disease" => &[
            "Find genes associated with disease",
            "Find drugs treating disease",
            "Find disease phenotypes",
        ],
        "drug" => &[
            "Find drug targets",
            "Find drug indications",
            "Find drug side effects",
        ],
        "pathway" => &["Find pathway genes", "Find diseases involving pathway"],
        _ => &["Explore entity relationships"],
    }
}

fn related_fields(result_type: &str) -> &'static [&'static str] {
    match result_type {
        "gene" => &["genomics", "proteomics", "systems biology"],
        "disease" => &["clinical research", "epidemiology", "precision medicine"],
        "drug" => &["pharmacology", "drug discovery", "toxicology"],
        "pathway" => &["systems biology", "molecular biology", "biochemistry"],
        _ => &["biomedical research"],
    }
}

// ── Type Inference ───────────────────────────────────────────────

/// Infer the entity type of a result list from its first item: a `db_ns`
/// field, then any `id`/`*_id` field holding a CURIE string or a
/// `[namespace, id]` pair.
pub fn infer_result_type(results: &[Value]) -> Option<&'static str> {
    let first = results.first()?.as_object()?;

    if let Some(t) = first
        .get("db_ns")
        .and_then(Value::as_str)
        .and_then(namespace_to_type)
    {
        return Some(t);
    }

    first
        .iter()
        .filter(|(key, _)| key.as_str() == "id" || key.ends_with("_id"))
        .find_map(|(_, value)| match value {
            Value::String(s) => namespace_to_type(s.split_once(':')?.0),
            Value::Array(pair) if pair.len() == 2 => namespace_to_type(pair[0].as_str()?),
            _ => None,
        })
}

// ── Enrichment ───────────────────────────────────────────────────

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn next_steps(result_type: Option<&str>, detailed: bool) -> Value {
    let Some(t) = result_type else {
        return strings(&["Explore relationships: Use graph traversal to find connections"]);
    };
    let table = if detailed {
        next_steps_detailed(t)
    } else {
        next_steps_standard(t)
    };
    match table {
        Some(steps) => strings(steps),
        None => Value::Array(vec![Value::String(format!("Explore {t} relationships in graph"))]),
    }
}

fn set_absent(item: &mut Map<String, Value>, key: &str, value: impl FnOnce() -> Value) {
    if !item.contains_key(key) {
        item.insert(key.to_string(), value());
    }
}

/// Enrich one item. Non-object items pass through untouched.
pub fn enrich_item(item: Value, level: DisclosureLevel, result_type: Option<&str>) -> Value {
    let Value::Object(mut map) = item else {
        return item;
    };
    if level == DisclosureLevel::Minimal {
        return Value::Object(map);
    }

    if let Some(t) = result_type {
        set_absent(&mut map, "_description", || {
            Value::String(
                entity_description(t)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{} entity from CoGEx knowledge graph", capitalize(t))),
            )
        });
    }
    set_absent(&mut map, "_next_steps", || {
        next_steps(result_type, level >= DisclosureLevel::Detailed)
    });

    if level >= DisclosureLevel::Detailed {
        set_absent(&mut map, "_provenance", || {
            json!({
                "source": "CoGEx Knowledge Graph",
                "entity_type": result_type.unwrap_or("unknown"),
            })
        });
    }

    if level >= DisclosureLevel::Exploratory {
        let t = result_type.unwrap_or_default();
        set_absent(&mut map, "_workflows", || strings(workflows(t)));
        set_absent(&mut map, "_research_context", || {
            json!({
                "common_queries": strings(common_queries(t)),
                "related_fields": strings(related_fields(t)),
            })
        });
    }

    Value::Object(map)
}

pub fn enrich(results: Vec<Value>, level: DisclosureLevel, result_type: Option<&str>) -> Vec<Value> {
    results
        .into_iter()
        .map(|item| enrich_item(item, level, result_type))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentMetadata {
    pub result_count: usize,
    pub result_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_hint: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedPage {
    pub results: Vec<Value>,
    pub disclosure_level: DisclosureLevel,
    pub metadata: EnrichmentMetadata,
    pub pagination: PageInfo,
    pub token_estimate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_hint: Option<String>,
}

/// Enrich a result list and return one token-budgeted page of it.
pub fn enrich_results(
    budgeter: &Budgeter,
    results: Vec<Value>,
    level: DisclosureLevel,
    result_type: Option<&str>,
    offset: usize,
    limit: Option<usize>,
) -> EnrichedPage {
    let result_type = result_type
        .map(str::to_string)
        .or_else(|| infer_result_type(&results).map(str::to_string));
    let enriched = enrich(results, level, result_type.as_deref());
    let (page, pagination) = budgeter.paginate(enriched, offset, limit);

    EnrichedPage {
        metadata: EnrichmentMetadata {
            result_count: pagination.returned,
            result_type_hint: result_type.as_deref().and_then(entity_description),
            result_type: result_type.unwrap_or_else(|| "unknown".to_string()),
        },
        results: page,
        disclosure_level: level,
        token_estimate: pagination.token_estimate,
        continuation_hint: continuation_hint(&pagination),
        pagination,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("detailed".parse::<DisclosureLevel>().unwrap(), DisclosureLevel::Detailed);
        let err = "verbose".parse::<DisclosureLevel>().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_infer_result_type_formats() {
        assert_eq!(infer_result_type(&[json!({"db_ns": "HGNC", "db_id": "6407"})]), Some("gene"));
        assert_eq!(infer_result_type(&[json!({"id": "mesh:D010300"})]), Some("disease"));
        assert_eq!(infer_result_type(&[json!({"drug_id": ["CHEBI", "15365"]})]), Some("drug"));
        assert_eq!(infer_result_type(&[json!({"id": "foo:1"})]), None);
        assert_eq!(infer_result_type(&[json!("hgnc:1")]), None);
        assert_eq!(infer_result_type(&[]), None);
    }

    #[test]
    fn test_minimal_is_identity() {
        let item = json!({"id": "hgnc:6407"});
        assert_eq!(enrich_item(item.clone(), DisclosureLevel::Minimal, Some("gene")), item);
    }

    #[test]
    fn test_levels_nest() {
        let item = json!({"id": "hgnc:6407"});
        let keys = |level| {
            let v = enrich_item(item.clone(), level, Some("gene"));
            v.as_object().unwrap().keys().cloned().collect::<Vec<_>>()
        };
        let standard = keys(DisclosureLevel::Standard);
        let detailed = keys(DisclosureLevel::Detailed);
        let exploratory = keys(DisclosureLevel::Exploratory);
        assert!(standard.iter().all(|k| detailed.contains(k)));
        assert!(detailed.iter().all(|k| exploratory.contains(k)));
        assert!(standard.contains(&"_description".to_string()));
        assert!(detailed.contains(&"_provenance".to_string()));
        assert!(exploratory.contains(&"_research_context".to_string()));
    }

    #[test]
    fn test_detailed_uses_richer_next_steps() {
        let v = enrich_item(json!({}), DisclosureLevel::Detailed, Some("gene"));
        assert_eq!(v["_next_steps"].as_array().unwrap().len(), 4);
        let v = enrich_item(json!({}), DisclosureLevel::Standard, Some("gene"));
        assert_eq!(v["_next_steps"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_existing_underscore_keys_never_overwritten() {
        let item = json!({
            "id": "hgnc:6407",
            "_description": "mine",
            "_next_steps": ["keep"],
            "_provenance": {"source": "lab"},
            "_workflows": [],
        });
        let v = enrich_item(item, DisclosureLevel::Exploratory, Some("gene"));
        assert_eq!(v["_description"], "mine");
        assert_eq!(v["_next_steps"], json!(["keep"]));
        assert_eq!(v["_provenance"], json!({"source": "lab"}));
        assert_eq!(v["_workflows"], json!([]));
        assert!(v.get("_research_context").is_some());
    }

    #[test]
    fn test_unknown_type_fallbacks() {
        let v = enrich_item(json!({}), DisclosureLevel::Exploratory, Some("tissue"));
        assert_eq!(v["_description"], "Tissue entity from CoGEx knowledge graph");
        assert_eq!(v["_next_steps"], json!(["Explore tissue relationships in graph"]));
        assert_eq!(v["_research_context"]["related_fields"], json!(["biomedical research"]));

        let v = enrich_item(json!({}), DisclosureLevel::Detailed, None);
        assert!(v.get("_description").is_none());
        assert_eq!(v["_provenance"]["entity_type"], "unknown");
    }

    #[test]
    fn test_enrich_results_page_and_metadata() {
        let results: Vec<Value> = (0..5)
            .map(|i| json!({"db_ns": "HGNC", "db_id": i.to_string()}))
            .collect();
        let page = enrich_results(
            &Budgeter::default(),
            results,
            DisclosureLevel::Standard,
            None,
            0,
            Some(2),
        );
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.metadata.result_type, "gene");
        assert_eq!(page.metadata.result_count, 2);
        assert!(page.metadata.result_type_hint.is_some());
        assert!(page.pagination.has_more);
        assert_eq!(
            page.continuation_hint.as_deref(),
            Some("Showing 2 of 5 results. Call with offset=2 to continue.")
        );
    }
}
