//! Static safety checks for Cypher queries.
//!
//! This is a conservative pre-filter, not a parser: it rejects write
//! keywords and unbound parameters. The read-only transaction on the
//! server is the real backstop, and grammar errors surface at execution.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Write-capable keywords that never appear in a read-only query.
pub const FORBIDDEN_KEYWORDS: [&str; 7] =
    ["DELETE", "DETACH", "CREATE", "MERGE", "SET", "REMOVE", "DROP"];

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| {
    let alternation = FORBIDDEN_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("keyword pattern is valid")
});

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\w+)").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyQuery,
    ForbiddenOperation,
    MissingParameter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub safe_to_execute: bool,
}

impl ValidationOutcome {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let ok = !issues.iter().any(|i| i.severity == Severity::Error);
        Self {
            valid: ok,
            issues,
            safe_to_execute: ok,
        }
    }

    /// All issue messages joined for a single-line error.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Forbidden keywords present in `query`, upper-cased, in order of first
/// appearance.
pub fn forbidden_keywords(query: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in FORBIDDEN.find_iter(query) {
        let keyword = m.as_str().to_ascii_uppercase();
        if !found.contains(&keyword) {
            found.push(keyword);
        }
    }
    found
}

/// Names of all `$name` placeholders in `query`, sorted and deduplicated.
pub fn placeholders(query: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(query)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Validate a query and its parameter bindings.
pub fn validate(query: &str, parameters: &Map<String, Value>) -> ValidationOutcome {
    if query.trim().is_empty() {
        return ValidationOutcome::from_issues(vec![ValidationIssue::error(
            IssueKind::EmptyQuery,
            "Query cannot be empty",
        )]);
    }

    let mut issues = Vec::new();

    let keywords = forbidden_keywords(query);
    if !keywords.is_empty() {
        issues.push(ValidationIssue::error(
            IssueKind::ForbiddenOperation,
            format!("{} not allowed in read-only queries", keywords.join(", ")),
        ));
    }

    for name in placeholders(query) {
        if !parameters.contains_key(&name) {
            issues.push(ValidationIssue::error(
                IssueKind::MissingParameter,
                format!("Parameter ${name} referenced but not provided"),
            ));
        }
    }

    ValidationOutcome::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_read_query_is_safe() {
        let outcome = validate(
            "MATCH (n:BioEntity) WHERE n.id = $id RETURN n.name LIMIT 5",
            &params(json!({"id": "hgnc:6407", "unused": 1})),
        );
        assert!(outcome.valid);
        assert!(outcome.safe_to_execute);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_detach_delete_is_one_issue() {
        let outcome = validate("MATCH (n) DETACH DELETE n", &Map::new());
        assert!(!outcome.safe_to_execute);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::ForbiddenOperation);
        assert_eq!(
            outcome.issues[0].message,
            "DETACH, DELETE not allowed in read-only queries"
        );
    }

    #[test]
    fn test_every_keyword_is_caught_case_insensitively() {
        for keyword in FORBIDDEN_KEYWORDS {
            let lower = format!("match (n) {} n", keyword.to_lowercase());
            let outcome = validate(&lower, &Map::new());
            assert!(!outcome.safe_to_execute, "{keyword}");
            assert!(outcome.issues[0].message.contains(keyword));
        }
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let outcome = validate(
            "MATCH (n) WHERE n.created_at > 0 AND n.dataset = 'x' RETURN n.offset",
            &Map::new(),
        );
        assert!(outcome.safe_to_execute, "{outcome:?}");
    }

    #[test]
    fn test_missing_parameters_reported_by_name() {
        let outcome = validate(
            "MATCH (a {id: $b_id})-[]-(c {id: $a_id}) WHERE a.x = $b_id RETURN c",
            &params(json!({"other": 1})),
        );
        let missing: Vec<_> = outcome
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::MissingParameter)
            .map(|i| i.message.clone())
            .collect();
        assert_eq!(
            missing,
            vec![
                "Parameter $a_id referenced but not provided",
                "Parameter $b_id referenced but not provided",
            ]
        );
        assert!(!outcome.valid);
    }

    #[test]
    fn test_empty_query() {
        let outcome = validate("   \n", &Map::new());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].kind, IssueKind::EmptyQuery);
        assert!(!outcome.safe_to_execute);
    }

    #[test]
    fn test_issue_serializes_snake_case() {
        let outcome = validate("CREATE (n)", &Map::new());
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["issues"][0]["kind"], "forbidden_operation");
        assert_eq!(v["issues"][0]["severity"], "error");
        assert_eq!(v["safe_to_execute"], false);
    }
}
