//! Free-text grounding: map a term such as "LRRK2" or "Parkinson's
//! disease" onto graph identifiers, refusing to guess when the match is
//! weak or the candidates are too close to call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use graphgate_core::types::namespace_filter;
use graphgate_core::Curie;
use graphgate_graph::{queries, GraphBackend};

use crate::error::GroundingError;

/// Top scores below this are rejected as low confidence.
pub const MIN_CONFIDENCE: f64 = 0.5;
/// A runner-up within this distance of the top score makes the term ambiguous.
pub const AMBIGUITY_MARGIN: f64 = 0.3;
/// Candidates (including the top) considered by the ambiguity check.
pub const AMBIGUITY_WINDOW: usize = 5;

const XREF_LIMIT: usize = 20;

// ── Oracle ───────────────────────────────────────────────────────

/// One raw match from a grounding oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGrounding {
    pub namespace: String,
    pub identifier: String,
    pub name: String,
    pub score: f64,
    pub source: String,
}

/// Text-to-identifier matching, treated as an external collaborator.
#[async_trait]
pub trait GroundingOracle: Send + Sync {
    /// Candidates ordered by descending score.
    async fn ground(
        &self,
        term: &str,
        organism: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawGrounding>, GroundingError>;
}

/// Oracle backed by the graph itself: a full-text index over entity names,
/// falling back to exact name equality when the index is missing or finds
/// nothing.
pub struct GraphNameOracle {
    backend: Arc<dyn GraphBackend>,
    index: String,
}

impl GraphNameOracle {
    pub fn new(backend: Arc<dyn GraphBackend>, index: impl Into<String>) -> Self {
        Self {
            backend,
            index: index.into(),
        }
    }
}

#[async_trait]
impl GroundingOracle for GraphNameOracle {
    async fn ground(
        &self,
        term: &str,
        _organism: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawGrounding>, GroundingError> {
        let query = escape_lucene(term);
        let hits = match queries::fulltext_names(self.backend.as_ref(), &self.index, &query, limit)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(index = %self.index, error = %e, "Full-text grounding failed, using exact names");
                Vec::new()
            }
        };

        if !hits.is_empty() {
            let max = hits.iter().map(|h| h.score).fold(f64::MIN, f64::max);
            let mut groundings: Vec<RawGrounding> = hits
                .into_iter()
                .filter_map(|hit| {
                    let score = if hit.name.eq_ignore_ascii_case(term) {
                        1.0
                    } else if max > 0.0 {
                        FULLTEXT_CEILING * hit.score / max
                    } else {
                        0.0
                    };
                    raw_from_id(&hit.id, hit.name, score, "fulltext")
                })
                .collect();
            groundings.sort_by(|a, b| b.score.total_cmp(&a.score));
            return Ok(groundings);
        }

        let exact = queries::exact_names(self.backend.as_ref(), term, limit)
            .await
            .map_err(|e| GroundingError::Oracle(e.to_string()))?;
        Ok(exact
            .into_iter()
            .filter_map(|hit| raw_from_id(&hit.id, hit.name, hit.score, "exact_name"))
            .collect())
    }
}

/// Best score a non-exact full-text hit can reach.
const FULLTEXT_CEILING: f64 = 0.7;

fn raw_from_id(id: &str, name: String, score: f64, source: &str) -> Option<RawGrounding> {
    let curie = Curie::parse(id)?;
    Some(RawGrounding {
        namespace: curie.prefix,
        identifier: curie.local,
        name,
        score: score.clamp(0.0, 1.0),
        source: source.to_string(),
    })
}

/// Escape Lucene query syntax so the term is matched literally.
fn escape_lucene(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(
            c,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
                | '*' | '?' | ':' | '\\' | '/'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ── Candidates ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingCandidate {
    pub curie: String,
    pub namespace: String,
    pub identifier: String,
    pub name: String,
    pub score: f64,
    pub source: String,
}

impl From<RawGrounding> for GroundingCandidate {
    fn from(raw: RawGrounding) -> Self {
        Self {
            curie: format!("{}:{}", raw.namespace, raw.identifier),
            score: (raw.score * 1000.0).round() / 1000.0,
            namespace: raw.namespace,
            identifier: raw.identifier,
            name: raw.name,
            source: raw.source,
        }
    }
}

impl GroundingCandidate {
    /// `[namespace, identifier]` with the namespace lower-cased, the form
    /// endpoints receive.
    pub fn pair(&self) -> (String, String) {
        (self.namespace.to_lowercase(), self.identifier.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingStatus {
    Resolved,
    NoMatch,
    LowConfidence,
    Ambiguous,
}

/// Filtered candidates for a term. `top_match` is only set when the term
/// resolved unambiguously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingOutcome {
    pub query: String,
    pub groundings: Vec<GroundingCandidate>,
    pub top_match: Option<GroundingCandidate>,
    pub status: GroundingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub param_filter: Option<String>,
    pub namespaces_allowed: Option<Vec<String>>,
}

impl GroundingOutcome {
    /// The unambiguous top candidate, or the reason there is none.
    pub fn resolve(&self) -> Result<GroundingCandidate, GroundingError> {
        let options = || {
            self.groundings
                .iter()
                .take(AMBIGUITY_WINDOW)
                .cloned()
                .collect::<Vec<_>>()
        };
        match (self.status, &self.top_match) {
            (GroundingStatus::Resolved, Some(top)) => Ok(top.clone()),
            (GroundingStatus::LowConfidence, _) => Err(GroundingError::LowConfidence {
                term: self.query.clone(),
                top_score: self.groundings.first().map(|g| g.score).unwrap_or(0.0),
                options: options(),
            }),
            (GroundingStatus::Ambiguous, _) => Err(GroundingError::Ambiguous {
                term: self.query.clone(),
                reason: self.reason.clone().unwrap_or_default(),
                options: options(),
            }),
            _ => Err(GroundingError::NoMatch {
                term: self.query.clone(),
                namespaces: self.namespaces_allowed.clone(),
            }),
        }
    }
}

/// Apply the absolute floor and the relative margin to an ordered list.
fn assess(groundings: &[GroundingCandidate]) -> (GroundingStatus, Option<String>) {
    let Some(top) = groundings.first() else {
        return (GroundingStatus::NoMatch, None);
    };
    if top.score < MIN_CONFIDENCE {
        return (
            GroundingStatus::LowConfidence,
            Some(format!("Top score {} is below {MIN_CONFIDENCE}", top.score)),
        );
    }
    let close = groundings
        .iter()
        .take(AMBIGUITY_WINDOW)
        .skip(1)
        .any(|other| top.score - other.score < AMBIGUITY_MARGIN);
    if close {
        return (
            GroundingStatus::Ambiguous,
            Some(format!("Multiple results within {AMBIGUITY_MARGIN} of top score")),
        );
    }
    (GroundingStatus::Resolved, None)
}

// ── Service ──────────────────────────────────────────────────────

pub struct GroundingService {
    oracle: Arc<dyn GroundingOracle>,
}

impl GroundingService {
    pub fn new(oracle: Arc<dyn GroundingOracle>) -> Self {
        Self { oracle }
    }

    /// Ground `term`, keeping only namespaces accepted for `param_type`.
    pub async fn ground(
        &self,
        term: &str,
        param_type: Option<&str>,
        organism: Option<&str>,
        limit: usize,
    ) -> Result<GroundingOutcome, GroundingError> {
        let allowed = param_type.and_then(namespace_filter);
        let raw = self.oracle.ground(term, organism, limit).await?;

        let groundings: Vec<GroundingCandidate> = raw
            .into_iter()
            .filter(|g| {
                allowed.map_or(true, |ns| ns.contains(&g.namespace.to_lowercase().as_str()))
            })
            .map(GroundingCandidate::from)
            .collect();

        let (status, reason) = assess(&groundings);
        tracing::debug!(
            term,
            param_type,
            candidates = groundings.len(),
            status = ?status,
            "Grounded term"
        );

        Ok(GroundingOutcome {
            query: term.to_string(),
            top_match: (status == GroundingStatus::Resolved)
                .then(|| groundings.first().cloned())
                .flatten(),
            groundings,
            status,
            reason,
            param_filter: param_type.map(str::to_string),
            namespaces_allowed: allowed.map(|ns| ns.iter().map(|s| s.to_string()).collect()),
        })
    }
}

// ── Cross-References ─────────────────────────────────────────────

/// The original identifier followed by its `xref` equivalents, restricted
/// to the namespaces accepted for `param_type`.
pub async fn lookup_xrefs(
    backend: &dyn GraphBackend,
    namespace: &str,
    identifier: &str,
    param_type: Option<&str>,
) -> Vec<(String, String)> {
    let original = (namespace.to_lowercase(), identifier.to_string());
    let allowed = param_type.and_then(namespace_filter);
    let source_id = Curie::from_pair(namespace, identifier).canonical().to_string();

    let targets = match queries::xrefs(backend, &source_id, XREF_LIMIT).await {
        Ok(targets) => targets,
        Err(e) => {
            tracing::debug!(source_id = %source_id, error = %e, "Xref lookup failed");
            return vec![original];
        }
    };

    let mut equivalents = vec![original];
    for target in targets {
        let Some(curie) = Curie::parse(&target).map(|c| c.canonical()) else {
            continue;
        };
        if allowed.is_some_and(|ns| !ns.contains(&curie.prefix.as_str())) {
            continue;
        }
        let pair = (curie.prefix, curie.local);
        if !equivalents.contains(&pair) {
            equivalents.push(pair);
        }
    }
    equivalents
}
