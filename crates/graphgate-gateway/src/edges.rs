//! Navigation edge map: which entity types a caller can reach from which,
//! and through which registered functions.
//!
//! Edges come from two places. Declared edges are taken as given. The rest
//! are inferred from function names, which is a naming-convention heuristic
//! and is labeled as such in every edge it produces.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use graphgate_core::EntityType;

use crate::endpoint::DeclaredEdge;

static GET_FOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^get_(\w+?)s?_for_(\w+?)s?$").expect("get_for pattern is valid"));
static IS_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^is_(\w+)_in_(\w+)").expect("is_in pattern is valid"));
static HAS_ASSOCIATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^has_(\w+)_(\w+)_association").expect("association pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrigin {
    Declared,
    NamingConvention,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeFunction {
    pub name: String,
    pub origin: EdgeOrigin,
}

/// Directed edges `source → target → [functions]`, ordered by type label.
#[derive(Debug, Clone, Default)]
pub struct EdgeMap {
    edges: BTreeMap<EntityType, BTreeMap<EntityType, Vec<EdgeFunction>>>,
}

impl EdgeMap {
    /// Merge declared edges first, then add the edges inferred from each
    /// function name.
    pub fn build<'a>(
        declared: &[DeclaredEdge],
        function_names: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut map = Self::default();
        for edge in declared {
            map.insert(edge.source, edge.target, &edge.function, EdgeOrigin::Declared);
        }
        for name in function_names {
            for (source, target) in infer_edges(name) {
                map.insert(source, target, name, EdgeOrigin::NamingConvention);
            }
        }
        map
    }

    fn insert(&mut self, source: EntityType, target: EntityType, name: &str, origin: EdgeOrigin) {
        let functions = self
            .edges
            .entry(source)
            .or_default()
            .entry(target)
            .or_default();
        if !functions.iter().any(|f| f.name == name) {
            functions.push(EdgeFunction {
                name: name.to_string(),
                origin,
            });
        }
    }

    pub fn targets(&self, source: EntityType) -> Option<&BTreeMap<EntityType, Vec<EdgeFunction>>> {
        self.edges.get(&source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityType, EntityType, &[EdgeFunction])> + '_ {
        self.edges.iter().flat_map(|(source, targets)| {
            targets
                .iter()
                .map(move |(target, functions)| (*source, *target, functions.as_slice()))
        })
    }

    /// Every type appearing as a source or a target.
    pub fn entity_types(&self) -> BTreeSet<EntityType> {
        self.iter().flat_map(|(s, t, _)| [s, t]).collect()
    }

    /// Number of distinct `(source, target)` pairs.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Edges implied by a function name:
///
/// - `get_X_for_Y` (plurals tolerated) gives `Y → X`
/// - `is_X_in_Y` gives `X ↔ Y`
/// - `has_X_Y_association` gives `X ↔ Y`
///
/// Fragments resolve through the entity-type synonym table; names with an
/// unknown fragment produce nothing.
pub fn infer_edges(name: &str) -> Vec<(EntityType, EntityType)> {
    if let Some((x, y)) = GET_FOR.captures(name).and_then(fragment_pair) {
        return vec![(y, x)];
    }
    let both = IS_IN
        .captures(name)
        .and_then(fragment_pair)
        .or_else(|| HAS_ASSOCIATION.captures(name).and_then(fragment_pair));
    match both {
        Some((x, y)) if x == y => vec![(x, y)],
        Some((x, y)) => vec![(x, y), (y, x)],
        None => Vec::new(),
    }
}

fn fragment_pair(caps: regex::Captures<'_>) -> Option<(EntityType, EntityType)> {
    let x = EntityType::from_fragment(caps.get(1)?.as_str())?;
    let y = EntityType::from_fragment(caps.get(2)?.as_str())?;
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_for_points_from_input_to_output() {
        assert_eq!(
            infer_edges("get_diseases_for_gene"),
            vec![(EntityType::Gene, EntityType::Disease)]
        );
        assert_eq!(
            infer_edges("get_drugs_for_target"),
            vec![(EntityType::Protein, EntityType::Drug)]
        );
        assert_eq!(
            infer_edges("get_genes_for_disease"),
            vec![(EntityType::Disease, EntityType::Gene)]
        );
    }

    #[test]
    fn test_membership_and_association_are_bidirectional() {
        assert_eq!(
            infer_edges("is_gene_in_pathway"),
            vec![
                (EntityType::Gene, EntityType::Pathway),
                (EntityType::Pathway, EntityType::Gene)
            ]
        );
        assert_eq!(
            infer_edges("has_gene_disease_association"),
            vec![
                (EntityType::Gene, EntityType::Disease),
                (EntityType::Disease, EntityType::Gene)
            ]
        );
    }

    #[test]
    fn test_unrecognised_names_infer_nothing() {
        assert!(infer_edges("get_genes_in_pathway").is_empty());
        assert!(infer_edges("get_widgets_for_gene").is_empty());
        assert!(infer_edges("describe_everything").is_empty());
    }

    #[test]
    fn test_build_merges_declared_first_and_dedupes() {
        let declared = vec![
            DeclaredEdge::new(EntityType::Pathway, EntityType::Gene, "get_genes_in_pathway"),
            DeclaredEdge::new(EntityType::Gene, EntityType::Disease, "get_diseases_for_gene"),
        ];
        let map = EdgeMap::build(
            &declared,
            ["get_diseases_for_gene", "get_genes_in_pathway", "is_gene_in_pathway"],
        );

        let gene_disease = &map.targets(EntityType::Gene).unwrap()[&EntityType::Disease];
        assert_eq!(gene_disease.len(), 1);
        assert_eq!(gene_disease[0].origin, EdgeOrigin::Declared);

        let pathway_gene = &map.targets(EntityType::Pathway).unwrap()[&EntityType::Gene];
        let names: Vec<_> = pathway_gene.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["get_genes_in_pathway", "is_gene_in_pathway"]);
        assert_eq!(pathway_gene[1].origin, EdgeOrigin::NamingConvention);

        assert_eq!(map.edge_count(), 3);
        assert_eq!(
            map.entity_types().into_iter().collect::<Vec<_>>(),
            vec![EntityType::Disease, EntityType::Gene, EntityType::Pathway]
        );
    }
}
