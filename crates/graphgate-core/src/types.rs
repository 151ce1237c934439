//! Core domain types for the graphgate gateway.
//!
//! Compact identifiers and the fixed classification tables that map
//! parameter names, CURIE prefixes, and grounding namespaces onto the
//! entity types callers navigate between.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Compact Identifiers ───────────────────────────────────────────

/// A compact identifier of the form `prefix:local-id` (e.g. `hgnc:6407`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Curie {
    pub prefix: String,
    pub local: String,
}

impl Curie {
    /// Parse `prefix:local`. Both parts must be non-empty and the prefix must
    /// look like a registry namespace, so free text such as `"note: hi"` is
    /// rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, local) = raw.split_once(':')?;
        if prefix.is_empty() || local.is_empty() || !is_namespace_like(prefix) {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            local: local.to_string(),
        })
    }

    /// Build from an explicit `(namespace, identifier)` pair.
    pub fn from_pair(namespace: &str, identifier: &str) -> Self {
        Self {
            prefix: namespace.to_string(),
            local: identifier.to_string(),
        }
    }

    /// The graph's canonical form: lower-cased prefix, with any copy of the
    /// prefix embedded in the local part removed (`CHEBI:CHEBI:15365` →
    /// `chebi:15365`). Idempotent.
    pub fn canonical(&self) -> Self {
        let prefix = self.prefix.to_lowercase();
        let embedded = format!("{prefix}:");
        let mut local = self.local.as_str();
        while local.len() > embedded.len() {
            match local.get(..embedded.len()) {
                Some(head) if head.eq_ignore_ascii_case(&embedded) => {
                    local = &local[embedded.len()..];
                }
                _ => break,
            }
        }
        Self {
            prefix,
            local: local.to_string(),
        }
    }

    /// Entity type implied by the prefix, if the prefix is known.
    pub fn entity_type(&self) -> Option<EntityType> {
        EntityType::from_prefix(&self.prefix)
    }
}

impl fmt::Display for Curie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

fn is_namespace_like(prefix: &str) -> bool {
    prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

// ── Entity Types ──────────────────────────────────────────────────

/// Entity types used for navigation between registered functions.
///
/// Declared in lexical order of their labels so ordered maps keyed by
/// `EntityType` list them alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    CellLine,
    CellType,
    ClinicalTrial,
    Disease,
    Drug,
    EnzymeActivity,
    #[serde(rename = "GOTerm")]
    GoTerm,
    Gene,
    Journal,
    #[serde(rename = "MeSHTerm")]
    MeshTerm,
    Pathway,
    Phenotype,
    Protein,
    ProteinDomain,
    Publication,
    Publisher,
    ResearchProject,
    SideEffect,
    Tissue,
    Variant,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CellLine => "CellLine",
            Self::CellType => "CellType",
            Self::ClinicalTrial => "ClinicalTrial",
            Self::Disease => "Disease",
            Self::Drug => "Drug",
            Self::EnzymeActivity => "EnzymeActivity",
            Self::GoTerm => "GOTerm",
            Self::Gene => "Gene",
            Self::Journal => "Journal",
            Self::MeshTerm => "MeSHTerm",
            Self::Pathway => "Pathway",
            Self::Phenotype => "Phenotype",
            Self::Protein => "Protein",
            Self::ProteinDomain => "ProteinDomain",
            Self::Publication => "Publication",
            Self::Publisher => "Publisher",
            Self::ResearchProject => "ResearchProject",
            Self::SideEffect => "SideEffect",
            Self::Tissue => "Tissue",
            Self::Variant => "Variant",
        }
    }

    /// Resolve a function-name fragment (`gene`, `drugs`, `cell_line`, ...)
    /// through the fixed synonym table.
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        let t = match fragment.to_ascii_lowercase().as_str() {
            "disease" | "indication" => Self::Disease,
            "gene" | "genes" | "marker" => Self::Gene,
            "drug" | "drugs" | "molecule" => Self::Drug,
            "pathway" => Self::Pathway,
            "phenotype" => Self::Phenotype,
            "variant" => Self::Variant,
            "target" | "targets" | "protein" => Self::Protein,
            "tissue" => Self::Tissue,
            "cell_line" => Self::CellLine,
            "cell_type" => Self::CellType,
            "go_term" => Self::GoTerm,
            "trial" => Self::ClinicalTrial,
            "side_effect" => Self::SideEffect,
            "mesh_term" => Self::MeshTerm,
            "paper_term" | "pmid_term" | "pmids" | "publication" => Self::Publication,
            "project" => Self::ResearchProject,
            "journal" => Self::Journal,
            "publisher" => Self::Publisher,
            "domain" => Self::ProteinDomain,
            "enzyme" => Self::EnzymeActivity,
            _ => return None,
        };
        Some(t)
    }

    /// Map a CURIE prefix to the entity type used by function parameters
    /// (MESH maps to Disease, not to the MeSHTerm graph label).
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let t = match prefix.to_ascii_lowercase().as_str() {
            "hgnc" | "ncbigene" | "ensembl" => Self::Gene,
            "mesh" | "doid" | "mondo" | "efo" | "orphanet" => Self::Disease,
            "hp" => Self::Phenotype,
            "chebi" | "chembl" | "chembl.compound" | "pubchem.compound" | "drugbank" => Self::Drug,
            "go" => Self::GoTerm,
            "reactome" | "wikipathways" | "kegg.pathway" => Self::Pathway,
            "uberon" => Self::Tissue,
            "cl" => Self::CellType,
            "pubmed" | "pmid" => Self::Publication,
            "clinicaltrials" | "nct" => Self::ClinicalTrial,
            "dbsnp" => Self::Variant,
            "interpro" => Self::ProteinDomain,
            "ec-code" => Self::EnzymeActivity,
            "uniprot" => Self::Protein,
            _ => return None,
        };
        Some(t)
    }

    /// Detect the entity type of a raw identifier such as `HGNC:6407` or
    /// `hgnc_6407`.
    pub fn detect(entity_id: &str) -> Option<Self> {
        let lower = entity_id.to_ascii_lowercase();
        let prefix = lower.split([':', '_']).next()?;
        if prefix.len() == lower.len() {
            return None;
        }
        Self::from_prefix(prefix)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Grounding Namespace Filters ───────────────────────────────────

/// Grounding namespaces accepted for a parameter type. A `disease` parameter
/// only accepts disease-flavored namespaces, which removes most cross-type
/// grounding mistakes.
pub fn namespace_filter(param_type: &str) -> Option<&'static [&'static str]> {
    let namespaces: &'static [&'static str] = match param_type.to_ascii_lowercase().as_str() {
        "disease" => &["mesh", "doid", "efo", "mondo", "hp", "orphanet", "umls"],
        "gene" | "genes" => &["hgnc", "ncbigene", "ensembl", "uniprot", "fplx"],
        "drug" | "drugs" => &["chebi", "drugbank", "pubchem.compound", "chembl.compound", "chembl"],
        "target" | "targets" => &["hgnc", "uniprot", "ncbigene"],
        "pathway" => &["reactome", "wikipathways", "kegg.pathway", "go"],
        "go_term" => &["go"],
        "phenotype" => &["hp", "mesh", "efo"],
        "tissue" => &["uberon", "bto"],
        "cell_type" => &["cl"],
        "cell_line" => &["efo", "cellosaurus", "ccle"],
        "variant" => &["dbsnp", "clinvar"],
        "mesh_term" => &["mesh"],
        "side_effect" => &["umls", "mesh"],
        "indication" => &["mesh", "doid", "efo", "mondo"],
        "molecule" => &["chebi", "drugbank", "pubchem.compound", "chembl"],
        _ => return None,
    };
    Some(namespaces)
}
