//! Document fact extraction for Turtle-family documents.
//!
//! Everything the index, completion, navigation and diagnostics need from a
//! document's text is computed here, as plain data:
//!
//! | Fact | Example |
//! |------|---------|
//! | Namespace declarations | `@prefix foaf: <http://xmlns.com/foaf/0.1/> .` |
//! | Namespace map | `foaf` → `http://xmlns.com/foaf/0.1/` (defaults + declarations) |
//! | Subjects | `ex:Bob` at the start of a statement |
//! | Symbols | every `prefix:local` occurrence |
//!
//! # Two tiers
//!
//! [`StructuredExtractor`] tokenizes the document and walks statements. When
//! the text defeats it (unterminated IRI or string, unbalanced brackets), the
//! [`HeuristicExtractor`] runs instead and produces best-effort facts line by
//! line. Callers only ever see [`extract`] and [`DocumentFacts`].

mod heuristic;
mod lexer;
mod namespaces;
mod structured;

pub use heuristic::HeuristicExtractor;
pub(crate) use lexer::prefixed_names_in_masked;
pub use lexer::{term_at_column, terms_in_line, LineMasker, LineTerm};
pub use namespaces::{NamespaceMap, WELL_KNOWN_NAMESPACES};
pub use structured::StructuredExtractor;

use thiserror::Error;

use crate::workspace::{MyRange, Rangeable};

/// A `@prefix` / `PREFIX` directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDecl {
    /// Prefix label without the colon; empty for the default namespace
    pub prefix: String,
    pub iri: String,
    /// Range of the `prefix:` token inside the directive
    pub range: MyRange,
}

/// A subject or symbol label found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Occurrence {
    /// Either `prefix:local` or a bare absolute IRI
    pub label: String,
    pub range: MyRange,
}

impl Rangeable for NamespaceDecl {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

impl Rangeable for Occurrence {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

/// Everything extracted from one document's text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFacts {
    /// Declarations in document order, duplicates included
    pub namespaces: Vec<NamespaceDecl>,
    /// Well-known defaults overlaid with this document's declarations
    pub namespace_map: NamespaceMap,
    pub subjects: Vec<Occurrence>,
    pub symbols: Vec<Occurrence>,
    pub base: Option<String>,
}

impl DocumentFacts {
    /// Prefix labels declared in this document (not the defaults).
    pub fn declared_prefixes(&self) -> impl Iterator<Item = &str> + '_ {
        self.namespaces.iter().map(|decl| decl.prefix.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("unterminated IRI starting on line {0}")]
    UnterminatedIri(u32),
    #[error("unterminated string starting on line {0}")]
    UnterminatedString(u32),
    #[error("unbalanced '{found}' on line {line}")]
    Unbalanced { found: char, line: u32 },
    #[error("malformed directive on line {0}")]
    MalformedDirective(u32),
}

/// One strategy for turning text into facts.
pub trait Extractor {
    fn extract(&self, text: &str) -> Result<DocumentFacts, ExtractError>;
}

/// Structured extraction with the line heuristic as fallback.
pub fn extract(text: &str) -> DocumentFacts {
    match StructuredExtractor.extract(text) {
        Ok(facts) => facts,
        Err(err) => {
            tracing::debug!("structured extraction failed ({err}); using line heuristics");
            HeuristicExtractor.facts(text)
        }
    }
}

/// The prefix component of a label: everything before the first `:`.
/// Labels without a colon belong to the default (empty) prefix.
pub fn prefix_of(label: &str) -> &str {
    label.split_once(':').map(|(prefix, _)| prefix).unwrap_or("")
}

/// The local component of a prefixed name, or the whole label without a colon.
pub fn local_of(label: &str) -> &str {
    label.split_once(':').map(|(_, local)| local).unwrap_or(label)
}

/// Subject labels prefer the prefixed form whenever the namespace map can
/// express the IRI.
pub(crate) fn subject_label(iri: &str, namespace_map: &NamespaceMap) -> String {
    namespace_map
        .abbreviate(iri)
        .unwrap_or_else(|| iri.to_string())
}
