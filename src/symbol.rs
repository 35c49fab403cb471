//! Symbol providers for Turtle documents.
//!
//! This module implements LSP symbol capabilities:
//! - `textDocument/documentSymbol` - outline view of current file
//! - `workspace/symbol` - fuzzy search across all files
//!
//! # Document Symbols
//!
//! | Symbol Type | LSP Kind | Example |
//! |-------------|----------|---------|
//! | Prefix declarations | `Namespace` | `@prefix foaf: <http://xmlns.com/foaf/0.1/> .` |
//! | Subjects | `Object` | `ex:Bob` at the start of a statement |
//!
//! Symbols are returned in document order.
//!
//! # Workspace Symbols
//!
//! Fuzzy search over every indexed subject label using [`nucleo_matcher`],
//! ranked by match score.

use std::path::Path;

use itertools::Itertools;
use nucleo_matcher::{
    pattern::{self, Normalization},
    Matcher,
};
use tower_lsp::lsp_types::{
    DocumentSymbol, DocumentSymbolResponse, Range, SymbolInformation, SymbolKind,
};

use crate::workspace::{IndexLocation, WorkspaceIndex};

fn compute_match_score(
    matcher: &mut Matcher,
    pattern: &pattern::Pattern,
    symbol: SymbolInformation,
) -> (u32, SymbolInformation) {
    let mut buf = Vec::new();
    (
        pattern
            .score(
                nucleo_matcher::Utf32Str::new(symbol.name.as_str(), &mut buf),
                matcher,
            )
            .unwrap_or_default(),
        symbol,
    )
}

#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
fn subject_symbol(label: &str, location: &IndexLocation) -> Option<SymbolInformation> {
    Some(SymbolInformation {
        name: label.to_string(),
        kind: SymbolKind::OBJECT,
        tags: None,
        deprecated: None,
        location: location.to_lsp_location()?,
        container_name: location
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    })
}

/// Search subjects across the workspace, best match first. An empty query
/// lists every subject occurrence by label.
pub fn workspace_symbol(index: &WorkspaceIndex, query: &str) -> Option<Vec<SymbolInformation>> {
    let symbols = index.subject_entries().flat_map(|(label, locations)| {
        locations
            .iter()
            .filter_map(move |location| subject_symbol(label, location))
    });

    if query.trim().is_empty() {
        return Some(
            symbols
                .sorted_by(|a, b| a.name.cmp(&b.name).then(a.location.uri.cmp(&b.location.uri)))
                .collect_vec(),
        );
    }

    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let pattern = pattern::Pattern::parse(query, pattern::CaseMatching::Smart, Normalization::Smart);

    Some(
        symbols
            .map(|symbol| compute_match_score(&mut matcher, &pattern, symbol))
            .filter(|(score, _)| *score > 0)
            // ties keep a stable, readable order
            .sorted_by(|(a, left), (b, right)| {
                Ord::cmp(b, a)
                    .then_with(|| left.name.cmp(&right.name))
                    .then_with(|| left.location.uri.cmp(&right.location.uri))
            })
            .map(|(_score, symbol)| symbol)
            .collect_vec(),
    )
}

#[derive(Debug)]
struct FlatSymbol {
    name: String,
    kind: SymbolKind,
    range: Range,
    detail: Option<String>,
}

/// Outline of one document: its prefix declarations and subjects. `None`
/// when the document is untracked or has neither.
#[allow(deprecated)] // field deprecated has been deprecated in favor of using tags
pub fn document_symbol(index: &WorkspaceIndex, path: &Path) -> Option<DocumentSymbolResponse> {
    let facts = index.document_facts(path)?;

    let declarations = facts.namespaces.iter().map(|decl| FlatSymbol {
        name: format!("{}:", decl.prefix),
        kind: SymbolKind::NAMESPACE,
        range: *decl.range,
        detail: Some(decl.iri.clone()),
    });
    let subjects = facts.subjects.iter().map(|subject| FlatSymbol {
        name: subject.label.clone(),
        kind: SymbolKind::OBJECT,
        range: *subject.range,
        detail: None,
    });

    let symbols = declarations
        .chain(subjects)
        .sorted_by_key(|symbol| (symbol.range.start.line, symbol.range.start.character))
        .map(|symbol| DocumentSymbol {
            name: symbol.name,
            kind: symbol.kind,
            range: symbol.range,
            selection_range: symbol.range,
            detail: symbol.detail,
            deprecated: None,
            tags: None,
            children: None,
        })
        .collect_vec();

    if symbols.is_empty() {
        return None;
    }

    Some(DocumentSymbolResponse::Nested(symbols))
}
