use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, TextEdit,
};

use crate::vocab::TermKind;

use super::cursor::CursorContext;

/// Directive introducers, the `a` type shortcut and TriG block keywords.
pub const SYNTAX_KEYWORDS: [(&str, &str); 6] = [
    ("@prefix", "Namespace prefix declaration"),
    ("@base", "Base IRI declaration"),
    ("PREFIX", "SPARQL-style prefix declaration"),
    ("BASE", "SPARQL-style base declaration"),
    ("a", "Shorthand for rdf:type"),
    ("GRAPH", "Named graph block"),
];

/// One completion source each; normalized into a [`CompletionItem`] at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    NamespaceKeyword {
        prefix: String,
        iri: String,
    },
    SyntaxKeyword {
        keyword: &'static str,
        detail: &'static str,
    },
    SubjectReference {
        /// Prefixed name, or a bare IRI the document cannot abbreviate
        label: String,
    },
    VocabularyTerm {
        prefix: String,
        local: String,
        kind: TermKind,
        iri: String,
        documentation: Option<String>,
    },
}

impl Candidate {
    pub fn label(&self) -> String {
        match self {
            Candidate::NamespaceKeyword { prefix, .. } => format!("{prefix}:"),
            Candidate::SyntaxKeyword { keyword, .. } => keyword.to_string(),
            Candidate::SubjectReference { label } => label.clone(),
            Candidate::VocabularyTerm { prefix, local, .. } => format!("{prefix}:{local}"),
        }
    }

    /// The namespace prefix of vocabulary terms and namespace keywords.
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Candidate::NamespaceKeyword { prefix, .. }
            | Candidate::VocabularyTerm { prefix, .. } => Some(prefix),
            _ => None,
        }
    }

    pub fn local(&self) -> Option<&str> {
        match self {
            Candidate::NamespaceKeyword { .. } => Some(""),
            Candidate::VocabularyTerm { local, .. } => Some(local),
            _ => None,
        }
    }

    fn insert_text(&self) -> String {
        match self {
            Candidate::SubjectReference { label } if is_iri(label) => format!("<{label}>"),
            _ => self.label(),
        }
    }
}

fn is_iri(label: &str) -> bool {
    label.contains("://") || label.starts_with("urn:")
}

pub trait Completable {
    fn completion(&self, cursor: &CursorContext, sort_text: String) -> CompletionItem;
}

impl Completable for Candidate {
    fn completion(&self, cursor: &CursorContext, sort_text: String) -> CompletionItem {
        let label = self.label();

        let (kind, detail, documentation) = match self {
            Candidate::NamespaceKeyword { iri, .. } => {
                (CompletionItemKind::MODULE, Some(iri.clone()), None)
            }
            Candidate::SyntaxKeyword { detail, .. } => {
                (CompletionItemKind::KEYWORD, Some(detail.to_string()), None)
            }
            Candidate::SubjectReference { .. } => (
                CompletionItemKind::REFERENCE,
                Some("Subject in workspace".to_string()),
                None,
            ),
            Candidate::VocabularyTerm {
                kind,
                iri,
                documentation,
                ..
            } => (
                match kind {
                    TermKind::Class => CompletionItemKind::CLASS,
                    TermKind::Property => CompletionItemKind::PROPERTY,
                },
                Some(iri.clone()),
                documentation.as_ref().map(|docs| {
                    Documentation::MarkupContent(MarkupContent {
                        kind: MarkupKind::Markdown,
                        value: docs.clone(),
                    })
                }),
            ),
        };

        CompletionItem {
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: *cursor.replace_range(),
                new_text: self.insert_text(),
            })),
            filter_text: Some(label.clone()),
            label,
            kind: Some(kind),
            detail,
            documentation,
            sort_text: Some(sort_text),
            ..Default::default()
        }
    }
}
