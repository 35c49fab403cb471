//! Completion.
//!
//! A request runs in two phases so the workspace index is never borrowed
//! across a vocabulary load:
//!
//! 1. [`CompletionRequest::construct`] snapshots everything it needs from the
//!    index (cursor context, namespaces, subjects).
//! 2. [`CompletionRequest::complete`] awaits vocabularies from the cache, then
//!    merges, ranks and truncates the candidates.

use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use tower_lsp::lsp_types::{CompletionList, CompletionResponse, Position};

use crate::config::Settings;
use crate::extract::{subject_label, NamespaceMap};
use crate::vocab::{vocabulary_key, Vocabulary, VocabularyCache};
use crate::workspace::{Rangeable, WorkspaceIndex};

mod candidate;
mod cursor;
mod ranking;

pub use candidate::{Candidate, Completable, SYNTAX_KEYWORDS};
pub use cursor::CursorContext;
pub use ranking::{bucket, rank, sort_key};

#[derive(Clone, Copy)]
pub struct Context<'a> {
    index: &'a WorkspaceIndex,
    path: &'a Path,
    settings: &'a Settings,
}

impl<'a> Context<'a> {
    pub fn new(index: &'a WorkspaceIndex, path: &'a Path) -> Context<'a> {
        Context {
            index,
            path,
            settings: index.settings(),
        }
    }
}

/// Everything a completion needs, owned, so the index can be released before
/// vocabularies are awaited.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    cursor: CursorContext,
    /// Declared prefixes with their namespace, in declaration order
    declared: Vec<(String, String)>,
    namespace_map: NamespaceMap,
    /// This document's subjects followed by workspace subjects
    subjects: Vec<String>,
    limit: usize,
}

impl CompletionRequest {
    pub fn construct(context: Context<'_>, line: usize, character: usize) -> Option<Self> {
        let Context {
            index,
            path,
            settings,
        } = context;

        let line_text = index.select_line(path, line).unwrap_or_default();
        let cursor = CursorContext::parse(&line_text, line, character)?;
        let namespace_map = index.namespace_map(path);
        let position = Position::new(line as u32, character as u32);

        let declared = index
            .declared_namespaces(path)
            .iter()
            .map(|decl| decl.prefix.clone())
            .unique()
            .filter_map(|prefix| {
                let iri = namespace_map.get(&prefix)?.to_string();
                Some((prefix, iri))
            })
            .collect();

        let own_subjects = index
            .document_facts(path)
            .map(|facts| facts.subjects.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|subject| !subject.includes_position(position))
            .map(|subject| subject.label.clone());

        // a label whose only occurrence is the term being typed is not a candidate
        let global_subjects = index
            .collect_global_subjects(cursor.active_prefix.as_deref())
            .into_iter()
            .filter(|label| {
                !index
                    .get_subjects(label)
                    .iter()
                    .all(|location| location.path == path && location.includes_position(position))
            });

        let subjects = own_subjects
            .chain(global_subjects)
            .map(|label| abbreviate(&label, &namespace_map))
            .unique()
            .collect();

        Some(CompletionRequest {
            cursor,
            declared,
            namespace_map,
            subjects,
            limit: settings.completion_limit,
        })
    }

    pub fn cursor(&self) -> &CursorContext {
        &self.cursor
    }

    /// Merge every source, rank, and truncate to the configured limit.
    pub async fn complete(self, cache: &VocabularyCache) -> CompletionResponse {
        let vocabulary_terms = self.vocabulary_candidates(cache).await;

        let namespace_keywords =
            self.declared
                .iter()
                .map(|(prefix, iri)| Candidate::NamespaceKeyword {
                    prefix: prefix.clone(),
                    iri: iri.clone(),
                });
        let syntax_keywords = SYNTAX_KEYWORDS
            .iter()
            .map(|&(keyword, detail)| Candidate::SyntaxKeyword { keyword, detail });
        let subjects = self
            .subjects
            .iter()
            .map(|label| Candidate::SubjectReference {
                label: label.clone(),
            });

        let candidates = namespace_keywords
            .chain(syntax_keywords)
            .chain(subjects)
            .chain(vocabulary_terms)
            .collect();

        let items = rank(candidates, &self.cursor)
            .into_iter()
            .take(self.limit)
            .map(|(key, candidate)| candidate.completion(&self.cursor, key))
            .collect();

        CompletionResponse::List(CompletionList {
            is_incomplete: true,
            items,
        })
    }

    /// Inside a prefix: that vocabulary only, loaded if needed. Otherwise every
    /// cached vocabulary, with loads for the declared ones started in the
    /// background.
    async fn vocabulary_candidates(&self, cache: &VocabularyCache) -> Vec<Candidate> {
        match &self.cursor.active_prefix {
            Some(prefix) => {
                let Some(key) = vocabulary_key(prefix, &self.namespace_map) else {
                    return vec![];
                };
                match cache.load_bound(&key).await {
                    Some(vocabulary) => terms(prefix, &vocabulary),
                    None => vec![],
                }
            }
            None => {
                for (prefix, _) in &self.declared {
                    if let Some(key) = vocabulary_key(prefix, &self.namespace_map) {
                        cache.prefetch(&key.key);
                    }
                }

                cache
                    .cached()
                    .iter()
                    .filter_map(|vocabulary| {
                        let prefix = self.prefix_for(vocabulary)?;
                        Some(terms(&prefix, vocabulary))
                    })
                    .flatten()
                    .collect()
            }
        }
    }

    /// The prefix this document uses for a vocabulary's namespace, else its
    /// key. `None` when the document binds the key to another namespace.
    fn prefix_for(&self, vocabulary: &Vocabulary) -> Option<String> {
        let bound = self
            .declared
            .iter()
            .map(|(prefix, iri)| (prefix.as_str(), iri.as_str()))
            .chain(self.namespace_map.iter())
            .find(|(_, iri)| vocabulary.serves(iri))
            .map(|(prefix, _)| prefix.to_string());

        match bound {
            Some(prefix) => Some(prefix),
            None if self.namespace_map.contains(&vocabulary.key) => None,
            None => Some(vocabulary.key.clone()),
        }
    }
}

fn terms(prefix: &str, vocabulary: &Arc<Vocabulary>) -> Vec<Candidate> {
    vocabulary
        .terms
        .iter()
        .map(|(local, term)| Candidate::VocabularyTerm {
            prefix: prefix.to_string(),
            local: local.clone(),
            kind: term.kind,
            iri: format!("{}{}", vocabulary.namespace, local),
            documentation: term.documentation.clone(),
        })
        .collect()
}

fn abbreviate(label: &str, namespace_map: &NamespaceMap) -> String {
    if label.contains("://") || label.starts_with("urn:") {
        subject_label(label, namespace_map)
    } else {
        label.to_string()
    }
}

/// Labels of a completion response, in order.
pub fn response_labels(response: &CompletionResponse) -> Vec<String> {
    let items = match response {
        CompletionResponse::List(list) => &list.items,
        CompletionResponse::Array(items) => items,
    };
    items.iter().map(|item| item.label.clone()).collect()
}
