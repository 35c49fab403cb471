//! The workspace index.
//!
//! Three global label indexes (namespace prefixes, subjects, prefixed-name
//! symbols) map a label to every place it occurs across the workspace. Each
//! document owns a [`Contribution`]: the exact entries it added at its last
//! reindex. All writes go through [`WorkspaceIndex::reindex_document`] and
//! [`WorkspaceIndex::remove_from_indexes`], which keeps the global indexes equal
//! to the union of the contributions at all times.

mod files;
mod types;


pub use files::list_files;
pub use types::{IndexLocation, MyRange, Rangeable};

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
    time::Instant,
};

use itertools::Itertools;
use rayon::prelude::*;
use ropey::Rope;
use tower_lsp::lsp_types::Position;

use crate::config::Settings;
use crate::extract::{
    extract, prefix_of, term_at_column, DocumentFacts, LineTerm, NamespaceDecl, NamespaceMap,
};

type LabelIndex = HashMap<String, Vec<IndexLocation>>;

/// What one document added to the global indexes, deduplicated per
/// (label, range).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contribution {
    /// Prefix labels without the colon
    pub prefixes: Vec<(String, MyRange)>,
    pub subjects: Vec<(String, MyRange)>,
    pub symbols: Vec<(String, MyRange)>,
}

impl Contribution {
    fn from_facts(facts: &DocumentFacts) -> Contribution {
        fn unique(entries: impl Iterator<Item = (String, MyRange)>) -> Vec<(String, MyRange)> {
            entries.unique().collect()
        }

        Contribution {
            prefixes: unique(
                facts
                    .namespaces
                    .iter()
                    .map(|decl| (decl.prefix.clone(), decl.range)),
            ),
            subjects: unique(facts.subjects.iter().map(|s| (s.label.clone(), s.range))),
            symbols: unique(facts.symbols.iter().map(|s| (s.label.clone(), s.range))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.subjects.is_empty() && self.symbols.is_empty()
    }
}

#[derive(Debug, Clone)]
struct DocumentEntry {
    facts: DocumentFacts,
    contribution: Contribution,
}

/// A term under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorToken {
    /// The term as written, `<...>` included for IRIs
    pub text: String,
    pub range: MyRange,
}

impl Rangeable for CursorToken {
    fn range(&self) -> &MyRange {
        &self.range
    }
}

#[derive(Debug)]
pub struct WorkspaceIndex {
    root_dir: PathBuf,
    settings: Settings,
    prefixes: LabelIndex,
    subjects: LabelIndex,
    symbols: LabelIndex,
    documents: HashMap<PathBuf, DocumentEntry>,
    /// Live text of documents the editor has open
    open: HashMap<PathBuf, Rope>,
    indexed: bool,
}

/// Mutation
impl WorkspaceIndex {
    pub fn new(settings: &Settings, root_dir: &Path) -> WorkspaceIndex {
        WorkspaceIndex {
            root_dir: root_dir.to_path_buf(),
            settings: settings.clone(),
            prefixes: HashMap::new(),
            subjects: HashMap::new(),
            symbols: HashMap::new(),
            documents: HashMap::new(),
            open: HashMap::new(),
            indexed: false,
        }
    }

    /// Replace the document's slice of the global indexes with one derived
    /// from `text`.
    pub fn reindex_document(&mut self, path: &Path, text: &str) {
        let facts = extract(text);
        self.install(path, facts);
    }

    fn install(&mut self, path: &Path, facts: DocumentFacts) {
        self.remove_from_indexes(path);

        let contribution = Contribution::from_facts(&facts);
        tracing::trace!(
            "reindexing {}: {} prefixes, {} subjects, {} symbols",
            path.display(),
            contribution.prefixes.len(),
            contribution.subjects.len(),
            contribution.symbols.len()
        );

        for (index, entries) in [
            (&mut self.prefixes, &contribution.prefixes),
            (&mut self.subjects, &contribution.subjects),
            (&mut self.symbols, &contribution.symbols),
        ] {
            for (label, range) in entries {
                index
                    .entry(label.clone())
                    .or_default()
                    .push(IndexLocation::new(path, *range));
            }
        }

        self.documents.insert(
            path.to_path_buf(),
            DocumentEntry {
                facts,
                contribution,
            },
        );
    }

    /// Remove exactly what the document's last contribution added. Labels
    /// left without locations are dropped from the index.
    pub fn remove_from_indexes(&mut self, path: &Path) {
        let Some(entry) = self.documents.remove(path) else {
            return;
        };

        let Contribution {
            prefixes,
            subjects,
            symbols,
        } = entry.contribution;

        for (index, entries) in [
            (&mut self.prefixes, prefixes),
            (&mut self.subjects, subjects),
            (&mut self.symbols, symbols),
        ] {
            for (label, range) in entries {
                let location = IndexLocation::new(path, range);
                if let Some(locations) = index.get_mut(&label) {
                    locations.retain(|it| *it != location);
                    if locations.is_empty() {
                        index.remove(&label);
                    }
                }
            }
        }
    }

    /// One-time bootstrap from disk. Returns the number of documents indexed;
    /// a second call does nothing and returns 0.
    pub fn index_workspace(&mut self) -> usize {
        if self.indexed {
            return 0;
        }
        self.indexed = true;

        let start = Instant::now();
        let paths = list_files(&self.root_dir, &self.settings);

        let extracted: Vec<(PathBuf, DocumentFacts)> = paths
            .par_iter()
            .filter(|path| !self.open.contains_key(*path))
            .filter_map(|path| match std::fs::read_to_string(path) {
                Ok(text) => Some((path.clone(), extract(&text))),
                Err(err) => {
                    tracing::debug!("skipping unreadable {}: {err}", path.display());
                    None
                }
            })
            .collect();

        let count = extracted.len();
        for (path, facts) in extracted {
            self.install(&path, facts);
        }

        tracing::info!(
            "indexed {count} documents under {} in {:?}",
            self.root_dir.display(),
            start.elapsed()
        );

        count
    }

    pub fn open_document(&mut self, path: &Path, text: &str) {
        self.open.insert(path.to_path_buf(), Rope::from_str(text));
        self.reindex_document(path, text);
    }

    pub fn update_document(&mut self, path: &Path, text: &str) {
        self.open_document(path, text)
    }

    /// Drops live text and the document's contribution, even when the file
    /// still exists on disk.
    pub fn close_document(&mut self, path: &Path) {
        self.open.remove(path);
        self.remove_from_indexes(path);
    }

    pub fn set_settings(&mut self, settings: &Settings) {
        self.settings = settings.clone();
    }
}

/// Queries
impl WorkspaceIndex {
    pub fn get_prefixes(&self, label: &str) -> &[IndexLocation] {
        Self::lookup(&self.prefixes, label)
    }

    pub fn get_subjects(&self, label: &str) -> &[IndexLocation] {
        Self::lookup(&self.subjects, label)
    }

    pub fn get_symbols(&self, label: &str) -> &[IndexLocation] {
        Self::lookup(&self.symbols, label)
    }

    fn lookup<'a>(index: &'a LabelIndex, label: &str) -> &'a [IndexLocation] {
        index.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Subject labels across the workspace, sorted. With a filter only labels
    /// whose prefix component equals it are returned.
    pub fn collect_global_subjects(&self, prefix_filter: Option<&str>) -> Vec<String> {
        self.subjects
            .keys()
            .filter(|label| prefix_filter.is_none_or(|prefix| prefix_of(label) == prefix))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every subject label with its locations.
    pub fn subject_entries(&self) -> impl Iterator<Item = (&str, &[IndexLocation])> + '_ {
        self.subjects
            .iter()
            .map(|(label, locations)| (label.as_str(), locations.as_slice()))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.open.contains_key(path)
    }

    /// Documents with a contribution, sorted.
    pub fn tracked_documents(&self) -> Vec<&Path> {
        self.documents
            .keys()
            .map(PathBuf::as_path)
            .sorted()
            .collect()
    }

    pub fn contribution(&self, path: &Path) -> Option<&Contribution> {
        self.documents.get(path).map(|entry| &entry.contribution)
    }

    pub fn document_facts(&self, path: &Path) -> Option<&DocumentFacts> {
        self.documents.get(path).map(|entry| &entry.facts)
    }

    /// The document's namespace map; only the well-known defaults for
    /// untracked documents.
    pub fn namespace_map(&self, path: &Path) -> NamespaceMap {
        self.document_facts(path)
            .map(|facts| facts.namespace_map.clone())
            .unwrap_or_else(NamespaceMap::with_defaults)
    }

    pub fn declared_namespaces(&self, path: &Path) -> &[NamespaceDecl] {
        self.document_facts(path)
            .map(|facts| facts.namespaces.as_slice())
            .unwrap_or(&[])
    }

    /// Live text when the document is open, otherwise what is on disk.
    pub fn document_text(&self, path: &Path) -> Option<String> {
        match self.open.get(path) {
            Some(rope) => Some(rope.to_string()),
            None => std::fs::read_to_string(path).ok(),
        }
    }

    /// One line of the document without its line ending.
    pub fn select_line(&self, path: &Path, line: usize) -> Option<String> {
        let text = match self.open.get(path) {
            Some(rope) => rope.get_line(line).map(|slice| slice.to_string())?,
            None => std::fs::read_to_string(path)
                .ok()?
                .lines()
                .nth(line)?
                .to_string(),
        };

        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }

    /// The Turtle term (prefixed name, `prefix:` or `<iri>`) under the cursor.
    pub fn token_at_position(&self, path: &Path, position: Position) -> Option<CursorToken> {
        let line = self.select_line(path, position.line as usize)?;
        let LineTerm { text, columns, .. } = term_at_column(&line, position.character as usize)?;

        Some(CursorToken {
            text,
            range: MyRange::on_line(position.line as usize, columns.start, columns.end),
        })
    }

    /// Whether the global indexes hold exactly the union of all contributions.
    pub fn is_consistent(&self) -> bool {
        fn sorted(mut entries: Vec<(String, IndexLocation)>) -> Vec<(String, IndexLocation)> {
            entries.sort_by(|a, b| {
                (&a.0, &a.1.path, a.1.range.sort_key()).cmp(&(&b.0, &b.1.path, b.1.range.sort_key()))
            });
            entries
        }

        let mut expected: [Vec<(String, IndexLocation)>; 3] = Default::default();
        for (path, entry) in &self.documents {
            let contribution = &entry.contribution;
            for (slot, entries) in expected.iter_mut().zip([
                &contribution.prefixes,
                &contribution.subjects,
                &contribution.symbols,
            ]) {
                slot.extend(
                    entries
                        .iter()
                        .map(|(label, range)| (label.clone(), IndexLocation::new(path, *range))),
                );
            }
        }

        [&self.prefixes, &self.subjects, &self.symbols]
            .into_iter()
            .zip(expected)
            .all(|(index, expected)| {
                let actual = index
                    .iter()
                    .flat_map(|(label, locations)| {
                        locations
                            .iter()
                            .map(|location| (label.clone(), location.clone()))
                    })
                    .collect();

                index.values().all(|locations| !locations.is_empty())
                    && sorted(actual) == sorted(expected)
            })
    }
}
