use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::async_trait;

use crate::extract::NamespaceMap;

use super::{Object, Triple, VocabularyData, VocabularyError};

/// Source of vocabulary facts, keyed by a short vocabulary key such as `foaf`.
#[async_trait]
pub trait VocabularyProvider: Send + Sync {
    /// `Ok(None)` when the key is unknown to this provider.
    async fn fetch(&self, key: &str) -> Result<Option<VocabularyData>, VocabularyError>;
}

/// Provider with nothing in it; used when no vocabulary directory is configured.
pub struct NoVocabularies;

#[async_trait]
impl VocabularyProvider for NoVocabularies {
    async fn fetch(&self, _key: &str) -> Result<Option<VocabularyData>, VocabularyError> {
        Ok(None)
    }
}

/// Reads `<dir>/<key>.nt` N-Triples dumps.
pub struct FileVocabularyProvider {
    dir: PathBuf,
}

impl FileVocabularyProvider {
    pub fn new(dir: &Path) -> FileVocabularyProvider {
        FileVocabularyProvider {
            dir: dir.to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        // keys become file names
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return None;
        }
        Some(self.dir.join(format!("{key}.nt")))
    }
}

#[async_trait]
impl VocabularyProvider for FileVocabularyProvider {
    async fn fetch(&self, key: &str) -> Result<Option<VocabularyData>, VocabularyError> {
        let Some(path) = self.path_for(key) else {
            return Ok(None);
        };

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(VocabularyError::Io { path, source }),
        };

        let triples = parse_ntriples(&text);
        if triples.is_empty() {
            return Err(VocabularyError::Empty(path));
        }

        let namespace = match NamespaceMap::well_known_iri(key) {
            Some(iri) => iri.to_string(),
            None => dominant_namespace(&triples)
                .ok_or_else(|| VocabularyError::NoNamespace(key.to_string()))?,
        };

        Ok(Some(VocabularyData { namespace, triples }))
    }
}

static TRIPLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?:<(?<s>[^>]*)>|_:\S+)\s+<(?<p>[^>]*)>\s+(?:<(?<o>[^>]*)>|_:\S+|"(?<lit>(?:[^"\\]|\\.)*)"(?:@[A-Za-z0-9\-]+|\^\^<[^>]*>)?)\s*\.\s*$"#,
    )
    .unwrap()
});

/// Parses N-Triples. Statements with a blank-node subject or object are
/// dropped, as are lines that do not parse.
pub fn parse_ntriples(text: &str) -> Vec<Triple> {
    text.lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let Some(captures) = TRIPLE_RE.captures(line) else {
                tracing::trace!("skipping unparsable N-Triples line: {line}");
                return None;
            };

            let subject = captures.name("s")?.as_str().to_string();
            let predicate = captures.name("p")?.as_str().to_string();
            let object = match (captures.name("o"), captures.name("lit")) {
                (Some(iri), _) => Object::Iri(iri.as_str().to_string()),
                (None, Some(literal)) => Object::Literal(unescape(literal.as_str())),
                (None, None) => return None,
            };

            Some(Triple {
                subject,
                predicate,
                object,
            })
        })
        .collect()
}

fn unescape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// The namespace most subjects share: everything up to the last `#` or `/`.
fn dominant_namespace(triples: &[Triple]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for triple in triples {
        if let Some(end) = triple.subject.rfind(['#', '/']) {
            *counts.entry(&triple.subject[..=end]).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(namespace, _)| namespace.to_string())
}
