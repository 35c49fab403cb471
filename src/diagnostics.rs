use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, DiagnosticTag, NumberOrString, Position, Range as LspRange,
};

use crate::config::Settings;
use crate::extract::{extract, local_of, prefix_of, prefixed_names_in_masked, LineMasker};
use crate::vocab::{vocabulary_key, VocabularyCache};
use crate::workspace::WorkspaceIndex;

pub const SOURCE: &str = "terrapin";

/// Lines whose prefixed names are declarations rather than uses.
static DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:@prefix|@base|(?i:prefix|base))(?:\s|$)").unwrap());

/// SPARQL-style directives and graph blocks end without a terminator.
static UNTERMINATED_OK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:(?i:prefix|base|graph)(?:\s|$)|\})|[{}]\s*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finding {
    MissingTerminator,
    UndeclaredPrefix,
    UnknownTerm,
    DuplicatePrefix,
    UnusedPrefix,
}

impl Finding {
    pub fn code(&self) -> &'static str {
        match self {
            Finding::MissingTerminator => "missing-terminator",
            Finding::UndeclaredPrefix => "undeclared-prefix",
            Finding::UnknownTerm => "unknown-term",
            Finding::DuplicatePrefix => "duplicate-prefix",
            Finding::UnusedPrefix => "unused-prefix",
        }
    }

    fn severity(&self) -> DiagnosticSeverity {
        match self {
            Finding::MissingTerminator | Finding::UndeclaredPrefix | Finding::DuplicatePrefix => {
                DiagnosticSeverity::WARNING
            }
            Finding::UnknownTerm | Finding::UnusedPrefix => DiagnosticSeverity::INFORMATION,
        }
    }

    fn diagnostic(&self, range: LspRange, message: String) -> Diagnostic {
        Diagnostic {
            range,
            severity: Some(self.severity()),
            code: Some(NumberOrString::String(self.code().into())),
            source: Some(SOURCE.into()),
            message,
            tags: (*self == Finding::UnusedPrefix).then(|| vec![DiagnosticTag::UNNECESSARY]),
            ..Default::default()
        }
    }
}

/// Lint findings for a tracked document, read from its live text when open.
/// `None` when the pass is switched off or the document cannot be read.
pub fn diagnostics(
    index: &WorkspaceIndex,
    cache: &VocabularyCache,
    path: &Path,
) -> Option<Vec<Diagnostic>> {
    let settings = index.settings();
    if !settings.diagnostics {
        return None;
    }

    let text = index.document_text(path)?;
    Some(lint(&text, settings, cache))
}

/// Lint one document's text. Never fails: anything unexpected becomes a
/// single diagnostic at the start of the document.
pub fn lint(text: &str, settings: &Settings, cache: &VocabularyCache) -> Vec<Diagnostic> {
    let outcome = catch_unwind(AssertUnwindSafe(|| scan(text, settings, cache)))
        .unwrap_or_else(|_| Err(anyhow::anyhow!("diagnostics pass panicked")));

    match outcome {
        Ok(diagnostics) => diagnostics,
        Err(err) => {
            tracing::error!("failed to produce diagnostics: {err:#}");
            vec![Diagnostic {
                range: LspRange::default(),
                severity: Some(DiagnosticSeverity::WARNING),
                source: Some(SOURCE.into()),
                message: format!("Internal error while checking this document: {err}"),
                ..Default::default()
            }]
        }
    }
}

fn single_line(line: usize, columns: Range<usize>) -> anyhow::Result<LspRange> {
    let line = u32::try_from(line).context("line number out of range")?;
    let start = u32::try_from(columns.start).context("column out of range")?;
    let end = u32::try_from(columns.end).context("column out of range")?;
    Ok(LspRange::new(Position::new(line, start), Position::new(line, end)))
}

/// Bracket and paren nesting carried from line to line. Never negative.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Depth {
    brackets: usize,
    parens: usize,
}

impl Depth {
    fn apply(self, masked: &str) -> Depth {
        masked.chars().fold(self, |depth, ch| match ch {
            '[' => Depth {
                brackets: depth.brackets + 1,
                ..depth
            },
            ']' => Depth {
                brackets: depth.brackets.saturating_sub(1),
                ..depth
            },
            '(' => Depth {
                parens: depth.parens + 1,
                ..depth
            },
            ')' => Depth {
                parens: depth.parens.saturating_sub(1),
                ..depth
            },
            _ => depth,
        })
    }

    fn is_top_level(&self) -> bool {
        self.brackets == 0 && self.parens == 0
    }
}

fn scan(
    text: &str,
    settings: &Settings,
    cache: &VocabularyCache,
) -> anyhow::Result<Vec<Diagnostic>> {
    let facts = extract(text);
    let namespace_map = &facts.namespace_map;

    let mut diagnostics = Vec::new();
    let mut masker = LineMasker::default();
    let mut depth = Depth::default();
    let mut usage: HashMap<String, usize> = HashMap::new();
    let mut prefetched: HashSet<String> = HashSet::new();

    for (line_number, line) in text.lines().enumerate() {
        let starts_in_string = masker.in_long_string();
        let masked = masker.mask(line);
        let before = depth;
        depth = depth.apply(&masked);

        let content = masked.trim();
        let is_directive = DIRECTIVE_RE.is_match(&masked);

        if !content.is_empty()
            && !starts_in_string
            && !masker.in_long_string()
            && before.is_top_level()
            && depth.is_top_level()
            && !content.ends_with(['.', ';', ','])
            && content.contains(char::is_whitespace)
            && !UNTERMINATED_OK_RE.is_match(&masked)
        {
            let start = masked.chars().take_while(|ch| ch.is_whitespace()).count();
            let end = masked.trim_end().chars().count();
            diagnostics.push(Finding::MissingTerminator.diagnostic(
                single_line(line_number, start..end)?,
                "Statement is missing a terminator ('.', ';' or ',')".into(),
            ));
        }

        if is_directive {
            continue;
        }

        for (name, columns) in prefixed_names_in_masked(&masked) {
            let prefix = prefix_of(&name);
            *usage.entry(prefix.to_string()).or_default() += 1;

            if !namespace_map.contains(prefix) {
                diagnostics.push(Finding::UndeclaredPrefix.diagnostic(
                    single_line(line_number, columns)?,
                    format!("Undeclared prefix '{prefix}'"),
                ));
                continue;
            }

            let local = local_of(&name);
            if !settings.unknown_term_diagnostics || local.is_empty() {
                continue;
            }
            let Some(key) = vocabulary_key(prefix, namespace_map) else {
                continue;
            };

            match cache.get(&key.key) {
                // cached under the same key, but for another namespace
                Some(vocabulary) if !vocabulary.serves(&key.namespace) => {}
                Some(vocabulary) if !vocabulary.contains(local) => {
                    diagnostics.push(Finding::UnknownTerm.diagnostic(
                        single_line(line_number, columns)?,
                        format!(
                            "'{local}' is not a known term of the {} vocabulary",
                            key.key
                        ),
                    ));
                }
                Some(_) => {}
                None => {
                    if prefetched.insert(key.key.clone()) {
                        cache.prefetch(&key.key);
                    }
                }
            }
        }
    }

    let mut seen = HashSet::new();
    for decl in &facts.namespaces {
        if !seen.insert(decl.prefix.as_str()) {
            diagnostics.push(Finding::DuplicatePrefix.diagnostic(
                *decl.range,
                format!("Prefix '{}' is declared more than once", decl.prefix),
            ));
        }
    }

    if settings.unused_prefix_diagnostics {
        let mut reported = HashSet::new();
        for decl in &facts.namespaces {
            let used = usage.get(&decl.prefix).copied().unwrap_or(0) > 0;
            if !used && reported.insert(decl.prefix.as_str()) {
                diagnostics.push(Finding::UnusedPrefix.diagnostic(
                    *decl.range,
                    format!("Prefix '{}' is declared but never used", decl.prefix),
                ));
            }
        }
    }

    diagnostics.sort_by_key(|diagnostic| {
        (diagnostic.range.start.line, diagnostic.range.start.character)
    });

    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils::{create_test_workspace, foaf_data, MockVocabularyProvider};
    use crate::vocab::{NoVocabularies, VocabState};

    fn no_vocabularies() -> VocabularyCache {
        VocabularyCache::new(Arc::new(NoVocabularies))
    }

    fn findings(diagnostics: &[Diagnostic], finding: Finding) -> Vec<(u32, String)> {
        diagnostics
            .iter()
            .filter(|it| it.code == Some(NumberOrString::String(finding.code().into())))
            .map(|it| (it.range.start.line, it.message.clone()))
            .collect()
    }

    const SCENARIO: &str = "@prefix foaf: <http://xmlns.com/foaf/0.1/> .\n\
                            \n\
                            ex:Bob foaf:knows ex:Alice ;\n    \
                            foaf:name \"Bob\"\n";

    #[test]
    fn test_missing_terminator_and_undeclared_prefix() {
        let diagnostics = lint(SCENARIO, &Settings::default(), &no_vocabularies());

        assert_eq!(
            findings(&diagnostics, Finding::MissingTerminator)
                .iter()
                .map(|(line, _)| *line)
                .collect::<Vec<_>>(),
            vec![3]
        );

        let undeclared = findings(&diagnostics, Finding::UndeclaredPrefix);
        assert_eq!(undeclared.len(), 2, "ex:Bob and ex:Alice");
        assert!(undeclared.iter().all(|(_, message)| message.contains("'ex'")));
        assert!(diagnostics.iter().all(|it| !it.message.contains("'foaf'")));
    }

    #[test]
    fn test_never_an_error_severity() {
        let diagnostics = lint(SCENARIO, &Settings::default(), &no_vocabularies());

        assert!(!diagnostics.is_empty());
        for diagnostic in diagnostics {
            assert_ne!(diagnostic.severity, Some(DiagnosticSeverity::ERROR));
            assert_eq!(diagnostic.source.as_deref(), Some(SOURCE));
        }
    }

    #[test]
    fn test_strings_iris_and_comments_are_ignored() {
        let text = "@prefix ex: <http://example.org/> .\n\
                    ex:a ex:label \"bad:prefix ( [ here\" . # other:thing [\n\
                    ex:b ex:see <http://other.org/x:y> .\n\
                    ex:c ex:text \"\"\"multi\n\
                    line body without end\n\
                    \"\"\" .\n";

        let diagnostics = lint(text, &Settings::default(), &no_vocabularies());

        assert_eq!(diagnostics, vec![]);
    }

    #[test]
    fn test_nested_lines_need_no_terminator() {
        let text = "@prefix ex: <http://example.org/> .\n\
                    ex:a ex:knows [\n    \
                    ex:name \"x\"\n\
                    ] ;\n    \
                    ex:list ( ex:b\n    \
                    ex:c ) .\n\
                    ex:lonely\n    \
                    ex:p ex:o .\n";

        let diagnostics = lint(text, &Settings::default(), &no_vocabularies());

        assert_eq!(findings(&diagnostics, Finding::MissingTerminator), vec![]);
    }

    #[test]
    fn test_depth_never_goes_negative() {
        let text = "] ] )\nex:a ex:b ex:c\n";

        let diagnostics = lint(text, &Settings::default(), &no_vocabularies());

        assert_eq!(
            findings(&diagnostics, Finding::MissingTerminator)
                .iter()
                .map(|(line, _)| *line)
                .collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_sparql_directives_and_graphs() {
        let text = "PREFIX ex: <http://example.org/>\n\
                    GRAPH ex:g {\n\
                    ex:a ex:b ex:c .\n\
                    }\n";

        let diagnostics = lint(text, &Settings::default(), &no_vocabularies());

        assert_eq!(findings(&diagnostics, Finding::MissingTerminator), vec![]);
        assert_eq!(findings(&diagnostics, Finding::UndeclaredPrefix), vec![]);
    }

    #[test]
    fn test_duplicate_and_unused_prefixes() {
        let text = "@prefix ex: <http://example.org/> .\n\
                    @prefix ex: <http://example.com/> .\n\
                    @prefix unused: <http://unused.org/> .\n\
                    ex:a ex:b ex:c .\n";

        let diagnostics = lint(text, &Settings::default(), &no_vocabularies());

        assert_eq!(
            findings(&diagnostics, Finding::DuplicatePrefix),
            vec![(1, "Prefix 'ex' is declared more than once".to_string())]
        );
        assert_eq!(
            findings(&diagnostics, Finding::UnusedPrefix),
            vec![(2, "Prefix 'unused' is declared but never used".to_string())]
        );

        let settings = Settings {
            unused_prefix_diagnostics: false,
            ..Settings::default()
        };
        let diagnostics = lint(text, &settings, &no_vocabularies());
        assert_eq!(findings(&diagnostics, Finding::UnusedPrefix), vec![]);
    }

    #[tokio::test]
    async fn test_unknown_term_with_cached_vocabulary() {
        let cache = VocabularyCache::new(Arc::new(MockVocabularyProvider::new([(
            "foaf",
            foaf_data(),
        )])));
        cache.load("foaf").await;
        let text = "ex:a a foaf:Person ; foaf:nmae \"x\" .\n";
        let settings = Settings::default();

        let declared = format!("@prefix ex: <http://example.org/> .\n{text}");

        let diagnostics = lint(&declared, &settings, &cache);

        let unknown = findings(&diagnostics, Finding::UnknownTerm);
        assert_eq!(unknown.len(), 1);
        assert!(unknown[0].1.contains("'nmae'"));

        let settings = Settings {
            unknown_term_diagnostics: false,
            ..Settings::default()
        };
        let diagnostics = lint(text, &settings, &cache);
        assert_eq!(findings(&diagnostics, Finding::UnknownTerm), vec![]);
    }

    #[tokio::test]
    async fn test_rebound_prefix_is_not_checked_against_cached_vocabulary() {
        let cache = VocabularyCache::new(Arc::new(MockVocabularyProvider::new([(
            "foaf",
            foaf_data(),
        )])));
        cache.load("foaf").await;
        let text = "@prefix ex: <http://example.org/> .
\
                    @prefix foaf: <http://example.org/myfoaf/> .
\
                    ex:a foaf:custom ex:b .
";

        let diagnostics = lint(text, &Settings::default(), &cache);

        assert_eq!(findings(&diagnostics, Finding::UnknownTerm), vec![]);
    }

    #[tokio::test]
    async fn test_uncached_vocabulary_is_prefetched() {
        let provider = Arc::new(MockVocabularyProvider::new([("foaf", foaf_data())]));
        let cache = VocabularyCache::new(provider.clone());

        let diagnostics = lint("foaf:nobody foaf:nmae foaf:x .\n", &Settings::default(), &cache);

        assert_eq!(findings(&diagnostics, Finding::UnknownTerm), vec![]);
        for _ in 0..10 {
            if cache.state("foaf") == VocabState::Cached {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state("foaf"), VocabState::Cached, "loaded in the background");
        assert_eq!(
            provider.calls.load(std::sync::atomic::Ordering::SeqCst),
            1,
            "one prefetch per vocabulary"
        );
        let diagnostics = lint("foaf:nobody foaf:nmae foaf:x .\n", &Settings::default(), &cache);
        assert_eq!(findings(&diagnostics, Finding::UnknownTerm).len(), 3);
    }

    #[test]
    fn test_master_switch() {
        let (_temp_dir, dir, mut index) = create_test_workspace(|_| {});
        let path = dir.join("a.ttl");
        index.open_document(&path, SCENARIO);

        assert!(diagnostics(&index, &no_vocabularies(), &path).is_some_and(|it| !it.is_empty()));

        index.set_settings(&Settings {
            diagnostics: false,
            ..Settings::default()
        });
        assert_eq!(diagnostics(&index, &no_vocabularies(), &path), None);
    }
}
