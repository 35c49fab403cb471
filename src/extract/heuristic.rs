use once_cell::sync::Lazy;
use regex::Regex;

use crate::workspace::MyRange;

use super::lexer::{prefixed_names_in_masked, LineMasker};
use super::{
    subject_label, DocumentFacts, ExtractError, Extractor, NamespaceDecl, NamespaceMap,
    Occurrence,
};

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:@prefix|(?i:prefix))\s+(?<label>(?:[\p{L}_][\p{L}\p{N}_\-.]*)?:)\s*<(?<iri>[^>\s]*)>",
    )
    .unwrap()
});

static BASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:@base|(?i:base))\s+<(?<iri>[^>\s]*)>").unwrap());

/// Line-by-line extraction for text the structured tier gives up on.
///
/// A line that starts in column 0 with a term contributes that term as a
/// subject; continuation lines are indented in practice. Every prefixed name
/// outside strings and comments is a symbol.
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn facts(&self, text: &str) -> DocumentFacts {
        let mut masker = LineMasker::default();
        let mut namespaces = Vec::new();
        let mut base = None;
        let mut raw_subjects: Vec<(String, bool, MyRange)> = Vec::new();
        let mut symbols = Vec::new();

        for (line_number, line) in text.lines().enumerate() {
            let masked = masker.mask(line);

            if let Some(captures) = PREFIX_RE.captures(line) {
                if let (Some(label), Some(iri)) = (captures.name("label"), captures.name("iri")) {
                    let start = line[..label.start()].chars().count();
                    let end = start + label.as_str().chars().count();
                    namespaces.push(NamespaceDecl {
                        prefix: label.as_str().trim_end_matches(':').to_string(),
                        iri: iri.as_str().to_string(),
                        range: MyRange::on_line(line_number, start, end),
                    });
                }
                continue;
            }

            if let Some(iri) = BASE_RE.captures(line).and_then(|c| c.name("iri")) {
                base = Some(iri.as_str().to_string());
                continue;
            }

            let names = prefixed_names_in_masked(&masked);

            if masked.starts_with('<') {
                let chars: Vec<char> = line.chars().collect();
                if let Some(close) = chars.iter().position(|ch| *ch == '>') {
                    let iri: String = chars[1..close].iter().collect();
                    raw_subjects.push((iri, true, MyRange::on_line(line_number, 0, close + 1)));
                }
            } else if let Some((name, columns)) =
                names.first().filter(|(_, columns)| columns.start == 0)
            {
                raw_subjects.push((
                    name.clone(),
                    false,
                    MyRange::on_line(line_number, columns.start, columns.end),
                ));
            }

            symbols.extend(names.into_iter().map(|(label, columns)| Occurrence {
                label,
                range: MyRange::on_line(line_number, columns.start, columns.end),
            }));
        }

        let mut namespace_map = NamespaceMap::with_defaults();
        for decl in &namespaces {
            namespace_map.insert(&decl.prefix, &decl.iri);
        }

        let subjects = raw_subjects
            .into_iter()
            .map(|(term, is_iri, range)| Occurrence {
                label: if is_iri {
                    subject_label(&term, &namespace_map)
                } else {
                    term
                },
                range,
            })
            .collect();

        DocumentFacts {
            namespaces,
            namespace_map,
            subjects,
            symbols,
            base,
        }
    }
}

impl Extractor for HeuristicExtractor {
    fn extract(&self, text: &str) -> Result<DocumentFacts, ExtractError> {
        Ok(self.facts(text))
    }
}
