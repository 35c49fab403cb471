use std::ops::Range;

use ropey::Rope;

use crate::workspace::MyRange;

use super::lexer::{tokenize, Directive, Token, TokenKind};
use super::{
    subject_label, DocumentFacts, ExtractError, Extractor, NamespaceDecl, NamespaceMap,
    Occurrence,
};

/// Token-based extraction that follows statement structure.
///
/// A subject is the first term of a statement at nesting depth 0: the first
/// term of the document, or the first term after a `.` (or a TriG graph brace).
/// Terms after `;` and `,` or inside `[ ]` / `( )` are never subjects.
pub struct StructuredExtractor;

enum SubjectTerm<'a> {
    Iri(&'a str),
    PrefixedName(&'a str),
}

impl Extractor for StructuredExtractor {
    fn extract(&self, text: &str) -> Result<DocumentFacts, ExtractError> {
        let tokens = tokenize(text)?;
        let rope = Rope::from_str(text);
        let to_range = |span: &Range<usize>| MyRange::from_range(&rope, span.clone());
        let line = |token: &Token| rope.byte_to_line(token.span.start) as u32;

        let mut namespaces: Vec<NamespaceDecl> = Vec::new();
        let mut base: Option<String> = None;
        let mut raw_subjects: Vec<(SubjectTerm, MyRange)> = Vec::new();
        let mut symbols: Vec<Occurrence> = Vec::new();

        // open brackets with the token that opened them
        let mut stack: Vec<(char, &Token)> = Vec::new();
        let mut expecting_subject = true;

        let mut iter = tokens.iter();
        while let Some(token) = iter.next() {
            let at_statement_start = expecting_subject && stack.is_empty();

            match &token.kind {
                TokenKind::Directive(directive) => {
                    if !stack.is_empty() {
                        return Err(ExtractError::MalformedDirective(line(token)));
                    }

                    match directive {
                        Directive::Prefix | Directive::SparqlPrefix => {
                            let (label, iri) = match (iter.next(), iter.next()) {
                                (
                                    Some(label @ Token {
                                        kind: TokenKind::PrefixedName(name),
                                        ..
                                    }),
                                    Some(Token {
                                        kind: TokenKind::Iri(iri),
                                        ..
                                    }),
                                ) if name.ends_with(':') && name.matches(':').count() == 1 => {
                                    (label, iri)
                                }
                                _ => return Err(ExtractError::MalformedDirective(line(token))),
                            };

                            if let TokenKind::PrefixedName(name) = &label.kind {
                                namespaces.push(NamespaceDecl {
                                    prefix: name.trim_end_matches(':').to_string(),
                                    iri: iri.clone(),
                                    range: to_range(&label.span),
                                });
                            }
                        }
                        Directive::Base | Directive::SparqlBase => match iter.next() {
                            Some(Token {
                                kind: TokenKind::Iri(iri),
                                ..
                            }) => base = Some(iri.clone()),
                            _ => return Err(ExtractError::MalformedDirective(line(token))),
                        },
                    }

                    if matches!(directive, Directive::Prefix | Directive::Base) {
                        match iter.next() {
                            Some(Token {
                                kind: TokenKind::Punct('.'),
                                ..
                            }) => {}
                            _ => return Err(ExtractError::MalformedDirective(line(token))),
                        }
                    }

                    expecting_subject = true;
                }
                TokenKind::Punct(open @ ('[' | '(')) => {
                    if at_statement_start {
                        expecting_subject = false;
                    }
                    stack.push((*open, token));
                }
                TokenKind::Punct(close @ (']' | ')')) => {
                    let expected = if *close == ']' { '[' } else { '(' };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(ExtractError::Unbalanced {
                                found: *close,
                                line: line(token),
                            })
                        }
                    }
                }
                TokenKind::Punct(terminator @ ('.' | '{' | '}')) => {
                    if !stack.is_empty() {
                        return Err(ExtractError::Unbalanced {
                            found: *terminator,
                            line: line(token),
                        });
                    }
                    expecting_subject = true;
                }
                TokenKind::Punct(_) | TokenKind::LangTag | TokenKind::DatatypeMarker => {}
                TokenKind::Iri(iri) => {
                    if at_statement_start {
                        raw_subjects.push((SubjectTerm::Iri(iri), to_range(&token.span)));
                        expecting_subject = false;
                    }
                }
                TokenKind::PrefixedName(name) => {
                    let range = to_range(&token.span);
                    symbols.push(Occurrence {
                        label: name.clone(),
                        range,
                    });
                    if at_statement_start {
                        raw_subjects.push((SubjectTerm::PrefixedName(name), range));
                        expecting_subject = false;
                    }
                }
                TokenKind::BlankNode | TokenKind::Literal | TokenKind::Word => {
                    if at_statement_start {
                        expecting_subject = false;
                    }
                }
            }
        }

        if let Some((open, token)) = stack.last() {
            return Err(ExtractError::Unbalanced {
                found: *open,
                line: line(token),
            });
        }

        let mut namespace_map = NamespaceMap::with_defaults();
        for decl in &namespaces {
            namespace_map.insert(&decl.prefix, &decl.iri);
        }

        let subjects = raw_subjects
            .into_iter()
            .map(|(term, range)| {
                let label = match term {
                    SubjectTerm::PrefixedName(name) => name.to_string(),
                    SubjectTerm::Iri(iri) => match &base {
                        Some(base) if !iri.contains(':') => {
                            subject_label(&format!("{base}{iri}"), &namespace_map)
                        }
                        _ => subject_label(iri, &namespace_map),
                    },
                };
                Occurrence { label, range }
            })
            .collect();

        Ok(DocumentFacts {
            namespaces,
            namespace_map,
            subjects,
            symbols,
            base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(occurrences: &[Occurrence]) -> Vec<&str> {
        occurrences.iter().map(|o| o.label.as_str()).collect()
    }

    #[test]
    fn test_subjects_only_at_statement_start() {
        let text = "\
@prefix ex: <http://example.org/> .
ex:Bob foaf:knows ex:Alice ;
    ex:friend [ ex:name \"Carol\" ] ,
        ex:Dave .
ex:Alice a foaf:Person .
";
        let facts = StructuredExtractor.extract(text).unwrap();

        assert_eq!(labels(&facts.subjects), vec!["ex:Bob", "ex:Alice"]);
        assert_eq!(facts.subjects[1].range.start.line, 4);
        assert_eq!(
            labels(&facts.symbols),
            vec![
                "ex:Bob",
                "foaf:knows",
                "ex:Alice",
                "ex:friend",
                "ex:name",
                "ex:Dave",
                "ex:Alice",
                "foaf:Person"
            ]
        );
    }

    #[test]
    fn test_namespace_declarations_and_map() {
        let text = "@prefix ex: <http://example.org/> .\nPREFIX foaf: <http://example.org/foaf#>\n@base <http://base.org/> .\n";

        let facts = StructuredExtractor.extract(text).unwrap();

        assert_eq!(facts.namespaces.len(), 2);
        assert_eq!(facts.namespaces[0].prefix, "ex");
        assert_eq!(*facts.namespaces[0].range, MyRange::on_line(0, 8, 11).0);
        assert_eq!(facts.namespaces[1].prefix, "foaf");
        // document declaration overrides the well-known namespace
        assert_eq!(
            facts.namespace_map.get("foaf"),
            Some("http://example.org/foaf#")
        );
        assert_eq!(
            facts.namespace_map.get("rdfs"),
            Some("http://www.w3.org/2000/01/rdf-schema#")
        );
        assert_eq!(facts.base.as_deref(), Some("http://base.org/"));
    }

    #[test]
    fn test_duplicate_declarations_are_kept() {
        let text = "@prefix ex: <http://a.org/> .\n@prefix ex: <http://b.org/> .\n";

        let facts = StructuredExtractor.extract(text).unwrap();

        assert_eq!(facts.namespaces.len(), 2);
        assert_eq!(facts.namespace_map.get("ex"), Some("http://b.org/"));
    }

    #[test]
    fn test_relative_subject_resolves_against_base() {
        let text = "@base <http://example.org/> .\n@prefix ex: <http://example.org/> .\n<Bob> a ex:Person .\n";

        let facts = StructuredExtractor.extract(text).unwrap();

        assert_eq!(labels(&facts.subjects), vec!["ex:Bob"]);
    }

    #[test]
    fn test_unterminated_last_statement_is_accepted() {
        let facts = StructuredExtractor.extract("ex:a ex:b ex:c").unwrap();

        assert_eq!(labels(&facts.subjects), vec!["ex:a"]);
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        assert_eq!(
            StructuredExtractor.extract("ex:a ex:b [ ex:c ex:d .\n"),
            Err(ExtractError::Unbalanced {
                found: '.',
                line: 0
            })
        );
        assert_eq!(
            StructuredExtractor.extract("ex:a ex:b ( ex:c\n"),
            Err(ExtractError::Unbalanced {
                found: '(',
                line: 0
            })
        );
        assert!(StructuredExtractor.extract("ex:a ex:b ex:c ] .").is_err());
    }

    #[test]
    fn test_malformed_prefix_directive() {
        assert_eq!(
            StructuredExtractor.extract("@prefix ex <http://a.org/> .\n"),
            Err(ExtractError::MalformedDirective(0))
        );
    }
}
