//! Tokenizing helpers.
//!
//! [`tokenize`] is the whole-document lexer behind the structured extractor.
//! [`LineMasker`] and [`terms_in_line`] work one line at a time and are what
//! the diagnostics scan, the heuristic extractor and cursor lookups use.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use super::ExtractError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Iri(String),
    PrefixedName(String),
    BlankNode,
    Literal,
    /// `@prefix`, `@base`, `PREFIX`, `BASE`
    Directive(Directive),
    LangTag,
    DatatypeMarker,
    /// `a`, `true`, numbers and other bare words
    Word,
    Punct(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    Prefix,
    Base,
    SparqlPrefix,
    SparqlBase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte range in the document
    pub span: Range<usize>,
}

fn line_of(text: &str, byte: usize) -> u32 {
    text[..byte].matches('\n').count() as u32
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '%' | '+')
}

/// Lex a whole document. Fails on unterminated IRIs and strings; everything
/// else unknown is skipped.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ExtractError> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(c) = text[i..].chars().next() {
        let start = i;
        let rest = &text[i..];

        match c {
            c if c.is_whitespace() => i += c.len_utf8(),
            '#' => i += rest.find('\n').unwrap_or(rest.len()),
            '<' => {
                let end = rest[1..]
                    .find(|ch: char| ch == '>' || ch == '\n' || ch == ' ')
                    .map(|offset| offset + 1)
                    .filter(|offset| rest[*offset..].starts_with('>'))
                    .ok_or(ExtractError::UnterminatedIri(line_of(text, start)))?;
                tokens.push(Token {
                    kind: TokenKind::Iri(rest[1..end].to_string()),
                    span: start..start + end + 1,
                });
                i += end + 1;
            }
            '"' | '\'' => {
                let len = literal_len(rest, c)
                    .ok_or(ExtractError::UnterminatedString(line_of(text, start)))?;
                tokens.push(Token {
                    kind: TokenKind::Literal,
                    span: start..start + len,
                });
                i += len;
            }
            '@' => {
                let word_len = rest[1..]
                    .find(|ch: char| !(ch.is_alphanumeric() || ch == '-'))
                    .unwrap_or(rest.len() - 1);
                let kind = match &rest[1..1 + word_len] {
                    "prefix" => TokenKind::Directive(Directive::Prefix),
                    "base" => TokenKind::Directive(Directive::Base),
                    _ => TokenKind::LangTag,
                };
                tokens.push(Token {
                    kind,
                    span: start..start + 1 + word_len,
                });
                i += 1 + word_len;
            }
            '^' if rest.starts_with("^^") => {
                tokens.push(Token {
                    kind: TokenKind::DatatypeMarker,
                    span: start..start + 2,
                });
                i += 2;
            }
            '.' | ';' | ',' | '[' | ']' | '(' | ')' | '{' | '}' => {
                tokens.push(Token {
                    kind: TokenKind::Punct(c),
                    span: start..start + 1,
                });
                i += 1;
            }
            c if is_name_char(c) => {
                let mut len = rest.find(|ch: char| !is_name_char(ch)).unwrap_or(rest.len());
                // a trailing dot terminates the statement, it is not part of the name
                while len > 1 && rest[..len].ends_with('.') {
                    len -= 1;
                }
                let word = &rest[..len];

                let kind = if word.starts_with("_:") {
                    TokenKind::BlankNode
                } else if word.contains(':') {
                    TokenKind::PrefixedName(word.to_string())
                } else if word.eq_ignore_ascii_case("prefix") {
                    TokenKind::Directive(Directive::SparqlPrefix)
                } else if word.eq_ignore_ascii_case("base") {
                    TokenKind::Directive(Directive::SparqlBase)
                } else {
                    TokenKind::Word
                };

                tokens.push(Token {
                    kind,
                    span: start..start + len,
                });
                i += len;
            }
            other => i += other.len_utf8(),
        }
    }

    Ok(tokens)
}

/// Byte length of a string literal starting at `rest[0] == quote`, quotes
/// included. `None` when it never closes.
fn literal_len(rest: &str, quote: char) -> Option<usize> {
    let triple: String = std::iter::repeat_n(quote, 3).collect();

    if rest.starts_with(&triple) {
        let mut offset = 3;
        loop {
            let found = rest[offset..].find(&triple)? + offset;
            if !is_escaped(rest, found) {
                // a run of more than three quotes closes on its last three
                let run = rest[found..].chars().take_while(|ch| *ch == quote).count();
                return Some(found + run.min(5));
            }
            offset = found + 1;
        }
    }

    let mut escaped = false;
    for (offset, ch) in rest.char_indices().skip(1) {
        match ch {
            '\n' => return None,
            '\\' if !escaped => escaped = true,
            ch if ch == quote && !escaped => return Some(offset + 1),
            _ => escaped = false,
        }
    }
    None
}

fn is_escaped(text: &str, byte: usize) -> bool {
    text[..byte]
        .chars()
        .rev()
        .take_while(|ch| *ch == '\\')
        .count()
        % 2
        == 1
}

/// Blanks out string bodies and IRI bodies and drops comments, one line at a
/// time, keeping every remaining character in its original column.
///
/// Long (triple-quoted) strings may span lines, so the masker is stateful and
/// must see the lines of a document in order.
#[derive(Debug, Default)]
pub struct LineMasker {
    long_quote: Option<char>,
}

const MASK: char = '_';

impl LineMasker {
    pub fn mask(&mut self, line: &str) -> String {
        let chars: Vec<char> = line.chars().collect();
        let mut out = Vec::with_capacity(chars.len());
        let mut i = 0;

        while i < chars.len() {
            if let Some(quote) = self.long_quote {
                if chars[i] == quote
                    && chars.get(i + 1) == Some(&quote)
                    && chars.get(i + 2) == Some(&quote)
                {
                    out.extend([quote; 3]);
                    self.long_quote = None;
                    i += 3;
                } else {
                    out.push(MASK);
                    i += 1;
                }
                continue;
            }

            match chars[i] {
                '#' => break,
                '<' => {
                    out.push('<');
                    i += 1;
                    while i < chars.len() && chars[i] != '>' {
                        out.push(MASK);
                        i += 1;
                    }
                    if i < chars.len() {
                        out.push('>');
                        i += 1;
                    }
                }
                quote @ ('"' | '\'') => {
                    if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                        out.extend([quote; 3]);
                        self.long_quote = Some(quote);
                        i += 3;
                        continue;
                    }

                    out.push(quote);
                    i += 1;
                    let mut escaped = false;
                    while i < chars.len() {
                        let ch = chars[i];
                        i += 1;
                        if ch == quote && !escaped {
                            out.push(quote);
                            break;
                        }
                        escaped = ch == '\\' && !escaped;
                        out.push(MASK);
                    }
                }
                other => {
                    out.push(other);
                    i += 1;
                }
            }
        }

        out.into_iter().collect()
    }

    /// Whether the last masked line ended inside a long string.
    pub fn in_long_string(&self) -> bool {
        self.long_quote.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTermKind {
    PrefixedName,
    Iri,
}

/// A term found on a single line, with character columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTerm {
    pub text: String,
    pub kind: LineTermKind,
    pub columns: Range<usize>,
}

static PNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[\s;,()\[\]{}^])(?<pname>(?:[\p{L}_][\p{L}\p{N}_\-.]*)?:[\p{L}\p{N}_\-.:%]*)",
    )
    .unwrap()
});

static IRI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<_*>").unwrap());

/// Prefixed names found in an already-masked line. Blank node labels are skipped.
pub(crate) fn prefixed_names_in_masked(masked: &str) -> Vec<(String, Range<usize>)> {
    PNAME_RE
        .captures_iter(masked)
        .filter_map(|captures| captures.name("pname"))
        .filter_map(|m| {
            let text = m.as_str().trim_end_matches('.');
            if text.starts_with("_:") || text.is_empty() {
                return None;
            }
            let start = masked[..m.start()].chars().count();
            Some((text.to_string(), start..start + text.chars().count()))
        })
        .collect()
}

/// Prefixed names and IRIs on one line, outside strings and comments.
pub fn terms_in_line(line: &str) -> Vec<LineTerm> {
    let masked = LineMasker::default().mask(line);
    let chars: Vec<char> = line.chars().collect();

    let names = prefixed_names_in_masked(&masked)
        .into_iter()
        .map(|(text, columns)| LineTerm {
            text,
            kind: LineTermKind::PrefixedName,
            columns,
        });

    let iris = IRI_RE.find_iter(&masked).map(|m| {
        let start = masked[..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        LineTerm {
            text: chars[start..end].iter().collect(),
            kind: LineTermKind::Iri,
            columns: start..end,
        }
    });

    let mut terms: Vec<LineTerm> = names.chain(iris).collect();
    terms.sort_by_key(|term| term.columns.start);
    terms
}

/// The term whose columns include `column` (its end inclusive, so a cursor
/// right after a term still selects it).
pub fn term_at_column(line: &str, column: usize) -> Option<LineTerm> {
    terms_in_line(line)
        .into_iter()
        .find(|term| term.columns.start <= column && column <= term.columns.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_prefix_directive() {
        assert_eq!(
            kinds("@prefix foaf: <http://xmlns.com/foaf/0.1/> ."),
            vec![
                TokenKind::Directive(Directive::Prefix),
                TokenKind::PrefixedName("foaf:".into()),
                TokenKind::Iri("http://xmlns.com/foaf/0.1/".into()),
                TokenKind::Punct('.'),
            ]
        );
    }

    #[test]
    fn test_tokenize_trailing_dot_is_terminator() {
        assert_eq!(
            kinds("ex:Bob foaf:knows ex:Alice."),
            vec![
                TokenKind::PrefixedName("ex:Bob".into()),
                TokenKind::PrefixedName("foaf:knows".into()),
                TokenKind::PrefixedName("ex:Alice".into()),
                TokenKind::Punct('.'),
            ]
        );
    }

    #[test]
    fn test_tokenize_literals_and_comments() {
        assert_eq!(
            kinds("ex:a rdfs:label \"x # not:comment\"@en ; ex:n 1.5 . # ex:gone"),
            vec![
                TokenKind::PrefixedName("ex:a".into()),
                TokenKind::PrefixedName("rdfs:label".into()),
                TokenKind::Literal,
                TokenKind::LangTag,
                TokenKind::Punct(';'),
                TokenKind::PrefixedName("ex:n".into()),
                TokenKind::Word,
                TokenKind::Punct('.'),
            ]
        );
    }

    #[test]
    fn test_tokenize_long_string_spans_lines() {
        let tokens = tokenize("ex:a ex:b \"\"\"line one\nline \"two\"\"\"\" .").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Literal);
        assert_eq!(tokens[3].kind, TokenKind::Punct('.'));
    }

    #[test]
    fn test_tokenize_errors() {
        assert_eq!(
            tokenize("ex:a ex:b <http://open\n"),
            Err(ExtractError::UnterminatedIri(0))
        );
        assert_eq!(
            tokenize("\nex:a ex:b \"open\n"),
            Err(ExtractError::UnterminatedString(1))
        );
    }

    #[test]
    fn test_mask_preserves_columns() {
        let line = "ex:a ex:b \"v;x\" , <http://e.org/#x> . # tail";
        let masked = LineMasker::default().mask(line);

        assert_eq!(masked, "ex:a ex:b \"___\" , <_______________> . ");
    }

    #[test]
    fn test_mask_carries_long_string_state() {
        let mut masker = LineMasker::default();
        assert_eq!(masker.mask("ex:a ex:b \"\"\"start ["), "ex:a ex:b \"\"\"_______");
        assert_eq!(masker.mask("] end\"\"\" ."), "_____\"\"\" .");
    }

    #[test]
    fn test_terms_in_line() {
        let terms = terms_in_line("ex:Bob foaf:knows <http://e.org/a>, _:b1 .");

        let texts: Vec<_> = terms.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["ex:Bob", "foaf:knows", "<http://e.org/a>"]);
        assert_eq!(terms[1].columns, 7..17);
        assert_eq!(terms[2].kind, LineTermKind::Iri);
    }

    #[test]
    fn test_term_at_column_end_inclusive() {
        let line = "ex:Bob foaf:knows ex:Alice .";

        assert_eq!(term_at_column(line, 6).map(|t| t.text), Some("ex:Bob".into()));
        assert_eq!(term_at_column(line, 10).map(|t| t.text), Some("foaf:knows".into()));
        assert_eq!(term_at_column(line, 27), None);
    }
}
