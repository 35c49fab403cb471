use crate::extract::LineMasker;
use crate::workspace::MyRange;

/// Range indexes for one line of the file; NOT THE WHOLE FILE
type LineRange = std::ops::Range<usize>;

/// What the user is typing at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    /// Everything typed from the start of the term up to the cursor
    pub typed: String,
    /// Set when the typed text contains a colon: the label before it
    pub active_prefix: Option<String>,
    /// The part after the colon, or the whole typed text without a prefix
    pub query: String,
    pub line: usize,
    pub columns: LineRange,
}

fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '@' | '%')
}

impl CursorContext {
    /// `None` when the cursor sits inside a string, an IRI or a comment.
    pub fn parse(line_text: &str, line: usize, character: usize) -> Option<CursorContext> {
        let chars: Vec<char> = line_text.chars().collect();
        let character = character.min(chars.len());
        let before: String = chars[..character].iter().collect();

        let masked: Vec<char> = LineMasker::default().mask(&before).chars().collect();
        if masked.len() < character {
            // truncated at a comment
            return None;
        }
        let open_iri = masked.iter().rposition(|c| *c == '<');
        let close_iri = masked.iter().rposition(|c| *c == '>');
        if open_iri.is_some() && open_iri > close_iri {
            return None;
        }
        let quotes = masked.iter().filter(|c| matches!(c, '"' | '\'')).count();
        if quotes % 2 == 1 {
            return None;
        }

        let start = chars[..character]
            .iter()
            .rposition(|c| !is_term_char(*c))
            .map(|i| i + 1)
            .unwrap_or(0);
        let typed: String = chars[start..character].iter().collect();

        let (active_prefix, query) = match typed.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, typed.clone()),
        };

        Some(CursorContext {
            typed,
            active_prefix,
            query,
            line,
            columns: start..character,
        })
    }

    /// The range the completion replaces.
    pub fn replace_range(&self) -> MyRange {
        MyRange::on_line(self.line, self.columns.start, self.columns.end)
    }
}
