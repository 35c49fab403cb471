//! Hover documentation for vocabulary terms.
//!
//! Hovering a `prefix:local` name resolves the prefix through the document's
//! namespace map, loads the matching vocabulary (waiting for it if needed) and
//! shows what the vocabulary says about the term:
//!
//! ```text
//! **foaf:Person**
//!
//! *Class* `<http://xmlns.com/foaf/0.1/Person>`
//!
//! A person.
//! ```
//!
//! # Configuration
//!
//! Hover can be disabled via [`Settings::hover`](crate::config::Settings):
//!
//! ```json
//! { "hover": false }
//! ```

use std::path::Path;

use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

use crate::extract::{local_of, prefix_of};
use crate::vocab::{vocabulary_key, Term, TermKind, VocabularyCache, VocabularyKey};
use crate::workspace::{CursorToken, WorkspaceIndex};

/// Everything hover needs from the index, taken before any vocabulary await
/// so no index borrow is held while loading.
#[derive(Debug, Clone)]
pub struct HoverRequest {
    token: CursorToken,
    key: VocabularyKey,
    iri: String,
}

impl HoverRequest {
    /// `None` when hover is off or the cursor is not on a prefixed name with a
    /// bound prefix and a local part.
    pub fn construct(index: &WorkspaceIndex, path: &Path, position: Position) -> Option<Self> {
        if !index.settings().hover {
            return None;
        }

        let token = index.token_at_position(path, position)?;
        if token.text.starts_with('<') || !token.text.contains(':') {
            return None;
        }

        let prefix = prefix_of(&token.text);
        let local = local_of(&token.text);
        if local.is_empty() {
            return None;
        }

        let namespace_map = index.namespace_map(path);
        let key = vocabulary_key(prefix, &namespace_map)?;
        let iri = namespace_map.expand(&token.text)?;

        Some(HoverRequest { token, key, iri })
    }

    pub async fn hover(self, cache: &VocabularyCache) -> Option<Hover> {
        let vocabulary = cache.load_bound(&self.key).await?;
        let term = vocabulary.term(local_of(&self.token.text))?;

        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: render(&self.token.text, &self.iri, term),
            }),
            range: Some(*self.token.range),
        })
    }
}

fn render(name: &str, iri: &str, term: &Term) -> String {
    let kind = match term.kind {
        TermKind::Class => "Class",
        TermKind::Property => "Property",
    };

    let mut sections = vec![format!("**{name}**"), format!("*{kind}* `<{iri}>`")];
    if let Some(label) = term.label.as_ref().filter(|label| label.as_str() != local_of(name)) {
        sections.push(format!("Label: {label}"));
    }
    sections.extend(term.documentation.clone());

    sections.join("\n\n")
}

/// Hover for a term in a document the caller already holds.
pub async fn hover(
    index: &WorkspaceIndex,
    cache: &VocabularyCache,
    path: &Path,
    position: Position,
) -> Option<Hover> {
    HoverRequest::construct(index, path, position)?
        .hover(cache)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::test_utils::{foaf_data, MockVocabularyProvider};
    use crate::workspace::MyRange;

    fn foaf_cache() -> VocabularyCache {
        VocabularyCache::new(Arc::new(MockVocabularyProvider::new([(
            "foaf",
            foaf_data(),
        )])))
    }

    fn markdown(hover: &Hover) -> &str {
        match &hover.contents {
            HoverContents::Markup(markup) => &markup.value,
            _ => panic!("expected markup"),
        }
    }

    #[tokio::test]
    async fn test_hover_on_vocabulary_term() {
        let mut index = WorkspaceIndex::new(&Settings::default(), Path::new("/ws"));
        let path = Path::new("/ws/a.ttl");
        index.open_document(path, "ex:Bob a foaf:Person .\n");

        let hover = hover(&index, &foaf_cache(), path, Position::new(0, 12))
            .await
            .unwrap();

        let value = markdown(&hover);
        assert!(value.starts_with("**foaf:Person**"), "{value}");
        assert!(value.contains("*Class* `<http://xmlns.com/foaf/0.1/Person>`"));
        assert_eq!(hover.range, Some(*MyRange::on_line(0, 9, 20)));
    }

    /// A renamed prefix bound to a well-known namespace still finds it.
    #[tokio::test]
    async fn test_hover_follows_namespace_binding() {
        let mut index = WorkspaceIndex::new(&Settings::default(), Path::new("/ws"));
        let path = Path::new("/ws/a.ttl");
        index.open_document(
            path,
            "@prefix f: <http://xmlns.com/foaf/0.1/> .\nex:Bob f:knows ex:Alice .\n",
        );

        let hover = hover(&index, &foaf_cache(), path, Position::new(1, 9))
            .await
            .unwrap();

        assert!(markdown(&hover).contains("*Property* `<http://xmlns.com/foaf/0.1/knows>`"));
    }

    /// A well-known prefix bound elsewhere does not borrow that vocabulary.
    #[tokio::test]
    async fn test_no_hover_for_rebound_prefix() {
        let mut index = WorkspaceIndex::new(&Settings::default(), Path::new("/ws"));
        let path = Path::new("/ws/a.ttl");
        index.open_document(
            path,
            "@prefix foaf: <http://example.org/myfoaf/> .
ex:Bob a foaf:Person .
",
        );
        let cache = foaf_cache();
        cache.load("foaf").await;

        assert_eq!(hover(&index, &cache, path, Position::new(1, 12)).await, None);
    }

    #[tokio::test]
    async fn test_no_hover() {
        let mut index = WorkspaceIndex::new(&Settings::default(), Path::new("/ws"));
        let path = Path::new("/ws/a.ttl");
        index.open_document(path, "ex:Bob a foaf:Nobody ; foaf: ex:x .\n");
        let cache = foaf_cache();

        for character in [2, 7, 12, 25] {
            assert_eq!(
                hover(&index, &cache, path, Position::new(0, character)).await,
                None,
                "column {character}"
            );
        }

        index.set_settings(&Settings {
            hover: false,
            ..Settings::default()
        });
        index.open_document(path, "ex:Bob a foaf:Person .\n");
        assert_eq!(hover(&index, &cache, path, Position::new(0, 12)).await, None);
    }
}
