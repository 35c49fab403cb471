use std::path::Path;

use itertools::Itertools;
use ropey::Rope;
use tower_lsp::lsp_types::{
    DocumentChanges, OneOf, OptionalVersionedTextDocumentIdentifier, Position, RenameParams,
    TextDocumentEdit, TextEdit, Url, WorkspaceEdit,
};

use crate::gotodef::resolve_locations;
use crate::workspace::{IndexLocation, MyRange, WorkspaceIndex};

/// The text currently at a single-line range.
fn text_at(rope: &Rope, range: &MyRange) -> Option<String> {
    if range.start.line != range.end.line {
        return None;
    }
    let line = rope.get_line(range.start.line as usize)?;
    let start = range.start.character as usize;
    let end = range.end.character as usize;
    if start > end || end > line.len_chars() {
        return None;
    }
    Some(line.slice(start..end).to_string())
}

/// Rename every occurrence of the term under the cursor. Each location is
/// checked against the document's current text (live when open, else disk) and
/// skipped unless it still reads as the original term. `None` when no location
/// survives.
pub fn rename(index: &WorkspaceIndex, params: &RenameParams, path: &Path) -> Option<WorkspaceEdit> {
    let position: Position = params.text_document_position.position;
    let (token, locations) = resolve_locations(index, path, position)?;

    let edits: Vec<TextDocumentEdit> = locations
        .into_iter()
        .chunk_by(|location| location.path.clone())
        .into_iter()
        .filter_map(|(document, locations)| {
            let locations: Vec<IndexLocation> = locations.collect();
            let rope = Rope::from_str(&index.document_text(&document)?);

            let edits: Vec<OneOf<TextEdit, _>> = locations
                .iter()
                .filter(|location| {
                    let current = text_at(&rope, &location.range);
                    if current.as_deref() != Some(token.text.as_str()) {
                        tracing::debug!(
                            "skipping stale {} at {}:{}",
                            token.text,
                            document.display(),
                            location.range.start.line
                        );
                        return false;
                    }
                    true
                })
                .map(|location| {
                    OneOf::Left(TextEdit {
                        range: *location.range,
                        new_text: params.new_name.clone(),
                    })
                })
                .collect();

            if edits.is_empty() {
                return None;
            }

            Some(TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    uri: Url::from_file_path(&document).ok()?,
                    version: None,
                },
                edits,
            })
        })
        .collect();

    if edits.is_empty() {
        return None;
    }

    Some(WorkspaceEdit {
        document_changes: Some(DocumentChanges::Edits(edits)),
        ..Default::default()
    })
}
