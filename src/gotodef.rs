use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::{Location, Position};

use crate::extract::subject_label;
use crate::workspace::{CursorToken, IndexLocation, WorkspaceIndex};

/// Index keys for a term as written. `ex:` is also looked up as `ex`, and an
/// `<iri>` as both its abbreviation in this document and the bare IRI.
pub fn lookup_keys(index: &WorkspaceIndex, path: &Path, token: &str) -> Vec<String> {
    let mut keys = Vec::new();

    match token.strip_prefix('<').and_then(|it| it.strip_suffix('>')) {
        Some(iri) => {
            keys.push(subject_label(iri, &index.namespace_map(path)));
            keys.push(iri.to_string());
        }
        None => {
            keys.push(token.to_string());
            keys.push(token.trim_end_matches(':').to_string());
        }
    }

    keys.dedup();
    keys.retain(|key| !key.is_empty());
    keys
}

/// The term under the cursor and every indexed occurrence of it, from all three
/// indexes, once per location, ordered by document then position.
pub fn resolve_locations(
    index: &WorkspaceIndex,
    path: &Path,
    position: Position,
) -> Option<(CursorToken, Vec<IndexLocation>)> {
    let token = index.token_at_position(path, position)?;

    let mut unique: BTreeMap<(PathBuf, (u32, u32, u32, u32)), IndexLocation> = BTreeMap::new();
    for key in lookup_keys(index, path, &token.text) {
        for location in index
            .get_prefixes(&key)
            .iter()
            .chain(index.get_subjects(&key))
            .chain(index.get_symbols(&key))
        {
            unique
                .entry((location.path.clone(), location.range.sort_key()))
                .or_insert_with(|| location.clone());
        }
    }

    Some((token, unique.into_values().collect()))
}

/// Any indexed occurrence of the label is a target; declaration sites are not
/// distinguished from uses.
pub fn goto_definition(
    index: &WorkspaceIndex,
    cursor_position: Position,
    path: &Path,
) -> Option<Vec<Location>> {
    let (_, locations) = resolve_locations(index, path, cursor_position)?;

    Some(
        locations
            .iter()
            .filter_map(IndexLocation::to_lsp_location)
            .collect(),
    )
}
