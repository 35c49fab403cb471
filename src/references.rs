use std::path::Path;

use tower_lsp::lsp_types::{Location, Position};

use crate::gotodef::resolve_locations;
use crate::workspace::{IndexLocation, WorkspaceIndex};

/// Same union as go-to-definition.
pub fn references(
    index: &WorkspaceIndex,
    cursor_position: Position,
    path: &Path,
) -> Option<Vec<Location>> {
    let (_, locations) = resolve_locations(index, path, cursor_position)?;

    Some(
        locations
            .iter()
            .filter_map(IndexLocation::to_lsp_location)
            .collect::<Vec<_>>(),
    )
}
