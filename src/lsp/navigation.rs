//! Location conversion between document ids and LSP locations.

use tower_lsp::lsp_types::{self, Url};

use crate::document::{GlobalState, LineIndex, Location, Position};

/// Convert an LSP position (UTF-16 column) to a byte position.
///
/// Columns past the end of a line clamp to the line's end.
pub fn position_from_lsp(line_index: &LineIndex, position: lsp_types::Position) -> Option<Position> {
    let offset = line_index.from_lsp_position(position)?;
    line_index.position_of(offset).ok()
}

/// Convert a location to an LSP location.
///
/// Document ids are URIs. An open target's line index translates byte
/// columns into UTF-16 ones; for a target that is not open the byte
/// columns are passed through unchanged.
pub fn to_lsp_location(state: &GlobalState, location: &Location) -> Option<lsp_types::Location> {
    let uri = Url::parse(location.source_id()).ok()?;
    let interval = location.interval();
    let range = match state.document(location.source_id()) {
        Some(document) => document.line_index().interval_to_range(&interval).ok()?,
        None => {
            let (start, end) = (interval.start(), interval.end());
            lsp_types::Range::new(
                lsp_types::Position::new(start.line, start.column),
                lsp_types::Position::new(end.line, end.column + 1),
            )
        }
    };
    Some(lsp_types::Location::new(uri, range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Interval;
    use tower_lsp::lsp_types::Position;

    #[test]
    fn converts_open_document_location() {
        let state = GlobalState::default();
        state.open("file:///a.pure", "Class é b\n".to_string());
        let location = Location::new(
            "file:///a.pure",
            Interval::from_coords(0, 9, 0, 9).unwrap(),
        );

        let lsp = to_lsp_location(&state, &location).unwrap();
        assert_eq!(lsp.uri.as_str(), "file:///a.pure");
        // 'é' is two bytes but one UTF-16 unit
        assert_eq!(lsp.range.start, Position::new(0, 8));
        assert_eq!(lsp.range.end, Position::new(0, 9));
    }

    #[test]
    fn lsp_position_to_byte_position() {
        let line_index = LineIndex::new("é = 1\nab\n".to_string());
        assert_eq!(
            position_from_lsp(&line_index, Position::new(0, 1)),
            Some(crate::document::Position::new(0, 2))
        );
        assert_eq!(
            position_from_lsp(&line_index, Position::new(1, 40)),
            Some(crate::document::Position::new(1, 2))
        );
        assert_eq!(position_from_lsp(&line_index, Position::new(7, 0)), None);
    }

    #[test]
    fn closed_document_keeps_byte_columns() {
        let state = GlobalState::default();
        let location = Location::new(
            "file:///missing.pure",
            Interval::from_coords(2, 4, 2, 9).unwrap(),
        );
        let lsp = to_lsp_location(&state, &location).unwrap();
        assert_eq!(lsp.uri.as_str(), "file:///missing.pure");
        assert_eq!(lsp.range.start, Position::new(2, 4));
        assert_eq!(lsp.range.end, Position::new(2, 10));
    }

    #[test]
    fn non_uri_document_ids_have_no_location() {
        let state = GlobalState::default();
        state.open("doc", "Class a\n".to_string());
        let location = Location::new("doc", Interval::from_coords(0, 0, 0, 0).unwrap());
        assert!(to_lsp_location(&state, &location).is_none());
    }
}
