//! Document outline: one symbol per section, with declarations nested inside.

use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

use crate::document::{DocumentState, LineIndex};
use crate::grammar::Declaration;

fn symbol_kind(kind: &str) -> SymbolKind {
    match kind.to_ascii_lowercase().as_str() {
        "class" => SymbolKind::CLASS,
        "enum" | "enumeration" => SymbolKind::ENUM,
        "function" => SymbolKind::FUNCTION,
        "property" => SymbolKind::PROPERTY,
        "association" => SymbolKind::INTERFACE,
        "profile" | "package" => SymbolKind::PACKAGE,
        _ => SymbolKind::OBJECT,
    }
}

#[allow(deprecated)]
fn declaration_symbol(declaration: &Declaration, line_index: &LineIndex) -> Option<DocumentSymbol> {
    let range = line_index
        .interval_to_range(&declaration.location.interval())
        .ok()?;
    let children: Vec<DocumentSymbol> = declaration
        .children
        .iter()
        .filter_map(|child| declaration_symbol(child, line_index))
        .collect();

    Some(DocumentSymbol {
        name: declaration.identifier.clone(),
        detail: Some(declaration.kind.clone()),
        kind: symbol_kind(&declaration.kind),
        tags: None,
        deprecated: None,
        range,
        selection_range: range,
        children: (!children.is_empty()).then_some(children),
    })
}

/// Build the outline of `document` from the declarations its handlers found.
#[allow(deprecated)]
pub fn document_symbols(
    document: &DocumentState,
    declarations: &[Declaration],
) -> Vec<DocumentSymbol> {
    let line_index = document.line_index();
    let mut symbols = Vec::new();

    document.for_each_section(|section| {
        let Ok(location) = section.location() else {
            return;
        };
        let Ok(range) = line_index.interval_to_range(&location.interval()) else {
            return;
        };
        let children: Vec<DocumentSymbol> = declarations
            .iter()
            .filter(|d| location.subsumes(&d.location, false))
            .filter_map(|d| declaration_symbol(d, &line_index))
            .collect();

        let selection_range = match section.section().declaration_line {
            Some(line) => line_index
                .line_content(line)
                .ok()
                .and_then(|content| {
                    let start = line_index.line_start(line).ok()?;
                    let start_pos = line_index.to_lsp_position(start).ok()?;
                    let end_pos = line_index.to_lsp_position(start + content.len()).ok()?;
                    Some(tower_lsp::lsp_types::Range::new(start_pos, end_pos))
                })
                .unwrap_or(range),
            None => range,
        };

        symbols.push(DocumentSymbol {
            name: section.grammar_name(),
            detail: Some("section".to_string()),
            kind: SymbolKind::NAMESPACE,
            tags: None,
            deprecated: None,
            range,
            selection_range,
            children: (!children.is_empty()).then_some(children),
        });
    });

    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{GlobalState, Interval, Location};
    use tower_lsp::lsp_types::Position;

    #[test]
    fn sections_become_namespaces_with_declarations() {
        let state = GlobalState::default();
        let doc = state.open("doc", "Class a\n###Mapping\nMapping b\n".to_string());
        let declarations = vec![
            Declaration::new(
                "a",
                "Class",
                Location::new("doc", Interval::from_coords(0, 6, 0, 6).unwrap()),
            ),
            Declaration::new(
                "b",
                "Mapping",
                Location::new("doc", Interval::from_coords(2, 8, 2, 8).unwrap()),
            ),
        ];

        let symbols = document_symbols(&doc, &declarations);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "Pure");
        assert_eq!(symbols[0].kind, SymbolKind::NAMESPACE);
        let pure_children = symbols[0].children.as_ref().unwrap();
        assert_eq!(pure_children.len(), 1);
        assert_eq!(pure_children[0].kind, SymbolKind::CLASS);

        assert_eq!(symbols[1].name, "Mapping");
        assert_eq!(symbols[1].selection_range.start, Position::new(1, 0));
        assert_eq!(symbols[1].selection_range.end, Position::new(1, 10));
        let mapping_children = symbols[1].children.as_ref().unwrap();
        assert_eq!(mapping_children[0].name, "b");
        assert_eq!(mapping_children[0].kind, SymbolKind::OBJECT);
    }
}
