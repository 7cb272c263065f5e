//! Completion conversion for LSP.

use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, CompletionResponse};

use crate::grammar::Completion;

/// Convert handler completions into an LSP response.
///
/// Returns None when there is nothing to offer so clients can fall back to
/// their own word completion.
pub fn to_completion_response(completions: Vec<Completion>) -> Option<CompletionResponse> {
    if completions.is_empty() {
        return None;
    }

    let items = completions
        .into_iter()
        .enumerate()
        .map(|(i, completion)| CompletionItem {
            // Keep the handler's ordering.
            sort_text: Some(format!("{:04}_{}", i, completion.label)),
            label: completion.label,
            kind: Some(CompletionItemKind::KEYWORD),
            detail: completion.detail,
            insert_text: completion.insert_text,
            ..Default::default()
        })
        .collect();

    Some(CompletionResponse::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_completions_yield_none() {
        assert!(to_completion_response(Vec::new()).is_none());
    }

    #[test]
    fn preserves_handler_order() {
        let response = to_completion_response(vec![
            Completion::new("Mapping").with_detail("section"),
            Completion::new("Class"),
        ])
        .unwrap();

        let CompletionResponse::Array(items) = response else {
            panic!("expected array response");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "Mapping");
        assert_eq!(items[0].detail.as_deref(), Some("section"));
        assert!(items[0].sort_text < items[1].sort_text);
    }
}
