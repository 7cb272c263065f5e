//! Diagnostics conversion from handler diagnostics to LSP diagnostics.

use tower_lsp::lsp_types::{self, DiagnosticSeverity, NumberOrString};

use crate::document::LineIndex;
use crate::grammar::{Diagnostic, DiagnosticSource, Severity};

fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

fn code(source: DiagnosticSource) -> &'static str {
    match source {
        DiagnosticSource::Parser => "parse-error",
        DiagnosticSource::Compiler => "compile-error",
    }
}

/// Convert the diagnostics located in `document_id` to LSP diagnostics.
///
/// Diagnostics about other documents, and those whose interval no longer
/// fits the text, are skipped.
pub fn to_diagnostics(
    diagnostics: &[Diagnostic],
    document_id: &str,
    line_index: &LineIndex,
) -> Vec<lsp_types::Diagnostic> {
    diagnostics
        .iter()
        .filter(|d| d.location.source_id() == document_id)
        .filter_map(|d| {
            let range = match line_index.interval_to_range(&d.location.interval()) {
                Ok(range) => range,
                Err(e) => {
                    log::debug!(target: "seclsp::lsp", "dropping diagnostic '{}': {}", d.message, e);
                    return None;
                }
            };
            Some(lsp_types::Diagnostic {
                range,
                severity: Some(severity(d.severity)),
                code: Some(NumberOrString::String(code(d.source).to_string())),
                code_description: None,
                source: Some(d.source.to_string()),
                message: d.message.clone(),
                related_information: None,
                tags: None,
                data: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Interval, Location};
    use tower_lsp::lsp_types::Position;

    fn diagnostic(source_id: &str, interval: Interval, source: DiagnosticSource) -> Diagnostic {
        Diagnostic {
            location: Location::new(source_id, interval),
            severity: Severity::Warning,
            message: "unexpected token".to_string(),
            source,
        }
    }

    #[test]
    fn converts_interval_and_source() {
        let line_index = LineIndex::new("###Mapping\nMapping b\n".to_string());
        let interval = Interval::from_coords(1, 8, 1, 8).unwrap();
        let diagnostics = to_diagnostics(
            &[diagnostic("doc", interval, DiagnosticSource::Parser)],
            "doc",
            &line_index,
        );

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(1, 8));
        assert_eq!(diagnostics[0].range.end, Position::new(1, 9));
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(diagnostics[0].source, Some("parser".to_string()));
        assert_eq!(
            diagnostics[0].code,
            Some(NumberOrString::String("parse-error".to_string()))
        );
    }

    #[test]
    fn skips_other_documents_and_stale_intervals() {
        let line_index = LineIndex::new("x".to_string());
        let inside = Interval::from_coords(0, 0, 0, 0).unwrap();
        let stale = Interval::from_coords(4, 0, 4, 2).unwrap();
        let diagnostics = to_diagnostics(
            &[
                diagnostic("other", inside, DiagnosticSource::Compiler),
                diagnostic("doc", stale, DiagnosticSource::Compiler),
                diagnostic("doc", inside, DiagnosticSource::Compiler),
            ],
            "doc",
            &line_index,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].source, Some("compiler".to_string()));
    }
}
