//! Interface to the per-grammar handlers.
//!
//! Each sub-grammar (the `Mapping` in `###Mapping`) is served by a
//! [`GrammarHandler`] registered under its name. Handlers are opaque: they
//! receive a section's text through [`SectionState`] and return
//! declarations, diagnostics and completions in document coordinates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::document::{Location, Position, SectionState};
use crate::reference::ReferenceResolver;

/// A named entity declared in a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub identifier: String,
    pub kind: String,
    pub location: Location,
    pub children: Vec<Declaration>,
}

impl Declaration {
    pub fn new(identifier: impl Into<String>, kind: impl Into<String>, location: Location) -> Self {
        Self {
            identifier: identifier.into(),
            kind: kind.into(),
            location,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Declaration>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSource {
    Parser,
    Compiler,
}

impl fmt::Display for DiagnosticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSource::Parser => write!(f, "parser"),
            DiagnosticSource::Compiler => write!(f, "compiler"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Location,
    pub severity: Severity,
    pub message: String,
    pub source: DiagnosticSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub detail: Option<String>,
    pub insert_text: Option<String>,
}

impl Completion {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: None,
            insert_text: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A command a handler offers for a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCommand {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed(String),
    Cancelled,
    Failed(String),
}

/// How a section changed when its document was re-segmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionChange {
    /// A fresh section state with an empty property store.
    Created,
    /// A reused section state whose line range or text changed.
    Updated,
    /// The section state was dropped.
    Removed,
}

/// Handler for one sub-grammar.
///
/// Every operation except `name` has a default so handlers only implement
/// what their grammar supports.
pub trait GrammarHandler: Send + Sync {
    /// Grammar name as written after `###`.
    fn name(&self) -> &str;

    fn declarations(&self, _section: &SectionState) -> Vec<Declaration> {
        Vec::new()
    }

    /// Parse/compile diagnostics. May run long; poll `token`.
    fn diagnostics(&self, _section: &SectionState, _token: &CancellationToken) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn completions(&self, _section: &SectionState, _position: Position) -> Vec<Completion> {
        Vec::new()
    }

    fn commands(&self, _section: &SectionState) -> Vec<SectionCommand> {
        Vec::new()
    }

    fn execute_command(
        &self,
        _section: &SectionState,
        command: &str,
        _token: &CancellationToken,
    ) -> CommandOutcome {
        CommandOutcome::Failed(format!("unsupported command: {}", command))
    }

    /// Called after re-segmentation so the handler can drop derived state
    /// (typically entries in `section.properties()`).
    fn on_section_changed(&self, _section: &SectionState, _change: SectionChange) {}

    /// Capability hook: handlers that discover references return themselves.
    fn as_reference_provider(&self) -> Option<&dyn ReferenceProvider> {
        None
    }
}

/// Extended capability: reference discovery.
pub trait ReferenceProvider: Send + Sync {
    fn references(&self, section: &SectionState) -> Vec<ReferenceResolver>;
}

/// Handlers keyed by grammar name.
#[derive(Clone, Default)]
pub struct GrammarRegistry {
    handlers: HashMap<String, Arc<dyn GrammarHandler>>,
}

impl fmt::Debug for GrammarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("GrammarRegistry")
            .field("grammars", &names)
            .finish()
    }
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn GrammarHandler>) {
        let name = handler.name().to_string();
        if self.handlers.insert(name.clone(), handler).is_some() {
            log::warn!(target: "seclsp::grammar", "replaced handler for grammar '{}'", name);
        }
    }

    pub fn with(mut self, handler: Arc<dyn GrammarHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler(&self, grammar_name: &str) -> Option<Arc<dyn GrammarHandler>> {
        self.handlers.get(grammar_name).cloned()
    }

    /// The handler for `grammar_name` if it provides references.
    ///
    /// `None` is a normal outcome: most grammars have no references.
    pub fn reference_provider(&self, grammar_name: &str) -> Option<Arc<dyn GrammarHandler>> {
        self.handlers
            .get(grammar_name)
            .filter(|handler| handler.as_reference_provider().is_some())
            .cloned()
    }

    pub fn grammar_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
