//! Handler requests routed through the state hierarchy.
//!
//! Each query locates the relevant sections of a document and forwards to
//! the handlers bound to them. Sections without a handler contribute nothing.

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::grammar::{CommandOutcome, Completion, Declaration, Diagnostic, SectionCommand};
use crate::reference::{resolver_at, ReferenceResolver};

use super::location::{Location, Position};
use super::state::GlobalState;

impl GlobalState {
    /// Diagnostics of every section, in document order.
    ///
    /// Stops early, returning what was collected, once `token` is cancelled.
    pub fn diagnostics(&self, id: &str, token: &CancellationToken) -> Result<Vec<Diagnostic>> {
        let document = self.require_document(id)?;
        let mut diagnostics = Vec::new();
        for section in document.sections() {
            if token.is_cancelled() {
                log::debug!(target: "seclsp::queries", "diagnostics for {} cancelled", id);
                break;
            }
            if let Some(handler) = section.handler() {
                diagnostics.extend(handler.diagnostics(&section, token));
            }
        }
        Ok(diagnostics)
    }

    /// Declarations of every section, in document order.
    pub fn declarations(&self, id: &str) -> Result<Vec<Declaration>> {
        let document = self.require_document(id)?;
        let mut declarations = Vec::new();
        document.for_each_section(|section| {
            if let Some(handler) = section.handler() {
                declarations.extend(handler.declarations(section));
            }
        });
        Ok(declarations)
    }

    /// Completions from the section under `position`.
    pub fn completions(&self, id: &str, position: Position) -> Result<Vec<Completion>> {
        let document = self.require_document(id)?;
        let Some(section) = document.section_at(position) else {
            return Ok(Vec::new());
        };
        Ok(section
            .handler()
            .map(|handler| handler.completions(&section, position))
            .unwrap_or_default())
    }

    /// Commands offered by the section containing `line`.
    pub fn commands(&self, id: &str, line: u32) -> Result<Vec<SectionCommand>> {
        let document = self.require_document(id)?;
        let Some(section) = document.section_at_line(line) else {
            return Ok(Vec::new());
        };
        Ok(section
            .handler()
            .map(|handler| handler.commands(&section))
            .unwrap_or_default())
    }

    /// Run a handler command for the section containing `line`.
    pub fn execute_command(
        &self,
        id: &str,
        line: u32,
        command: &str,
        token: &CancellationToken,
    ) -> Result<CommandOutcome> {
        let document = self.require_document(id)?;
        let section = document.section_at_line(line).ok_or_else(|| {
            let valid = format!("0..={}", document.line_index().line_count() - 1);
            Error::bounds("line", line as usize, valid)
        })?;
        let Some(handler) = section.handler() else {
            return Ok(CommandOutcome::Failed(format!(
                "no handler for grammar '{}'",
                section.grammar_name()
            )));
        };
        if token.is_cancelled() {
            return Ok(CommandOutcome::Cancelled);
        }
        log::debug!(
            target: "seclsp::queries",
            "executing '{}' in {} line {}",
            command,
            id,
            line
        );
        Ok(handler.execute_command(&section, command, token))
    }

    /// Reference resolvers of every section whose grammar provides them.
    pub fn references(&self, id: &str) -> Result<Vec<ReferenceResolver>> {
        let document = self.require_document(id)?;
        let mut resolvers = Vec::new();
        document.for_each_section(|section| {
            let provider = section
                .handler()
                .and_then(|handler| handler.as_reference_provider());
            if let Some(provider) = provider {
                resolvers.extend(provider.references(section));
            }
        });
        Ok(resolvers)
    }

    /// Target of the reference under `position`.
    ///
    /// An unresolvable reference, or no reference at all, is `Ok(None)`.
    pub fn definition(&self, id: &str, position: Position) -> Result<Option<Location>> {
        let document = self.require_document(id)?;
        let Some(section) = document.section_at(position) else {
            return Ok(None);
        };
        let Some(provider) = section
            .handler()
            .and_then(|handler| handler.as_reference_provider())
        else {
            return Ok(None);
        };

        let resolvers = provider.references(&section);
        let Some(resolver) = resolver_at(&resolvers, id, position) else {
            return Ok(None);
        };

        let context = self.resolution_context();
        match resolver.resolve_with(context.as_deref()) {
            Ok(location) => Ok(Some(location)),
            Err(Error::ResolutionFailed { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }
}
