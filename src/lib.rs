//! Language server core for documents split into grammar sections.
//!
//! A document is divided into sections by `###Name` declaration lines; each
//! section is served by the [`GrammarHandler`] registered for its grammar.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{
    CodeActionOrCommand, CodeActionParams, CodeActionProviderCapability, CodeActionResponse,
    Command, CompletionOptions, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentSymbolParams,
    DocumentSymbolResponse, ExecuteCommandOptions, ExecuteCommandParams, GotoDefinitionParams,
    GotoDefinitionResponse, InitializeParams, InitializeResult, InitializedParams, LSPAny,
    MessageType, OneOf, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind, Url,
};
use tower_lsp::{Client, LanguageServer, LspService};

mod cancel;
mod document;
mod error;
mod grammar;
mod lsp;
mod properties;
mod reference;
mod settings;

pub use cancel::{CancelOnDrop, CancellationRegistry, CancellationToken};
pub use document::{
    DocumentState, GlobalState, Interval, LineIndex, Location, Position, Section,
    SectionSegmenter, SectionState, DEFAULT_GRAMMAR,
};
pub use error::{Error, Result};
pub use grammar::{
    CommandOutcome, Completion, Declaration, Diagnostic, DiagnosticSource, GrammarHandler,
    GrammarRegistry, ReferenceProvider, SectionChange, SectionCommand, Severity,
};
pub use lsp::{
    document_symbols, position_from_lsp, to_completion_response, to_diagnostics, to_lsp_location,
};
pub use properties::{PropertyStore, PropertyValue};
pub use reference::{resolver_at, ReferenceResolver, ResolutionContext, ResolutionError};
pub use settings::{discover_settings, load_settings, parse_settings, SectionSettings, Settings};

/// Workspace command that runs a section command.
///
/// Arguments: `[uri, line, command id]`.
pub const SECTION_COMMAND: &str = "seclsp.sectionCommand";

pub struct Backend {
    client: Client,
    grammars: GrammarRegistry,
    state: OnceLock<Arc<GlobalState>>,
    next_request: AtomicU64,
}

impl Backend {
    pub(crate) fn new(client: Client, grammars: GrammarRegistry) -> Self {
        Self {
            client,
            grammars,
            state: OnceLock::new(),
            next_request: AtomicU64::new(0),
        }
    }

    /// The global state, created with default settings if `initialize` has
    /// not installed one yet.
    fn state(&self) -> &Arc<GlobalState> {
        self.state.get_or_init(|| {
            Arc::new(GlobalState::new(
                self.grammars.clone(),
                SectionSegmenter::default(),
            ))
        })
    }

    /// Collect diagnostics from every section and publish them.
    ///
    /// A newer run for the same document cancels the previous one; a
    /// cancelled run publishes nothing.
    async fn publish_diagnostics(&self, uri: Url, version: Option<i32>) {
        let state = Arc::clone(self.state());
        let document_id = uri.to_string();
        let token_id = format!("diagnostics:{}", document_id);
        state.cancellations().cancel(&token_id);
        let token = state.cancellations().issue(token_id);
        let guard = CancelOnDrop::new(token.clone());

        let result = tokio::task::spawn_blocking(move || {
            let line_index = state.require_document(&document_id)?.line_index();
            let diagnostics = state.diagnostics(&document_id, &token)?;
            let converted = to_diagnostics(&diagnostics, &document_id, &line_index);
            Ok::<_, Error>((converted, token.is_cancelled()))
        })
        .await;
        guard.disarm();

        match result {
            Ok(Ok((diagnostics, false))) => {
                self.client
                    .publish_diagnostics(uri, diagnostics, version)
                    .await;
            }
            Ok(Ok((_, true))) => {
                log::debug!(target: "seclsp::server", "diagnostics for {} superseded", uri);
            }
            Ok(Err(e)) => {
                log::warn!(target: "seclsp::server", "diagnostics for {} failed: {}", uri, e);
            }
            Err(e) => {
                log::error!(target: "seclsp::server", "diagnostics task for {} panicked: {}", uri, e);
            }
        }
    }

    fn section_position(
        &self,
        uri: &Url,
        position: tower_lsp::lsp_types::Position,
    ) -> Option<Position> {
        let document = self.state().document(uri.as_str())?;
        position_from_lsp(&document.line_index(), position)
    }
}

/// Split `[uri, line, command id]` command arguments.
fn command_arguments(arguments: &[LSPAny]) -> Option<(String, u32, String)> {
    let [uri, line, command] = arguments else {
        return None;
    };
    let line = u32::try_from(line.as_u64()?).ok()?;
    Some((uri.as_str()?.to_string(), line, command.as_str()?.to_string()))
}

fn invalid_params(message: impl Into<String>) -> jsonrpc::Error {
    jsonrpc::Error::invalid_params(message.into())
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        // Extract workspace root from params
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            // Discover settings by walking up the directory tree
            let (settings, settings_dir) = settings::discover_settings(&root);
            log::info!(
                target: "seclsp::server",
                "default grammar '{}' (settings from {})",
                settings.default_grammar(),
                settings_dir.display()
            );
            let state = Arc::new(GlobalState::new(
                self.grammars.clone(),
                settings.segmenter(),
            ));
            if self.state.set(state).is_err() {
                log::warn!(
                    target: "seclsp::server",
                    "state already in use, settings from {} ignored",
                    root.display()
                );
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![SECTION_COMMAND.to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let grammars = self.grammars.grammar_names().join(", ");
        self.client
            .log_message(
                MessageType::INFO,
                format!("seclsp initialized (grammars: {})", grammars),
            )
            .await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        self.state().open(uri.as_str(), params.text_document.text);
        self.publish_diagnostics(uri, Some(params.text_document.version))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        let Some(change) = params.content_changes.into_iter().next() else {
            return;
        };
        let uri = params.text_document.uri;
        if let Err(e) = self.state().change(uri.as_str(), change.text.clone()) {
            log::warn!(target: "seclsp::server", "{}; opening it instead", e);
            self.state().open(uri.as_str(), change.text);
        }
        self.publish_diagnostics(uri, Some(params.text_document.version))
            .await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        let state = self.state();
        state
            .cancellations()
            .cancel(&format!("diagnostics:{}", uri));
        if let Err(e) = state.close(uri.as_str()) {
            log::debug!(target: "seclsp::server", "close: {}", e);
        }
        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn completion(
        &self,
        params: CompletionParams,
    ) -> jsonrpc::Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let Some(position) = self.section_position(uri, params.text_document_position.position)
        else {
            return Ok(None);
        };

        match self.state().completions(uri.as_str(), position) {
            Ok(completions) => Ok(to_completion_response(completions)),
            Err(e) => {
                log::debug!(target: "seclsp::server", "completion: {}", e);
                Ok(None)
            }
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> jsonrpc::Result<Option<GotoDefinitionResponse>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let Some(position) =
            self.section_position(uri, params.text_document_position_params.position)
        else {
            return Ok(None);
        };

        let state = self.state();
        let target = match state.definition(uri.as_str(), position) {
            Ok(target) => target,
            Err(e) => {
                log::debug!(target: "seclsp::server", "definition: {}", e);
                None
            }
        };
        Ok(target
            .and_then(|location| to_lsp_location(state, &location))
            .map(GotoDefinitionResponse::Scalar))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> jsonrpc::Result<Option<DocumentSymbolResponse>> {
        let id = params.text_document.uri.as_str();
        let state = self.state();
        let Some(document) = state.document(id) else {
            return Ok(None);
        };
        let declarations = state.declarations(id).unwrap_or_default();
        Ok(Some(DocumentSymbolResponse::Nested(document_symbols(
            &document,
            &declarations,
        ))))
    }

    async fn code_action(
        &self,
        params: CodeActionParams,
    ) -> jsonrpc::Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        let line = params.range.start.line;
        let commands = self
            .state()
            .commands(uri.as_str(), line)
            .unwrap_or_default();
        if commands.is_empty() {
            return Ok(None);
        }

        let actions = commands
            .into_iter()
            .map(|command| {
                CodeActionOrCommand::Command(Command {
                    title: command.title,
                    command: SECTION_COMMAND.to_string(),
                    arguments: Some(vec![
                        LSPAny::String(uri.to_string()),
                        LSPAny::from(line),
                        LSPAny::String(command.id),
                    ]),
                })
            })
            .collect();
        Ok(Some(actions))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> jsonrpc::Result<Option<LSPAny>> {
        if params.command != SECTION_COMMAND {
            return Err(invalid_params(format!(
                "unknown command '{}'",
                params.command
            )));
        }
        let (uri, line, command) = command_arguments(&params.arguments)
            .ok_or_else(|| invalid_params("expected [uri, line, command]"))?;

        let state = Arc::clone(self.state());
        let request = self.next_request.fetch_add(1, Ordering::Relaxed);
        let token = state.cancellations().issue(format!("command-{}", request));
        // Dropping this request future cancels the worker's token.
        let guard = CancelOnDrop::new(token.clone());

        let result =
            tokio::task::spawn_blocking(move || state.execute_command(&uri, line, &command, &token))
                .await;
        guard.disarm();

        match result {
            Ok(Ok(CommandOutcome::Completed(message))) => Ok(Some(LSPAny::String(message))),
            Ok(Ok(CommandOutcome::Cancelled)) => Err(jsonrpc::Error {
                code: jsonrpc::ErrorCode::RequestCancelled,
                message: "command cancelled".into(),
                data: None,
            }),
            Ok(Ok(CommandOutcome::Failed(message))) => {
                self.client.show_message(MessageType::ERROR, &message).await;
                Err(jsonrpc::Error {
                    code: jsonrpc::ErrorCode::InternalError,
                    message: message.into(),
                    data: None,
                })
            }
            Ok(Err(e)) => Err(invalid_params(e.to_string())),
            Err(e) => {
                log::error!(target: "seclsp::server", "command task panicked: {}", e);
                Err(jsonrpc::Error::internal_error())
            }
        }
    }
}

/// Create the LSP service serving documents with the given grammars.
pub fn create_service(grammars: GrammarRegistry) -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(move |client| Backend::new(client, grammars))
}
