//! `terrapin` language server over stdio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::request::{
    GotoImplementationParams, GotoImplementationResponse, GotoTypeDefinitionParams,
    GotoTypeDefinitionResponse,
};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing_subscriber::EnvFilter;

use terrapin::completion::{CompletionRequest, Context};
use terrapin::config::Settings;
use terrapin::hover::HoverRequest;
use terrapin::vocab::VocabularyCache;
use terrapin::workspace::WorkspaceIndex;
use terrapin::{diagnostics, gotodef, references, rename, symbol};

#[macro_use]
mod macros;

#[derive(Parser, Debug)]
#[command(name = "terrapin", version)]
#[command(about = "Language server for Turtle and RDF documents", long_about = None)]
struct Cli {
    /// Default log filter when TERRAPIN_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

struct Backend {
    client: Client,
    index: Arc<RwLock<WorkspaceIndex>>,
    cache: Arc<RwLock<VocabularyCache>>,
}

impl Backend {
    fn new(client: Client) -> Backend {
        let settings = Settings::default();
        Backend {
            client,
            index: Arc::new(RwLock::new(WorkspaceIndex::new(&settings, Path::new(".")))),
            cache: Arc::new(RwLock::new(VocabularyCache::from_settings(&settings))),
        }
    }

    /// The cache is cheap to clone; holding a clone keeps its lock out of
    /// any vocabulary await.
    async fn cache(&self) -> VocabularyCache {
        self.cache.read().await.clone()
    }

    async fn publish_diagnostics(&self, uri: Url, path: &Path) {
        let cache = self.cache().await;
        let diagnostics = {
            let index = self.index.read().await;
            diagnostics::diagnostics(&index, &cache, path)
        };

        if let Some(diagnostics) = diagnostics {
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }

    async fn definition(
        &self,
        params: &TextDocumentPositionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let (path, position) = params_position_path!(params);
        let index = self.index.read().await;

        Ok(gotodef::goto_definition(&index, position, &path).map(GotoDefinitionResponse::Array))
    }
}

fn root_dir(params: &InitializeParams) -> PathBuf {
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();

    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(root_uri)
        .and_then(|uri| uri.to_file_path().ok())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let root_dir = root_dir(&params);

        let settings = match Settings::new(&root_dir, params.initialization_options.as_ref()) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!("invalid settings, using defaults: {err}");
                Settings::default()
            }
        };
        tracing::info!("workspace root {}", root_dir.display());

        *self.index.write().await = WorkspaceIndex::new(&settings, &root_dir);
        *self.cache.write().await = VocabularyCache::from_settings(&settings);

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "terrapin".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![":".into()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
                implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
                references_provider: Some(OneOf::Left(true)),
                rename_provider: Some(OneOf::Left(true)),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let count = self.index.write().await.index_workspace();

        self.client
            .log_message(MessageType::INFO, format!("terrapin indexed {count} documents"))
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return;
        };

        self.index
            .write()
            .await
            .open_document(&path, &params.text_document.text);
        self.publish_diagnostics(uri, &path).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return;
        };
        // full sync: the last change holds the whole document
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        self.index.write().await.update_document(&path, &change.text);
        self.publish_diagnostics(uri, &path).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        let Ok(path) = uri.to_file_path() else {
            return;
        };

        self.index.write().await.close_document(&path);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let mut index = self.index.write().await;
        let root_dir = index.root_dir().to_path_buf();

        match Settings::new(&root_dir, Some(&params.settings)) {
            Ok(settings) => {
                index.set_settings(&settings);
                *self.cache.write().await = VocabularyCache::from_settings(&settings);
            }
            Err(err) => tracing::warn!("ignoring configuration change: {err}"),
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let (path, position) = params_position_path!(params.text_document_position);

        let request = {
            let index = self.index.read().await;
            CompletionRequest::construct(
                Context::new(&index, &path),
                position.line as usize,
                position.character as usize,
            )
        };

        let Some(request) = request else {
            return Ok(None);
        };
        let cache = self.cache().await;

        Ok(Some(request.complete(&cache).await))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        self.definition(&params.text_document_position_params).await
    }

    async fn goto_type_definition(
        &self,
        params: GotoTypeDefinitionParams,
    ) -> Result<Option<GotoTypeDefinitionResponse>> {
        self.definition(&params.text_document_position_params).await
    }

    async fn goto_implementation(
        &self,
        params: GotoImplementationParams,
    ) -> Result<Option<GotoImplementationResponse>> {
        self.definition(&params.text_document_position_params).await
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let (path, position) = params_position_path!(params.text_document_position);
        let index = self.index.read().await;

        Ok(references::references(&index, position, &path))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let path = params_path!(params.text_document_position.text_document.uri);
        let index = self.index.read().await;

        Ok(rename::rename(&index, &params, &path))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let (path, position) = params_position_path!(params.text_document_position_params);

        let request = {
            let index = self.index.read().await;
            HoverRequest::construct(&index, &path, position)
        };

        let Some(request) = request else {
            return Ok(None);
        };
        let cache = self.cache().await;

        Ok(request.hover(&cache).await)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let path = params_path!(params.text_document.uri);
        let index = self.index.read().await;

        Ok(symbol::document_symbol(&index, &path))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let index = self.index.read().await;

        Ok(symbol::workspace_symbol(&index, &params.query))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol
    let filter = EnvFilter::try_from_env("TERRAPIN_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("starting terrapin {}", env!("CARGO_PKG_VERSION"));

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
