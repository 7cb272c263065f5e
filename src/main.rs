use seclsp::{create_service, GrammarRegistry};
use tower_lsp::Server;

#[tokio::main]
async fn main() {
    // stdout carries the protocol stream
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = create_service(GrammarRegistry::new());
    Server::new(stdin, stdout, socket).serve(service).await;
}
