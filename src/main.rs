use std::sync::Arc;

use slack_assist::config::Config;
use slack_assist::openai::{AssistantBackend, OpenAiGateway};
use slack_assist::orchestrator::{AiMode, Orchestrator};
use slack_assist::signature::SignatureVerifier;
use slack_assist::slack::client::{ChatApi, SlackClient};
use slack_assist::slack::socket::SocketModeClient;
use slack_assist::slack::webhook::{WebhookState, webhook_routes};
use slack_assist::store::{BindingStore, LibSqlStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export SLACK_BOT_TOKEN=xoxb-...");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    eprintln!("🤖 Slack Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/slack/events/assistant", config.port);
    eprintln!("   Chat webhook: http://0.0.0.0:{}/slack/events/chat", config.port);
    if config.app_token.is_some() {
        eprintln!("   Socket Mode: enabled");
    }

    // ── Store ────────────────────────────────────────────────────────────
    let store: Arc<dyn BindingStore> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );

    // ── Slack + OpenAI wiring ────────────────────────────────────────────
    let chat: Arc<dyn ChatApi> = Arc::new(SlackClient::new(config.bot_token.clone()));
    let backend: Arc<dyn AssistantBackend> = Arc::new(OpenAiGateway::new(
        config.openai_api_key.clone(),
        config.assistant_id.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(chat, backend, store));

    // ── Socket Mode (optional) ───────────────────────────────────────────
    if let Some(app_token) = config.app_token.clone() {
        let socket = SocketModeClient::new(
            app_token,
            Arc::clone(&orchestrator),
            AiMode::Assistant,
        );
        tokio::spawn(async move {
            socket.run().await;
        });
    }

    // ── Webhook server ───────────────────────────────────────────────────
    let verifier = Arc::new(SignatureVerifier::new(config.signing_secret.clone()));
    let app = webhook_routes(WebhookState {
        verifier,
        orchestrator,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
