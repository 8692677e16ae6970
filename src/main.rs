use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use anton::config::{ClientConfig, ProxyConfig};
use anton::conversation::{ConversationStore, HttpProxyClient};
use anton::gateway::{BackendGateway, HttpGateway};
use anton::proxy::build_app;

#[derive(Parser, Debug)]
#[command(name = "anton", version)]
#[command(about = "Anton onboarding proxy and terminal chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Mode {
    /// Run the same-origin proxy in front of the backend (default)
    Serve,
    /// Chat with Anton in the terminal through a running proxy
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Mode::Serve) {
        Mode::Serve => serve().await,
        Mode::Chat => chat().await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = ProxyConfig::from_env().context("invalid proxy configuration")?;

    let gateway =
        HttpGateway::from_config(&config).context("failed to build backend client")?;

    eprintln!("🤖 Anton proxy v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", gateway.base_url());
    eprintln!("   Timeout: {}s", config.request_timeout.as_secs());
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat", config.port);
    eprintln!("   User API: http://0.0.0.0:{}/api/user", config.port);
    if !config.cors_origins.is_empty() {
        eprintln!("   CORS: {}", config.cors_origins.join(", "));
    }

    let gateway: Arc<dyn BackendGateway> = Arc::new(gateway);
    let app = build_app(gateway, &config);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Proxy server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

async fn chat() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("invalid client configuration")?;
    tracing::info!(proxy = %config.proxy_url, "Starting chat session");

    let api = Arc::new(HttpProxyClient::from_config(&config).context("failed to build proxy client")?);
    let store = ConversationStore::start(api).await;

    anton::ui::terminal::run(store).await?;
    Ok(())
}
