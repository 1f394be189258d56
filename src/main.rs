use notion_proxy::config::config_search_paths;
use notion_proxy::{build_router, AppState, ProxyConfig, UpstreamClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "notion-proxy",
    about = "OpenAI- and Anthropic-compatible API in front of Notion AI",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notion_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    config.validate()?;
    let cookie = config.resolve_cookie()?;
    let master_key = config.resolve_master_key();
    let upstream = UpstreamClient::new(&config, &cookie)?;

    info!("notion-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", upstream.inference_url());
    info!("  Space:     {}", config.upstream.space_id);
    info!("  Port:      {}", config.port);
    info!("  Models:    {} mapped, default {}", config.models.len(), config.default_model);
    info!("  Timeout:   {}s", config.request_timeout_secs);
    if master_key.is_none() {
        warn!(
            "  Auth:      disabled ({} unset, empty or \"1\")",
            config.auth.master_key_env
        );
    }

    upstream.warmup().await;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        config: config.clone(),
        upstream,
        master_key,
        shutdown: shutdown.clone(),
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OpenAI:    POST http://localhost:{}/v1/chat/completions", config.port);
    info!("  Anthropic: POST http://localhost:{}/v1/messages", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Shut down");
    Ok(())
}

/// Resolves on Ctrl-C, cancelling every in-flight inference first.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, cancelling in-flight requests");
    shutdown.cancel();
}
