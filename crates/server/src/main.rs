use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use ogc_mcp_backend::app;
use ogc_mcp_backend::{BearerGate, ToolServices};
use ogc_mcp_client::http::redact_url;
use ogc_mcp_client::{AppConfig, OgcApiClient, read_config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ogc-mcp-backend", version, about = "MCP tools for OGC API - Processes")]
struct Args {
    /// JSON config file. A missing or unreadable file falls back to defaults.
    #[arg(long, env = "OGC_MCP_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Listen address; overrides `HOST`/`PORT` from the config.
    #[arg(long, env = "OGC_MCP_BIND")]
    bind: Option<String>,

    /// Default tracing filter. `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    let (config, load_error) = match read_config(&args.config) {
        Ok(config) => (config, None),
        Err(e) => {
            warn!(error = %e, "using empty config");
            (AppConfig::default(), Some(e))
        }
    };
    let endpoint = config.ogc_endpoint().with_context(|| match &load_error {
        Some(e) => format!("invalid OGC service configuration ({e})"),
        None => "invalid OGC service configuration".to_string(),
    })?;
    let client = OgcApiClient::new(&endpoint).context("build OGC client")?;
    let gate = BearerGate::from_config(&config);
    if !gate.is_configured() {
        warn!("AUTH_TOKEN is not set; every tool call will be rejected");
    }

    let bind = args
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.bind_host(), config.bind_port()));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(
        upstream = %redact_url(&endpoint.base_url),
        retries = endpoint.retry.max_attempts(),
        "ogc-mcp-backend starting"
    );

    let services = Arc::new(ToolServices::new(client, gate));
    app::serve(listener, services, shutdown_signal())
        .await
        .context("serve")?;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
