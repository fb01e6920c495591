//! HTTP surface: the MCP streamable-HTTP endpoint at `/mcp` plus a health check.

use crate::tools::{OgcTools, ToolServices};
use axum::Json;
use axum::Router;
use axum::routing::get;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build the router. Each MCP session gets its own handler over the shared `services`.
pub fn router(services: Arc<ToolServices>, cancel: &CancellationToken) -> Router {
    let mcp: StreamableHttpService<OgcTools, LocalSessionManager> = StreamableHttpService::new(
        move || Ok(OgcTools::new(Arc::clone(&services))),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            cancellation_token: cancel.child_token(),
            ..Default::default()
        },
    );

    Router::new()
        .route("/health", get(health))
        .nest_service("/mcp", mcp)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serve until `shutdown` resolves; open MCP sessions are cancelled first.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<S>(
    listener: TcpListener,
    services: Arc<ToolServices>,
    shutdown: S,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let app = router(services, &cancel);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            cancel.cancel();
        })
        .await
}
