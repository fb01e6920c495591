use anyhow::Context as _;
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

pub use ogc_mcp_test_support::{KillOnDrop, MockUpstream, pick_unused_port};

/// A backend process bound to an ephemeral port; killed on drop.
pub struct Backend {
    pub base_url: String,
    _child: KillOnDrop,
    _dir: tempfile::TempDir,
}

/// Write `config` to a temp file, start the backend on it, and wait for `/health`.
pub async fn spawn_backend(config: &Value) -> anyhow::Result<Backend> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, serde_json::to_vec_pretty(config)?)?;

    let port = pick_unused_port()?;
    let child = spawn_process(&config_path, port)?;
    let base_url = format!("http://127.0.0.1:{port}");
    let backend = Backend {
        base_url,
        _child: KillOnDrop(child),
        _dir: dir,
    };
    ogc_mcp_test_support::wait_http_ok(
        &format!("{}/health", backend.base_url),
        Duration::from_secs(15),
    )
    .await?;
    Ok(backend)
}

fn spawn_process(config_path: &Path, port: u16) -> anyhow::Result<std::process::Child> {
    let bin = env!("CARGO_BIN_EXE_ogc-mcp-backend");
    Command::new(bin)
        .arg("--config")
        .arg(config_path)
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .env_remove("RUST_LOG")
        .env_remove("OGC_MCP_BIND")
        .stdout(Stdio::null())
        .spawn()
        .context("spawn ogc-mcp-backend")
}
