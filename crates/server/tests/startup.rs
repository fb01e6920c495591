use std::process::Command;

fn run_with_config(contents: &str) -> anyhow::Result<std::process::Output> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, contents)?;
    let output = Command::new(env!("CARGO_BIN_EXE_ogc-mcp-backend"))
        .arg("--config")
        .arg(&config_path)
        .arg("--bind")
        .arg("127.0.0.1:0")
        .env_remove("RUST_LOG")
        .output()?;
    Ok(output)
}

#[test]
fn mistyped_config_value_is_reported_at_startup() -> anyhow::Result<()> {
    let output = run_with_config(
        r#"{"AUTH_TOKEN": "secret", "PORT": "3001", "OGC": {"HOST": "http://127.0.0.1:9"}}"#,
    )?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid OGC service configuration"), "{stderr}");
    assert!(stderr.contains("cannot parse"), "{stderr}");
    assert!(stderr.contains("invalid type"), "{stderr}");
    Ok(())
}

#[test]
fn missing_ogc_section_fails_without_parse_noise() -> anyhow::Result<()> {
    let output = run_with_config(r#"{"AUTH_TOKEN": "secret"}"#)?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing OGC"), "{stderr}");
    assert!(!stderr.contains("cannot parse"), "{stderr}");
    Ok(())
}
