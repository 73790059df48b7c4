//! Config load validation tests for basekit-config.
// crates/basekit-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding, overlay).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;

use basekit_config::BaseKitConfig;
use basekit_config::ConfigError;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<BaseKitConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(BaseKitConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(BaseKitConfig::load(Some(Path::new(&long_component))), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(BaseKitConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(BaseKitConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(BaseKitConfig::load(Some(&path)), "config io error")
}

#[test]
fn load_rejects_unknown_keys() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(b"[server]\nbnid = \"127.0.0.1:1\"\n").map_err(|err| err.to_string())?;
    assert_invalid(BaseKitConfig::load(Some(file.path())), "config parse error")
}

#[test]
fn load_accepts_empty_file_with_defaults() -> TestResult {
    let file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let config = BaseKitConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.server.bind != "127.0.0.1:8080" || config.api.version != "0.9" {
        return Err(format!("unexpected defaults: {config:?}"));
    }
    if config.pipeline.debug_output_validation || config.pipeline.object_id_parsing {
        return Err("pipeline switches should default off".to_string());
    }
    Ok(())
}

#[test]
fn local_overlay_overrides_single_keys() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let main = dir.path().join("basekit.toml");
    let local = dir.path().join("basekit.local.toml");
    fs::write(&main, "[server]\nbind = \"127.0.0.1:9000\"\nmax_body_bytes = 2048\n\n[api]\nversion = \"1.0\"\n")
        .map_err(|err| err.to_string())?;
    fs::write(&local, "[server]\nbind = \"0.0.0.0:9100\"\n").map_err(|err| err.to_string())?;
    let config = BaseKitConfig::load(Some(&main)).map_err(|err| err.to_string())?;
    if config.server.bind != "0.0.0.0:9100" {
        return Err(format!("overlay not applied: {}", config.server.bind));
    }
    if config.server.max_body_bytes != 2048 || config.api.version != "1.0" {
        return Err("overlay clobbered unrelated keys".to_string());
    }
    Ok(())
}

#[test]
fn invalid_overlay_fails_the_load() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let main = dir.path().join("basekit.toml");
    fs::write(&main, "").map_err(|err| err.to_string())?;
    fs::write(dir.path().join("basekit.local.toml"), "[server]\nbind = \"nowhere\"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(BaseKitConfig::load(Some(&main)), "server.bind is not a valid socket address")
}
