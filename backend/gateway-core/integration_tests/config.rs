use gateway_core::GatewayConfig;
use gateway_core::config::{ENV_HOST, ENV_PORT, ENV_SECURE, ENV_TOKEN};
use gateway_core::error::ConfigError;

use serial_test::serial;
use tempfile::TempDir;

// ============================================================================
// GatewayConfig load / save / env overlay
// ============================================================================

fn clear_env() {
    for var in [ENV_HOST, ENV_PORT, ENV_TOKEN, ENV_SECURE] {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn given_missing_file_when_load_then_defaults() {
    let dir = TempDir::new().expect("temp dir");

    let config = GatewayConfig::load(dir.path()).expect("load");

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 18789);
    assert!(config.token.is_none());
    assert!(!config.secure);
    assert_eq!(config.ws_url(), "ws://127.0.0.1:18789");
}

/// **VALUE**: Saving then loading keeps every setting except the token.
///
/// **WHY THIS MATTERS**: The bearer token must never land on disk through
/// this code path.
///
/// **BUG THIS CATCHES**: Token serialized into `gateway.json`, or a save that
/// is not readable by load.
#[test]
fn given_saved_config_when_loaded_then_settings_kept_and_token_not_persisted() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let config = GatewayConfig::new("gateway.internal", 443)
        .with_secure(true)
        .with_token("super-secret");

    // WHEN
    config.save(dir.path()).expect("save");
    let raw = std::fs::read_to_string(dir.path().join("gateway.json")).expect("read");
    let loaded = GatewayConfig::load(dir.path()).expect("load");

    // THEN
    assert!(!raw.contains("super-secret"));
    assert_eq!(loaded.host, "gateway.internal");
    assert_eq!(loaded.port, 443);
    assert!(loaded.secure);
    assert!(loaded.token.is_none());
    assert_eq!(loaded.ws_url(), "wss://gateway.internal:443");
    assert_eq!(
        loaded.http_base_url().expect("url").as_str(),
        "https://gateway.internal:443/"
    );
}

#[test]
fn given_token_in_file_when_loaded_then_token_available_but_redacted() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("gateway.json"),
        r#"{"host":"10.0.0.5","token":"from-file"}"#,
    )
    .expect("write");

    let config = GatewayConfig::load(dir.path()).expect("load");

    assert_eq!(config.token_str(), Some("from-file"));
    assert_eq!(config.port, 18789);
    assert!(!format!("{config:?}").contains("from-file"));
}

#[test]
fn given_corrupt_file_when_load_then_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("gateway.json"), "{not json").expect("write");

    let result = GatewayConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

#[test]
fn given_invalid_values_when_validated_then_rejected() {
    assert!(GatewayConfig::new("", 18789).validate().is_err());
    assert!(GatewayConfig::new("ws://host", 18789).validate().is_err());
    assert!(GatewayConfig::new("host", 0).validate().is_err());
    assert!(GatewayConfig::default().validate().is_ok());
}

/// **VALUE**: `GATEWAY_*` variables override file values.
///
/// **BUG THIS CATCHES**: Environment ignored, so containerized deployments
/// cannot point the client at their gateway.
#[test]
#[serial]
fn given_env_overrides_when_apply_env_then_values_replaced() {
    // GIVEN
    clear_env();
    unsafe {
        std::env::set_var(ENV_HOST, "gw.example");
        std::env::set_var(ENV_PORT, "9000");
        std::env::set_var(ENV_TOKEN, "env-token");
        std::env::set_var(ENV_SECURE, "true");
    }

    // WHEN
    let config = GatewayConfig::default().apply_env();
    clear_env();

    // THEN
    let config = config.expect("apply env");
    assert_eq!(config.host, "gw.example");
    assert_eq!(config.port, 9000);
    assert_eq!(config.token_str(), Some("env-token"));
    assert!(config.secure);
}

#[test]
#[serial]
fn given_bad_port_in_env_when_apply_env_then_env_error() {
    clear_env();
    unsafe { std::env::set_var(ENV_PORT, "not-a-port") };

    let result = GatewayConfig::default().apply_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::EnvError { .. })));
}
