//! Gateway connection settings.
//!
//! Four options only: `host`, `port`, `token`, `secure`. They come from
//! `{config_dir}/gateway.json` and can be overridden by `GATEWAY_*`
//! environment variables (a `.env` file is honored).

use crate::error::config::ConfigError;

use common::{ErrorLocation, RedactedToken};

use std::env;
use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "gateway.json";

pub const ENV_HOST: &str = "GATEWAY_HOST";
pub const ENV_PORT: &str = "GATEWAY_PORT";
pub const ENV_TOKEN: &str = "GATEWAY_TOKEN";
pub const ENV_SECURE: &str = "GATEWAY_SECURE";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 18789;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Never written back to disk.
    #[serde(default, skip_serializing)]
    pub token: Option<RedactedToken>,

    #[serde(default)]
    pub secure: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: None,
            secure: false,
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then(|| RedactedToken::new(token));
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Load config from `{config_dir}/gateway.json`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Gateway config not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read gateway config: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: GatewayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse gateway config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Gateway config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/gateway.json` via temp file + rename.
    ///
    /// The token is skipped; it only ever comes from the file the user wrote
    /// or from the environment.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::caller(),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Gateway config saved to {}", config_path.display());
        Ok(())
    }

    /// Overlay `GATEWAY_*` variables, loading a `.env` file first if one exists.
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded .env from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => warn!("Failed to load .env: {}", e),
        }

        if let Some(host) = read_var(ENV_HOST)? {
            self.host = host;
        }

        if let Some(port) = read_var(ENV_PORT)? {
            self.port = port
                .parse::<u16>()
                .map_err(|e| ConfigError::env(ENV_PORT, e.to_string()))?;
        }

        if let Some(token) = read_var(ENV_TOKEN)? {
            self = self.with_token(token);
        }

        if let Some(secure) = read_var(ENV_SECURE)? {
            self.secure = parse_bool(&secure).ok_or_else(|| {
                ConfigError::env(ENV_SECURE, format!("expected true/false, got '{secure}'"))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation("host cannot be empty"));
        }

        if self.host.contains("://") || self.host.contains('/') {
            return Err(ConfigError::validation(format!(
                "host must be a bare hostname, got '{}'",
                self.host
            )));
        }

        if self.port == 0 {
            return Err(ConfigError::validation("port must be non-zero"));
        }

        Ok(())
    }

    /// `ws://host:port` or `wss://host:port`.
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// `http://host:port/` or `https://host:port/`.
    pub fn http_base_url(&self) -> Result<Url, ConfigError> {
        let scheme = if self.secure { "https" } else { "http" };
        let raw = format!("{scheme}://{}:{}/", self.host, self.port);
        Url::parse(&raw).map_err(|e| ConfigError::validation(format!("invalid base URL '{raw}': {e}")))
    }

    pub fn token_str(&self) -> Option<&str> {
        self.token.as_ref().map(RedactedToken::expose)
    }
}

fn read_var(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::env(name, "contains invalid unicode")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
