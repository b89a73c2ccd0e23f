//! Composition root: resolves directories, builds the core clients and runs
//! the sync lifecycle until shutdown.

use crate::error::DashboardError;

use gateway_core::sync::Domain;
use gateway_core::{
    BuiltinData, CoreError, DashboardSync, GatewayClient, GatewayConfig, RpcTuning,
    SyncSettings, ToolClient,
};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

pub const APP_DIR_NAME: &str = "gateway-dashboard";
pub const BUILTIN_FILE_NAME: &str = "builtin.json";
pub const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Where the dashboard reads config from and writes logs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    /// Platform config dir for settings, platform local data dir for logs.
    pub fn resolve() -> Result<Self, DashboardError> {
        let config_root = dirs::config_dir()
            .ok_or_else(|| DashboardError::path("Could not determine config directory"))?;
        let data_root = dirs::data_local_dir()
            .ok_or_else(|| DashboardError::path("Could not determine data directory"))?;

        Ok(Self {
            config_dir: config_root.join(APP_DIR_NAME),
            log_dir: data_root.join(APP_DIR_NAME).join("logs"),
        })
    }

    /// Everything under one root. Used for portable installs and tests.
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            log_dir: root.join("logs"),
        }
    }

    pub fn builtin_path(&self) -> PathBuf {
        self.config_dir.join(BUILTIN_FILE_NAME)
    }

    pub fn ensure(&self) -> Result<(), DashboardError> {
        for dir in [&self.config_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                DashboardError::path(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }
}

/// The running application: one gateway client, one tool client and the
/// reconciliation layer over both.
pub struct Dashboard {
    sync: DashboardSync,
}

impl Dashboard {
    /// Load `gateway.json` and `builtin.json` from the config dir, then apply
    /// environment overrides.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(paths: &AppPaths) -> Result<Self, DashboardError> {
        let config = GatewayConfig::load(&paths.config_dir)
            .and_then(GatewayConfig::apply_env)
            .map_err(CoreError::from)?;
        let builtin = BuiltinData::load(&paths.builtin_path())?;

        info!(
            "Gateway at {} ({})",
            config.ws_url(),
            if config.token_str().is_some() {
                "token set"
            } else {
                "no token"
            }
        );

        Self::from_parts(&config, builtin, RpcTuning::default(), SyncSettings::default())
    }

    pub fn from_parts(
        config: &GatewayConfig,
        builtin: BuiltinData,
        tuning: RpcTuning,
        settings: SyncSettings,
    ) -> Result<Self, DashboardError> {
        let gateway = GatewayClient::new(config, tuning)?;
        let tools = ToolClient::from_config(config)?;
        Ok(Self {
            sync: DashboardSync::new(gateway, tools, builtin, settings),
        })
    }

    pub fn sync(&self) -> &DashboardSync {
        &self.sync
    }

    /// Start the sync lifecycle, then open the connection.
    pub fn start(&self) {
        self.sync.start();
        self.sync.gateway().connect();
    }

    pub async fn stop(&self) {
        self.sync.shutdown().await;
        self.sync.gateway().disconnect().await;
    }

    /// One line: connection state, the tier each domain reads from, counters.
    pub fn status_line(&self) -> String {
        let tiers = Domain::ALL
            .iter()
            .map(|domain| {
                format!(
                    "{}={}",
                    domain.as_str(),
                    self.sync.active_tier(*domain).as_str()
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let stats = self.sync.stats();

        format!(
            "state={} {tiers} polls={}/{} poll_failures={} live_events={} ignored={}",
            self.sync.gateway().state(),
            stats.polls_applied,
            stats.polls_applied + stats.polls_unchanged,
            stats.poll_failures,
            stats.live_events_applied,
            stats.live_events_ignored,
        )
    }

    /// Run until `shutdown` resolves, logging a status line every
    /// `status_interval`. Always leaves the client disconnected.
    pub async fn run_until<F>(&self, shutdown: F, status_interval: Duration)
    where
        F: Future<Output = ()>,
    {
        self.start();
        info!("Dashboard running");

        let mut ticker = tokio::time::interval(status_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => info!("{}", self.status_line()),
            }
        }

        info!("Dashboard shutting down");
        self.stop().await;
        if self.sync.gateway().pending_calls().await > 0 {
            warn!("Calls still pending after disconnect");
        }
    }
}
