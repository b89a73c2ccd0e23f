pub mod config;
pub mod gateway;
pub mod sync;
pub mod tool;

pub use config::ConfigError;
pub use gateway::GatewayError;
pub use sync::SyncError;
pub use tool::ToolError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Gateway(#[from] gateway::GatewayError),

    #[error(transparent)]
    Tool(#[from] tool::ToolError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Sync(#[from] sync::SyncError),

    #[error(transparent)]
    Model(#[from] models::ModelError),
}
