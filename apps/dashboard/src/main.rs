use dashboard::app::{AppPaths, Dashboard, STATUS_INTERVAL};
use dashboard::error::DashboardError;
use dashboard::logger::initialize as LoggerInitialize;

use std::process::ExitCode;

use log::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), DashboardError> {
    let paths = AppPaths::resolve()?;
    paths.ensure()?;

    // Logger first, so config loading is visible
    LoggerInitialize(&paths.log_dir)?;

    info!(
        "Gateway dashboard {} starting",
        env!("CARGO_PKG_VERSION")
    );
    info!("Config directory: {}", paths.config_dir.display());
    info!("Log directory: {}", paths.log_dir.display());

    let dashboard = Dashboard::build(&paths)?;

    dashboard
        .run_until(
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for ctrl-c: {e}");
                    std::future::pending::<()>().await;
                }
            },
            STATUS_INTERVAL,
        )
        .await;

    Ok(())
}
