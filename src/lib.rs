pub mod browser;
pub mod classify;
pub mod config;
pub mod error;
pub mod harvest;
pub mod keepalive;
pub mod login;
pub mod runner;
pub mod sync;
pub mod typing;

use crate::browser::CdpClient;
use crate::config::AppConfig;
use crate::error::Result;
use std::sync::Arc;

/// Launch Chrome and run the supervisor until interrupted
pub async fn run(config: AppConfig) -> Result<()> {
    let mut client = CdpClient::new();
    client.launch(&config.browser).await?;
    let client = Arc::new(client);

    let runner = runner::Runner::new(Arc::clone(&client), config);

    let result = tokio::select! {
        r = runner.run() => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received; shutting down");
            Ok(())
        }
    };

    client.terminate();
    result
}
