//! Keep-alive timers.
//!
//! Both timers are single-fire: the reload itself re-runs the whole
//! per-page cycle on the freshly loaded page, which is where the repeat
//! effect comes from.

use crate::browser::CdpClient;
use crate::sync::{self, SyncClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One-shot page reload after `delay`
pub fn schedule_reload(client: Arc<CdpClient>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        tracing::info!("keep-alive interval elapsed; reloading page");
        if let Err(e) = client.reload().await {
            tracing::error!("keep-alive reload failed: {}", e);
        }
    })
}

/// One-shot harvest + sync shortly after page load
pub fn schedule_initial_sync(
    client: Arc<CdpClient>,
    sync_client: Arc<SyncClient>,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        sync::sync_from_cookies(client.as_ref(), sync_client.as_ref()).await;
    })
}
