//! Supervisor loop.
//!
//! Classifies the current location once per page lifetime and dispatches
//! the owning routine. Each navigation or keep-alive reload starts a
//! fresh iteration with fresh in-memory state, which is what resets
//! polls and the typing flag.

use crate::browser::CdpClient;
use crate::classify::{self, PageContext};
use crate::config::{AppConfig, CredentialStore};
use crate::error::Result;
use crate::keepalive;
use crate::login::{CdpLoginSurface, LoginAutomator};
use crate::sync::SyncClient;
use std::sync::Arc;
use std::time::Duration;

const LOCATION_POLL: Duration = Duration::from_secs(1);
const NAVIGATION_SETTLE: Duration = Duration::from_secs(2);

pub struct Runner {
    client: Arc<CdpClient>,
    sync_client: Arc<SyncClient>,
    config: AppConfig,
    credentials: CredentialStore,
}

impl Runner {
    pub fn new(client: Arc<CdpClient>, config: AppConfig) -> Self {
        let sync_client = Arc::new(SyncClient::new(
            config.backend.base_url.clone(),
            config.backend.api_key.clone(),
        ));
        Self {
            client,
            sync_client,
            config,
            credentials: CredentialStore::open_default(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.client.navigate(&self.config.browser.start_url).await?;

        loop {
            let context = match self.client.current_location().await {
                Ok((host, path)) => classify::classify(&host, &path),
                Err(e) => {
                    tracing::error!("location probe failed: {}", e);
                    tokio::time::sleep(LOCATION_POLL).await;
                    continue;
                }
            };

            match context {
                Some(PageContext::TargetBusinessPage) => {
                    self.business_page_cycle().await;
                }
                Some(PageContext::TargetInterstitialSignin) => {
                    tracing::info!("interstitial signin page detected");
                    if let Err(e) = self.login_automator().run_interstitial().await {
                        tracing::error!("interstitial automation failed: {}", e);
                    }
                    self.wait_for_departure(PageContext::TargetInterstitialSignin)
                        .await;
                }
                Some(identity) => {
                    tracing::info!(context = ?identity, "identity provider page detected");
                    if let Err(e) = self.login_automator().run_identity().await {
                        tracing::error!("sign-in automation failed: {}", e);
                    }
                }
                None => {
                    tracing::debug!("page belongs to neither domain; waiting");
                    tokio::time::sleep(LOCATION_POLL).await;
                }
            }
        }
    }

    /// Business page lifetime: schedule the initial sync and the
    /// keep-alive reload, then wait for whichever navigation boundary
    /// comes first.
    async fn business_page_cycle(&self) {
        tracing::info!("business page detected; scheduling sync and keep-alive reload");
        let sync_handle = keepalive::schedule_initial_sync(
            Arc::clone(&self.client),
            Arc::clone(&self.sync_client),
            Duration::from_secs(self.config.timing.initial_sync_delay_secs),
        );
        let mut reload_handle = keepalive::schedule_reload(
            Arc::clone(&self.client),
            Duration::from_secs(self.config.timing.reload_interval_secs),
        );

        tokio::select! {
            _ = &mut reload_handle => {
                tokio::time::sleep(NAVIGATION_SETTLE).await;
            }
            _ = self.wait_for_departure(PageContext::TargetBusinessPage) => {
                // The page navigated out from under the timers; they
                // belong to the old page lifetime and die with it.
                sync_handle.abort();
                reload_handle.abort();
            }
        }
    }

    /// Poll until the location stops classifying as `from`
    async fn wait_for_departure(&self, from: PageContext) {
        loop {
            tokio::time::sleep(LOCATION_POLL).await;
            match self.client.current_location().await {
                Ok((host, path)) => {
                    if classify::classify(&host, &path) != Some(from) {
                        return;
                    }
                }
                Err(e) => tracing::debug!("location probe failed while waiting: {}", e),
            }
        }
    }

    /// Fresh automator per sign-in context entry; re-reads the stored
    /// credential so a password set while running is picked up.
    fn login_automator(&self) -> LoginAutomator<CdpLoginSurface> {
        let credential = match self.credentials.load() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("failed to read stored credential: {}", e);
                None
            }
        };
        let surface = Arc::new(CdpLoginSurface::new(
            Arc::clone(&self.client),
            self.config.selectors.clone(),
        ));
        LoginAutomator::new(surface, credential)
    }
}
