//! Sign-in automation state machine.
//!
//! Both sign-in contexts run a fixed-interval, level-triggered poll:
//! every tick re-probes the DOM from scratch, so transient markup states
//! during page transitions are tolerated. Sub-states are checked in
//! strict priority order because a page mid-transition can satisfy more
//! than one probe at once.
//!
//! Password entry runs as a spawned sequence guarded by a single
//! in-flight flag owned by this instance; the flag is released on a
//! fixed safety timeout so it can never stay stuck, and a navigation
//! discards the whole instance anyway.

use crate::classify::{self, PageContext};
use crate::config::SelectorConfig;
use crate::error::{FlowsyncError, Result};
use crate::browser::CdpClient;
use crate::typing::{self, CdpField};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Poll cadence and delays for the sign-in automation
#[derive(Debug, Clone)]
pub struct LoginTiming {
    /// Poll interval on identity-provider pages
    pub identity_poll: Duration,
    /// Poll interval on the interstitial signin page
    pub interstitial_poll: Duration,
    /// Pause between focusing the password field and typing
    pub settle_delay: Duration,
    /// Fixed part of the pause between typing and clicking next
    pub post_type_base: Duration,
    /// Random jitter added on top of the fixed part
    pub post_type_jitter: Duration,
    /// How long the typing flag stays held after the sequence
    pub typing_safety_timeout: Duration,
}

impl Default for LoginTiming {
    fn default() -> Self {
        Self {
            identity_poll: Duration::from_millis(1500),
            interstitial_poll: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(400),
            post_type_base: Duration::from_millis(500),
            post_type_jitter: Duration::from_millis(500),
            typing_safety_timeout: Duration::from_secs(15),
        }
    }
}

/// DOM facts about the password prompt, gathered in one probe
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordProbe {
    pub present: bool,
    /// Has a rendered box (an invisible field must not be typed into)
    pub visible: bool,
    pub empty: bool,
    pub next_present: bool,
}

impl PasswordProbe {
    fn ready(&self) -> bool {
        self.present && self.next_present && self.visible && self.empty
    }
}

/// One identity-page poll snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProbe {
    /// An account chooser entry is showing
    pub account_item: bool,
    pub password: PasswordProbe,
}

/// What the page offers the automation. CDP-backed in production,
/// scripted in tests.
#[async_trait]
pub trait LoginSurface: Send + Sync {
    /// Current (hostname, pathname)
    async fn current_location(&self) -> Result<(String, String)>;
    /// Probe the identity page sub-states
    async fn probe(&self) -> Result<IdentityProbe>;
    /// Find the interstitial submit control; returns the selector that
    /// matched (primary first, then fallback)
    async fn find_consent_control(&self) -> Result<Option<String>>;
    /// Click whatever the selector matches; false when nothing matched
    async fn click(&self, selector: &str) -> Result<bool>;
    /// Click the first account chooser entry
    async fn click_account(&self) -> Result<bool>;
    async fn focus_password(&self) -> Result<()>;
    /// Humanized credential entry into the password field
    async fn type_password(&self, credential: &str) -> Result<()>;
    /// Click the next control, preferring a nested button
    async fn click_next(&self) -> Result<()>;
}

/// What a single identity tick decided to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing actionable on the page
    Idle,
    /// First account chooser entry clicked
    ClickedAccount,
    /// Password sequence spawned
    StartedTyping,
    /// A sequence is already in flight; tick skipped
    TypingInProgress,
    /// Password prompt found but no credential configured
    MissingCredential,
}

pub struct LoginAutomator<S: LoginSurface + ?Sized> {
    surface: Arc<S>,
    credential: Option<String>,
    typing_in_flight: Arc<AtomicBool>,
    timing: LoginTiming,
}

impl<S: LoginSurface + ?Sized + 'static> LoginAutomator<S> {
    pub fn new(surface: Arc<S>, credential: Option<String>) -> Self {
        Self {
            surface,
            credential,
            typing_in_flight: Arc::new(AtomicBool::new(false)),
            timing: LoginTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: LoginTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Poll the interstitial signin page for its submit control. Returns
    /// after the first successful click (the consent is terminal for this
    /// context) or when navigation leaves the page.
    pub async fn run_interstitial(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.timing.interstitial_poll);
        loop {
            ticker.tick().await;

            match self.surface.current_location().await {
                Ok((host, path)) => {
                    if classify::classify(&host, &path)
                        != Some(PageContext::TargetInterstitialSignin)
                    {
                        tracing::debug!("left interstitial signin page; stopping poll");
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::error!("location probe failed: {}", e);
                    continue;
                }
            }

            match self.surface.find_consent_control().await {
                Ok(Some(selector)) => match self.surface.click(&selector).await {
                    Ok(true) => {
                        tracing::info!(selector = %selector, "clicked interstitial consent control");
                        return Ok(());
                    }
                    Ok(false) => tracing::debug!("consent control vanished before click"),
                    Err(e) => tracing::error!("consent click failed: {}", e),
                },
                Ok(None) => {}
                Err(e) => tracing::error!("consent probe failed: {}", e),
            }
        }
    }

    /// Poll the identity-provider pages until navigation leaves the
    /// domain. Tick failures are logged and absorbed; the next tick
    /// re-probes from scratch.
    pub async fn run_identity(&self) -> Result<()> {
        let mut ticker = tokio::time::interval(self.timing.identity_poll);
        loop {
            ticker.tick().await;

            match self.surface.current_location().await {
                Ok((host, path)) => match classify::classify(&host, &path) {
                    Some(ctx) if ctx.is_identity() => {}
                    _ => {
                        tracing::debug!("left identity provider; stopping poll");
                        return Ok(());
                    }
                },
                Err(e) => {
                    tracing::error!("location probe failed: {}", e);
                    continue;
                }
            }

            if let Err(e) = self.identity_tick().await {
                tracing::error!("sign-in poll tick failed: {}", e);
            }
        }
    }

    /// One identity-page tick, sub-states in priority order:
    /// account chooser first, then the password prompt.
    pub async fn identity_tick(&self) -> Result<TickOutcome> {
        let probe = self.surface.probe().await?;

        if probe.account_item {
            // Clicking triggers navigation; the next tick re-evaluates
            // whatever page state that produces.
            self.surface.click_account().await?;
            tracing::info!("clicked first entry in the account chooser");
            return Ok(TickOutcome::ClickedAccount);
        }

        if probe.password.ready() {
            if self.typing_in_flight.load(Ordering::SeqCst) {
                return Ok(TickOutcome::TypingInProgress);
            }
            let Some(credential) = self.credential.clone() else {
                tracing::warn!(
                    "password prompt detected but no credential is configured; \
                     run `flowsync set-password` to store one"
                );
                return Ok(TickOutcome::MissingCredential);
            };

            self.typing_in_flight.store(true, Ordering::SeqCst);
            let surface = Arc::clone(&self.surface);
            let lock = Arc::clone(&self.typing_in_flight);
            let timing = self.timing.clone();
            tokio::spawn(async move {
                if let Err(e) = password_sequence(surface.as_ref(), &credential, &timing).await {
                    tracing::error!("password entry failed: {}", e);
                }
                // The flag must not survive a wedged sequence; navigation
                // is the common release, this timeout is the backstop.
                tokio::time::sleep(timing.typing_safety_timeout).await;
                lock.store(false, Ordering::SeqCst);
            });
            return Ok(TickOutcome::StartedTyping);
        }

        Ok(TickOutcome::Idle)
    }
}

/// Focus, settle, type, pause, submit
async fn password_sequence<S: LoginSurface + ?Sized>(
    surface: &S,
    credential: &str,
    timing: &LoginTiming,
) -> Result<()> {
    surface.focus_password().await?;
    tokio::time::sleep(timing.settle_delay).await;

    surface.type_password(credential).await?;

    let jitter_ms = timing.post_type_jitter.as_millis() as u64;
    let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
    tokio::time::sleep(timing.post_type_base + Duration::from_millis(jitter)).await;

    surface.click_next().await?;
    tracing::info!("submitted password form");
    Ok(())
}

/// Live-page surface over CDP
pub struct CdpLoginSurface {
    client: Arc<CdpClient>,
    selectors: SelectorConfig,
}

impl CdpLoginSurface {
    pub fn new(client: Arc<CdpClient>, selectors: SelectorConfig) -> Self {
        Self { client, selectors }
    }
}

#[async_trait]
impl LoginSurface for CdpLoginSurface {
    async fn current_location(&self) -> Result<(String, String)> {
        self.client.current_location().await
    }

    async fn probe(&self) -> Result<IdentityProbe> {
        use crate::browser::cdp::js_escape;
        let expression = format!(
            "(function() {{ \
               const account = document.querySelector('{}'); \
               const pw = document.querySelector('{}'); \
               const next = document.querySelector('{}'); \
               return {{ \
                 account: !!account, \
                 pwPresent: !!pw, \
                 pwVisible: !!pw && pw.getClientRects().length > 0, \
                 pwEmpty: !!pw && pw.value === '', \
                 nextPresent: !!next \
               }}; \
             }})()",
            js_escape(&self.selectors.account_list_item),
            js_escape(&self.selectors.password_input),
            js_escape(&self.selectors.next_control),
        );
        let value = self.client.evaluate(&expression).await?;

        let flag = |key: &str| value.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(IdentityProbe {
            account_item: flag("account"),
            password: PasswordProbe {
                present: flag("pwPresent"),
                visible: flag("pwVisible"),
                empty: flag("pwEmpty"),
                next_present: flag("nextPresent"),
            },
        })
    }

    async fn find_consent_control(&self) -> Result<Option<String>> {
        if self.client.exists(&self.selectors.interstitial_submit).await? {
            return Ok(Some(self.selectors.interstitial_submit.clone()));
        }
        if self
            .client
            .exists(&self.selectors.interstitial_submit_fallback)
            .await?
        {
            return Ok(Some(self.selectors.interstitial_submit_fallback.clone()));
        }
        Ok(None)
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        self.client.click(selector).await
    }

    async fn click_account(&self) -> Result<bool> {
        self.client.click(&self.selectors.account_list_item).await
    }

    async fn focus_password(&self) -> Result<()> {
        if !self.client.focus(&self.selectors.password_input).await? {
            return Err(FlowsyncError::Cdp(
                "password input disappeared before focus".to_string(),
            ));
        }
        Ok(())
    }

    async fn type_password(&self, credential: &str) -> Result<()> {
        let field = CdpField::new(
            Arc::clone(&self.client),
            self.selectors.password_input.clone(),
        );
        typing::type_humanized(&field, credential).await
    }

    async fn click_next(&self) -> Result<()> {
        use crate::browser::cdp::js_escape;
        let clicked = self
            .client
            .evaluate_bool(&format!(
                "(function() {{ \
                   const control = document.querySelector('{}'); \
                   if (!control) return false; \
                   const button = control.querySelector('button'); \
                   (button || control).click(); \
                   return true; \
                 }})()",
                js_escape(&self.selectors.next_control)
            ))
            .await?;
        if !clicked {
            return Err(FlowsyncError::Cdp(
                "next control disappeared before click".to_string(),
            ));
        }
        Ok(())
    }
}
