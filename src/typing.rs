//! Humanized input simulation.
//!
//! Text goes into the field one character at a time with a randomized
//! inter-keystroke delay. Each write replays the accumulated prefix
//! through the field's native value setter: React-style frameworks wrap
//! the `value` property and silently resist plain assignment, so the
//! prototype setter is the only path the page cannot intercept. A
//! bubbling `input` event follows every keystroke and a single bubbling
//! `change` event follows the last one; that is the full event contract
//! the host page listens for (no key-down/key-up simulation).

use crate::browser::cdp::js_escape;
use crate::browser::CdpClient;
use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Inter-keystroke delay range, milliseconds
const KEYSTROKE_DELAY_MIN_MS: u64 = 50;
const KEYSTROKE_DELAY_MAX_MS: u64 = 150;

/// One planned keystroke: the accumulated field value after it, and the
/// pause before it.
#[derive(Debug, Clone)]
pub struct Keystroke {
    pub prefix: String,
    pub delay: Duration,
}

/// Build the keystroke plan for a string
pub fn plan_keystrokes(text: &str) -> Vec<Keystroke> {
    let mut rng = rand::thread_rng();
    let mut prefix = String::with_capacity(text.len());
    text.chars()
        .map(|c| {
            prefix.push(c);
            Keystroke {
                prefix: prefix.clone(),
                delay: Duration::from_millis(
                    rng.gen_range(KEYSTROKE_DELAY_MIN_MS..KEYSTROKE_DELAY_MAX_MS),
                ),
            }
        })
        .collect()
}

/// The form field being driven. CDP-backed in production, scripted in
/// tests.
#[async_trait]
pub trait SyntheticField: Send + Sync {
    /// Write the full value through the native setter
    async fn write_value(&self, value: &str) -> Result<()>;
    /// Dispatch a bubbling `input` event
    async fn fire_input(&self) -> Result<()>;
    /// Dispatch a bubbling `change` event
    async fn fire_change(&self) -> Result<()>;
}

/// Type `text` into the field at a human pace
pub async fn type_humanized(field: &dyn SyntheticField, text: &str) -> Result<()> {
    for keystroke in plan_keystrokes(text) {
        tokio::time::sleep(keystroke.delay).await;
        field.write_value(&keystroke.prefix).await?;
        field.fire_input().await?;
    }
    field.fire_change().await?;
    Ok(())
}

/// A field on the live page, addressed by selector
pub struct CdpField {
    client: Arc<CdpClient>,
    selector: String,
}

impl CdpField {
    pub fn new(client: Arc<CdpClient>, selector: impl Into<String>) -> Self {
        Self {
            client,
            selector: selector.into(),
        }
    }

    async fn dispatch(&self, event: &str) -> Result<()> {
        self.client
            .evaluate_bool(&format!(
                "(function() {{ const el = document.querySelector('{}'); if (!el) return false; el.dispatchEvent(new Event('{}', {{bubbles: true}})); return true; }})()",
                js_escape(&self.selector),
                event
            ))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SyntheticField for CdpField {
    async fn write_value(&self, value: &str) -> Result<()> {
        self.client
            .evaluate_bool(&format!(
                "(function() {{ const el = document.querySelector('{}'); if (!el) return false; const setter = Object.getOwnPropertyDescriptor(window.HTMLInputElement.prototype, 'value').set; setter.call(el, '{}'); return true; }})()",
                js_escape(&self.selector),
                js_escape(value)
            ))
            .await?;
        Ok(())
    }

    async fn fire_input(&self) -> Result<()> {
        self.dispatch("input").await
    }

    async fn fire_change(&self) -> Result<()> {
        self.dispatch("change").await
    }
}
