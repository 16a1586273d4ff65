use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Backend the harvested session token is relayed to
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chrome instance settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Reload / sync timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// DOM probe selectors for the sign-in pages
    #[serde(default)]
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the token backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer API key sent with every sync request
    #[serde(default)]
    pub api_key: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Chrome executable path
    #[serde(default = "default_chrome_path")]
    pub chrome_path: PathBuf,

    /// Dedicated user data directory (keeps the Google session isolated)
    #[serde(default = "default_user_data_dir")]
    pub user_data_dir: PathBuf,

    /// Run Chrome headless
    #[serde(default)]
    pub headless: bool,

    /// Page the supervisor navigates to on startup
    #[serde(default = "default_start_url")]
    pub start_url: String,

    /// Custom launch arguments
    #[serde(default)]
    pub custom_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: default_chrome_path(),
            user_data_dir: default_user_data_dir(),
            headless: false,
            start_url: default_start_url(),
            custom_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Seconds between keep-alive page reloads
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,

    /// Seconds to wait after page load before the first harvest + sync
    #[serde(default = "default_sync_delay")]
    pub initial_sync_delay_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: default_reload_interval(),
            initial_sync_delay_secs: default_sync_delay(),
        }
    }
}

/// Selectors for the sign-in automation. Brittle by nature; these are
/// the knobs to turn when Google changes its markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Submit control on the interstitial signin page
    #[serde(default = "default_interstitial_submit")]
    pub interstitial_submit: String,

    /// Fallback when the primary submit selector matches nothing
    #[serde(default = "default_interstitial_submit_fallback")]
    pub interstitial_submit_fallback: String,

    /// First entry of the account chooser list
    #[serde(default = "default_account_list_item")]
    pub account_list_item: String,

    /// Password input on the challenge page
    #[serde(default = "default_password_input")]
    pub password_input: String,

    /// "Next" control that submits the password form
    #[serde(default = "default_next_control")]
    pub next_control: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            interstitial_submit: default_interstitial_submit(),
            interstitial_submit_fallback: default_interstitial_submit_fallback(),
            account_list_item: default_account_list_item(),
            password_input: default_password_input(),
            next_control: default_next_control(),
        }
    }
}

/// Default Chrome path based on platform
fn default_chrome_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        PathBuf::from("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe")
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/bin/google-chrome")
    }
}

fn default_user_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("flowsync").join("chrome-profile"))
        .unwrap_or_else(|| PathBuf::from("chrome-profile"))
}

fn default_start_url() -> String {
    "https://labs.google/fx/tools/flow".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_reload_interval() -> u64 {
    3600
}

fn default_sync_delay() -> u64 {
    5
}

fn default_interstitial_submit() -> String {
    "button[type=\"submit\"]".to_string()
}

fn default_interstitial_submit_fallback() -> String {
    "input[type=\"submit\"]".to_string()
}

fn default_account_list_item() -> String {
    "ul li [data-identifier]".to_string()
}

fn default_password_input() -> String {
    "input[type=\"password\"]".to_string()
}

fn default_next_control() -> String {
    "#passwordNext".to_string()
}
