pub mod credential;
pub mod schema;
pub mod storage;

pub use credential::CredentialStore;
pub use schema::{AppConfig, BackendConfig, BrowserConfig, SelectorConfig, TimingConfig};
pub use storage::{config_dir, get_config_path, init_config, load_config, save_config};
