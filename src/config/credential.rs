//! Plaintext credential store for the sign-in password.
//!
//! One key in one TOML file under the config dir. Written only by the
//! `set-password` / `clear-password` CLI actions, read by the login
//! automation. A missing file is a valid state, not an error.

use crate::error::{FlowsyncError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    password: String,
}

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at the default platform location
    pub fn open_default() -> Self {
        Self::at(super::storage::config_dir().join("credential.toml"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the stored password, `None` when not configured
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            FlowsyncError::Config(format!(
                "Failed to read credential from {:?}: {}",
                self.path, e
            ))
        })?;
        let file: CredentialFile = toml::from_str(&content)?;
        Ok(Some(file.password))
    }

    pub fn store(&self, password: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FlowsyncError::Config(format!(
                    "Failed to create credential directory {:?}: {}",
                    parent, e
                ))
            })?;
        }
        let content = toml::to_string_pretty(&CredentialFile {
            password: password.to_string(),
        })?;
        fs::write(&self.path, content).map_err(|e| {
            FlowsyncError::Config(format!(
                "Failed to write credential to {:?}: {}",
                self.path, e
            ))
        })?;
        tracing::info!("Stored credential at {:?}", self.path);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::info!("Removed credential at {:?}", self.path);
        }
        Ok(())
    }
}
