//! Facade configuration.
//!
//! Loaded from a JSON file and/or overridden from the command line. The
//! `backend` field decides which service provider the facade is built with.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::credential::CredentialStore;
use crate::error::{DriveError, Result};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Which service provider backs the facade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Google,
    Stub,
}

impl FromStr for BackendKind {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(BackendKind::Google),
            "stub" => Ok(BackendKind::Stub),
            other => Err(DriveError::InvalidArgument(format!(
                "unknown backend '{}', expected 'google' or 'stub'",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Google => write!(f, "google"),
            BackendKind::Stub => write!(f, "stub"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub api_base: String,
    pub upload_base: String,
    /// Shared Drive to operate in; `None` means the account's own drive.
    pub drive_id: Option<String>,
    /// Records requested per list/search page.
    pub page_size: u32,
    /// Worker threads serving the `*_async` calls.
    pub worker_threads: usize,
    /// Where `authenticate(.., persist = true)` saves the credential.
    pub credential_store: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            drive_id: None,
            page_size: 100,
            worker_threads: 4,
            credential_store: default_credential_path(),
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(DriveError::InvalidArgument(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(DriveError::InvalidArgument(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn credential_store(&self) -> Option<CredentialStore> {
        self.credential_store.as_ref().map(CredentialStore::new)
    }
}

fn default_credential_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("driven").join("credential.json"))
}
