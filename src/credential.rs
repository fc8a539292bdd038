//! Credentials passed into `authenticate`, and their on-disk store.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::ServiceAccountCredentials;

/// How a credential proves its identity to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CredentialSource {
    /// Service account key, exchanged for tokens via a signed JWT.
    ServiceAccount(ServiceAccountCredentials),
    /// Pre-issued OAuth access token.
    AccessToken { token: String },
}

/// Opaque credential handed to a service provider.
///
/// The facade only looks at whether one is present; whether it is valid is
/// up to the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    account: Option<String>,
    source: Option<CredentialSource>,
}

impl Credential {
    /// Credential naming an account without any secret material.
    pub fn named(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            source: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn access_token(token: impl Into<String>) -> Self {
        Self {
            account: None,
            source: Some(CredentialSource::AccessToken {
                token: token.into(),
            }),
        }
    }

    pub fn service_account(credentials: ServiceAccountCredentials) -> Self {
        Self {
            account: Some(credentials.client_email.clone()),
            source: Some(CredentialSource::ServiceAccount(credentials)),
        }
    }

    /// Load a service account JSON key.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::service_account(credentials))
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn source(&self) -> Option<&CredentialSource> {
        self.source.as_ref()
    }
}

/// JSON file holding a persisted credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(credential)?)?;
        debug!("Saved credential to {:?}", self.path);
        Ok(())
    }

    /// Load the stored credential, `None` if nothing has been saved.
    pub fn load(&self) -> Result<Option<Credential>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared credential at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
