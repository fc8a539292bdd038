//! Pluggable backends behind the facade.
//!
//! A [`ServiceProvider`] turns a credential into an authenticated
//! [`DriveService`] handle. The facade holds exactly one provider, picked at
//! construction time, and routes every data call through the handle it
//! obtained from it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::models::{DriveUser, FileContent, FilePage, FileRecord};
use crate::outcome::Outcome;

pub mod google;
pub mod stub;

pub use google::{GoogleDriveProvider, GoogleDriveService};
pub use stub::{StubProvider, StubService};

/// Remote storage operations available once authenticated.
///
/// Listing calls are paged: pass the previous page's `next_page_token` to
/// continue. `None` as a folder id means the drive root.
#[async_trait]
pub trait DriveService: Send + Sync {
    async fn about(&self) -> Result<DriveUser>;

    /// Summary metadata for `id`, `None` if no such record exists.
    async fn get_metadata(&self, id: &str) -> Result<Option<FileRecord>>;

    async fn list_children(
        &self,
        folder_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FilePage>;

    async fn search(&self, filter: &str, page_token: Option<&str>) -> Result<FilePage>;

    async fn create_record(
        &self,
        parent_id: Option<&str>,
        name: &str,
        content: Option<&FileContent>,
    ) -> Result<FileRecord>;

    async fn update_record(&self, id: &str, content: &FileContent) -> Result<FileRecord>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_record(&self, id: &str) -> Result<bool>;

    /// Full metadata for `id`; `NotFound` if it does not exist.
    async fn fetch_details(&self, id: &str) -> Result<FileRecord>;

    /// Give `principal` read access. Returns `false` for an unknown id.
    async fn grant_access(&self, id: &str, principal: &str) -> Result<bool>;

    /// Write the file body to `destination` and return the path written.
    async fn download(&self, record: &FileRecord, destination: &Path) -> Result<PathBuf>;
}

/// Source of authenticated [`DriveService`] handles.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Short backend name, e.g. `"google"`.
    fn name(&self) -> &'static str;

    /// Authenticate with `credential`, saving it when `persist` is set.
    async fn initialize(&self, credential: &Credential, persist: bool) -> Outcome<DriveError>;

    /// The handle obtained by the last successful `initialize`.
    fn authenticated_service(&self) -> Option<Arc<dyn DriveService>>;

    /// Drop the handle and any persisted credential.
    async fn teardown(&self);
}

/// Build the provider named by `config.backend`.
pub fn from_config(config: &Config) -> Result<Arc<dyn ServiceProvider>> {
    config.validate()?;
    let provider: Arc<dyn ServiceProvider> = match config.backend {
        BackendKind::Google => Arc::new(GoogleDriveProvider::new(config.clone())),
        BackendKind::Stub => Arc::new(StubProvider::with_page_size(config.page_size as usize)),
    };
    Ok(provider)
}

/// Destination path for a download of `title` into `destination`.
///
/// Only the last component of `title` is used, so a remote title can never
/// place the file outside a destination directory.
pub(crate) fn resolve_destination(destination: &Path, title: &str) -> Result<PathBuf> {
    if !destination.is_dir() {
        return Ok(destination.to_path_buf());
    }

    match Path::new(title).file_name() {
        Some(name) => Ok(destination.join(name)),
        None => Err(DriveError::InvalidArgument(format!(
            "title '{}' is not usable as a file name; pass a file path instead",
            title
        ))),
    }
}
