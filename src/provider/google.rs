//! Google Drive API v3 provider.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{resolve_destination, DriveService, ServiceProvider};
use crate::auth::Authenticator;
use crate::config::Config;
use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::models::{
    About, ApiErrorResponse, ContentSource, DriveUser, FileContent, FilePage, FileRecord,
    FOLDER_MIME_TYPE,
};
use crate::outcome::Outcome;
use crate::query::quote;

/// Fields requested for summary records.
const SUMMARY_FIELDS: &str = "id, name, mimeType, webContentLink, description, parents, trashed";

/// Fields requested for detail fetches.
const DETAIL_FIELDS: &str = "id, name, mimeType, webContentLink, description, parents, trashed, \
     size, createdTime, modifiedTime, webViewLink, md5Checksum, sharedWithMeTime";

/// Provider that authenticates against Google and hands out
/// [`GoogleDriveService`] handles.
pub struct GoogleDriveProvider {
    config: Config,
    http: Client,
    service: Mutex<Option<Arc<GoogleDriveService>>>,
}

impl GoogleDriveProvider {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: Client::new(),
            service: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<GoogleDriveService>>> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn connect(&self, credential: &Credential, persist: bool) -> Result<Arc<GoogleDriveService>> {
        let auth = Authenticator::for_credential(credential, self.http.clone())?;
        let service = GoogleDriveService::new(auth, self.http.clone(), &self.config);

        // A successful about call proves the token is accepted.
        let user = service.about().await.map_err(DriveError::into_auth_failure)?;
        info!(
            "Authenticated as {}",
            user.email_address.as_deref().unwrap_or("<unknown>")
        );

        if persist {
            if let Some(store) = self.config.credential_store() {
                store.save(credential)?;
            }
        }

        Ok(Arc::new(service))
    }
}

#[async_trait]
impl ServiceProvider for GoogleDriveProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn initialize(&self, credential: &Credential, persist: bool) -> Outcome<DriveError> {
        match self.connect(credential, persist).await {
            Ok(service) => {
                *self.slot() = Some(service);
                Outcome::success()
            }
            Err(e) => {
                *self.slot() = None;
                Outcome::failure(e.into_auth_failure())
            }
        }
    }

    fn authenticated_service(&self) -> Option<Arc<dyn DriveService>> {
        self.slot()
            .as_ref()
            .map(|service| Arc::clone(service) as Arc<dyn DriveService>)
    }

    async fn teardown(&self) {
        *self.slot() = None;
        if let Some(store) = self.config.credential_store() {
            if let Err(e) = store.clear() {
                warn!("Failed to clear stored credential: {}", e);
            }
        }
    }
}

/// Authenticated Drive API v3 client.
pub struct GoogleDriveService {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
    drive_id: Option<String>,
    page_size: u32,
}

impl GoogleDriveService {
    pub fn new(auth: Authenticator, http: Client, config: &Config) -> Self {
        Self {
            auth,
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            drive_id: config.drive_id.clone(),
            page_size: config.page_size,
        }
    }

    /// Shared Drive ID, if operating inside one.
    pub fn drive_id(&self) -> Option<&str> {
        self.drive_id.as_deref()
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.api_base, id)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.get_access_token().await?;
        let response = request
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .send()
            .await?;
        Ok(response)
    }

    /// One page of files matching a Drive query.
    async fn files_page(&self, query: &str, page_token: Option<&str>) -> Result<FilePage> {
        let page_size = self.page_size.to_string();
        let fields = format!("nextPageToken, files({})", SUMMARY_FIELDS);
        let mut request = self
            .http
            .get(format!("{}/files", self.api_base))
            .query(&[
                ("q", query),
                ("pageSize", page_size.as_str()),
                ("spaces", "drive"),
                ("fields", fields.as_str()),
            ]);

        if let Some(drive_id) = &self.drive_id {
            request = request.query(&[
                ("driveId", drive_id.as_str()),
                ("corpora", "drive"),
                ("includeItemsFromAllDrives", "true"),
            ]);
        }

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = check(self.send(request).await?).await?;
        Ok(response.json().await?)
    }

    async fn upload_multipart(
        &self,
        request: RequestBuilder,
        metadata: serde_json::Value,
        content: &FileContent,
        filename: &str,
    ) -> Result<FileRecord> {
        let body = content.read().await?;

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file_part = Part::bytes(body)
            .file_name(filename.to_string())
            .mime_str(content.mime_type())?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let request = request
            .query(&[("uploadType", "multipart"), ("fields", SUMMARY_FIELDS)])
            .multipart(form);

        let response = check(self.send(request).await?).await?;
        Ok(response.json().await?)
    }
}

/// Query for the non-trashed children of `folder_id` (the root when `None`).
fn children_query(folder_id: Option<&str>) -> String {
    format!(
        "{} in parents and trashed = false",
        quote(folder_id.unwrap_or("root"))
    )
}

/// Turn a non-success response into an `ApiError`.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}

#[async_trait]
impl DriveService for GoogleDriveService {
    async fn about(&self) -> Result<DriveUser> {
        let request = self
            .http
            .get(format!("{}/about", self.api_base))
            .query(&[("fields", "user")]);
        let response = check(self.send(request).await?).await?;
        let about: About = response.json().await?;
        Ok(about.user)
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<FileRecord>> {
        let request = self
            .http
            .get(self.file_url(id))
            .query(&[("fields", SUMMARY_FIELDS)]);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn list_children(
        &self,
        folder_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        self.files_page(&children_query(folder_id), page_token).await
    }

    async fn search(&self, filter: &str, page_token: Option<&str>) -> Result<FilePage> {
        self.files_page(filter, page_token).await
    }

    async fn create_record(
        &self,
        parent_id: Option<&str>,
        name: &str,
        content: Option<&FileContent>,
    ) -> Result<FileRecord> {
        let mut metadata = serde_json::json!({ "name": name });
        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        } else if let Some(drive_id) = &self.drive_id {
            metadata["parents"] = serde_json::json!([drive_id]);
        }

        match content {
            Some(content) => {
                metadata["mimeType"] = serde_json::json!(content.mime_type());
                let request = self.http.post(format!("{}/files", self.upload_base));
                self.upload_multipart(request, metadata, content, name).await
            }
            None => {
                metadata["mimeType"] = serde_json::json!(FOLDER_MIME_TYPE);
                let request = self
                    .http
                    .post(format!("{}/files", self.api_base))
                    .query(&[("fields", SUMMARY_FIELDS)])
                    .json(&metadata);
                let response = check(self.send(request).await?).await?;
                Ok(response.json().await?)
            }
        }
    }

    async fn update_record(&self, id: &str, content: &FileContent) -> Result<FileRecord> {
        let metadata = serde_json::json!({ "mimeType": content.mime_type() });
        let request = self
            .http
            .patch(format!("{}/files/{}", self.upload_base, id));
        let filename = match content.source() {
            ContentSource::Path(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(id)
                .to_string(),
            ContentSource::Bytes(_) => id.to_string(),
        };

        match self.upload_multipart(request, metadata, content, &filename).await {
            Err(DriveError::ApiError { status: 404, .. }) => Err(DriveError::NotFound(id.to_string())),
            other => other,
        }
    }

    async fn delete_record(&self, id: &str) -> Result<bool> {
        let response = self.send(self.http.delete(self.file_url(id))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("Delete of {} ignored: no such file", id);
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    async fn fetch_details(&self, id: &str) -> Result<FileRecord> {
        let request = self
            .http
            .get(self.file_url(id))
            .query(&[("fields", DETAIL_FIELDS)]);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DriveError::NotFound(id.to_string()));
        }
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    async fn grant_access(&self, id: &str, principal: &str) -> Result<bool> {
        let permission = serde_json::json!({
            "role": "reader",
            "type": "user",
            "emailAddress": principal,
        });
        let request = self
            .http
            .post(format!("{}/permissions", self.file_url(id)))
            .query(&[("sendNotificationEmail", "false")])
            .json(&permission);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    async fn download(&self, record: &FileRecord, destination: &Path) -> Result<PathBuf> {
        let final_path = resolve_destination(destination, &record.title)?;

        let request = self.http.get(self.file_url(&record.id)).query(&[("alt", "media")]);
        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DriveError::NotFound(record.id.clone()));
        }
        let response = check(response).await?;

        debug!("Downloading {} to {:?}", record.id, final_path);
        let mut file = File::create(&final_path).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_query_quotes_folder_id() {
        assert_eq!(
            children_query(None),
            "'root' in parents and trashed = false"
        );
        assert_eq!(
            children_query(Some(r"odd\id's")),
            r"'odd\\id\'s' in parents and trashed = false"
        );
    }
}
