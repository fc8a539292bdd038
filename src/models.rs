//! Raw backend records and Drive API v3 payloads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Mime type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Metadata record for a file or folder, as the backend returns it.
///
/// Summary listings only fill the first few fields; a details fetch fills
/// the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    #[serde(rename = "name")]
    pub title: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, rename = "webContentLink")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default, deserialize_with = "deserialize_size", skip_serializing)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub md5_checksum: Option<String>,
    /// When the file was shared with the current account; `None` for files
    /// the account owns or reaches otherwise.
    #[serde(default)]
    pub shared_with_me_time: Option<String>,
}

impl FileRecord {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    /// Copy of this record restricted to the fields a listing returns.
    pub fn summary(&self) -> FileRecord {
        FileRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            mime_type: self.mime_type.clone(),
            download_url: self.download_url.clone(),
            description: self.description.clone(),
            parents: self.parents.clone(),
            trashed: self.trashed,
            ..Default::default()
        }
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        Some(s) => s.parse::<u64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// One page of a listing or search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    #[serde(default, rename = "files")]
    pub records: Vec<FileRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// The account a session is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    /// Stable account identifier (Drive reports it as the permission id).
    #[serde(default, rename = "permissionId")]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// About response from the Drive API.
#[derive(Debug, Deserialize)]
pub struct About {
    pub user: DriveUser,
}

/// Where the bytes of a [`FileContent`] come from.
#[derive(Debug, Clone)]
pub enum ContentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// Body and mime type for a create or update.
#[derive(Debug, Clone)]
pub struct FileContent {
    mime_type: String,
    source: ContentSource,
}

impl FileContent {
    pub fn new(mime_type: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            mime_type: mime_type.into(),
            source: ContentSource::Path(path.into()),
        }
    }

    /// Content read from `path`, with the mime type guessed from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        Self::new(mime_type, path)
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            source: ContentSource::Bytes(bytes.into()),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    /// Load the full body.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            ContentSource::Path(path) => Ok(tokio::fs::read(path).await?),
            ContentSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_file_record_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "webContentLink": "https://drive.google.com/uc?id=abc123",
            "parents": ["folder1"],
            "size": "2048"
        }"#;

        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.title, "report.pdf");
        assert_eq!(record.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(record.parents, vec!["folder1".to_string()]);
        assert_eq!(record.size, Some(2048));
        assert!(!record.trashed);
    }

    #[test]
    fn test_summary_drops_detail_fields() {
        let record = FileRecord {
            id: "abc".into(),
            title: "a.txt".into(),
            size: Some(12),
            modified_time: Some("2024-01-01T00:00:00Z".into()),
            ..Default::default()
        };

        let summary = record.summary();
        assert_eq!(summary.id, "abc");
        assert_eq!(summary.size, None);
        assert_eq!(summary.modified_time, None);
    }

    #[test]
    fn test_file_content_from_path_guesses_mime() {
        let content = FileContent::from_path("notes/readme.txt");
        assert_eq!(content.mime_type(), "text/plain");

        let unknown = FileContent::from_path("blob.unknownext");
        assert_eq!(unknown.mime_type(), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_file_content_read_bytes() {
        let content = FileContent::from_bytes("text/plain", b"hello".to_vec());
        assert_eq!(content.read().await.unwrap(), b"hello");
    }
}
