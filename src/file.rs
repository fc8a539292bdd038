//! The file entity handed out by the facade.

use std::fmt;
use std::sync::Arc;

use crate::models::{format_size, FileRecord};

/// Normalized, immutable view over one remote file.
///
/// Entities returned by get/list/query carry summary data only
/// (`has_details() == false`). [`crate::Driven::details`] returns a new
/// entity with the full record merged in and leaves the receiver unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveFile {
    model: Arc<FileRecord>,
    has_details: bool,
}

impl DriveFile {
    pub(crate) fn from_summary(record: FileRecord) -> Self {
        Self {
            model: Arc::new(record),
            has_details: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.model.id
    }

    pub fn title(&self) -> &str {
        &self.model.title
    }

    /// Mime type of the file.
    pub fn mime_type(&self) -> Option<&str> {
        self.model.mime_type.as_deref()
    }

    pub fn download_url(&self) -> Option<&str> {
        self.model.download_url.as_deref()
    }

    pub fn is_folder(&self) -> bool {
        self.model.is_folder()
    }

    pub fn has_details(&self) -> bool {
        self.has_details
    }

    /// The raw backend record behind this entity.
    pub fn model(&self) -> &FileRecord {
        &self.model
    }

    /// Build the detailed counterpart of this entity.
    ///
    /// Fields present in `details` win; fields it lacks keep their summary
    /// value. The id never changes.
    pub(crate) fn with_details(&self, details: FileRecord) -> DriveFile {
        let summary = &*self.model;
        let merged = FileRecord {
            id: summary.id.clone(),
            title: if details.title.is_empty() {
                summary.title.clone()
            } else {
                details.title
            },
            mime_type: details.mime_type.or_else(|| summary.mime_type.clone()),
            download_url: details
                .download_url
                .or_else(|| summary.download_url.clone()),
            description: details.description.or_else(|| summary.description.clone()),
            parents: if details.parents.is_empty() {
                summary.parents.clone()
            } else {
                details.parents
            },
            trashed: details.trashed,
            size: details.size.or(summary.size),
            created_time: details.created_time.or_else(|| summary.created_time.clone()),
            modified_time: details
                .modified_time
                .or_else(|| summary.modified_time.clone()),
            web_view_link: details
                .web_view_link
                .or_else(|| summary.web_view_link.clone()),
            md5_checksum: details.md5_checksum.or_else(|| summary.md5_checksum.clone()),
            shared_with_me_time: details
                .shared_with_me_time
                .or_else(|| summary.shared_with_me_time.clone()),
        };

        DriveFile {
            model: Arc::new(merged),
            has_details: true,
        }
    }
}

impl fmt::Display for DriveFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size_str = self
            .model
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let mime = self.mime_type().unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id(), size_str, mime, self.title())
    }
}
