//! In-memory provider with deterministic fixtures.
//!
//! Accepts any credential and serves a seeded dataset (`Id01`..`Id03`), so
//! the facade can be exercised without network access. Understands a small
//! subset of the Drive query grammar:
//!
//! - `title = 'x'`, `name = 'x'`, `mimeType = 'x'`, `id = 'x'` (also `!=`,
//!   and `contains` for title/name)
//! - `'<folder id>' in parents`
//! - `trashed = true|false`
//! - `sharedWithMe = true|false`
//!
//! joined with `and`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{resolve_destination, DriveService, ServiceProvider};
use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::models::{DriveUser, FileContent, FilePage, FileRecord, FOLDER_MIME_TYPE};
use crate::outcome::Outcome;

/// Id of the implicit root folder.
pub const ROOT_ID: &str = "root";

const DEFAULT_PAGE_SIZE: usize = 100;

static AND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").expect("Invalid and regex"));

static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(title|name|mimeType|id)\s*(=|!=|contains)\s*'((?:[^'\\]|\\.)*)'$")
        .expect("Invalid field regex")
});

static PARENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^'((?:[^'\\]|\\.)*)'\s+in\s+parents$").expect("Invalid parent regex")
});

static TRASHED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^trashed\s*=\s*(true|false)$").expect("Invalid trashed regex")
});

static SHARED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sharedWithMe\s*=\s*(true|false)$").expect("Invalid sharedWithMe regex")
});

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Equals(Field, String),
    NotEquals(Field, String),
    Contains(String),
    InParents(String),
    Trashed(bool),
    SharedWithMe(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    MimeType,
    Id,
}

impl Field {
    fn value<'a>(&self, record: &'a FileRecord) -> &'a str {
        match self {
            Field::Title => &record.title,
            Field::MimeType => record.mime_type.as_deref().unwrap_or(""),
            Field::Id => &record.id,
        }
    }
}

impl Clause {
    fn matches(&self, record: &FileRecord) -> bool {
        match self {
            Clause::Equals(field, value) => field.value(record) == value,
            Clause::NotEquals(field, value) => field.value(record) != value,
            Clause::Contains(value) => record.title.contains(value.as_str()),
            Clause::InParents(parent) => record.parents.iter().any(|p| p == parent),
            Clause::Trashed(trashed) => record.trashed == *trashed,
            Clause::SharedWithMe(shared) => record.shared_with_me_time.is_some() == *shared,
        }
    }
}

fn unescape(value: &str) -> String {
    value.replace("\\'", "'").replace("\\\\", "\\")
}

fn parse_filter(filter: &str) -> Result<Vec<Clause>> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(DriveError::InvalidArgument("empty query".to_string()));
    }

    AND_REGEX
        .split(trimmed)
        .map(|clause| parse_clause(clause.trim()))
        .collect()
}

fn parse_clause(clause: &str) -> Result<Clause> {
    if let Some(captures) = FIELD_REGEX.captures(clause) {
        let field = match &captures[1] {
            "mimeType" => Field::MimeType,
            "id" => Field::Id,
            _ => Field::Title,
        };
        let value = unescape(&captures[3]);
        return match &captures[2] {
            "=" => Ok(Clause::Equals(field, value)),
            "!=" => Ok(Clause::NotEquals(field, value)),
            _ if field == Field::Title => Ok(Clause::Contains(value)),
            _ => Err(DriveError::InvalidArgument(format!(
                "'contains' is only supported on title: {}",
                clause
            ))),
        };
    }

    if let Some(captures) = PARENT_REGEX.captures(clause) {
        return Ok(Clause::InParents(unescape(&captures[1])));
    }

    if let Some(captures) = TRASHED_REGEX.captures(clause) {
        return Ok(Clause::Trashed(&captures[1] == "true"));
    }

    if let Some(captures) = SHARED_REGEX.captures(clause) {
        return Ok(Clause::SharedWithMe(&captures[1] == "true"));
    }

    Err(DriveError::InvalidArgument(format!(
        "unsupported query clause: {}",
        clause
    )))
}

#[derive(Debug, Clone)]
struct StubEntry {
    record: FileRecord,
    content: Vec<u8>,
    readers: Vec<String>,
}

#[derive(Debug, Default)]
struct StubState {
    entries: BTreeMap<String, StubEntry>,
    next_id: usize,
}

/// Dataset shared between a provider and the handles it gives out.
#[derive(Debug)]
struct StubStore {
    state: Mutex<StubState>,
    page_size: usize,
    calls: AtomicUsize,
}

impl StubStore {
    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self, operation: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("stub: {}", operation);
    }

    fn page(&self, matches: Vec<FileRecord>, page_token: Option<&str>) -> Result<FilePage> {
        let offset = match page_token {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                DriveError::InvalidArgument(format!("bad page token: {}", token))
            })?,
        };

        let end = (offset + self.page_size).min(matches.len());
        let records = matches
            .get(offset..end)
            .map(<[FileRecord]>::to_vec)
            .unwrap_or_default();
        let next_page_token = (end < matches.len()).then(|| end.to_string());

        Ok(FilePage {
            records,
            next_page_token,
        })
    }
}

fn fixture(n: usize) -> (FileRecord, Vec<u8>) {
    let content = format!("Content{:02}", n).into_bytes();
    let record = FileRecord {
        id: format!("Id{:02}", n),
        title: format!("Title{:02}", n),
        mime_type: Some(format!("MimeType{:02}", n)),
        download_url: Some(format!("DownloadUrl{:02}", n)),
        description: Some(format!("Description{:02}", n)),
        parents: vec![ROOT_ID.to_string()],
        trashed: false,
        size: Some(content.len() as u64),
        created_time: Some("2014-05-03T00:00:00.000Z".to_string()),
        modified_time: Some("2014-05-03T00:00:00.000Z".to_string()),
        web_view_link: Some(format!("WebViewLink{:02}", n)),
        md5_checksum: None,
        shared_with_me_time: None,
    };
    (record, content)
}

/// Fixture-backed [`ServiceProvider`].
pub struct StubProvider {
    store: Arc<StubStore>,
    service: Mutex<Option<Arc<StubService>>>,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StubProvider {
    /// Provider seeded with `Id01`..`Id03`.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let seed = (1..=3).map(fixture).collect();
        Self::from_seed(seed, page_size)
    }

    /// Provider serving exactly `records`; content of each is its title.
    pub fn with_records(records: Vec<FileRecord>, page_size: usize) -> Self {
        let seed = records
            .into_iter()
            .map(|record| {
                let content = record.title.clone().into_bytes();
                (record, content)
            })
            .collect();
        Self::from_seed(seed, page_size)
    }

    fn from_seed(seed: Vec<(FileRecord, Vec<u8>)>, page_size: usize) -> Self {
        let mut state = StubState::default();
        for (record, content) in seed {
            state.entries.insert(
                record.id.clone(),
                StubEntry {
                    record,
                    content,
                    readers: Vec::new(),
                },
            );
        }
        state.next_id = state.entries.len() + 1;

        Self {
            store: Arc::new(StubStore {
                state: Mutex::new(state),
                page_size: page_size.max(1),
                calls: AtomicUsize::new(0),
            }),
            service: Mutex::new(None),
        }
    }

    /// Number of backend operations served so far.
    pub fn remote_calls(&self) -> usize {
        self.store.calls.load(Ordering::SeqCst)
    }

    /// Principals granted access to `id`.
    pub fn readers(&self, id: &str) -> Vec<String> {
        self.store
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.readers.clone())
            .unwrap_or_default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<StubService>>> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ServiceProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn initialize(&self, credential: &Credential, _persist: bool) -> Outcome<DriveError> {
        debug!(
            "stub: accepting credential for {}",
            credential.account().unwrap_or("<unnamed>")
        );
        *self.slot() = Some(Arc::new(StubService {
            store: Arc::clone(&self.store),
        }));
        Outcome::success()
    }

    fn authenticated_service(&self) -> Option<Arc<dyn DriveService>> {
        self.slot()
            .as_ref()
            .map(|service| Arc::clone(service) as Arc<dyn DriveService>)
    }

    async fn teardown(&self) {
        *self.slot() = None;
    }
}

/// Handle served by [`StubProvider`].
#[derive(Debug)]
pub struct StubService {
    store: Arc<StubStore>,
}

#[async_trait]
impl DriveService for StubService {
    async fn about(&self) -> Result<DriveUser> {
        self.store.record_call("about");
        Ok(DriveUser {
            name: Some("Name".to_string()),
            display_name: Some("DisplayName".to_string()),
            email_address: Some("EmailAddress".to_string()),
        })
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<FileRecord>> {
        self.store.record_call("get_metadata");
        let state = self.store.lock();
        Ok(state.entries.get(id).map(|entry| entry.record.summary()))
    }

    async fn list_children(
        &self,
        folder_id: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        self.store.record_call("list_children");
        let parent = folder_id.unwrap_or(ROOT_ID);
        let matches: Vec<FileRecord> = {
            let state = self.store.lock();
            state
                .entries
                .values()
                .filter(|entry| {
                    !entry.record.trashed && entry.record.parents.iter().any(|p| p == parent)
                })
                .map(|entry| entry.record.summary())
                .collect()
        };
        self.store.page(matches, page_token)
    }

    async fn search(&self, filter: &str, page_token: Option<&str>) -> Result<FilePage> {
        self.store.record_call("search");
        let clauses = parse_filter(filter)?;
        let matches: Vec<FileRecord> = {
            let state = self.store.lock();
            state
                .entries
                .values()
                .filter(|entry| clauses.iter().all(|c| c.matches(&entry.record)))
                .map(|entry| entry.record.summary())
                .collect()
        };
        self.store.page(matches, page_token)
    }

    async fn create_record(
        &self,
        parent_id: Option<&str>,
        name: &str,
        content: Option<&FileContent>,
    ) -> Result<FileRecord> {
        self.store.record_call("create_record");
        let body = match content {
            Some(content) => Some(content.read().await?),
            None => None,
        };
        let parent = parent_id.unwrap_or(ROOT_ID).to_string();

        let mut state = self.store.lock();
        if parent != ROOT_ID {
            match state.entries.get(&parent) {
                Some(entry) if entry.record.is_folder() => {}
                Some(_) => {
                    return Err(DriveError::InvalidArgument(format!(
                        "parent {} is not a folder",
                        parent
                    )))
                }
                None => return Err(DriveError::NotFound(parent)),
            }
        }

        let mut id = format!("Id{:02}", state.next_id);
        while state.entries.contains_key(&id) {
            state.next_id += 1;
            id = format!("Id{:02}", state.next_id);
        }
        state.next_id += 1;

        let is_folder = content.is_none();
        let body = body.unwrap_or_default();
        let record = FileRecord {
            id: id.clone(),
            title: name.to_string(),
            mime_type: Some(match content {
                Some(content) => content.mime_type().to_string(),
                None => FOLDER_MIME_TYPE.to_string(),
            }),
            download_url: (!is_folder).then(|| format!("DownloadUrl{}", &id[2..])),
            parents: vec![parent],
            size: (!is_folder).then_some(body.len() as u64),
            ..Default::default()
        };

        state.entries.insert(
            id,
            StubEntry {
                record: record.clone(),
                content: body,
                readers: Vec::new(),
            },
        );
        Ok(record.summary())
    }

    async fn update_record(&self, id: &str, content: &FileContent) -> Result<FileRecord> {
        self.store.record_call("update_record");
        let body = content.read().await?;

        let mut state = self.store.lock();
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| DriveError::NotFound(id.to_string()))?;
        entry.record.mime_type = Some(content.mime_type().to_string());
        entry.record.size = Some(body.len() as u64);
        entry.content = body;
        Ok(entry.record.summary())
    }

    async fn delete_record(&self, id: &str) -> Result<bool> {
        self.store.record_call("delete_record");
        let mut state = self.store.lock();
        if state.entries.remove(id).is_none() {
            return Ok(false);
        }

        // Drop everything that lived under the deleted record.
        let mut orphans = vec![id.to_string()];
        while let Some(parent) = orphans.pop() {
            let children: Vec<String> = state
                .entries
                .values()
                .filter(|entry| entry.record.parents.contains(&parent))
                .map(|entry| entry.record.id.clone())
                .collect();
            for child in children {
                state.entries.remove(&child);
                orphans.push(child);
            }
        }
        Ok(true)
    }

    async fn fetch_details(&self, id: &str) -> Result<FileRecord> {
        self.store.record_call("fetch_details");
        let state = self.store.lock();
        state
            .entries
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    async fn grant_access(&self, id: &str, principal: &str) -> Result<bool> {
        self.store.record_call("grant_access");
        let mut state = self.store.lock();
        match state.entries.get_mut(id) {
            Some(entry) => {
                if !entry.readers.iter().any(|r| r == principal) {
                    entry.readers.push(principal.to_string());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn download(&self, record: &FileRecord, destination: &Path) -> Result<PathBuf> {
        self.store.record_call("download");
        let content = {
            let state = self.store.lock();
            let entry = state
                .entries
                .get(&record.id)
                .ok_or_else(|| DriveError::NotFound(record.id.clone()))?;
            if entry.record.is_folder() {
                return Err(DriveError::InvalidArgument(format!(
                    "{} is a folder",
                    record.id
                )));
            }
            entry.content.clone()
        };

        let path = resolve_destination(destination, &record.title)?;
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_clauses() {
        let clauses =
            parse_filter("title = 'Title01' and 'root' in parents and trashed = false").unwrap();
        assert_eq!(
            clauses,
            vec![
                Clause::Equals(Field::Title, "Title01".to_string()),
                Clause::InParents("root".to_string()),
                Clause::Trashed(false),
            ]
        );
    }

    #[test]
    fn test_parse_filter_shared_with_me() {
        let clauses = parse_filter("sharedWithMe = true and trashed = false").unwrap();
        assert_eq!(
            clauses,
            vec![Clause::SharedWithMe(true), Clause::Trashed(false)]
        );

        let shared = FileRecord {
            shared_with_me_time: Some("2014-05-03T00:00:00.000Z".to_string()),
            ..Default::default()
        };
        assert!(clauses.iter().all(|c| c.matches(&shared)));
        assert!(!Clause::SharedWithMe(true).matches(&FileRecord::default()));
    }

    #[test]
    fn test_parse_filter_unescapes_quotes() {
        let clauses = parse_filter(r"name = 'Bob\'s file'").unwrap();
        assert_eq!(
            clauses,
            vec![Clause::Equals(Field::Title, "Bob's file".to_string())]
        );
    }

    #[test]
    fn test_parse_filter_rejects_unknown_grammar() {
        assert!(matches!(
            parse_filter("modifiedTime > '2012-06-04'"),
            Err(DriveError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_filter("   "),
            Err(DriveError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_filter("mimeType contains 'x'"),
            Err(DriveError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_paging_splits_results() {
        let provider = StubProvider::with_page_size(2);
        let service = StubService {
            store: Arc::clone(&provider.store),
        };

        let first = service.list_children(None, None).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = service.list_children(None, Some("2")).await.unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(second.next_page_token.is_none());
        assert_eq!(provider.remote_calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_descendants() {
        let provider = StubProvider::new();
        let service = StubService {
            store: Arc::clone(&provider.store),
        };

        let folder = service.create_record(None, "Folder", None).await.unwrap();
        let content = FileContent::from_bytes("text/plain", b"x".to_vec());
        let child = service
            .create_record(Some(&folder.id), "child.txt", Some(&content))
            .await
            .unwrap();

        assert!(service.delete_record(&folder.id).await.unwrap());
        assert!(service.get_metadata(&child.id).await.unwrap().is_none());
        assert!(!service.delete_record(&folder.id).await.unwrap());
    }
}
