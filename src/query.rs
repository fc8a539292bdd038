//! Paged listing and search.
//!
//! The backend answers listings one page at a time. [`FileIter`] hides the
//! page tokens: it walks pages on demand until the backend stops handing out
//! continuation tokens.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;

use crate::dispatch;
use crate::error::{DriveError, Result};
use crate::file::DriveFile;
use crate::models::FilePage;
use crate::provider::DriveService;

/// Filter selecting files other accounts have shared with this one.
pub(crate) const SHARED_WITH_ME_FILTER: &str = "sharedWithMe = true and trashed = false";

/// What a paged listing walks over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PageSource {
    /// Children of a folder; `None` is the root.
    Children(Option<String>),
    /// Records matching a filter expression.
    Search(String),
    /// Files shared with the authenticated account.
    SharedWithMe,
}

impl PageSource {
    pub(crate) async fn fetch(
        &self,
        service: &dyn DriveService,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        match self {
            PageSource::Children(folder) => service.list_children(folder.as_deref(), page_token).await,
            PageSource::Search(filter) => service.search(filter, page_token).await,
            PageSource::SharedWithMe => service.search(SHARED_WITH_ME_FILTER, page_token).await,
        }
    }
}

/// Fetch every page of `source` and return all entities in order.
pub(crate) async fn collect_all(
    service: Arc<dyn DriveService>,
    source: PageSource,
) -> Result<Vec<DriveFile>> {
    let mut files = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = source.fetch(service.as_ref(), page_token.as_deref()).await?;
        files.extend(page.records.into_iter().map(DriveFile::from_summary));

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    debug!("{:?} yielded {} file(s)", source, files.len());
    Ok(files)
}

/// First entity of `source`, if any.
///
/// Empty pages that still carry a continuation token are skipped.
pub(crate) async fn first(
    service: Arc<dyn DriveService>,
    source: PageSource,
) -> Result<Option<DriveFile>> {
    let mut page_token: Option<String> = None;

    loop {
        let page = source.fetch(service.as_ref(), page_token.as_deref()).await?;
        if let Some(record) = page.records.into_iter().next() {
            return Ok(Some(DriveFile::from_summary(record)));
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => return Ok(None),
        }
    }
}

/// Quote `value` as a string literal of the Drive query grammar.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Filter for a non-trashed file with exactly `title`, optionally in `parent`.
pub(crate) fn title_filter(title: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!(
            "name = {} and {} in parents and trashed = false",
            quote(title),
            quote(parent)
        ),
        None => format!("name = {} and trashed = false", quote(title)),
    }
}

/// Reject blank arguments before anything is dispatched.
pub(crate) fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DriveError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// Lazy, single-pass sequence of files from a listing or search.
///
/// Yields `Err` at most once: after a failed page fetch the iterator is
/// exhausted.
pub struct FileIter {
    service: Arc<dyn DriveService>,
    handle: Handle,
    source: PageSource,
    buffer: VecDeque<DriveFile>,
    next_page: Option<String>,
    done: bool,
}

impl FileIter {
    /// Start iterating, fetching the first page right away.
    pub(crate) fn start(
        service: Arc<dyn DriveService>,
        handle: Handle,
        source: PageSource,
    ) -> Result<Self> {
        let page = dispatch::block_on(&handle, source.fetch(service.as_ref(), None))?;
        let mut iter = Self {
            service,
            handle,
            source,
            buffer: VecDeque::new(),
            next_page: None,
            done: false,
        };
        iter.absorb(page);
        Ok(iter)
    }

    fn absorb(&mut self, page: FilePage) {
        self.buffer
            .extend(page.records.into_iter().map(DriveFile::from_summary));
        self.next_page = page.next_page_token;
        if self.next_page.is_none() {
            self.done = true;
        }
    }
}

impl Iterator for FileIter {
    type Item = Result<DriveFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.buffer.pop_front() {
                return Some(Ok(file));
            }
            if self.done {
                return None;
            }

            let token = self.next_page.take();
            let fetch = self.source.fetch(self.service.as_ref(), token.as_deref());
            match dispatch::block_on(&self.handle, fetch) {
                Ok(page) => self.absorb(page),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl fmt::Debug for FileIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIter")
            .field("source", &self.source)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("Title01"), "'Title01'");
        assert_eq!(quote("Bob's"), r"'Bob\'s'");
        assert_eq!(quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_title_filter() {
        assert_eq!(
            title_filter("Title01", None),
            "name = 'Title01' and trashed = false"
        );
        assert_eq!(
            title_filter("Title01", Some("folder1")),
            "name = 'Title01' and 'folder1' in parents and trashed = false"
        );
    }

    #[test]
    fn test_require() {
        assert!(require("id", "Id01").is_ok());
        assert!(matches!(
            require("id", "  "),
            Err(DriveError::InvalidArgument(_))
        ));
    }
}
