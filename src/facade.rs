//! The facade: one session, one provider, every operation in blocking and
//! callback form.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::api::{Auth, Delete, Details, Download, Get, GetByTitle, List, Post, Put, Query, Share};
use crate::config::Config;
use crate::credential::Credential;
use crate::dispatch::Dispatcher;
use crate::error::{DriveError, Result};
use crate::file::DriveFile;
use crate::models::{DriveUser, FileContent};
use crate::outcome::Outcome;
use crate::provider::{self, DriveService, ServiceProvider};
use crate::query::{self, require, FileIter, PageSource};
use crate::session::{SessionManager, SessionState};
use crate::task::Task;

const DEFAULT_WORKERS: usize = 4;

/// Session-aware entry point to a Drive backend.
///
/// Blocking methods must not be called from a current-thread tokio runtime;
/// from a multi-threaded runtime they are run via `block_in_place`.
pub struct Driven {
    provider: Arc<dyn ServiceProvider>,
    session: Arc<SessionManager>,
    dispatcher: Dispatcher,
}

impl Driven {
    pub fn new(provider: Arc<dyn ServiceProvider>) -> Result<Self> {
        Self::with_workers(provider, DEFAULT_WORKERS)
    }

    /// Facade whose async calls run on `worker_threads` threads.
    pub fn with_workers(provider: Arc<dyn ServiceProvider>, worker_threads: usize) -> Result<Self> {
        debug!(
            "Creating facade over {} provider with {} worker(s)",
            provider.name(),
            worker_threads
        );
        Ok(Self {
            provider,
            session: Arc::new(SessionManager::new()),
            dispatcher: Dispatcher::new(worker_threads)?,
        })
    }

    /// Facade over the provider selected by `config.backend`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_workers(provider::from_config(config)?, config.worker_threads)
    }

    pub fn provider(&self) -> &dyn ServiceProvider {
        self.provider.as_ref()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Credential of the current session.
    pub fn credential(&self) -> Option<Credential> {
        self.session.credential()
    }

    /// Backend handle of the current session.
    pub fn service(&self) -> Result<Arc<dyn DriveService>> {
        self.session.service()
    }

    /// The account the session is authenticated as.
    pub fn user(&self) -> Result<DriveUser> {
        self.run(Ok(()), |service| async move { service.about().await })
    }

    pub fn user_async(&self, task: impl Task<Result<DriveUser>>) {
        self.run_async(Ok(()), |service| async move { service.about().await }, task)
    }

    /// Session check, argument check, then block on `op`.
    fn run<T, F, Fut>(&self, check: Result<()>, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn DriveService>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let service = self.session.service()?;
        check?;
        self.dispatcher.block_on(op(service))
    }

    /// Same checks as [`Driven::run`], on the calling thread; the work and
    /// any failure are delivered to `task` from a worker.
    fn run_async<T, F, Fut>(&self, check: Result<()>, op: F, task: impl Task<Result<T>>)
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn DriveService>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.session.service().and_then(|service| check.map(|()| service)) {
            Ok(service) => self.dispatcher.spawn(op(service), task),
            Err(e) => {
                debug!("Rejected async call before dispatch: {}", e);
                self.dispatcher.spawn(async move { Err(e) }, task)
            }
        }
    }

    fn iterate(&self, check: Result<()>, source: PageSource) -> Result<FileIter> {
        let service = self.session.service()?;
        check?;
        FileIter::start(service, self.dispatcher.handle().clone(), source)
    }
}

async fn fetch_file(service: Arc<dyn DriveService>, id: String) -> Result<DriveFile> {
    match service.get_metadata(&id).await? {
        Some(record) => Ok(DriveFile::from_summary(record)),
        None => Err(DriveError::NotFound(id)),
    }
}

async fn fetch_by_title(
    service: Arc<dyn DriveService>,
    title: String,
    parent: Option<String>,
) -> Result<DriveFile> {
    let filter = query::title_filter(&title, parent.as_deref());
    query::first(service, PageSource::Search(filter))
        .await?
        .ok_or_else(|| DriveError::NotFound(format!("title '{}'", title)))
}

async fn fetch_details(service: Arc<dyn DriveService>, file: DriveFile) -> Result<DriveFile> {
    let details = service.fetch_details(file.id()).await?;
    Ok(file.with_details(details))
}

async fn create_file(
    service: Arc<dyn DriveService>,
    parent: Option<String>,
    name: String,
    content: Option<FileContent>,
) -> Result<DriveFile> {
    let record = service
        .create_record(parent.as_deref(), &name, content.as_ref())
        .await?;
    debug!("Created {} ({})", record.title, record.id);
    Ok(DriveFile::from_summary(record))
}

async fn update_file(
    service: Arc<dyn DriveService>,
    id: String,
    content: FileContent,
) -> Result<DriveFile> {
    let record = service.update_record(&id, &content).await?;
    Ok(DriveFile::from_summary(record))
}

async fn download_file(
    service: Arc<dyn DriveService>,
    file: DriveFile,
    local: PathBuf,
) -> Result<PathBuf> {
    service.download(file.model(), &local).await
}

fn require_path(local: &Path) -> Result<()> {
    if local.as_os_str().is_empty() {
        return Err(DriveError::InvalidArgument(
            "download destination must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl Auth for Driven {
    fn authenticate_with(&self, credential: Credential, persist: bool) -> Outcome<DriveError> {
        self.dispatcher.block_on(
            self.session
                .authenticate(self.provider.as_ref(), credential, persist),
        )
    }

    fn authenticate_with_async(
        &self,
        credential: Credential,
        persist: bool,
        task: impl Task<Outcome<DriveError>>,
    ) {
        let session = Arc::clone(&self.session);
        let provider = Arc::clone(&self.provider);
        self.dispatcher.spawn_outcome(
            async move {
                session
                    .authenticate(provider.as_ref(), credential, persist)
                    .await
            },
            task,
        )
    }

    fn deauthenticate(&self) -> Outcome<DriveError> {
        self.dispatcher
            .block_on(self.session.deauthenticate(self.provider.as_ref()))
    }

    fn deauthenticate_async(&self, task: impl Task<Outcome<DriveError>>) {
        let session = Arc::clone(&self.session);
        let provider = Arc::clone(&self.provider);
        self.dispatcher.spawn_outcome(
            async move { session.deauthenticate(provider.as_ref()).await },
            task,
        )
    }

    fn is_authenticated(&self) -> bool {
        self.session.state() == SessionState::Authenticated
    }
}

impl Get for Driven {
    fn get(&self, id: &str) -> Result<DriveFile> {
        self.run(require("id", id), |s| fetch_file(s, id.to_string()))
    }

    fn get_async(&self, id: &str, task: impl Task<Result<DriveFile>>) {
        let id = id.to_string();
        self.run_async(require("id", &id), |s| fetch_file(s, id), task)
    }
}

impl GetByTitle for Driven {
    fn title(&self, title: &str) -> Result<DriveFile> {
        self.run(require("title", title), |s| {
            fetch_by_title(s, title.to_string(), None)
        })
    }

    fn title_in(&self, parent: &DriveFile, title: &str) -> Result<DriveFile> {
        self.run(require("title", title), |s| {
            fetch_by_title(s, title.to_string(), Some(parent.id().to_string()))
        })
    }

    fn title_async(&self, title: &str, task: impl Task<Result<DriveFile>>) {
        let title = title.to_string();
        self.run_async(
            require("title", &title),
            |s| fetch_by_title(s, title, None),
            task,
        )
    }

    fn title_in_async(&self, parent: &DriveFile, title: &str, task: impl Task<Result<DriveFile>>) {
        let title = title.to_string();
        let parent = parent.id().to_string();
        self.run_async(
            require("title", &title),
            |s| fetch_by_title(s, title, Some(parent)),
            task,
        )
    }
}

impl Details for Driven {
    fn details(&self, file: &DriveFile) -> Result<DriveFile> {
        self.run(require("id", file.id()), |s| fetch_details(s, file.clone()))
    }

    fn details_async(&self, file: &DriveFile, task: impl Task<Result<DriveFile>>) {
        let file = file.clone();
        self.run_async(require("id", file.id()), |s| fetch_details(s, file), task)
    }
}

impl List for Driven {
    fn list(&self) -> Result<FileIter> {
        self.iterate(Ok(()), PageSource::Children(None))
    }

    fn list_in(&self, folder: &DriveFile) -> Result<FileIter> {
        self.iterate(
            require("folder id", folder.id()),
            PageSource::Children(Some(folder.id().to_string())),
        )
    }

    fn list_async(&self, task: impl Task<Result<Vec<DriveFile>>>) {
        self.run_async(
            Ok(()),
            |s| query::collect_all(s, PageSource::Children(None)),
            task,
        )
    }

    fn list_in_async(&self, folder: &DriveFile, task: impl Task<Result<Vec<DriveFile>>>) {
        let source = PageSource::Children(Some(folder.id().to_string()));
        self.run_async(
            require("folder id", folder.id()),
            |s| query::collect_all(s, source),
            task,
        )
    }

    fn shared(&self) -> Result<FileIter> {
        self.iterate(Ok(()), PageSource::SharedWithMe)
    }

    fn shared_async(&self, task: impl Task<Result<Vec<DriveFile>>>) {
        self.run_async(
            Ok(()),
            |s| query::collect_all(s, PageSource::SharedWithMe),
            task,
        )
    }
}

impl Post for Driven {
    fn create_at(
        &self,
        parent: Option<&DriveFile>,
        name: &str,
        content: Option<FileContent>,
    ) -> Result<DriveFile> {
        let parent = parent.map(|p| p.id().to_string());
        self.run(require("name", name), |s| {
            create_file(s, parent, name.to_string(), content)
        })
    }

    fn create_at_async(
        &self,
        parent: Option<&DriveFile>,
        name: &str,
        content: Option<FileContent>,
        task: impl Task<Result<DriveFile>>,
    ) {
        let parent = parent.map(|p| p.id().to_string());
        let name = name.to_string();
        self.run_async(
            require("name", &name),
            |s| create_file(s, parent, name, content),
            task,
        )
    }
}

impl Put for Driven {
    fn update(&self, file: &DriveFile, content: FileContent) -> Result<DriveFile> {
        self.run(require("id", file.id()), |s| {
            update_file(s, file.id().to_string(), content)
        })
    }

    fn update_async(&self, file: &DriveFile, content: FileContent, task: impl Task<Result<DriveFile>>) {
        let id = file.id().to_string();
        self.run_async(require("id", &id), |s| update_file(s, id, content), task)
    }
}

impl Delete for Driven {
    fn delete(&self, id: &str) -> Result<bool> {
        self.run(require("id", id), |s| async move {
            s.delete_record(id).await
        })
    }

    fn delete_async(&self, id: &str, task: impl Task<Result<bool>>) {
        let id = id.to_string();
        self.run_async(
            require("id", &id),
            |s| async move { s.delete_record(&id).await },
            task,
        )
    }
}

impl Query for Driven {
    fn first(&self, filter: &str) -> Result<Option<DriveFile>> {
        self.run(require("query", filter), |s| {
            query::first(s, PageSource::Search(filter.to_string()))
        })
    }

    fn first_async(&self, filter: &str, task: impl Task<Result<Option<DriveFile>>>) {
        let source = PageSource::Search(filter.to_string());
        self.run_async(require("query", filter), |s| query::first(s, source), task)
    }

    fn query(&self, filter: &str) -> Result<FileIter> {
        self.iterate(
            require("query", filter),
            PageSource::Search(filter.to_string()),
        )
    }

    fn query_async(&self, filter: &str, task: impl Task<Result<Vec<DriveFile>>>) {
        let source = PageSource::Search(filter.to_string());
        self.run_async(
            require("query", filter),
            |s| query::collect_all(s, source),
            task,
        )
    }
}

impl Download for Driven {
    fn download(&self, file: &DriveFile, local: &Path) -> Result<PathBuf> {
        self.run(require_path(local), |s| {
            download_file(s, file.clone(), local.to_path_buf())
        })
    }

    fn download_async(&self, file: &DriveFile, local: &Path, task: impl Task<Result<PathBuf>>) {
        let file = file.clone();
        let local = local.to_path_buf();
        self.run_async(
            require_path(&local),
            |s| download_file(s, file, local),
            task,
        )
    }
}

impl Share for Driven {
    fn share(&self, file: &DriveFile, user: &str) -> Result<bool> {
        self.run(require("user", user), |s| async move {
            s.grant_access(file.id(), user).await
        })
    }

    fn share_async(&self, file: &DriveFile, user: &str, task: impl Task<Result<bool>>) {
        let id = file.id().to_string();
        let user = user.to_string();
        self.run_async(
            require("user", &user),
            |s| async move { s.grant_access(&id, &user).await },
            task,
        )
    }
}
