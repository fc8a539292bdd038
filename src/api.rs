//! Capability traits making up the facade's public surface.
//!
//! Each capability pairs a blocking method with an `_async` twin taking the
//! same arguments plus a [`Task`]. [`crate::Driven`] implements all of them.
//!
//! Data calls made without an authenticated session fail with
//! `NotAuthenticated` before anything reaches the backend. The async twins
//! never fail on the calling thread; every error goes to the task.

use std::path::{Path, PathBuf};

use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::file::DriveFile;
use crate::models::FileContent;
use crate::outcome::Outcome;
use crate::query::FileIter;
use crate::task::Task;

pub trait Auth {
    /// Authenticate with `credential`, optionally persisting it.
    fn authenticate_with(&self, credential: Credential, persist: bool) -> Outcome<DriveError>;

    fn authenticate_with_async(
        &self,
        credential: Credential,
        persist: bool,
        task: impl Task<Outcome<DriveError>>,
    );

    /// End the session. Succeeds when there is no session.
    fn deauthenticate(&self) -> Outcome<DriveError>;

    fn deauthenticate_async(&self, task: impl Task<Outcome<DriveError>>);

    fn is_authenticated(&self) -> bool;

    /// Authenticate and persist the credential.
    fn authenticate(&self, credential: Credential) -> Outcome<DriveError> {
        self.authenticate_with(credential, true)
    }

    fn authenticate_async(&self, credential: Credential, task: impl Task<Outcome<DriveError>>) {
        self.authenticate_with_async(credential, true, task)
    }
}

pub trait Get {
    /// File with `id`; `NotFound` if there is none.
    fn get(&self, id: &str) -> Result<DriveFile>;

    fn get_async(&self, id: &str, task: impl Task<Result<DriveFile>>);
}

pub trait GetByTitle {
    /// First non-trashed file named `title` anywhere in the drive.
    fn title(&self, title: &str) -> Result<DriveFile>;

    /// First non-trashed file named `title` directly inside `parent`.
    fn title_in(&self, parent: &DriveFile, title: &str) -> Result<DriveFile>;

    fn title_async(&self, title: &str, task: impl Task<Result<DriveFile>>);

    fn title_in_async(&self, parent: &DriveFile, title: &str, task: impl Task<Result<DriveFile>>);
}

pub trait Details {
    /// New entity with the full record of `file` merged in.
    fn details(&self, file: &DriveFile) -> Result<DriveFile>;

    fn details_async(&self, file: &DriveFile, task: impl Task<Result<DriveFile>>);
}

pub trait List {
    /// Everything in the drive root.
    fn list(&self) -> Result<FileIter>;

    /// Everything directly inside `folder`.
    fn list_in(&self, folder: &DriveFile) -> Result<FileIter>;

    fn list_async(&self, task: impl Task<Result<Vec<DriveFile>>>);

    fn list_in_async(&self, folder: &DriveFile, task: impl Task<Result<Vec<DriveFile>>>);

    /// Everything other accounts have shared with this one.
    fn shared(&self) -> Result<FileIter>;

    fn shared_async(&self, task: impl Task<Result<Vec<DriveFile>>>);
}

/// Creation. Without content a folder is created.
pub trait Post {
    fn create_at(
        &self,
        parent: Option<&DriveFile>,
        name: &str,
        content: Option<FileContent>,
    ) -> Result<DriveFile>;

    fn create_at_async(
        &self,
        parent: Option<&DriveFile>,
        name: &str,
        content: Option<FileContent>,
        task: impl Task<Result<DriveFile>>,
    );

    /// Folder `name` in the root.
    fn create(&self, name: &str) -> Result<DriveFile> {
        self.create_at(None, name, None)
    }

    fn create_with(&self, name: &str, content: FileContent) -> Result<DriveFile> {
        self.create_at(None, name, Some(content))
    }

    fn create_in(&self, parent: &DriveFile, name: &str) -> Result<DriveFile> {
        self.create_at(Some(parent), name, None)
    }

    fn create_in_with(
        &self,
        parent: &DriveFile,
        name: &str,
        content: FileContent,
    ) -> Result<DriveFile> {
        self.create_at(Some(parent), name, Some(content))
    }

    fn create_async(&self, name: &str, task: impl Task<Result<DriveFile>>) {
        self.create_at_async(None, name, None, task)
    }

    fn create_with_async(&self, name: &str, content: FileContent, task: impl Task<Result<DriveFile>>) {
        self.create_at_async(None, name, Some(content), task)
    }

    fn create_in_async(&self, parent: &DriveFile, name: &str, task: impl Task<Result<DriveFile>>) {
        self.create_at_async(Some(parent), name, None, task)
    }

    fn create_in_with_async(
        &self,
        parent: &DriveFile,
        name: &str,
        content: FileContent,
        task: impl Task<Result<DriveFile>>,
    ) {
        self.create_at_async(Some(parent), name, Some(content), task)
    }
}

pub trait Put {
    /// Replace the content of `file`; returns the entity as the backend
    /// reports it after the change.
    fn update(&self, file: &DriveFile, content: FileContent) -> Result<DriveFile>;

    fn update_async(&self, file: &DriveFile, content: FileContent, task: impl Task<Result<DriveFile>>);
}

pub trait Delete {
    /// `true` if a record was removed, `false` if `id` did not exist.
    fn delete(&self, id: &str) -> Result<bool>;

    fn delete_async(&self, id: &str, task: impl Task<Result<bool>>);
}

pub trait Query {
    /// First match for `filter`, `None` when nothing matches.
    fn first(&self, filter: &str) -> Result<Option<DriveFile>>;

    fn first_async(&self, filter: &str, task: impl Task<Result<Option<DriveFile>>>);

    /// Every match for `filter`, fetched page by page as the iterator advances.
    fn query(&self, filter: &str) -> Result<FileIter>;

    /// Every match for `filter`, collected across all pages.
    fn query_async(&self, filter: &str, task: impl Task<Result<Vec<DriveFile>>>);
}

pub trait Download {
    /// Save the body of `file` to `local` (a file path, or a directory to
    /// save into under the file's title).
    fn download(&self, file: &DriveFile, local: &Path) -> Result<PathBuf>;

    fn download_async(&self, file: &DriveFile, local: &Path, task: impl Task<Result<PathBuf>>);
}

pub trait Share {
    /// Grant `user` read access. `false` if the file does not exist.
    fn share(&self, file: &DriveFile, user: &str) -> Result<bool>;

    fn share_async(&self, file: &DriveFile, user: &str, task: impl Task<Result<bool>>);
}
