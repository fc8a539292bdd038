//! driven - a session-aware facade over a remote Drive.
//!
//! This library provides:
//! - One authenticated session per [`Driven`] facade
//! - Get, list, create, update, delete, query, download and share, each in a
//!   blocking form and an `_async` form reporting through a [`Task`]
//! - Pluggable backends: Google Drive, or an in-memory stub with fixed data
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use driven::prelude::*;
//! use driven::{Credential, Driven, StubProvider};
//!
//! fn main() -> driven::Result<()> {
//!     let driven = Driven::new(Arc::new(StubProvider::new()))?;
//!     driven.authenticate(Credential::named("me")).into_result()?;
//!
//!     for file in driven.query("title = 'Title01'")? {
//!         println!("{}", file?);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod credential;
mod dispatch;
pub mod error;
pub mod facade;
pub mod file;
pub mod models;
pub mod outcome;
pub mod provider;
pub mod query;
pub mod session;
pub mod task;
pub mod url_parser;

/// Capability traits, needed in scope to call facade operations.
pub mod prelude {
    pub use crate::api::{
        Auth, Delete, Details, Download, Get, GetByTitle, List, Post, Put, Query, Share,
    };
}

// Re-exports for convenience
pub use config::{BackendKind, Config};
pub use credential::{Credential, CredentialSource, CredentialStore};
pub use facade::Driven;
pub use error::{DriveError, ErrorKind, Result};
pub use file::DriveFile;
pub use models::{DriveUser, FileContent, FileRecord};
pub use outcome::Outcome;
pub use provider::{DriveService, GoogleDriveProvider, ServiceProvider, StubProvider};
pub use query::FileIter;
pub use session::SessionState;
pub use task::{Completion, Task};
pub use url_parser::extract_id;
