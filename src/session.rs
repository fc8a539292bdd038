//! Authentication state of a facade.
//!
//! Transitions (`authenticate`, `deauthenticate`) are serialized by an async
//! mutex. Data calls only take a short read of the current state to grab the
//! backend handle; a transition that lands right after that read does not
//! affect the call already in flight.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::credential::Credential;
use crate::error::{DriveError, Result};
use crate::outcome::Outcome;
use crate::provider::{DriveService, ServiceProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// An `authenticate` from the unauthenticated state is in progress.
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Unauthenticated => write!(f, "unauthenticated"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
        }
    }
}

struct Session {
    state: SessionState,
    credential: Option<Credential>,
    service: Option<Arc<dyn DriveService>>,
}

impl Session {
    fn unauthenticated() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            credential: None,
            service: None,
        }
    }
}

/// The single session owned by a facade.
pub(crate) struct SessionManager {
    session: RwLock<Session>,
    transitions: Mutex<()>,
}

impl SessionManager {
    pub(crate) fn new() -> Self {
        Self {
            session: RwLock::new(Session::unauthenticated()),
            transitions: Mutex::new(()),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.read(|session| session.state)
    }

    pub(crate) fn credential(&self) -> Option<Credential> {
        self.read(|session| session.credential.clone())
    }

    /// Backend handle of the current session, `NotAuthenticated` without one.
    pub(crate) fn service(&self) -> Result<Arc<dyn DriveService>> {
        self.read(|session| match (&session.state, &session.service) {
            (SessionState::Authenticated, Some(service)) => Ok(Arc::clone(service)),
            _ => Err(DriveError::NotAuthenticated),
        })
    }

    pub(crate) async fn authenticate(
        &self,
        provider: &dyn ServiceProvider,
        credential: Credential,
        persist: bool,
    ) -> Outcome<DriveError> {
        let _transition = self.transitions.lock().await;

        self.write(|session| {
            if session.state == SessionState::Unauthenticated {
                session.state = SessionState::Authenticating;
            }
        });

        let outcome = match AssertUnwindSafe(provider.initialize(&credential, persist))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Outcome::failure(DriveError::TaskFailed(format!(
                "{} provider panicked while authenticating",
                provider.name()
            ))),
        };
        if !outcome.is_success() {
            warn!("Authentication with {} provider failed", provider.name());
            self.write(|session| *session = Session::unauthenticated());
            return outcome;
        }

        match provider.authenticated_service() {
            Some(service) => {
                info!("Session authenticated via {} provider", provider.name());
                self.write(|session| {
                    *session = Session {
                        state: SessionState::Authenticated,
                        credential: Some(credential),
                        service: Some(service),
                    }
                });
                Outcome::success()
            }
            None => {
                self.write(|session| *session = Session::unauthenticated());
                Outcome::failure(DriveError::AuthenticationFailed(format!(
                    "{} provider returned no backend handle",
                    provider.name()
                )))
            }
        }
    }

    pub(crate) async fn deauthenticate(&self, provider: &dyn ServiceProvider) -> Outcome<DriveError> {
        let _transition = self.transitions.lock().await;

        if self.state() == SessionState::Unauthenticated {
            return Outcome::success();
        }

        let torn_down = AssertUnwindSafe(provider.teardown()).catch_unwind().await;
        self.write(|session| *session = Session::unauthenticated());
        if torn_down.is_err() {
            warn!("Teardown of {} provider panicked", provider.name());
            return Outcome::failure(DriveError::TaskFailed(format!(
                "{} provider panicked while tearing down",
                provider.name()
            )));
        }
        info!("Session closed");
        Outcome::success()
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        f(&session)
    }

    fn write(&self, f: impl FnOnce(&mut Session)) {
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StubProvider;

    #[tokio::test]
    async fn test_lifecycle() {
        let provider = StubProvider::new();
        let manager = SessionManager::new();
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(matches!(manager.service(), Err(DriveError::NotAuthenticated)));

        let outcome = manager
            .authenticate(&provider, Credential::named("tester"), true)
            .await;
        assert!(outcome.is_success());
        assert_eq!(manager.state(), SessionState::Authenticated);
        assert!(manager.service().is_ok());
        assert_eq!(
            manager.credential().and_then(|c| c.account().map(str::to_string)),
            Some("tester".to_string())
        );

        assert!(manager.deauthenticate(&provider).await.is_success());
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(manager.credential().is_none());
        assert!(manager.deauthenticate(&provider).await.is_success());
    }
}
