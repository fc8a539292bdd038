//! Success/failure wrapper for calls that change session state.

use std::fmt;

/// Outcome of an operation without a natural return value.
///
/// `authenticate` and `deauthenticate` report expected failures through this
/// type instead of an error return, so callers always get the same shape back.
#[derive(Debug)]
pub struct Outcome<E> {
    error: Option<E>,
}

impl<E> Outcome<E> {
    pub fn success() -> Self {
        Self { error: None }
    }

    pub fn failure(error: E) -> Self {
        Self { error: Some(error) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The failure cause, absent on success.
    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Convert into a standard `Result`, e.g. to use `?` on it.
    pub fn into_result(self) -> Result<(), E> {
        match self.error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl<E> From<Result<(), E>> for Outcome<E> {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Outcome::success(),
            Err(e) => Outcome::failure(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Outcome<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "success"),
            Some(e) => write!(f, "failure: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriveError;

    #[test]
    fn test_success_has_no_error() {
        let outcome: Outcome<DriveError> = Outcome::success();
        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_failure_carries_error() {
        let outcome = Outcome::failure(DriveError::AuthenticationFailed("bad key".into()));
        assert!(!outcome.is_success());
        assert!(outcome.error().is_some());
        assert_eq!(outcome.to_string(), "failure: Authentication failed: bad key");
    }

    #[test]
    fn test_from_result() {
        let ok: Outcome<String> = Ok(()).into();
        assert!(ok.is_success());

        let err: Outcome<String> = Err("nope".to_string()).into();
        assert_eq!(err.error().map(String::as_str), Some("nope"));
    }
}
