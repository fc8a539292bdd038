//! Access-token management for the Google provider.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::credential::{Credential, CredentialSource};
use crate::error::{DriveError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Refresh this long before the cached token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

#[derive(Clone)]
enum TokenSource {
    ServiceAccount(Arc<ServiceAccountCredentials>),
    Static(String),
}

/// Hands out bearer tokens for Drive API requests.
#[derive(Clone)]
pub struct Authenticator {
    source: TokenSource,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Build an authenticator for the given credential.
    ///
    /// Fails with `AuthenticationFailed` when the credential carries no
    /// secret to authenticate with.
    pub fn for_credential(credential: &Credential, client: Client) -> Result<Self> {
        let source = match credential.source() {
            Some(CredentialSource::ServiceAccount(key)) => {
                TokenSource::ServiceAccount(Arc::new(key.clone()))
            }
            Some(CredentialSource::AccessToken { token }) if !token.is_empty() => {
                TokenSource::Static(token.clone())
            }
            _ => {
                return Err(DriveError::AuthenticationFailed(format!(
                    "no usable secret for account {}",
                    credential.account().unwrap_or("<unnamed>")
                )))
            }
        };

        Ok(Self {
            source,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let credentials = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(credentials) => credentials,
        };

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token(credentials).await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_token(&self, credentials: &ServiceAccountCredentials) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::AuthenticationFailed(e.to_string()))?
            .as_secs();

        let token_uri = credentials.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        debug!("Requesting access token for {}", credentials.client_email);
        let response = self.client.post(token_uri).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::AuthenticationFailed(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    #[test]
    fn test_credential_without_secret_is_rejected() {
        let result = Authenticator::for_credential(&Credential::named("someone"), Client::new());
        assert!(matches!(result, Err(DriveError::AuthenticationFailed(_))));

        let result = Authenticator::for_credential(&Credential::access_token(""), Client::new());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let auth =
            Authenticator::for_credential(&Credential::access_token("ya29.abc"), Client::new())
                .unwrap();
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.abc");
    }
}
