// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Builder for user-account [Credentials] and the OAuth 2.0 refresh-token
//! exchange behind them.
//!
//! This module is designed for refresh tokens obtained via the standard
//! [Authorization Code grant]. Acquiring the initial refresh token (e.g.,
//! through user consent) is outside the scope of this crate. See
//! [RFC 6749 Section 4.1] for flow details.
//!
//! You might instantiate these credentials directly using the [`Builder`]
//! if you need to:
//! * Build from an `authorized_user` JSON record produced by a discovery
//!   layer.
//! * Seed the credentials with a previously obtained access token.
//! * Override the **quota project ID** for billing and quota management.
//! * Override the **token URI** used to fetch access tokens.
//!
//! [Authorization Code grant]: https://tools.ietf.org/html/rfc6749#section-1.3.1
//! [RFC 6749 Section 4.1]: https://datatracker.ietf.org/doc/html/rfc6749#section-4.1
//! [Credentials]: crate::credentials::Credentials

use crate::build_errors::Error as BuilderError;
use crate::clock::{Clock, SystemClock};
use crate::credentials::{BuildResult, Credentials, Result, UserCredentials};
use crate::errors::{CredentialsError, status_to_kind};
use crate::token::{Token, TokenProvider};
use crate::token_cache::TokenCache;
use http::StatusCode;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use time::Duration;

const OAUTH2_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// A builder for user-account [Credentials].
///
/// # Example
/// ```
/// # use oauth2_user_credentials::credentials::user_account::Builder;
/// let credentials = Builder::new()
///     .with_client_id("test-client-id")
///     .with_client_secret("test-client-secret")
///     .with_refresh_token("test-refresh-token")
///     .build();
/// ```
pub struct Builder {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    access_token: Option<Token>,
    token_uri: Option<String>,
    quota_project_id: Option<String>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    clock: Arc<dyn Clock>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            access_token: None,
            token_uri: None,
            quota_project_id: None,
            token_provider: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl Builder {
    /// Creates a new builder with no fields set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder seeded from an `authorized_user` JSON value.
    ///
    /// The `authorized_user` JSON is the record a discovery layer
    /// produces for a user account; it carries the `client_id`,
    /// `client_secret`, and `refresh_token` fields, and optionally
    /// `token_uri` and `quota_project_id`. Values set on the builder
    /// afterwards override values from the JSON.
    ///
    /// # Example
    /// ```
    /// # use oauth2_user_credentials::credentials::user_account::Builder;
    /// let authorized_user = serde_json::json!({
    ///     "type": "authorized_user",
    ///     "client_id": "test-client-id",
    ///     "client_secret": "test-client-secret",
    ///     "refresh_token": "test-refresh-token",
    /// });
    /// let credentials = Builder::from_authorized_user(authorized_user)?.build()?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_authorized_user(authorized_user: Value) -> BuildResult<Self> {
        let authorized_user = serde_json::from_value::<AuthorizedUser>(authorized_user)
            .map_err(BuilderError::parsing)?;
        let mut builder = Self::new()
            .with_client_id(authorized_user.client_id)
            .with_client_secret(authorized_user.client_secret)
            .with_refresh_token(authorized_user.refresh_token);
        if let Some(token_uri) = authorized_user.token_uri {
            builder = builder.with_token_uri(token_uri);
        }
        if let Some(quota_project_id) = authorized_user.quota_project_id {
            builder = builder.with_quota_project_id(quota_project_id);
        }
        Ok(builder)
    }

    /// Sets the OAuth 2.0 client id.
    pub fn with_client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the OAuth 2.0 client secret.
    pub fn with_client_secret<S: Into<String>>(mut self, client_secret: S) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the refresh token used to renew access tokens.
    pub fn with_refresh_token<S: Into<String>>(mut self, refresh_token: S) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Seeds the credentials with a previously obtained access token.
    ///
    /// The token is served until it expires. Credentials built with an
    /// access token and no refresh token can never renew: if the token
    /// carries no expiration they stay valid forever, otherwise reads
    /// after the expiration fail with a configuration error.
    pub fn with_access_token(mut self, access_token: Token) -> Self {
        self.access_token = Some(access_token);
        self
    }

    /// Sets the URI for the token endpoint used to fetch access tokens.
    ///
    /// Defaults to `https://oauth2.googleapis.com/token`.
    pub fn with_token_uri<S: Into<String>>(mut self, token_uri: S) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Sets the [quota project] for these credentials.
    ///
    /// In some services, you can use an account in one project for
    /// authentication and authorization, and charge the usage to a
    /// different project. This requires that the account has
    /// `serviceusage.services.use` permissions on the quota project.
    ///
    /// [quota project]: https://cloud.google.com/docs/quotas/quota-project
    pub fn with_quota_project_id<S: Into<String>>(mut self, quota_project_id: S) -> Self {
        self.quota_project_id = Some(quota_project_id.into());
        self
    }

    /// Replaces the token provider used to renew access tokens.
    ///
    /// Defaults to the OAuth 2.0 refresh-token exchange over HTTP. Mostly
    /// useful in tests.
    pub fn with_token_provider<T: TokenProvider + 'static>(mut self, token_provider: T) -> Self {
        self.token_provider = Some(Arc::new(token_provider));
        self
    }

    /// Replaces the wall clock used to decide token expiry.
    ///
    /// Defaults to the system clock. Mostly useful in tests.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Returns a [Credentials] instance with the configured settings.
    ///
    /// # Errors
    ///
    /// Returns a [BuilderError] if `client_id` or `client_secret` is
    /// missing, or if neither a refresh token nor an access token was
    /// supplied — such credentials could never produce a token, so
    /// construction fails instead of every later use failing.
    ///
    /// [BuilderError]: crate::build_errors::Error
    pub fn build(self) -> BuildResult<Credentials> {
        let client_id = self
            .client_id
            .ok_or_else(|| BuilderError::missing_field("client_id"))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| BuilderError::missing_field("client_secret"))?;
        if self.refresh_token.is_none() && self.access_token.is_none() && self.token_provider.is_none()
        {
            return Err(BuilderError::missing_token_source());
        }
        let token_uri = self.token_uri.unwrap_or_else(|| OAUTH2_ENDPOINT.to_string());

        let token_provider: Option<Arc<dyn TokenProvider>> =
            match (self.token_provider, self.refresh_token.as_ref()) {
                (Some(custom), _) => Some(custom),
                (None, Some(refresh_token)) => Some(Arc::new(UserTokenProvider {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                    token_uri: token_uri.clone(),
                    clock: self.clock.clone(),
                })),
                (None, None) => None,
            };
        let token_cache = TokenCache::new(token_provider, self.access_token, self.clock);

        Ok(Credentials {
            inner: Arc::new(UserCredentials {
                client_id,
                client_secret,
                refresh_token: self.refresh_token,
                token_uri,
                quota_project_id: self.quota_project_id,
                token_cache,
            }),
        })
    }
}

/// Performs the OAuth 2.0 refresh-token exchange.
///
/// One form-encoded POST to the token endpoint per invocation; no internal
/// retries, no cache state.
struct UserTokenProvider {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for UserTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserTokenProvider")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[censored]")
            .field("refresh_token", &"[censored]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[async_trait::async_trait]
impl TokenProvider for UserTokenProvider {
    async fn token(&self) -> Result<Token> {
        tracing::debug!(token_uri = %self.token_uri, "exchanging refresh token for access token");
        let client = Client::new();

        // Make the request
        let req = Oauth2RefreshRequest {
            grant_type: RefreshGrantType::RefreshToken,
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        };
        let resp = client
            .request(Method::POST, self.token_uri.as_str())
            .form(&req)
            .send()
            .await
            .map_err(CredentialsError::transient)?;

        // Process the response
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| CredentialsError::new(status_to_kind(status), e))?;
            return Err(classify_rejection(status, &body));
        }
        let response = resp.json::<Oauth2RefreshResponse>().await.map_err(|e| {
            if e.is_decode() {
                CredentialsError::malformed(e)
            } else {
                CredentialsError::transient(e)
            }
        })?;
        let token = Token {
            token: response.access_token,
            token_type: response.token_type,
            expires_at: response
                .expires_in
                .map(|d| self.clock.now() + Duration::seconds(d)),
        };
        Ok(token)
    }

    fn kind(&self) -> &'static str {
        "user_account"
    }
}

// Maps a non-2xx token-endpoint response to a classified failure. A body
// carrying the standard OAuth2 `invalid_grant` error code means the
// refresh token itself was rejected, whatever the status line says.
fn classify_rejection(status: StatusCode, body: &str) -> CredentialsError {
    if let Ok(error) = serde_json::from_str::<Oauth2ErrorResponse>(body) {
        if error.error == "invalid_grant" {
            let detail = error
                .error_description
                .unwrap_or_else(|| "the authorization server rejected the refresh token".into());
            return CredentialsError::invalid_grant_from_str(detail);
        }
    }
    CredentialsError::from_str(
        status_to_kind(status),
        format!("failed to fetch token, HTTP status {status}: {body}"),
    )
}

/// Data model for the `authorized_user` JSON record.
#[derive(Debug, PartialEq, serde::Deserialize)]
pub(crate) struct AuthorizedUser {
    #[serde(rename = "type")]
    cred_type: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: Option<String>,
    quota_project_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
enum RefreshGrantType {
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
struct Oauth2RefreshRequest {
    grant_type: RefreshGrantType,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
struct Oauth2RefreshResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct Oauth2ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
