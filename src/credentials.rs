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

//! User-account credentials.
//!
//! User accounts represent a developer, an administrator, or any other
//! person who interacts with an OAuth 2.0 protected service. This module
//! provides [Credentials] derived from such an account: an immutable
//! identity (client id, client secret, refresh token, token endpoint,
//! quota project) paired with a cache of the most recently fetched access
//! token. The credentials renew the token lazily, on the first request
//! metadata call that observes it expired, and coalesce concurrent
//! renewals into one exchange.
//!
//! Credentials are built with the [user_account::Builder]:
//!
//! ```
//! # use oauth2_user_credentials::credentials::user_account::Builder;
//! # tokio_test::block_on(async {
//! let credentials = Builder::new()
//!     .with_client_id("YOUR_CLIENT_ID")
//!     .with_client_secret("YOUR_CLIENT_SECRET") // LOAD SECURELY!
//!     .with_refresh_token("YOUR_REFRESH_TOKEN") // LOAD SECURELY!
//!     .build()?;
//! let headers = credentials.headers().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

use crate::errors::CredentialsError;
use crate::headers_util::build_bearer_headers;
use crate::token::Token;
use crate::token_cache::TokenCache;
use http::HeaderMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub mod user_account;

/// A `Result` alias where the `Err` case is
/// [errors::CredentialsError][crate::errors::CredentialsError].
pub type Result<T> = std::result::Result<T, CredentialsError>;

/// A `Result` alias where the `Err` case is
/// [build_errors::Error][crate::build_errors::Error].
pub type BuildResult<T> = std::result::Result<T, crate::build_errors::Error>;

/// The header used to attribute quota and billing to a project other than
/// the authenticating one.
pub(crate) const QUOTA_PROJECT_KEY: &str = "x-goog-user-project";

/// OAuth 2.0 user-account credentials.
///
/// An HTTP client holds one `Credentials` value per principal and calls
/// [headers()][Credentials::headers] before each outbound request. The
/// identity fields never change after construction; the cached access
/// token is the only mutable state, and it is shared by all clones.
///
/// # Equality
///
/// Equality and hashing are a snapshot: two credentials are equal when
/// their identity fields, the kind (not instance) of their configured
/// token provider, *and their currently cached access tokens* all match.
/// Credentials with the same identity but different cached tokens are
/// not equal.
///
/// # Serialization
///
/// Serializing captures the identity fields and the currently cached
/// token. Deserializing rebuilds the credentials with the default
/// transport and clock bindings, performs no network calls, and enforces
/// the same construction invariants as the [user_account::Builder].
#[derive(Clone)]
pub struct Credentials {
    pub(crate) inner: Arc<UserCredentials>,
}

pub(crate) struct UserCredentials {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) refresh_token: Option<String>,
    pub(crate) token_uri: String,
    pub(crate) quota_project_id: Option<String>,
    pub(crate) token_cache: TokenCache,
}

impl Credentials {
    /// Returns a currently valid access token, renewing it first if
    /// needed.
    ///
    /// Concurrent callers share a single renewal: at most one exchange
    /// with the authorization server is outstanding per credentials
    /// instance, and every caller waiting on it receives the same token
    /// or the same classified failure.
    pub async fn token(&self) -> Result<Token> {
        self.inner.token_cache.token().await
    }

    /// The headers to attach to an outbound request.
    ///
    /// Produces `authorization: {token_type} {token}` and, when a quota
    /// project is configured, `x-goog-user-project: {project}`. Fails
    /// with the same classified error as [token()][Credentials::token]
    /// when renewal fails.
    pub async fn headers(&self) -> Result<HeaderMap> {
        let token = self.token().await?;
        build_bearer_headers(&token, &self.inner.quota_project_id)
    }

    /// Discards the cached access token and fetches a new one.
    ///
    /// Equivalent to forcing the cache to the expired state and reading
    /// it once. Fails with a configuration error, leaving the cached
    /// token untouched, when the credentials have no way to renew.
    pub async fn refresh(&self) -> Result<Token> {
        if !self.inner.token_cache.can_refresh() {
            return Err(CredentialsError::configuration_from_str(
                "cannot refresh credentials without a refresh token",
            ));
        }
        self.inner.token_cache.force_refresh().await
    }

    /// The OAuth 2.0 client id.
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// The token endpoint these credentials exchange refresh tokens with.
    pub fn token_uri(&self) -> &str {
        &self.inner.token_uri
    }

    /// The project to attribute quota and billing to, if any.
    pub fn quota_project_id(&self) -> Option<&str> {
        self.inner.quota_project_id.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.inner.client_id)
            .field("client_secret", &"[censored]")
            .field(
                "refresh_token",
                &self.inner.refresh_token.as_ref().map(|_| "[censored]"),
            )
            .field("token_uri", &self.inner.token_uri)
            .field("quota_project_id", &self.inner.quota_project_id)
            .field("token_cache", &self.inner.token_cache)
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.inner.client_id == other.inner.client_id
            && self.inner.client_secret == other.inner.client_secret
            && self.inner.refresh_token == other.inner.refresh_token
            && self.inner.token_uri == other.inner.token_uri
            && self.inner.quota_project_id == other.inner.quota_project_id
            && self.inner.token_cache.provider_kind() == other.inner.token_cache.provider_kind()
            && self.inner.token_cache.current() == other.inner.token_cache.current()
    }
}

impl Eq for Credentials {}

impl Hash for Credentials {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.client_id.hash(state);
        self.inner.client_secret.hash(state);
        self.inner.refresh_token.hash(state);
        self.inner.token_uri.hash(state);
        self.inner.quota_project_id.hash(state);
        self.inner.token_cache.provider_kind().hash(state);
        self.inner.token_cache.current().hash(state);
    }
}

/// The persisted form: identity fields plus the cached token. The
/// transport and clock bindings are not part of the snapshot.
#[derive(serde::Serialize, serde::Deserialize)]
struct CredentialsSnapshot {
    client_id: String,
    client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<Token>,
}

impl serde::Serialize for Credentials {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        CredentialsSnapshot {
            client_id: self.inner.client_id.clone(),
            client_secret: self.inner.client_secret.clone(),
            refresh_token: self.inner.refresh_token.clone(),
            token_uri: Some(self.inner.token_uri.clone()),
            quota_project_id: self.inner.quota_project_id.clone(),
            access_token: self.inner.token_cache.current(),
        }
        .serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Credentials {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let snapshot = CredentialsSnapshot::deserialize(deserializer)?;
        let mut builder = user_account::Builder::new()
            .with_client_id(snapshot.client_id)
            .with_client_secret(snapshot.client_secret);
        if let Some(token_uri) = snapshot.token_uri {
            builder = builder.with_token_uri(token_uri);
        }
        if let Some(refresh_token) = snapshot.refresh_token {
            builder = builder.with_refresh_token(refresh_token);
        }
        if let Some(quota_project_id) = snapshot.quota_project_id {
            builder = builder.with_quota_project_id(quota_project_id);
        }
        if let Some(access_token) = snapshot.access_token {
            builder = builder.with_access_token(access_token);
        }
        builder.build().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::user_account::Builder;
    use super::*;
    use crate::errors::ErrorKind;
    use crate::token::tests::MockTokenProvider;
    use http::header::AUTHORIZATION;
    use std::collections::hash_map::DefaultHasher;
    use time::OffsetDateTime;

    fn hash_of(credentials: &Credentials) -> u64 {
        let mut hasher = DefaultHasher::new();
        credentials.hash(&mut hasher);
        hasher.finish()
    }

    fn access_token(token: &str) -> Token {
        Token {
            token: token.to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        }
    }

    fn base_builder() -> Builder {
        Builder::new()
            .with_client_id("test-client-id")
            .with_client_secret("test-client-secret")
            .with_refresh_token("test-refresh-token")
    }

    #[test]
    fn accessors() {
        let credentials = base_builder()
            .with_token_uri("https://example.com/token")
            .with_quota_project_id("test-project")
            .build()
            .unwrap();
        assert_eq!(credentials.client_id(), "test-client-id");
        assert_eq!(credentials.token_uri(), "https://example.com/token");
        assert_eq!(credentials.quota_project_id(), Some("test-project"));
    }

    #[test]
    fn debug_censors_secrets() {
        let credentials = base_builder().build().unwrap();
        let fmt = format!("{credentials:?}");
        assert!(fmt.contains("test-client-id"), "{fmt}");
        assert!(!fmt.contains("test-client-secret"), "{fmt}");
        assert!(!fmt.contains("test-refresh-token"), "{fmt}");
    }

    #[tokio::test]
    async fn token_and_headers_from_provider() {
        let token = access_token("test-token");
        let token_clone = token.clone();

        let mut mock = MockTokenProvider::new();
        mock.expect_token().times(1).return_once(|| Ok(token_clone));

        let credentials = base_builder()
            .with_quota_project_id("test-project")
            .with_token_provider(mock)
            .build()
            .unwrap();

        let headers = credentials.headers().await.unwrap();
        assert_eq!(headers.len(), 2, "{headers:?}");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer test-token");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(QUOTA_PROJECT_KEY).unwrap(), "test-project");

        // The second read is a cache hit; the provider is not called again.
        let actual = credentials.token().await.unwrap();
        assert_eq!(actual, token);
    }

    #[tokio::test]
    async fn headers_failure_propagates_classification() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .return_once(|| Err(CredentialsError::from_str(ErrorKind::Transient, "try again")));

        let credentials = base_builder().with_token_provider(mock).build().unwrap();
        let e = credentials.headers().await.unwrap_err();
        assert!(e.is_transient(), "{e}");
    }

    #[tokio::test]
    async fn fixed_token_headers_never_refresh() {
        let credentials = Builder::new()
            .with_client_id("test-client-id")
            .with_client_secret("test-client-secret")
            .with_access_token(access_token("fixed-token"))
            .build()
            .unwrap();

        for _ in 0..3 {
            let headers = credentials.headers().await.unwrap();
            assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer fixed-token");
        }
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_is_configuration_error() {
        let credentials = Builder::new()
            .with_client_id("test-client-id")
            .with_client_secret("test-client-secret")
            .with_access_token(access_token("fixed-token"))
            .build()
            .unwrap();

        let e = credentials.refresh().await.unwrap_err();
        assert!(e.is_configuration(), "{e}");

        // The fixed token is left in place and remains usable.
        let actual = credentials.token().await.unwrap();
        assert_eq!(actual, access_token("fixed-token"));
    }

    #[tokio::test]
    async fn refresh_forces_new_token() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .return_once(|| Ok(access_token("first-token")));
        mock.expect_token()
            .times(1)
            .return_once(|| Ok(access_token("second-token")));

        let credentials = base_builder().with_token_provider(mock).build().unwrap();
        assert_eq!(credentials.token().await.unwrap().token, "first-token");

        // The cached token has no expiration, so only an explicit refresh
        // replaces it.
        assert_eq!(credentials.refresh().await.unwrap().token, "second-token");
        assert_eq!(credentials.token().await.unwrap().token, "second-token");
    }

    #[test]
    fn equality_identity_and_cached_token() {
        let credentials = base_builder()
            .with_quota_project_id("test-project")
            .with_access_token(access_token("token-1"))
            .build()
            .unwrap();
        let same = base_builder()
            .with_quota_project_id("test-project")
            .with_access_token(access_token("token-1"))
            .build()
            .unwrap();
        assert_eq!(credentials, same);
        assert_eq!(hash_of(&credentials), hash_of(&same));

        // Each variant differs from `credentials` in exactly one field.
        let variant = || {
            base_builder()
                .with_quota_project_id("test-project")
                .with_access_token(access_token("token-1"))
        };
        for different in [
            variant().with_client_id("other").build().unwrap(),
            variant().with_client_secret("other").build().unwrap(),
            variant().with_refresh_token("other").build().unwrap(),
            variant()
                .with_token_uri("https://example.com/token")
                .build()
                .unwrap(),
            variant()
                .with_quota_project_id("other-project")
                .build()
                .unwrap(),
            variant()
                .with_access_token(access_token("token-2"))
                .build()
                .unwrap(),
        ] {
            assert_ne!(credentials, different);
        }
    }

    #[tokio::test]
    async fn equality_is_a_snapshot() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .times(1)
            .return_once(|| Ok(access_token("renewed-token")));
        mock.expect_kind().return_const("user_account");

        let credentials = base_builder()
            .with_access_token(access_token("seed-token"))
            .with_token_provider(mock)
            .build()
            .unwrap();
        let twin = base_builder()
            .with_access_token(access_token("seed-token"))
            .build()
            .unwrap();
        assert_eq!(credentials, twin);

        // A successful refresh on one side changes its cached token, and
        // with it the equality snapshot.
        credentials.refresh().await.unwrap();
        assert_ne!(credentials, twin);
    }

    #[test]
    fn equality_considers_provider_kind() {
        let mut mock = MockTokenProvider::new();
        mock.expect_kind().return_const("custom-provider");

        let credentials = base_builder().build().unwrap();
        let with_custom_provider = base_builder().with_token_provider(mock).build().unwrap();
        assert_ne!(credentials, with_custom_provider);
    }

    #[test]
    fn serialize_roundtrip_resets_transport() {
        let expires_at = OffsetDateTime::from_unix_timestamp(1_767_225_600).unwrap();
        let credentials = base_builder()
            .with_quota_project_id("test-project")
            .with_access_token(Token {
                token: "cached-token".to_string(),
                token_type: "Bearer".to_string(),
                expires_at: Some(expires_at),
            })
            .build()
            .unwrap();

        let json = serde_json::to_value(&credentials).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "client_id": "test-client-id",
                "client_secret": "test-client-secret",
                "refresh_token": "test-refresh-token",
                "token_uri": "https://oauth2.googleapis.com/token",
                "quota_project_id": "test-project",
                "access_token": {
                    "token": "cached-token",
                    "token_type": "Bearer",
                    "expires_at": 1_767_225_600,
                },
            })
        );

        let restored = serde_json::from_value::<Credentials>(json).unwrap();
        assert_eq!(restored, credentials);
    }

    #[test]
    fn deserialize_without_token_source_fails() {
        let json = serde_json::json!({
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "token_uri": "https://oauth2.googleapis.com/token",
        });
        let e = serde_json::from_value::<Credentials>(json).unwrap_err();
        let msg = e.to_string();
        assert!(msg.contains("refresh_token"), "{msg}");
    }

    #[tokio::test]
    async fn deserialized_credentials_serve_cached_token_offline() {
        let json = serde_json::json!({
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "token_uri": "https://oauth2.googleapis.com/token",
            "access_token": {
                "token": "persisted-token",
                "token_type": "Bearer",
            },
        });
        let credentials = serde_json::from_value::<Credentials>(json).unwrap();
        let headers = credentials.headers().await.unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer persisted-token");
    }
}
