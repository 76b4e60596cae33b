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

//! Types and functions to work with access tokens.

use crate::Result;
use time::OffsetDateTime;

/// Represents an access token.
///
/// A token is an immutable value: a successful refresh produces a new
/// `Token` rather than mutating the old one. Equality and hashing are
/// structural over all fields.
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Token {
    /// The actual token string.
    ///
    /// This is the value used in the `authorization:` header.
    pub token: String,

    /// The type of the token.
    ///
    /// The most common type is `"Bearer"` but other types may appear in
    /// the future.
    pub token_type: String,

    /// The instant at which the token expires.
    ///
    /// If `None`, the token does not expire and never needs refreshing.
    ///
    /// This is an absolute wall-clock instant, serialized as Unix seconds,
    /// so a persisted token remains meaningful across processes.
    #[serde(
        with = "time::serde::timestamp::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Produces a new access token on each invocation.
///
/// This is the renewal boundary of the credentials: the [TokenCache] calls
/// `token()` once per refresh episode, on behalf of every caller waiting on
/// that episode. Implementations perform exactly one exchange with the
/// authorization server and never retry internally; they hold no cache
/// state of their own.
///
/// [TokenCache]: crate::token_cache::TokenCache
#[async_trait::async_trait]
pub trait TokenProvider: std::fmt::Debug + Send + Sync {
    /// Fetches a new token, or a classified failure.
    async fn token(&self) -> Result<Token>;

    /// A stable identifier for the provider implementation.
    ///
    /// Credentials compare equal only if their providers are of the same
    /// kind; the instances themselves are never compared.
    fn kind(&self) -> &'static str;
}
