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

//! OAuth 2.0 user-account credentials for HTTP clients.
//!
//! This crate contains types and functions to authenticate outbound HTTP
//! requests with a short-lived [bearer token] derived from an OAuth 2.0
//! [refresh token] and a client registration. An HTTP client holds a
//! [credentials::Credentials] value and, before each call, asks it for the
//! headers to attach; the credentials cache the access token, renew it when
//! it expires, and coalesce concurrent renewals into a single exchange with
//! the authorization server.
//!
//! Acquiring the initial refresh token (e.g. through user consent in the
//! [Authorization Code grant]) is outside the scope of this crate, as is
//! discovering credential material from files or the environment: callers
//! provide the client id, client secret, and refresh token to the
//! [credentials::user_account::Builder] directly.
//!
//! [Authorization Code grant]: https://datatracker.ietf.org/doc/html/rfc6749#section-4.1
//! [bearer token]: https://datatracker.ietf.org/doc/html/rfc6750
//! [refresh token]: https://datatracker.ietf.org/doc/html/rfc6749#section-1.5

/// Errors created during credentials construction.
pub mod build_errors;

/// Errors created while fetching or formatting access tokens.
pub mod errors;

/// Types and functions to work with the credentials themselves.
pub mod credentials;

/// The access token value type and the provider abstraction.
pub mod token;

/// Wall-clock abstraction, injectable for tests.
pub mod clock;

/// The token cache
pub(crate) mod token_cache;

/// A `Result` alias where the `Err` case is
/// `oauth2_user_credentials::errors::CredentialsError`.
pub(crate) type Result<T> = std::result::Result<T, crate::errors::CredentialsError>;

/// Header formatting helpers.
pub(crate) mod headers_util;
