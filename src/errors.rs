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

use http::StatusCode;
use std::error::Error;
use std::fmt::{Display, Formatter, Result};
use std::sync::Arc;

/// Represents an error fetching or formatting an access token.
///
/// Errors are classified by [ErrorKind]. The classification tells the
/// caller whether retrying the operation can help: a [Transient] failure
/// may clear up on its own, while an [InvalidGrant] failure repeats until
/// the refresh token is replaced. The credentials never retry internally;
/// retry loops, with [exponential backoff] and [retry budgets], belong to
/// the application.
///
/// [Transient]: ErrorKind::Transient
/// [InvalidGrant]: ErrorKind::InvalidGrant
/// [exponential backoff]: https://en.wikipedia.org/wiki/Exponential_backoff
/// [retry budgets]: https://docs.rs/tower/latest/tower/retry/budget/index.html
#[derive(Clone, Debug)]
pub struct CredentialsError {
    kind: ErrorKind,
    source: CredentialsErrorImpl,
}

/// The classification of a [CredentialsError].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The authorization server rejected the refresh token.
    ///
    /// The token may have been revoked or may never have been valid.
    /// Repeated calls repeat the failure until the credential material is
    /// replaced.
    InvalidGrant,

    /// A network problem or server-side error interrupted the exchange.
    ///
    /// The operation may succeed if retried.
    Transient,

    /// The authorization server returned a response that could not be
    /// understood.
    Malformed,

    /// The credentials cannot perform the requested operation as
    /// configured.
    ///
    /// For example, the cached access token expired and there is no
    /// refresh token to renew it with. This is a usage error, not a server
    /// failure.
    Configuration,
}

#[derive(Clone, Debug)]
enum CredentialsErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl CredentialsError {
    /// Creates a new `CredentialsError` wrapping an underlying error.
    pub(crate) fn new<T: Error + Send + Sync + 'static>(kind: ErrorKind, source: T) -> Self {
        CredentialsError {
            kind,
            source: CredentialsErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `CredentialsError` from a plain message.
    pub fn from_str<T: Into<String>>(kind: ErrorKind, message: T) -> Self {
        CredentialsError {
            kind,
            source: CredentialsErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// The classification of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if a retry of the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// The authorization server rejected the refresh token.
    pub fn is_invalid_grant(&self) -> bool {
        self.kind == ErrorKind::InvalidGrant
    }

    /// The server response could not be understood.
    pub fn is_malformed(&self) -> bool {
        self.kind == ErrorKind::Malformed
    }

    /// The credentials are not configured for the requested operation.
    pub fn is_configuration(&self) -> bool {
        self.kind == ErrorKind::Configuration
    }

    pub(crate) fn transient<T: Error + Send + Sync + 'static>(source: T) -> Self {
        CredentialsError::new(ErrorKind::Transient, source)
    }

    pub(crate) fn malformed<T: Error + Send + Sync + 'static>(source: T) -> Self {
        CredentialsError::new(ErrorKind::Malformed, source)
    }

    pub(crate) fn invalid_grant_from_str<T: Into<String>>(message: T) -> Self {
        CredentialsError::from_str(ErrorKind::InvalidGrant, message)
    }

    pub(crate) fn configuration_from_str<T: Into<String>>(message: T) -> Self {
        CredentialsError::from_str(ErrorKind::Configuration, message)
    }
}

impl std::error::Error for CredentialsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            CredentialsErrorImpl::SimpleMessage(_) => None,
            CredentialsErrorImpl::Source(source) => Some(source),
        }
    }
}

const RETRYABLE_MSG: &str = "but future attempts may succeed";
const NON_RETRYABLE_MSG: &str = "and future attempts will not succeed";

impl Display for CredentialsError {
    /// Formats the error message to include the classification and source.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_transient() {
            RETRYABLE_MSG
        } else {
            NON_RETRYABLE_MSG
        };
        let source = match &self.source {
            CredentialsErrorImpl::SimpleMessage(message) => message.clone(),
            CredentialsErrorImpl::Source(source) => source.to_string(),
        };
        write!(
            f,
            "cannot create access token [{:?}], {}, source:{}",
            self.kind, msg, source
        )
    }
}

/// Maps a token-endpoint HTTP status to the corresponding failure class.
///
/// Server-side errors and throttling do not indicate that there is anything
/// wrong with our request, so they are transient. Any other rejection means
/// the server refused the grant.
pub(crate) fn status_to_kind(c: StatusCode) -> ErrorKind {
    match c {
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::TOO_MANY_REQUESTS => ErrorKind::Transient,
        _ => ErrorKind::InvalidGrant,
    }
}
