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

//! Errors created during credentials construction.

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type for [Credentials] builders.
///
/// Validation failures are part of the ordinary control flow of
/// [build()]: they are returned as values, never panics. Applications
/// rarely need to create instances of this error type; the exception
/// might be when mocking a builder in tests.
///
/// [Credentials]: crate::credentials::Credentials
/// [build()]: crate::credentials::user_account::Builder::build
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    /// Neither a refresh token nor an initial access token was supplied.
    ///
    /// Such credentials could never produce a token, so construction
    /// fails immediately.
    pub fn is_missing_token_source(&self) -> bool {
        matches!(self.0, ErrorKind::MissingTokenSource)
    }

    /// A required field was missing from the builder.
    pub fn is_missing_field(&self) -> bool {
        matches!(self.0, ErrorKind::MissingField(_))
    }

    /// A problem parsing an `authorized_user` JSON specification.
    pub fn is_parsing(&self) -> bool {
        matches!(self.0, ErrorKind::Parsing(_))
    }

    pub(crate) fn missing_token_source() -> Error {
        Error(ErrorKind::MissingTokenSource)
    }

    pub(crate) fn missing_field(field: &'static str) -> Error {
        Error(ErrorKind::MissingField(field))
    }

    /// A problem parsing a credentials specification.
    pub(crate) fn parsing<T>(source: T) -> Error
    where
        T: Into<BoxError>,
    {
        Error(ErrorKind::Parsing(source.into()))
    }
}

#[derive(thiserror::Error, Debug)]
enum ErrorKind {
    #[error("requires at least one of `refresh_token` or `access_token`")]
    MissingTokenSource,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("cannot parse the credentials specification {0}")]
    Parsing(#[source] BoxError),
}
