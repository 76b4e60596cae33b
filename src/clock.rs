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

//! Wall-clock abstraction.
//!
//! Token expiry is decided by comparing wall-clock time against the
//! expiration instant reported by the authorization server. The clock is
//! injected through the [Builder] rather than read from a process-wide
//! source, so tests can drive expiry without sleeping.
//!
//! [Builder]: crate::credentials::user_account::Builder

use time::OffsetDateTime;

/// Represents a clock, which can tell the current time.
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Gets the current time according to this clock.
    fn now(&self) -> OffsetDateTime;
}

/// The system clock as provided by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
