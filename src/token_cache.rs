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

use crate::Result;
use crate::clock::Clock;
use crate::errors::CredentialsError;
use crate::token::{Token, TokenProvider};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::broadcast;

/// Caches the current access token and coordinates its renewal.
///
/// The cache holds at most one token. A token whose expiration has not
/// passed is served directly; once it expires (or before the first fetch)
/// a renewal episode runs. At most one provider call is in flight per
/// cache: the caller that first observes the need performs the exchange,
/// and every caller arriving while it is outstanding awaits that same
/// outcome. The outcome, success or failure, is delivered identically to
/// the issuer and all waiters of the episode. Failures are not memoized;
/// the next call after a failed episode starts a fresh exchange.
#[derive(Clone, Debug)]
pub(crate) struct TokenCache {
    state: Arc<Mutex<CacheState>>,

    // The provider performs the actual token exchange. `None` for
    // credentials that hold a fixed token with no way to renew it.
    provider: Option<Arc<dyn TokenProvider>>,

    clock: Arc<dyn Clock>,
}

#[derive(Debug)]
struct CacheState {
    current: Option<Token>,

    // The episode channel of an outstanding refresh, if any. Waiters
    // subscribe; the issuer publishes exactly one outcome and clears the
    // slot. A closed channel without an outcome means the issuer was
    // dropped mid-exchange.
    inflight: Option<broadcast::Sender<Result<Token>>>,
}

// Returns true if the token's expiration instant has passed. Tokens
// without an expiration never expire.
fn expired(token: &Token, now: OffsetDateTime) -> bool {
    token.expires_at.is_some_and(|e| e <= now)
}

// What a caller must do, decided atomically under the state lock.
enum Decision {
    Hit(Token),
    Join(broadcast::Receiver<Result<Token>>),
    Refresh(Arc<dyn TokenProvider>, broadcast::Sender<Result<Token>>),
}

// Clears the in-flight slot if the issuing task is dropped mid-exchange.
// Waiters then observe a closed channel and start a new episode instead of
// hanging.
struct AbandonGuard(Option<Arc<Mutex<CacheState>>>);

impl AbandonGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if let Some(state) = self.0.take() {
            state.lock().unwrap().inflight = None;
        }
    }
}

impl TokenCache {
    pub fn new(
        provider: Option<Arc<dyn TokenProvider>>,
        initial: Option<Token>,
        clock: Arc<dyn Clock>,
    ) -> TokenCache {
        TokenCache {
            state: Arc::new(Mutex::new(CacheState {
                current: initial,
                inflight: None,
            })),
            provider,
            clock,
        }
    }

    /// Returns the cached token, renewing it first if it has expired.
    pub async fn token(&self) -> Result<Token> {
        loop {
            match self.decide()? {
                Decision::Hit(token) => return Ok(token),
                Decision::Refresh(provider, tx) => return self.refresh(provider, tx).await,
                Decision::Join(mut rx) => match rx.recv().await {
                    Ok(outcome) => return outcome,
                    // The issuer went away without publishing an outcome.
                    // Start over: the next iteration begins a new episode
                    // or joins one that another waiter already began.
                    Err(_) => continue,
                },
            }
        }
    }

    /// Drops the cached token and renews it.
    ///
    /// Joins an in-flight episode if one is already outstanding.
    pub async fn force_refresh(&self) -> Result<Token> {
        self.state.lock().unwrap().current = None;
        self.token().await
    }

    /// A snapshot of the currently cached token.
    pub fn current(&self) -> Option<Token> {
        self.state.lock().unwrap().current.clone()
    }

    /// Whether this cache has any way to renew its token.
    pub fn can_refresh(&self) -> bool {
        self.provider.is_some()
    }

    /// The kind of the configured provider, if any.
    pub fn provider_kind(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.kind())
    }

    // The check-then-act step. Runs entirely under the state lock so two
    // callers cannot both observe an expired token and both start an
    // exchange. The lock is never held across an await.
    fn decide(&self) -> Result<Decision> {
        let mut state = self.state.lock().unwrap();
        if let Some(token) = state.current.as_ref() {
            if !expired(token, self.clock.now()) {
                return Ok(Decision::Hit(token.clone()));
            }
        }
        if let Some(tx) = state.inflight.as_ref() {
            return Ok(Decision::Join(tx.subscribe()));
        }
        let provider = self.provider.clone().ok_or_else(|| {
            CredentialsError::configuration_from_str(
                "the access token is expired and there is no refresh token to renew it with",
            )
        })?;
        let (tx, _) = broadcast::channel(1);
        state.inflight = Some(tx.clone());
        Ok(Decision::Refresh(provider, tx))
    }

    // Performs the exchange as the sole issuer of this episode and
    // publishes the outcome.
    async fn refresh(
        &self,
        provider: Arc<dyn TokenProvider>,
        tx: broadcast::Sender<Result<Token>>,
    ) -> Result<Token> {
        tracing::debug!("refreshing access token");
        let mut guard = AbandonGuard(Some(self.state.clone()));
        let result = provider.token().await;
        if let Err(e) = result.as_ref() {
            tracing::warn!(error = %e, "access token refresh failed");
        }

        // Publish atomically with respect to callers arriving afterwards:
        // the cache update, the slot clear, and the waiter notification all
        // happen under the state lock. A failure leaves the cached token
        // untouched.
        let mut state = self.state.lock().unwrap();
        if let Ok(token) = result.as_ref() {
            state.current = Some(token.clone());
        }
        state.inflight = None;
        guard.disarm();
        let _ = tx.send(result.clone());
        drop(state);
        result
    }
}
