//! One-time state tokens correlating an authorization redirect with its callback.

use crate::cache::ExpiringStore;
use crate::sso::password::random_code;
use std::sync::Arc;

/// Length of the random state value.
pub const STATE_LENGTH: usize = 32;

/// What a state token remembers between redirect and callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// Provider key the state was issued for
    pub provider: String,
    /// Session token of an already logged-in user asking to bind this provider
    pub bind_session: Option<String>,
}

#[derive(Clone)]
pub struct StateStore {
    store: Arc<dyn ExpiringStore<PendingLogin>>,
}

impl StateStore {
    pub fn new(store: Arc<dyn ExpiringStore<PendingLogin>>) -> Self {
        Self { store }
    }

    /// Issue a fresh state for `provider`, optionally carrying a session to bind to.
    pub fn issue(&self, provider: &str, bind_session: Option<String>) -> String {
        let state = random_code(STATE_LENGTH);
        self.store.set(
            state.clone(),
            PendingLogin {
                provider: provider.to_string(),
                bind_session: bind_session.filter(|t| !t.is_empty()),
            },
        );
        state
    }

    /// Consume `state` for a callback of `provider`.
    ///
    /// The entry is removed even when it belongs to another provider, so a
    /// state can never be tried twice.
    pub fn consume(&self, provider: &str, state: &str) -> Option<PendingLogin> {
        let pending = self.store.take(state)?;
        if pending.provider != provider {
            tracing::warn!(
                expected = %pending.provider,
                got = provider,
                "state presented for a different provider"
            );
            return None;
        }
        Some(pending)
    }
}
