use std::sync::{PoisonError, RwLock};

use tracing::debug;

/// Holder of the current session token, shared by every request path of one
/// [`crate::ApiClient`].
///
/// Writes only affect requests that read the token afterwards; a request
/// already on the wire keeps the header it was built with.
#[derive(Debug, Default)]
pub struct CredentialStore {
    token: RwLock<Option<String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(token);
        debug!("session token updated");
    }

    /// Stores `token` only while the store still holds `expected`. Returns
    /// whether the swap happened.
    pub fn replace(&self, expected: &str, token: impl Into<String>) -> bool {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_deref() != Some(expected) {
            return false;
        }
        *slot = Some(token.into());
        debug!("session token rotated");
        true
    }

    /// Returns whether a token was present.
    pub fn clear(&self) -> bool {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        let had_token = slot.take().is_some();
        if had_token {
            debug!("session token cleared");
        }
        had_token
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
