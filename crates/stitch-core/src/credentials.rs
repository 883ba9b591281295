//! Credential/session provider abstraction.
//!
//! The original client read its access token from ad-hoc global storage;
//! here every component that needs a token receives a provider instead.
//! Storage mechanics (keychain, file, memory) stay behind this trait.

use std::sync::Mutex;

/// Source of the current access token.
///
/// `store`/`clear` exist so the API client can persist a refreshed token and
/// drop credentials after a failed refresh.
pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, if a session exists.
    fn access_token(&self) -> Option<String>;

    /// Replace the stored token after a successful refresh or login.
    fn store(&self, token: String);

    /// Drop the session (refresh failed or user logged out).
    fn clear(&self);
}

/// In-memory provider, suitable for tests and short-lived CLI sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: Mutex<Option<String>>,
}

impl MemoryCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl CredentialProvider for MemoryCredentials {
    fn access_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store(&self, token: String) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
