use std::collections::HashMap;
use std::sync::Mutex;

use crate::CredentialScope;

/// Cached operator credentials.
///
/// Implementations must be cheap to read: every request resolves its
/// credential right before it is sent.
pub trait CredentialStore: Send + Sync {
    fn get(&self, scope: CredentialScope) -> Option<String>;
    fn set(&self, scope: CredentialScope, secret: String);
    fn clear(&self, scope: CredentialScope);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<CredentialScope, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, scope: CredentialScope, secret: impl Into<String>) -> Self {
        self.set(scope, secret.into());
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, scope: CredentialScope) -> Option<String> {
        self.secrets
            .lock()
            .ok()
            .and_then(|secrets| secrets.get(&scope).cloned())
    }

    fn set(&self, scope: CredentialScope, secret: String) {
        if let Ok(mut secrets) = self.secrets.lock() {
            secrets.insert(scope, secret);
        }
    }

    fn clear(&self, scope: CredentialScope) {
        if let Ok(mut secrets) = self.secrets.lock() {
            secrets.remove(&scope);
        }
    }
}
