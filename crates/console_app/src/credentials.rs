use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use console_engine::{CredentialScope, CredentialStore};
use console_logging::{console_debug, console_error};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::config::CredentialOverrides;
use crate::persist::{write_atomic, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct StoredCredentials {
    admin_key: Option<String>,
    task_token: Option<String>,
}

impl StoredCredentials {
    fn slot(&mut self, scope: CredentialScope) -> &mut Option<String> {
        match scope {
            CredentialScope::Admin => &mut self.admin_key,
            CredentialScope::TaskToken => &mut self.task_token,
        }
    }

    fn get(&self, scope: CredentialScope) -> Option<&String> {
        match scope {
            CredentialScope::Admin => self.admin_key.as_ref(),
            CredentialScope::TaskToken => self.task_token.as_ref(),
        }
    }
}

#[derive(Debug, Default)]
struct Secrets {
    saved: StoredCredentials,
    /// Session-only values from the environment; checked before `saved`.
    overrides: StoredCredentials,
}

/// Credentials persisted to a RON file. Every change rewrites the file
/// atomically, so a 401 that clears a key also removes it from disk.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    secrets: Mutex<Secrets>,
}

impl FileCredentialStore {
    /// Reads `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let saved = if path.exists() {
            let text = fs::read_to_string(path)?;
            ron::from_str(&text).map_err(|err| StoreError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?
        } else {
            console_debug!("No credentials at {:?}, starting empty", path);
            StoredCredentials::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            secrets: Mutex::new(Secrets {
                saved,
                overrides: StoredCredentials::default(),
            }),
        })
    }

    pub fn with_overrides(self, overrides: CredentialOverrides) -> Self {
        {
            let mut secrets = self.lock();
            secrets.overrides = StoredCredentials {
                admin_key: overrides.admin_key,
                task_token: overrides.task_token,
            };
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves `secret` for `scope` and writes the file.
    pub fn store(&self, scope: CredentialScope, secret: &str) -> Result<(), StoreError> {
        let mut secrets = self.lock();
        *secrets.saved.slot(scope) = Some(secret.to_string());
        *secrets.overrides.slot(scope) = None;
        self.save(&secrets.saved)
    }

    /// Drops `scope` from memory and disk.
    pub fn forget(&self, scope: CredentialScope) -> Result<(), StoreError> {
        let mut secrets = self.lock();
        *secrets.overrides.slot(scope) = None;
        if secrets.saved.slot(scope).take().is_none() {
            return Ok(());
        }
        self.save(&secrets.saved)
    }

    fn save(&self, saved: &StoredCredentials) -> Result<(), StoreError> {
        let text = ron::ser::to_string_pretty(saved, PrettyConfig::new())
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        write_atomic(&self.path, text.as_bytes())
    }

    fn lock(&self) -> MutexGuard<'_, Secrets> {
        self.secrets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, scope: CredentialScope) -> Option<String> {
        let secrets = self.lock();
        secrets
            .overrides
            .get(scope)
            .or_else(|| secrets.saved.get(scope))
            .cloned()
    }

    fn set(&self, scope: CredentialScope, secret: String) {
        if let Err(err) = self.store(scope, &secret) {
            console_error!("Could not save the {}: {}", scope, err);
        }
    }

    fn clear(&self, scope: CredentialScope) {
        if let Err(err) = self.forget(scope) {
            console_error!("Could not remove the {} from {:?}: {}", scope, self.path, err);
        }
    }
}
