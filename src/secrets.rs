use crate::error::{SyncError, SyncResult};
use keyring::{Entry, Error as KeyringError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keychain service every Jira password is stored under; the account is the Jira username.
pub const CREDENTIAL_SERVICE: &str = "JiraWorklogApp";

/// Opaque secret storage keyed by `(service, account)`. Last write wins.
pub trait CredentialStore: Send + Sync {
    fn save(&self, service: &str, account: &str, secret: &str) -> SyncResult<()>;
    /// `Ok(None)` when nothing is stored for the pair.
    fn read(&self, service: &str, account: &str) -> SyncResult<Option<String>>;
    /// Deleting a missing entry is not an error.
    fn delete(&self, service: &str, account: &str) -> SyncResult<()>;
}

/// OS keychain backed store.
#[derive(Clone, Debug, Default)]
pub struct KeyringStore;

impl KeyringStore {
    fn entry(service: &str, account: &str) -> SyncResult<Entry> {
        Entry::new(service, account)
            .map_err(|err| SyncError::Credentials(format!("Failed to open keyring entry: {err}")))
    }
}

impl CredentialStore for KeyringStore {
    fn save(&self, service: &str, account: &str, secret: &str) -> SyncResult<()> {
        Self::entry(service, account)?
            .set_password(secret)
            .map_err(|err| {
                SyncError::Credentials(format!("Failed to store secret in keyring: {err}"))
            })
    }

    fn read(&self, service: &str, account: &str) -> SyncResult<Option<String>> {
        match Self::entry(service, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(err) => Err(SyncError::Credentials(format!(
                "Failed to read secret from keyring: {err}"
            ))),
        }
    }

    fn delete(&self, service: &str, account: &str) -> SyncResult<()> {
        match Self::entry(service, account)?.delete_credential() {
            Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
            Err(err) => Err(SyncError::Credentials(format!(
                "Failed to delete secret from keyring: {err}"
            ))),
        }
    }
}

/// Process-local store for tests and environments without a keychain.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.entries
            .lock()
            .map_err(|_| SyncError::Credentials("credential store lock poisoned".into()))
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, service: &str, account: &str, secret: &str) -> SyncResult<()> {
        self.lock()?
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    fn read(&self, service: &str, account: &str) -> SyncResult<Option<String>> {
        Ok(self
            .lock()?
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    fn delete(&self, service: &str, account: &str) -> SyncResult<()> {
        self.lock()?
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}
