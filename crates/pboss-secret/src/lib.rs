//! Secure credential bridge.
//!
//! Exactly two operations cross from the UI into the credential store:
//! [`CredentialStore::store`] and [`CredentialStore::read`]. The secret is not
//! validated here; the backend is the first thing to use it.

use std::sync::Mutex;

/// Keychain service name.
pub const SERVICE: &str = "ProductivityBoss";
/// Keychain account name.
pub const ACCOUNT: &str = "openai_api_key";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("credential store error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Two-operation secret store.
pub trait CredentialStore: Send + Sync {
    /// Persist `secret`, replacing any previous value.
    /// Returns `Ok(false)` without touching the store when `secret` is empty.
    fn store(&self, secret: &str) -> Result<bool, SecretError>;

    /// The stored secret, or `None` if nothing was ever stored.
    fn read(&self) -> Result<Option<String>, SecretError>;
}

/// OS-native keychain: macOS Keychain, Windows Credential Manager, and on
/// Linux the Secret Service keyring with a keyutils cache in front of it.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE, ACCOUNT)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SecretError> {
        Ok(keyring::Entry::new(&self.service, &self.account)?)
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, secret: &str) -> Result<bool, SecretError> {
        if secret.is_empty() {
            return Ok(false);
        }
        self.entry()?.set_password(secret)?;
        tracing::info!(service = %self.service, "api key stored");
        Ok(true)
    }

    fn read(&self) -> Result<Option<String>, SecretError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    secret: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Mutex::new(Some(secret.to_string())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, secret: &str) -> Result<bool, SecretError> {
        if secret.is_empty() {
            return Ok(false);
        }
        *self.secret.lock().unwrap() = Some(secret.to_string());
        Ok(true)
    }

    fn read(&self) -> Result<Option<String>, SecretError> {
        Ok(self.secret.lock().unwrap().clone())
    }
}

/// Masked form for display: first three and last four characters.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
