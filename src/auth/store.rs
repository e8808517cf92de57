//! Credential persistence for the session token.
//!
//! The token lives in the platform keyring under a fixed key so it survives
//! restarts of the client. Only the session guard (discard on rejection),
//! the login flow, and logout write to the store.

use std::error::Error;
use std::fmt;
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

const KEYRING_SERVICE: &str = "creditchat";
/// Fixed key the session token is stored under.
pub const CREDENTIAL_KEY: &str = "accessToken";

/// Failures when accessing the system keyring.
///
/// Recoverable errors mean the backend was temporarily unavailable (a locked
/// keychain, an unreachable secret service). Permanent errors carry the
/// underlying cause for the user.
#[derive(Debug)]
pub enum CredentialError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl CredentialError {
    fn inner(&self) -> &keyring::Error {
        match self {
            CredentialError::Recoverable(err) | CredentialError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, CredentialError::Recoverable(_))
    }
}

impl From<keyring::Error> for CredentialError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                CredentialError::Recoverable(err)
            }
            other => CredentialError::Permanent(other),
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "credential store unavailable: {}", self.inner())?;
        if self.is_recoverable() {
            write!(f, " (unlock it and retry, or pass --no-keyring)")?;
        }
        Ok(())
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Holder of the single session token.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, CredentialError>;
    fn store(&self, token: &str) -> Result<(), CredentialError>;
    /// Remove the token. Returns whether one was present.
    fn clear(&self) -> Result<bool, CredentialError>;
}

/// Keyring-backed store used by the CLI.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    /// Use a different keyring service name, e.g. to keep two profiles apart.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, CredentialError> {
        Ok(Entry::new(&self.service, CREDENTIAL_KEY)?)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<String>, CredentialError> {
        match self.entry()?.get_password() {
            Ok(token) => {
                debug!(service = %self.service, "credential found");
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, "no stored credential");
                Ok(None)
            }
            Err(err) => Err(CredentialError::from(err)),
        }
    }

    fn store(&self, token: &str) -> Result<(), CredentialError> {
        self.entry()?.set_password(token)?;
        debug!(service = %self.service, "credential stored");
        Ok(())
    }

    fn clear(&self) -> Result<bool, CredentialError> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                debug!(service = %self.service, "credential removed");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(CredentialError::from(err)),
        }
    }
}

/// Process-local store for `--no-keyring` runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.slot().clone())
    }

    fn store(&self, token: &str) -> Result<(), CredentialError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<bool, CredentialError> {
        Ok(self.slot().take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load().expect("load"), None);

        store.store("abc").expect("store");
        assert_eq!(store.load().expect("load").as_deref(), Some("abc"));

        assert!(store.clear().expect("clear"));
        assert!(!store.clear().expect("second clear"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn memory_store_overwrites_previous_token() {
        let store = MemoryCredentialStore::with_token("old");
        store.store("new").expect("store");
        assert_eq!(store.load().expect("load").as_deref(), Some("new"));
    }

    #[test]
    fn keyring_errors_split_into_recoverable_and_permanent() {
        let locked = CredentialError::from(keyring::Error::NoStorageAccess(Box::new(
            std::io::Error::other("locked"),
        )));
        assert!(locked.is_recoverable());
        assert!(locked.to_string().contains("--no-keyring"));

        let bad = CredentialError::from(keyring::Error::BadEncoding(vec![0xff]));
        assert!(!bad.is_recoverable());
        assert!(bad.to_string().starts_with("credential store unavailable"));
        assert!(!bad.to_string().contains("--no-keyring"));
    }
}
