//! API key storage and lookup.
//!
//! The key is taken from the environment first (`GEMINI_API_KEY`, then
//! `API_KEY`) and otherwise from the system keyring.

use crate::core::keyring::{KeyringAccessError, KeyringOperation};
use keyring::Entry;
use std::error::Error;
use std::fmt;
use std::io::{self, BufRead, Write};

const KEYRING_SERVICE: &str = "threadchat";
const KEYRING_USER: &str = "gemini";
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment(&'static str),
    Keyring,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Environment(var) => write!(f, "${var}"),
            KeySource::Keyring => write!(f, "system keyring"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub value: String,
    pub source: KeySource,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug)]
pub enum CredentialError {
    Missing,
    Keyring(KeyringAccessError),
}

const STORE_KEY_FIX: &str = "threadchat auth                 # Store a key in the system keyring";
const ENV_KEY_FIX: &str = "export GEMINI_API_KEY=...       # Use an environment variable";
const UNLOCK_FIX: &str = "Unlock the system keyring (or start its service) and retry";

impl CredentialError {
    pub fn quick_fixes(&self) -> &'static [&'static str] {
        match self {
            CredentialError::Keyring(err) if err.is_unavailable() => &[UNLOCK_FIX, ENV_KEY_FIX],
            CredentialError::Keyring(_) => &[ENV_KEY_FIX],
            CredentialError::Missing => &[STORE_KEY_FIX, ENV_KEY_FIX],
        }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing => write!(
                f,
                "No API key found: GEMINI_API_KEY and API_KEY are unset and the keyring has no entry"
            ),
            CredentialError::Keyring(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Missing => None,
            CredentialError::Keyring(err) => Some(err),
        }
    }
}

pub struct AuthManager {
    use_keyring: bool,
}

impl AuthManager {
    pub fn new() -> Self {
        Self { use_keyring: true }
    }

    /// An AuthManager that never touches the keyring (useful for tests)
    pub fn without_keyring() -> Self {
        Self { use_keyring: false }
    }

    fn entry(operation: KeyringOperation) -> Result<Entry, KeyringAccessError> {
        Entry::new(KEYRING_SERVICE, KEYRING_USER)
            .map_err(|err| KeyringAccessError::new(operation, err))
    }

    pub fn get_key(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        match Self::entry(KeyringOperation::Read)?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(KeyringAccessError::new(KeyringOperation::Read, err)),
        }
    }

    pub fn store_key(&self, key: &str) -> Result<(), KeyringAccessError> {
        Self::entry(KeyringOperation::Store)?
            .set_password(key)
            .map_err(|err| KeyringAccessError::new(KeyringOperation::Store, err))
    }

    /// Returns false when there was nothing to remove.
    pub fn remove_key(&self) -> Result<bool, KeyringAccessError> {
        match Self::entry(KeyringOperation::Remove)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(KeyringAccessError::new(KeyringOperation::Remove, err)),
        }
    }

    pub fn resolve_api_key(&self) -> Result<ApiKey, CredentialError> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with<F>(&self, env: F) -> Result<ApiKey, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for var in API_KEY_ENV_VARS {
            if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
                return Ok(ApiKey {
                    value: value.trim().to_string(),
                    source: KeySource::Environment(var),
                });
            }
        }

        match self.get_key() {
            Ok(Some(value)) => Ok(ApiKey {
                value,
                source: KeySource::Keyring,
            }),
            Ok(None) => Err(CredentialError::Missing),
            Err(err) => Err(CredentialError::Keyring(err)),
        }
    }

    pub fn interactive_auth(&self) -> Result<(), Box<dyn Error>> {
        println!("🔐 Store a Gemini API key in the system keyring");
        print!("API key: ");
        io::stdout().flush()?;

        let mut key = String::new();
        io::stdin().lock().read_line(&mut key)?;
        let key = key.trim();
        if key.is_empty() {
            return Err("API key cannot be empty".into());
        }

        if let Err(err) = self.store_key(key) {
            if err.is_unavailable() {
                eprintln!("💡 {UNLOCK_FIX}, or export GEMINI_API_KEY instead.");
            }
            return Err(err.into());
        }
        println!("✅ API key stored");
        Ok(())
    }

    pub fn interactive_deauth(&self) -> Result<(), Box<dyn Error>> {
        if self.remove_key()? {
            println!("✅ API key removed from the system keyring");
        } else {
            println!("No stored API key to remove");
        }
        Ok(())
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}
