//! Account store for the identity provider.
//!
//! Accounts are persisted to `users.yaml` in the data directory. Only the
//! SHA-256 digest of each API key is stored; the key itself is handed to
//! the client exactly once, at registration.
//!
//! # File Format
//!
//! ```yaml
//! accounts:
//!   - uid: "9f0c..."
//!     email: "user@example.com"
//!     display_name: "User"
//!     key_digest: "base64url-sha256"
//!     created_at: "2026-01-01T00:00:00Z"
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use whereizit_core::Principal;

/// A stored account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// SHA-256 digest of the account's API key, base64url encoded.
    pub key_digest: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn principal(&self) -> Principal {
        Principal {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Errors that can occur in the account store.
#[derive(Debug)]
pub enum AccountStoreError {
    /// I/O error reading or writing the accounts file.
    IoError(std::io::Error),
    /// Error parsing or serializing the accounts file.
    YamlError(String),
    /// Registration with an email that already has an account.
    EmailTaken(String),
}

impl std::fmt::Display for AccountStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStoreError::IoError(e) => write!(f, "I/O error: {}", e),
            AccountStoreError::YamlError(e) => write!(f, "YAML error: {}", e),
            AccountStoreError::EmailTaken(email) => {
                write!(f, "An account already exists for {}", email)
            }
        }
    }
}

impl std::error::Error for AccountStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccountStoreError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// In-memory account store, persisted to `users.yaml` on every change.
#[derive(Debug)]
pub struct AccountStore {
    /// Path to the users.yaml file.
    path: PathBuf,
    /// Accounts indexed by API-key digest.
    accounts: HashMap<String, Account>,
}

impl AccountStore {
    /// Loads the account store from the data directory.
    ///
    /// A missing file yields an empty store; a corrupt file logs a
    /// warning and yields an empty store.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("users.yaml");

        match Self::load_accounts(&path) {
            Ok(accounts) => {
                tracing::info!("Loaded {} account(s)", accounts.len());
                Self { path, accounts }
            }
            Err(e) => {
                if matches!(&e, AccountStoreError::IoError(io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
                {
                    tracing::info!("No users.yaml found, starting with 0 accounts");
                } else {
                    tracing::warn!("Failed to load users.yaml: {}", e);
                }
                Self {
                    path,
                    accounts: HashMap::new(),
                }
            }
        }
    }

    fn load_accounts(path: &Path) -> Result<HashMap<String, Account>, AccountStoreError> {
        let contents = std::fs::read_to_string(path).map_err(AccountStoreError::IoError)?;
        let file: AccountsFile =
            serde_yaml::from_str(&contents).map_err(|e| AccountStoreError::YamlError(e.to_string()))?;

        Ok(file
            .accounts
            .into_iter()
            .map(|account| (account.key_digest.clone(), account))
            .collect())
    }

    fn persist(&self) -> Result<(), AccountStoreError> {
        let mut accounts: Vec<Account> = self.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let contents = serde_yaml::to_string(&AccountsFile { accounts })
            .map_err(|e| AccountStoreError::YamlError(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(AccountStoreError::IoError)
    }

    /// Creates a new account and returns its principal and API key.
    ///
    /// The key is returned exactly once; only its digest is stored.
    pub fn register(
        &mut self,
        email: &str,
        display_name: Option<String>,
    ) -> Result<(Principal, String), AccountStoreError> {
        if self.accounts.values().any(|a| a.email == email) {
            return Err(AccountStoreError::EmailTaken(email.to_string()));
        }

        let key = generate_key();
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.to_string(),
            display_name,
            photo_url: None,
            key_digest: digest_key(&key),
            created_at: Utc::now(),
        };
        let principal = account.principal();

        self.accounts.insert(account.key_digest.clone(), account);
        self.persist()?;

        Ok((principal, key))
    }

    /// Resolves an API key to its principal.
    pub fn authenticate(&self, key: &str) -> Option<Principal> {
        self.accounts.get(&digest_key(key)).map(Account::principal)
    }

    /// Deletes the account behind an API key.
    ///
    /// The account's areas are left in place. Returns `true` if an
    /// account was removed.
    pub fn delete(&mut self, key: &str) -> Result<bool, AccountStoreError> {
        let removed = self.accounts.remove(&digest_key(key)).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Generates a new API key: 32 random bytes, base64url encoded.
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Digest used to index and verify API keys.
fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
