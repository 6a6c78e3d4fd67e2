//! Argon2 password hashing and the in-memory credential store.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopguard_core::collaborators::{AccountProfile, CredentialStore, NewAccount};
use shopguard_core::error::StoreError;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format")]
    InvalidHash,
}

impl From<PasswordError> for StoreError {
    fn from(err: PasswordError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Hash a password with Argon2id into PHC string format.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Check a password against a stored PHC hash. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Well-formed Argon2id hash that matches no password. Unknown identities are checked against
/// it so a miss costs as much as a wrong password.
pub const UNKNOWN_ACCOUNT_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$oJGl5RLqxNnfky2B23qGlw$OKK5+Xc22mXgyhwhJcwINo32ucmIM/Cf5Chd04t9w+U";

/// Verify `secret` on the blocking pool. `None` runs against [`UNKNOWN_ACCOUNT_HASH`] and
/// always yields `false`.
pub async fn verify_detached(
    secret: &str,
    stored_hash: Option<String>,
) -> Result<bool, StoreError> {
    let known = stored_hash.is_some();
    let hash = stored_hash.unwrap_or_else(|| UNKNOWN_ACCOUNT_HASH.to_string());
    let secret = secret.to_string();

    let matched = tokio::task::spawn_blocking(move || verify_password(&secret, &hash))
        .await
        .map_err(|err| StoreError::Unavailable(format!("password check aborted: {}", err)))??;
    Ok(known && matched)
}

/// Hash a new account's secret on the blocking pool.
pub async fn hash_detached(account: NewAccount) -> Result<StoredAccount, StoreError> {
    let stored = tokio::task::spawn_blocking(move || StoredAccount::from_new(account))
        .await
        .map_err(|err| StoreError::Unavailable(format!("password hashing aborted: {}", err)))??;
    Ok(stored)
}

/// Account row as kept by the credential stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub profile: AccountProfile,
    pub password_hash: String,
}

impl StoredAccount {
    pub fn from_new(account: NewAccount) -> Result<Self, PasswordError> {
        let password_hash = hash_password(&account.secret)?;
        Ok(Self {
            profile: account.profile,
            password_hash,
        })
    }

    pub fn identity(&self) -> &str {
        &self.profile.email
    }
}

/// Credential store keeping hashed accounts in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<String, StoredAccount>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn verify(&self, identity: &str, secret: &str) -> Result<bool, StoreError> {
        let stored_hash = self
            .accounts
            .read()
            .await
            .get(identity)
            .map(|account| account.password_hash.clone());
        if stored_hash.is_none() {
            debug!(identity, "Unknown identity");
        }
        verify_detached(secret, stored_hash).await
    }

    async fn create(&self, account: NewAccount) -> Result<AccountProfile, StoreError> {
        if self.accounts.read().await.contains_key(&account.profile.email) {
            return Err(StoreError::duplicate_identity(&account.profile.email));
        }

        let stored = hash_detached(account).await?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(stored.identity()) {
            return Err(StoreError::duplicate_identity(stored.identity()));
        }
        let profile = stored.profile.clone();
        accounts.insert(stored.identity().to_string(), stored);
        info!(identity = %profile.email, "Account created");
        Ok(profile)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.accounts.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopguard_core::mocks::sample_profile;

    fn new_account(email: &str, secret: &str) -> NewAccount {
        NewAccount {
            profile: sample_profile(email),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("Pass@word1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("Pass@word1"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Pass@word1").unwrap();
        assert!(verify_password("Pass@word1", &hash).unwrap());
        assert!(!verify_password("pass@word1", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(PasswordError::InvalidHash)
        ));
    }

    #[tokio::test]
    async fn created_account_verifies() {
        let store = InMemoryCredentialStore::new();
        store
            .create(new_account("ada@example.com", "Pass@word1"))
            .await
            .unwrap();

        assert!(store.verify("ada@example.com", "Pass@word1").await.unwrap());
        assert!(!store.verify("ada@example.com", "wrong").await.unwrap());
        assert!(!store.verify("nobody@example.com", "Pass@word1").await.unwrap());
    }

    #[test]
    fn unknown_account_hash_is_well_formed() {
        assert!(!verify_password("Pass@word1", UNKNOWN_ACCOUNT_HASH).unwrap());
        assert!(!verify_password("", UNKNOWN_ACCOUNT_HASH).unwrap());
    }

    #[tokio::test]
    async fn unknown_identity_still_runs_the_hash() {
        assert!(!verify_detached("Pass@word1", None).await.unwrap());

        let hash = hash_password("Pass@word1").unwrap();
        assert!(verify_detached("Pass@word1", Some(hash)).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_registrations_keep_one_account() {
        let store = std::sync::Arc::new(InMemoryCredentialStore::new());

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.create(new_account("ada@example.com", "Pass@word1")).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.create(new_account("ada@example.com", "Other@pass2")).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_identity_conflicts() {
        let store = InMemoryCredentialStore::new();
        store
            .create(new_account("ada@example.com", "Pass@word1"))
            .await
            .unwrap();

        let err = store
            .create(new_account("ada@example.com", "Other@pass2"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
