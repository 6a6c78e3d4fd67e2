use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shopguard_adapters::credentials::{hash_detached, verify_detached, StoredAccount};
use shopguard_core::collaborators::{AccountProfile, CredentialStore, NewAccount};
use shopguard_core::error::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AccountFileError {
    #[error("account store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("account store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<AccountFileError> for StoreError {
    fn from(err: AccountFileError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct AccountData {
    accounts: BTreeMap<String, StoredAccount>,
}

/// File-backed credential store.
///
/// The file is rewritten after every account creation so accounts survive restarts. A failed
/// write leaves the in-memory view unchanged.
#[derive(Debug)]
pub struct PersistedAccountStore {
    path: PathBuf,
    data: Mutex<AccountData>,
}

impl PersistedAccountStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AccountFileError> {
        let path = path.into();
        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.is_empty() {
                AccountData::default()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            AccountData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: AccountData) -> Result<AccountData, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_accounts(&path, &data).map(|()| data))
            .await
            .map_err(|err| StoreError::Unavailable(format!("account write aborted: {}", err)))?
            .map_err(StoreError::from)
    }
}

fn write_accounts(path: &Path, data: &AccountData) -> Result<(), AccountFileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(data)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(tmp_path, path)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for PersistedAccountStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn verify(&self, identity: &str, secret: &str) -> Result<bool, StoreError> {
        let stored_hash = self
            .data
            .lock()
            .await
            .accounts
            .get(identity)
            .map(|account| account.password_hash.clone());
        verify_detached(secret, stored_hash).await
    }

    async fn create(&self, account: NewAccount) -> Result<AccountProfile, StoreError> {
        if self.data.lock().await.accounts.contains_key(&account.profile.email) {
            return Err(StoreError::duplicate_identity(&account.profile.email));
        }

        let stored = hash_detached(account).await?;
        let identity = stored.identity().to_string();
        let profile = stored.profile.clone();

        // Held across the write so file order matches map order.
        let mut data = self.data.lock().await;
        if data.accounts.contains_key(&identity) {
            return Err(StoreError::duplicate_identity(&identity));
        }
        let mut next = data.clone();
        next.accounts.insert(identity.clone(), stored);
        match self.persist(next).await {
            Ok(written) => *data = written,
            Err(err) => {
                warn!(identity = %identity, error = %err, "Failed to persist account");
                return Err(err);
            }
        }

        info!(identity = %identity, path = %self.path.display(), "Account persisted");
        Ok(profile)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.data.lock().await.accounts.len())
    }
}
