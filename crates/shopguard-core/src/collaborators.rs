use crate::error::{BasketError, SessionError, StoreError};
use crate::types::AddressDetails;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored profile of a registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub address: AddressDetails,
    pub created_at: DateTime<Utc>,
}

/// Account creation request handed to the credential store after approval.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub profile: AccountProfile,
    pub secret: String,
}

/// Authenticated session issued to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub identity: String,
    pub established_at: DateTime<Utc>,
}

/// Account credential persistence.
///
/// Uniqueness of identities is enforced here, not by the executor.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn verify(&self, identity: &str, secret: &str) -> Result<bool, StoreError>;

    async fn create(&self, account: NewAccount) -> Result<AccountProfile, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// Issues and ends authenticated sessions.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn establish(&self, identity: &str) -> Result<Session, SessionError>;

    /// Returns whether a live session was ended.
    async fn end(&self, token: &str) -> bool;
}

/// Moves an anonymous basket onto an identified account. Idempotent per anonymous id.
#[async_trait]
pub trait BasketTransfer: Send + Sync {
    /// Returns the number of line items moved. Zero when the anonymous basket was empty,
    /// unknown or already transferred.
    async fn transfer(&self, anonymous_id: &str, identity: &str) -> Result<usize, BasketError>;
}

/// What happened to the caller's anonymous basket after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasketHandoff {
    /// No anonymous basket id came with the request.
    NotPresented,
    /// The basket service accepted the transfer.
    Transferred { items: usize },
    /// The basket service failed; the anonymous basket is untouched.
    Failed,
}

impl BasketHandoff {
    pub fn moved_items(self) -> bool {
        matches!(self, Self::Transferred { items } if items > 0)
    }

    /// Whether the anonymous basket id has been consumed and may be forgotten by the caller.
    pub fn released(self) -> bool {
        matches!(self, Self::Transferred { .. })
    }
}
