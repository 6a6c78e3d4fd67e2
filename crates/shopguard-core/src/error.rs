use crate::decision::Decision;
use thiserror::Error;

/// Message shown for every failed sign-in that is not a validation error.
pub const SIGN_IN_FAILED_MESSAGE: &str = "Invalid login attempt.";

/// Message shown when a registration is stopped by the gate.
pub const REGISTRATION_REJECTED_MESSAGE: &str =
    "We could not complete your registration. Please try again later.";

/// Message shown when a post-approval step fails without field detail.
pub const ACTION_FAILED_MESSAGE: &str = "Something went wrong. Please try again.";

/// Verification gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid assessment request: {0}")]
    InvalidRequest(String),

    #[error("Risk scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("Risk scoring protocol error: {0}")]
    Protocol(String),
}

impl GateError {
    pub fn timeout(elapsed_ms: u128) -> Self {
        Self::Unavailable(format!("no response within {}ms", elapsed_ms))
    }
}

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    Conflict { field: String, message: String },

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn duplicate_identity(identity: &str) -> Self {
        Self::Conflict {
            field: "email".to_string(),
            message: format!("An account for '{}' already exists.", identity),
        }
    }
}

/// Session manager errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to establish session: {0}")]
    Establish(String),
}

/// Basket transfer errors.
#[derive(Debug, Error)]
pub enum BasketError {
    #[error("Basket transfer failed: {0}")]
    Transfer(String),
}

/// Account lifecycle errors surfaced to callers.
///
/// Only validation and store conflicts carry field detail into the form messages. Gate outcomes,
/// credential failures and collaborator outages collapse into generic text.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Verification gate unavailable: {0}")]
    GateUnavailable(String),

    #[error("Verification gate did not approve: {0}")]
    GateRejected(Decision),

    #[error("Credentials did not verify")]
    InvalidCredentials,

    #[error("Account store conflict on '{field}': {message}")]
    StoreConflict { field: String, message: String },

    #[error("Account store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Session could not be established: {0}")]
    SessionEstablish(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl AccountError {
    pub fn stage_violation(expected: &str, actual: &str) -> Self {
        Self::InvariantViolation(format!(
            "stage order violation: expected '{}', got '{}'",
            expected, actual
        ))
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Field the error refers to, when it is safe to say.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::StoreConflict { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Text for the sign-in form. Identical for every non-validation failure.
    pub fn sign_in_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            _ => SIGN_IN_FAILED_MESSAGE.to_string(),
        }
    }

    /// Text for the registration form.
    pub fn registration_message(&self) -> String {
        match self {
            Self::Validation { message, .. } | Self::StoreConflict { message, .. } => {
                message.clone()
            }
            Self::GateUnavailable(_) | Self::GateRejected(_) => {
                REGISTRATION_REJECTED_MESSAGE.to_string()
            }
            Self::InvalidCredentials
            | Self::StoreUnavailable(_)
            | Self::SessionEstablish(_)
            | Self::InvariantViolation(_) => ACTION_FAILED_MESSAGE.to_string(),
        }
    }
}

impl From<GateError> for AccountError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::InvalidRequest(message) => Self::validation("device_fingerprinting", message),
            GateError::Unavailable(message) | GateError::Protocol(message) => {
                Self::GateUnavailable(message)
            }
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field, message } => Self::StoreConflict { field, message },
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
        }
    }
}

impl From<SessionError> for AccountError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Establish(message) => Self::SessionEstablish(message),
        }
    }
}
