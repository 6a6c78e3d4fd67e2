//! Collaborator adapters for Shopguard.

#![deny(unsafe_code)]

pub mod basket;
pub mod credentials;
pub mod http;
pub mod session;

use async_trait::async_trait;
use rand::Rng;
use shopguard_core::decision::DECISION_FIELD;
use shopguard_core::error::GateError;
use shopguard_core::gate::RiskScoringService;
use shopguard_core::types::{
    AssessmentRequest, AssessmentResponse, OutcomeNotification, RequestContext,
};
use thiserror::Error;
use tracing::debug;

pub use basket::{BasketItem, InMemoryBasketService};
pub use credentials::{
    hash_detached, hash_password, verify_detached, verify_password, InMemoryCredentialStore,
    PasswordError, StoredAccount, UNKNOWN_ACCOUNT_HASH,
};
pub use http::{HttpRiskScoringClient, HttpScoringConfig};
pub use session::InMemorySessionManager;

/// Adapter construction errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid adapter configuration: {0}")]
    InvalidConfig(String),
}

/// Share of assessments the simulated scorer approves.
pub const DEFAULT_APPROVAL_RATIO: f64 = 2.0 / 3.0;

/// Local stand-in for the risk scoring service.
///
/// Approves a configurable share of assessments at random and rejects the rest. Outcome
/// notifications are accepted and dropped.
#[derive(Debug, Clone)]
pub struct SimulatedRiskScorer {
    approval_ratio: f64,
}

impl SimulatedRiskScorer {
    pub fn new(approval_ratio: f64) -> Result<Self, AdapterError> {
        if !(0.0..=1.0).contains(&approval_ratio) {
            return Err(AdapterError::InvalidConfig(format!(
                "approval ratio must be within 0..=1, got {}",
                approval_ratio
            )));
        }
        Ok(Self { approval_ratio })
    }

    pub fn approval_ratio(&self) -> f64 {
        self.approval_ratio
    }
}

impl Default for SimulatedRiskScorer {
    fn default() -> Self {
        Self {
            approval_ratio: DEFAULT_APPROVAL_RATIO,
        }
    }
}

#[async_trait]
impl RiskScoringService for SimulatedRiskScorer {
    fn provider(&self) -> &'static str {
        "simulated"
    }

    async fn assess(
        &self,
        ctx: &RequestContext,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError> {
        let literal = if rand::thread_rng().gen_bool(self.approval_ratio) {
            "Approve"
        } else {
            "Reject"
        };
        debug!(
            correlation_id = %ctx.correlation_id,
            kind = request.kind().name(),
            decision = literal,
            "Simulated assessment"
        );
        Ok(AssessmentResponse::default().with_detail(DECISION_FIELD, literal))
    }

    async fn notify_outcome(
        &self,
        _ctx: &RequestContext,
        _notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError> {
        Ok(AssessmentResponse::default())
    }
}

/// Scorer answering every assessment with the same decision literal.
#[derive(Debug, Clone)]
pub struct FixedDecisionScorer {
    literal: String,
}

impl FixedDecisionScorer {
    pub fn new(literal: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
        }
    }
}

#[async_trait]
impl RiskScoringService for FixedDecisionScorer {
    fn provider(&self) -> &'static str {
        "fixed"
    }

    async fn assess(
        &self,
        _ctx: &RequestContext,
        _request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError> {
        Ok(AssessmentResponse::default().with_detail(DECISION_FIELD, self.literal.clone()))
    }

    async fn notify_outcome(
        &self,
        _ctx: &RequestContext,
        _notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError> {
        Ok(AssessmentResponse::default())
    }
}

/// Deterministic failing scorer useful for outage drills.
#[derive(Debug, Clone)]
pub struct AlwaysUnavailableScorer {
    reason: String,
}

impl AlwaysUnavailableScorer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RiskScoringService for AlwaysUnavailableScorer {
    fn provider(&self) -> &'static str {
        "unavailable"
    }

    async fn assess(
        &self,
        _ctx: &RequestContext,
        _request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError> {
        Err(GateError::Unavailable(self.reason.clone()))
    }

    async fn notify_outcome(
        &self,
        _ctx: &RequestContext,
        _notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError> {
        Err(GateError::Unavailable(self.reason.clone()))
    }
}
