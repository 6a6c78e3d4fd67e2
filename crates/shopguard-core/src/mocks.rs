//! In-process collaborators for tests and local wiring.

use crate::collaborators::{
    AccountProfile, BasketTransfer, CredentialStore, NewAccount, Session, SessionManager,
};
use crate::decision::DECISION_FIELD;
use crate::error::{BasketError, GateError, SessionError, StoreError};
use crate::gate::RiskScoringService;
use crate::types::{
    AddressDetails, AssessmentRequest, AssessmentResponse, AssessmentType, CorrelationId,
    DeviceContext, OutcomeNotification, RequestContext, SignInAssessment, UserDetails,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
enum ScorerBehavior {
    Respond(AssessmentResponse),
    Slow(Duration, AssessmentResponse),
    Unavailable(String),
}

/// Scripted risk scorer that records every call it receives.
#[derive(Debug)]
pub struct MockRiskScorer {
    behavior: ScorerBehavior,
    fail_notifications: bool,
    assessments: Mutex<Vec<(CorrelationId, AssessmentRequest)>>,
    notifications: Mutex<Vec<OutcomeNotification>>,
}

impl MockRiskScorer {
    fn from_behavior(behavior: ScorerBehavior) -> Self {
        Self {
            behavior,
            fail_notifications: false,
            assessments: Mutex::new(Vec::new()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    /// Answer every assessment with `{"MerchantRuleDecision": decision}`.
    pub fn with_decision(decision: &str) -> Self {
        Self::with_response(AssessmentResponse::default().with_detail(DECISION_FIELD, decision))
    }

    pub fn with_response(response: AssessmentResponse) -> Self {
        Self::from_behavior(ScorerBehavior::Respond(response))
    }

    pub fn slow(delay: Duration, decision: &str) -> Self {
        Self::from_behavior(ScorerBehavior::Slow(
            delay,
            AssessmentResponse::default().with_detail(DECISION_FIELD, decision),
        ))
    }

    pub fn unavailable() -> Self {
        Self::from_behavior(ScorerBehavior::Unavailable(
            "connection refused".to_string(),
        ))
    }

    pub fn failing_notifications(mut self) -> Self {
        self.fail_notifications = true;
        self
    }

    pub fn assessments(&self) -> Vec<(CorrelationId, AssessmentRequest)> {
        locked(&self.assessments).clone()
    }

    pub fn notifications(&self) -> Vec<OutcomeNotification> {
        locked(&self.notifications).clone()
    }
}

#[async_trait]
impl RiskScoringService for MockRiskScorer {
    fn provider(&self) -> &'static str {
        "mock"
    }

    async fn assess(
        &self,
        ctx: &RequestContext,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError> {
        locked(&self.assessments).push((ctx.correlation_id.clone(), request.clone()));

        match &self.behavior {
            ScorerBehavior::Respond(response) => Ok(response.clone()),
            ScorerBehavior::Slow(delay, response) => {
                tokio::time::sleep(*delay).await;
                Ok(response.clone())
            }
            ScorerBehavior::Unavailable(reason) => Err(GateError::Unavailable(reason.clone())),
        }
    }

    async fn notify_outcome(
        &self,
        _ctx: &RequestContext,
        notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError> {
        locked(&self.notifications).push(notification.clone());

        if self.fail_notifications {
            return Err(GateError::Unavailable("notification endpoint down".to_string()));
        }
        Ok(AssessmentResponse::default())
    }
}

/// Plain-text credential store. Never use outside tests.
#[derive(Debug, Default)]
pub struct MockCredentialStore {
    accounts: Mutex<HashMap<String, (String, AccountProfile)>>,
    unavailable: bool,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        locked(&self.accounts).insert(
            email.to_string(),
            (password.to_string(), sample_profile(email)),
        );
        self
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("mock store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn verify(&self, identity: &str, secret: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        Ok(locked(&self.accounts)
            .get(identity)
            .map(|(stored, _)| stored == secret)
            .unwrap_or(false))
    }

    async fn create(&self, account: NewAccount) -> Result<AccountProfile, StoreError> {
        self.ensure_available()?;
        let mut accounts = locked(&self.accounts);
        if accounts.contains_key(&account.profile.email) {
            return Err(StoreError::duplicate_identity(&account.profile.email));
        }
        accounts.insert(
            account.profile.email.clone(),
            (account.secret, account.profile.clone()),
        );
        Ok(account.profile)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.ensure_available()?;
        Ok(locked(&self.accounts).len())
    }
}

/// Session manager keeping live sessions in memory.
#[derive(Debug, Default)]
pub struct MockSessionManager {
    sessions: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MockSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            failing: true,
        }
    }

    pub fn active_identities(&self) -> Vec<String> {
        locked(&self.sessions).values().cloned().collect()
    }
}

#[async_trait]
impl SessionManager for MockSessionManager {
    async fn establish(&self, identity: &str) -> Result<Session, SessionError> {
        if self.failing {
            return Err(SessionError::Establish("session backend offline".to_string()));
        }
        let session = Session {
            token: Uuid::new_v4().to_string(),
            identity: identity.to_string(),
            established_at: Utc::now(),
        };
        locked(&self.sessions).insert(session.token.clone(), identity.to_string());
        Ok(session)
    }

    async fn end(&self, token: &str) -> bool {
        locked(&self.sessions).remove(token).is_some()
    }
}

/// Basket transfer recorder. Reports one moved line item per transfer unless set to fail.
#[derive(Debug, Default)]
pub struct MockBasketTransfer {
    transfers: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl MockBasketTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn transfers(&self) -> Vec<(String, String)> {
        locked(&self.transfers).clone()
    }
}

#[async_trait]
impl BasketTransfer for MockBasketTransfer {
    async fn transfer(&self, anonymous_id: &str, identity: &str) -> Result<usize, BasketError> {
        if self.fail {
            return Err(BasketError::Transfer("basket service offline".to_string()));
        }
        locked(&self.transfers).push((anonymous_id.to_string(), identity.to_string()));
        Ok(1)
    }
}

pub fn sample_profile(email: &str) -> AccountProfile {
    AccountProfile {
        email: email.to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        phone_number: None,
        address: AddressDetails::default(),
        created_at: Utc::now(),
    }
}

/// Minimal sign-in assessment for gate tests.
pub fn sample_sign_in(session_id: &str) -> AssessmentRequest {
    AssessmentRequest::SignIn(SignInAssessment {
        sign_in_id: Uuid::new_v4().to_string(),
        assessment_type: AssessmentType::Protect,
        user: UserDetails {
            user_id: "ada@example.com".to_string(),
            ..UserDetails::default()
        },
        device_context: DeviceContext::fingerprinted(session_id),
        merchant_local_date: Utc::now(),
        customer_local_date: None,
    })
}
