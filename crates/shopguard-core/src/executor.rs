use crate::collaborators::{
    AccountProfile, BasketHandoff, BasketTransfer, CredentialStore, NewAccount, Session,
    SessionManager,
};
use crate::decision::Decision;
use crate::error::{AccountError, GateError};
use crate::flow::{RegistrationStageMachine, SignInStageMachine};
use crate::gate::VerificationGate;
use crate::navigation::resolve_return_url;
use crate::types::{
    AddressDetails, AddressType, AssessmentRequest, AssessmentType, CorrelationId, DeviceContext,
    MarketingContext, OutcomeNotification, RequestContext, SignInAssessment, SignUpAssessment,
    SignupStatus, StoreFrontContext, UserDetails, UserProfileType,
};
use crate::validation::{normalize_identity, require, validate_email, validate_new_password};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Account lifecycle configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub storefront: StoreFrontContext,
    pub marketing: MarketingContext,
    /// Locale reported for new users.
    pub language: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            storefront: StoreFrontContext {
                storefront_type: Default::default(),
                store_name: "Shopguard Sample Store".to_string(),
                market: "US".to_string(),
            },
            marketing: MarketingContext {
                incentive_offer: Some("Integrate with Fraud Protection".to_string()),
                ..MarketingContext::default()
            },
            language: "EN-US".to_string(),
        }
    }
}

/// Fingerprinting data posted with the sign-in and registration forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub session_id: String,
    #[serde(default)]
    pub fingerprinting_dc: Option<String>,
}

/// Caller environment that is not part of the form itself.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub ip_address: Option<String>,
    pub anonymous_basket_id: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInCommand {
    pub email: String,
    pub password: String,
    pub device_fingerprinting: DeviceFingerprint,
    #[serde(default)]
    pub customer_local_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCommand {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country_region: Option<String>,
    /// Browser `getTimezoneOffset()` in minutes, positive west of UTC.
    #[serde(default)]
    pub client_time_zone: i32,
    #[serde(default)]
    pub client_date: Option<DateTime<FixedOffset>>,
    pub device_fingerprinting: DeviceFingerprint,
}

#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub correlation_id: CorrelationId,
    pub session: Session,
    pub basket: BasketHandoff,
    pub redirect: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub correlation_id: CorrelationId,
    pub profile: AccountProfile,
    pub session: Session,
    pub basket: BasketHandoff,
    pub redirect: String,
}

/// Runs sign-in and registration behind the verification gate.
///
/// No account state changes unless the gate returned `Approve` for this action.
pub struct AccountLifecycleExecutor {
    gate: Arc<VerificationGate>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionManager>,
    baskets: Arc<dyn BasketTransfer>,
    config: ExecutorConfig,
}

impl AccountLifecycleExecutor {
    pub fn new(
        gate: Arc<VerificationGate>,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionManager>,
        baskets: Arc<dyn BasketTransfer>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            gate,
            credentials,
            sessions,
            baskets,
            config,
        }
    }

    pub fn gate(&self) -> &Arc<VerificationGate> {
        &self.gate
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub async fn sign_in(
        &self,
        ctx: &RequestContext,
        caller: &CallerContext,
        command: SignInCommand,
    ) -> Result<SignInOutcome, AccountError> {
        validate_email(&command.email)?;
        require("password", &command.password)?;
        require(
            "device_fingerprinting",
            &command.device_fingerprinting.session_id,
        )?;

        let identity = normalize_identity(&command.email);
        let mut machine = SignInStageMachine::new(ctx.correlation_id.clone());
        let request = self.sign_in_assessment(caller, &command, &identity);

        let assessed = self.gate.assess(ctx, &request).await;
        machine.mark_assessed()?;

        let decision = match assessed {
            Ok(assessment) => assessment.decision,
            Err(err) => return Err(err.into()),
        };
        if !decision.is_approving() {
            info!(
                correlation_id = %ctx.correlation_id,
                decision = %decision,
                "Sign-in stopped by gate"
            );
            return Err(AccountError::GateRejected(decision));
        }

        if !self
            .credentials
            .verify(&identity, &command.password)
            .await?
        {
            info!(correlation_id = %ctx.correlation_id, "Sign-in credentials rejected");
            return Err(AccountError::InvalidCredentials);
        }
        machine.mark_credentials_verified()?;

        let session = self.sessions.establish(&identity).await?;
        machine.mark_authenticated()?;

        let basket = self
            .transfer_basket(ctx, caller.anonymous_basket_id.as_deref(), &identity)
            .await;

        info!(
            correlation_id = %ctx.correlation_id,
            basket_moved = basket.moved_items(),
            "Sign-in authenticated"
        );

        Ok(SignInOutcome {
            correlation_id: ctx.correlation_id.clone(),
            session,
            basket,
            redirect: resolve_return_url(caller.return_url.as_deref()),
        })
    }

    /// Register a new account.
    ///
    /// Exactly one outcome notification follows every assessment attempt, carrying the same
    /// correlation id: `Approved` once the account exists and is signed in, `Rejected` in
    /// every other branch.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        caller: &CallerContext,
        command: RegisterCommand,
    ) -> Result<RegistrationOutcome, AccountError> {
        validate_registration(&command)?;

        let identity = normalize_identity(&command.email);
        let mut machine = RegistrationStageMachine::new(ctx.correlation_id.clone());
        let sign_up = self.sign_up_assessment(caller, &command, &identity);
        let sign_up_id = sign_up.sign_up_id.clone();
        let request = AssessmentRequest::SignUp(sign_up);

        let assessed = self.gate.assess(ctx, &request).await;
        let decision = match assessed {
            Ok(assessment) => assessment.decision,
            Err(GateError::InvalidRequest(message)) => {
                // Nothing left the process; there is no outcome to report.
                return Err(GateError::InvalidRequest(message).into());
            }
            Err(err) => {
                machine.mark_assessed()?;
                self.send_outcome(
                    ctx,
                    OutcomeNotification::rejected(
                        ctx.correlation_id.clone(),
                        &sign_up_id,
                        "User is Rejected: assessment unavailable",
                    ),
                )
                .await;
                machine.mark_rejected()?;
                return Err(err.into());
            }
        };
        machine.mark_assessed()?;

        if !decision.is_approving() {
            self.send_outcome(
                ctx,
                OutcomeNotification::rejected(
                    ctx.correlation_id.clone(),
                    &sign_up_id,
                    rejection_reason(decision),
                ),
            )
            .await;
            machine.mark_rejected()?;
            info!(
                correlation_id = %ctx.correlation_id,
                decision = %decision,
                "Registration stopped by gate"
            );
            return Err(AccountError::GateRejected(decision));
        }

        let (profile, session) = match self
            .complete_registration(&mut machine, &command, &identity)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    error = %err,
                    "Registration failed after approval"
                );
                self.send_outcome(
                    ctx,
                    OutcomeNotification::rejected(
                        ctx.correlation_id.clone(),
                        &sign_up_id,
                        "User is Rejected: account could not be completed",
                    ),
                )
                .await;
                machine.mark_rejected()?;
                return Err(err);
            }
        };

        self.send_outcome(
            ctx,
            OutcomeNotification::approved(ctx.correlation_id.clone(), &sign_up_id, &identity),
        )
        .await;
        machine.mark_registered()?;

        let basket = self
            .transfer_basket(ctx, caller.anonymous_basket_id.as_deref(), &identity)
            .await;

        info!(correlation_id = %ctx.correlation_id, "Registration completed");

        Ok(RegistrationOutcome {
            correlation_id: ctx.correlation_id.clone(),
            profile,
            session,
            basket,
            redirect: resolve_return_url(caller.return_url.as_deref()),
        })
    }

    /// End the session behind `token`. Returns whether a live session existed.
    pub async fn sign_out(&self, token: &str) -> bool {
        self.sessions.end(token).await
    }

    async fn complete_registration(
        &self,
        machine: &mut RegistrationStageMachine,
        command: &RegisterCommand,
        identity: &str,
    ) -> Result<(AccountProfile, Session), AccountError> {
        let profile = self
            .credentials
            .create(NewAccount {
                profile: account_profile(command, identity),
                secret: command.password.clone(),
            })
            .await?;
        machine.mark_account_created()?;

        let session = self.sessions.establish(identity).await?;
        machine.mark_signed_in()?;

        Ok((profile, session))
    }

    async fn send_outcome(&self, ctx: &RequestContext, notification: OutcomeNotification) {
        // Delivery problems are logged by the gate and never change the action's result.
        let _ = self.gate.notify_outcome(ctx, &notification).await;
    }

    async fn transfer_basket(
        &self,
        ctx: &RequestContext,
        anonymous_id: Option<&str>,
        identity: &str,
    ) -> BasketHandoff {
        let Some(anonymous_id) = anonymous_id.filter(|id| !id.trim().is_empty()) else {
            return BasketHandoff::NotPresented;
        };

        match self.baskets.transfer(anonymous_id, identity).await {
            Ok(items) => BasketHandoff::Transferred { items },
            Err(err) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    error = %err,
                    "Basket transfer failed"
                );
                BasketHandoff::Failed
            }
        }
    }

    fn sign_in_assessment(
        &self,
        caller: &CallerContext,
        command: &SignInCommand,
        identity: &str,
    ) -> AssessmentRequest {
        AssessmentRequest::SignIn(SignInAssessment {
            sign_in_id: Uuid::new_v4().to_string(),
            assessment_type: AssessmentType::Protect,
            user: UserDetails {
                user_id: identity.to_string(),
                email: Some(identity.to_string()),
                ..UserDetails::default()
            },
            device_context: device_context(&command.device_fingerprinting, caller),
            merchant_local_date: Utc::now(),
            customer_local_date: command.customer_local_date,
        })
    }

    fn sign_up_assessment(
        &self,
        caller: &CallerContext,
        command: &RegisterCommand,
        identity: &str,
    ) -> SignUpAssessment {
        let now = Utc::now();
        let address = signup_address(command);

        SignUpAssessment {
            sign_up_id: Uuid::new_v4().to_string(),
            assessment_type: AssessmentType::Protect,
            user: UserDetails {
                user_id: identity.to_string(),
                creation_date: Some(now),
                update_date: Some(now),
                first_name: Some(command.first_name.trim().to_string()),
                last_name: Some(command.last_name.trim().to_string()),
                country: command.country_region.clone(),
                zip_code: command.zip_code.clone(),
                time_zone: Some(format_time_zone(command.client_time_zone)),
                language: Some(self.config.language.clone()),
                phone_number: command.phone.clone(),
                email: Some(identity.to_string()),
                profile_type: Some(UserProfileType::Consumer),
                address: Some(address),
                ..UserDetails::default()
            },
            device_context: device_context(&command.device_fingerprinting, caller),
            merchant_local_date: now,
            customer_local_date: command.client_date,
            marketing_context: self.config.marketing.clone(),
            store_front_context: self.config.storefront.clone(),
        }
    }
}

fn validate_registration(command: &RegisterCommand) -> Result<(), AccountError> {
    validate_email(&command.email)?;
    require("first_name", &command.first_name)?;
    require("last_name", &command.last_name)?;
    validate_new_password(&command.password, &command.confirm_password)?;
    require(
        "device_fingerprinting",
        &command.device_fingerprinting.session_id,
    )
}

fn device_context(fingerprint: &DeviceFingerprint, caller: &CallerContext) -> DeviceContext {
    DeviceContext::fingerprinted(fingerprint.session_id.trim())
        .with_ip_address(caller.ip_address.clone())
        .with_datacenter(fingerprint.fingerprinting_dc.clone())
}

fn signup_address(command: &RegisterCommand) -> AddressDetails {
    AddressDetails {
        address_type: Some(AddressType::Primary),
        first_name: Some(command.first_name.trim().to_string()),
        last_name: Some(command.last_name.trim().to_string()),
        phone_number: command.phone.clone(),
        street1: command.address1.clone(),
        street2: command.address2.clone(),
        street3: None,
        city: command.city.clone(),
        state: command.state.clone(),
        district: None,
        zip_code: command.zip_code.clone(),
        country: command.country_region.clone(),
    }
}

fn account_profile(command: &RegisterCommand, identity: &str) -> AccountProfile {
    AccountProfile {
        email: identity.to_string(),
        first_name: command.first_name.trim().to_string(),
        last_name: command.last_name.trim().to_string(),
        phone_number: command.phone.clone(),
        address: signup_address(command),
        created_at: Utc::now(),
    }
}

fn rejection_reason(decision: Decision) -> String {
    format!(
        "User is {}: gate decision {}",
        SignupStatus::Rejected.name(),
        decision
    )
}

/// Render a browser timezone offset as a signed `hh:mm:ss` span.
///
/// Browsers report minutes *behind* UTC, so 420 becomes `-07:00:00`.
pub fn format_time_zone(offset_minutes: i32) -> String {
    let minutes = -(offset_minutes as i64);
    let sign = if minutes < 0 { "-" } else { "" };
    let total = minutes.abs();
    format!("{}{:02}:{:02}:00", sign, total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SIGN_IN_FAILED_MESSAGE;
    use crate::gate::GateConfig;
    use crate::mocks::{
        MockBasketTransfer, MockCredentialStore, MockRiskScorer, MockSessionManager,
    };
    use crate::types::AssessmentResponse;
    use std::time::Duration;

    struct Harness {
        executor: AccountLifecycleExecutor,
        scorer: Arc<MockRiskScorer>,
        store: Arc<MockCredentialStore>,
        sessions: Arc<MockSessionManager>,
        baskets: Arc<MockBasketTransfer>,
    }

    fn harness(scorer: MockRiskScorer, store: MockCredentialStore) -> Harness {
        harness_with(scorer, store, MockSessionManager::new(), MockBasketTransfer::new())
    }

    fn harness_with_sessions(
        scorer: MockRiskScorer,
        store: MockCredentialStore,
        sessions: MockSessionManager,
    ) -> Harness {
        harness_with(scorer, store, sessions, MockBasketTransfer::new())
    }

    fn harness_with(
        scorer: MockRiskScorer,
        store: MockCredentialStore,
        sessions: MockSessionManager,
        baskets: MockBasketTransfer,
    ) -> Harness {
        let scorer = Arc::new(scorer);
        let store = Arc::new(store);
        let sessions = Arc::new(sessions);
        let baskets = Arc::new(baskets);
        let gate = Arc::new(VerificationGate::new(
            scorer.clone(),
            GateConfig {
                timeout: Duration::from_millis(200),
                trail_capacity: 64,
            },
        ));
        let executor = AccountLifecycleExecutor::new(
            gate,
            store.clone(),
            sessions.clone(),
            baskets.clone(),
            ExecutorConfig::default(),
        );
        Harness {
            executor,
            scorer,
            store,
            sessions,
            baskets,
        }
    }

    fn caller_with_basket() -> CallerContext {
        CallerContext {
            ip_address: Some("203.0.113.7".to_string()),
            anonymous_basket_id: Some("anon-basket-1".to_string()),
            return_url: Some("/orders".to_string()),
        }
    }

    fn sign_in_command(password: &str) -> SignInCommand {
        SignInCommand {
            email: "Ada@Example.com".to_string(),
            password: password.to_string(),
            device_fingerprinting: DeviceFingerprint {
                session_id: "device-session-1".to_string(),
                fingerprinting_dc: Some("uswest".to_string()),
            },
            customer_local_date: None,
        }
    }

    fn register_command() -> RegisterCommand {
        RegisterCommand {
            email: "grace@example.com".to_string(),
            password: "Pass@word1".to_string(),
            confirm_password: "Pass@word1".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            phone: Some("+1-5550100".to_string()),
            address1: Some("1 Navy Way".to_string()),
            address2: None,
            city: Some("Arlington".to_string()),
            state: Some("VA".to_string()),
            zip_code: Some("22202".to_string()),
            country_region: Some("US".to_string()),
            client_time_zone: 300,
            client_date: None,
            device_fingerprinting: DeviceFingerprint {
                session_id: "device-session-2".to_string(),
                fingerprinting_dc: None,
            },
        }
    }

    #[tokio::test]
    async fn approved_sign_in_authenticates_and_moves_basket() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );
        let ctx = RequestContext::new();

        let outcome = h
            .executor
            .sign_in(&ctx, &caller_with_basket(), sign_in_command("Pass@word1"))
            .await
            .unwrap();

        assert_eq!(outcome.session.identity, "ada@example.com");
        assert_eq!(outcome.basket, BasketHandoff::Transferred { items: 1 });
        assert_eq!(outcome.redirect, "/orders");
        assert_eq!(
            h.baskets.transfers(),
            vec![("anon-basket-1".to_string(), "ada@example.com".to_string())]
        );

        let sent = h.scorer.assessments();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ctx.correlation_id);
        assert_eq!(
            sent[0].1.device_context().ip_address.as_deref(),
            Some("203.0.113.7")
        );
    }

    #[tokio::test]
    async fn wrong_password_after_approval_stays_unauthenticated() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );

        let err = h
            .executor
            .sign_in(
                &RequestContext::new(),
                &caller_with_basket(),
                sign_in_command("nope"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(err.sign_in_message(), SIGN_IN_FAILED_MESSAGE);
        assert!(h.baskets.transfers().is_empty());
        assert!(h.sessions.active_identities().is_empty());
    }

    #[tokio::test]
    async fn gate_rejection_and_bad_password_read_the_same() {
        let rejected = harness(
            MockRiskScorer::with_decision("Reject"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );
        let bad_password = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );

        let rejected_err = rejected
            .executor
            .sign_in(
                &RequestContext::new(),
                &CallerContext::default(),
                sign_in_command("Pass@word1"),
            )
            .await
            .unwrap_err();
        let password_err = bad_password
            .executor
            .sign_in(
                &RequestContext::new(),
                &CallerContext::default(),
                sign_in_command("wrong"),
            )
            .await
            .unwrap_err();

        assert_eq!(rejected_err.sign_in_message(), password_err.sign_in_message());
        assert!(rejected.sessions.active_identities().is_empty());
    }

    #[tokio::test]
    async fn non_approving_payloads_never_reach_credentials() {
        let payloads = vec![
            AssessmentResponse::default(),
            AssessmentResponse::default().with_detail("MerchantRuleDecision", "Review"),
            AssessmentResponse::default().with_detail("MerchantRuleDecision", "approve"),
            AssessmentResponse::default().with_detail("MerchantRuleDecision", 1),
        ];

        for payload in payloads {
            let h = harness(
                MockRiskScorer::with_response(payload),
                MockCredentialStore::unavailable(),
            );
            let err = h
                .executor
                .sign_in(
                    &RequestContext::new(),
                    &CallerContext::default(),
                    sign_in_command("Pass@word1"),
                )
                .await
                .unwrap_err();
            // An unavailable store would surface as StoreUnavailable had it been called.
            assert!(matches!(err, AccountError::GateRejected(_)));
        }
    }

    #[tokio::test]
    async fn gate_outage_fails_sign_in_closed() {
        let h = harness(
            MockRiskScorer::unavailable(),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );

        let err = h
            .executor
            .sign_in(
                &RequestContext::new(),
                &caller_with_basket(),
                sign_in_command("Pass@word1"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::GateUnavailable(_)));
        assert_eq!(err.sign_in_message(), SIGN_IN_FAILED_MESSAGE);
        assert!(h.sessions.active_identities().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_gate() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new(),
        );
        let mut command = sign_in_command("Pass@word1");
        command.device_fingerprinting.session_id = String::new();

        let err = h
            .executor
            .sign_in(&RequestContext::new(), &CallerContext::default(), command)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(h.scorer.assessments().is_empty());
    }

    #[tokio::test]
    async fn approved_registration_creates_account_and_reports_approval() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new(),
        );
        let ctx = RequestContext::new();

        let outcome = h
            .executor
            .register(&ctx, &caller_with_basket(), register_command())
            .await
            .unwrap();

        assert_eq!(outcome.profile.email, "grace@example.com");
        assert_eq!(h.store.count().await.unwrap(), 1);
        assert_eq!(h.sessions.active_identities(), vec!["grace@example.com"]);
        assert!(outcome.basket.moved_items());

        let notifications = h.scorer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, SignupStatus::Approved);
        assert_eq!(notifications[0].correlation_id, ctx.correlation_id);
        assert_eq!(
            notifications[0].user.as_ref().map(|u| u.user_id.as_str()),
            Some("grace@example.com")
        );

        let assessments = h.scorer.assessments();
        let (assessed_id, request) = &assessments[0];
        assert_eq!(assessed_id, &ctx.correlation_id);
        assert_eq!(request.event_id(), notifications[0].sign_up_id);
    }

    #[tokio::test]
    async fn review_decision_blocks_registration() {
        let h = harness(
            MockRiskScorer::with_decision("Review"),
            MockCredentialStore::new(),
        );
        let ctx = RequestContext::new();

        let err = h
            .executor
            .register(&ctx, &caller_with_basket(), register_command())
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::GateRejected(Decision::Review)));
        assert_eq!(h.store.count().await.unwrap(), 0);
        assert!(h.baskets.transfers().is_empty());

        let notifications = h.scorer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, SignupStatus::Rejected);
        assert_eq!(notifications[0].correlation_id, ctx.correlation_id);
        assert!(notifications[0].user.is_none());
    }

    #[tokio::test]
    async fn gate_outage_on_registration_still_reports_once() {
        let h = harness(MockRiskScorer::unavailable(), MockCredentialStore::new());
        let ctx = RequestContext::new();

        let err = h
            .executor
            .register(&ctx, &CallerContext::default(), register_command())
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::GateUnavailable(_)));
        assert_eq!(h.store.count().await.unwrap(), 0);
        let notifications = h.scorer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, SignupStatus::Rejected);
        assert_eq!(notifications[0].correlation_id, ctx.correlation_id);
    }

    #[tokio::test]
    async fn gate_timeout_on_registration_creates_nothing() {
        let h = harness(
            MockRiskScorer::slow(Duration::from_secs(5), "Approve"),
            MockCredentialStore::new(),
        );

        let err = h
            .executor
            .register(
                &RequestContext::new(),
                &CallerContext::default(),
                register_command(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::GateUnavailable(_)));
        assert_eq!(h.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_account_after_approval_reports_conflict_and_rejection() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("grace@example.com", "Other@pass1"),
        );
        let ctx = RequestContext::new();

        let err = h
            .executor
            .register(&ctx, &CallerContext::default(), register_command())
            .await
            .unwrap_err();

        assert_eq!(err.field(), Some("email"));
        assert_eq!(h.store.count().await.unwrap(), 1);
        let notifications = h.scorer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, SignupStatus::Rejected);
        assert_eq!(notifications[0].correlation_id, ctx.correlation_id);
    }

    #[tokio::test]
    async fn session_failure_after_approval_reports_rejection() {
        let h = harness_with_sessions(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new(),
            MockSessionManager::failing(),
        );
        let ctx = RequestContext::new();

        let err = h
            .executor
            .register(&ctx, &CallerContext::default(), register_command())
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::SessionEstablish(_)));
        let notifications = h.scorer.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, SignupStatus::Rejected);
        assert_eq!(notifications[0].correlation_id, ctx.correlation_id);
    }

    #[tokio::test]
    async fn failed_notification_does_not_undo_registration() {
        let h = harness(
            MockRiskScorer::with_decision("Approve").failing_notifications(),
            MockCredentialStore::new(),
        );

        let outcome = h
            .executor
            .register(
                &RequestContext::new(),
                &CallerContext::default(),
                register_command(),
            )
            .await;

        assert!(outcome.is_ok());
        assert_eq!(h.scorer.notifications().len(), 1);
    }

    #[tokio::test]
    async fn sign_up_assessment_carries_storefront_context() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new(),
        );

        h.executor
            .register(
                &RequestContext::new(),
                &CallerContext::default(),
                register_command(),
            )
            .await
            .unwrap();

        let assessments = h.scorer.assessments();
        let (_, request) = &assessments[0];
        let AssessmentRequest::SignUp(sign_up) = request else {
            panic!("expected sign-up assessment");
        };
        assert_eq!(sign_up.store_front_context.market, "US");
        assert_eq!(sign_up.user.time_zone.as_deref(), Some("-05:00:00"));
        assert_eq!(
            sign_up.user.address.as_ref().and_then(|a| a.city.as_deref()),
            Some("Arlington")
        );
    }

    #[tokio::test]
    async fn basket_failure_keeps_authentication_and_anonymous_basket() {
        let h = harness_with(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
            MockSessionManager::new(),
            MockBasketTransfer::failing(),
        );

        let outcome = h
            .executor
            .sign_in(
                &RequestContext::new(),
                &caller_with_basket(),
                sign_in_command("Pass@word1"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.basket, BasketHandoff::Failed);
        assert!(!outcome.basket.released());
        assert_eq!(h.sessions.active_identities(), vec!["ada@example.com"]);
    }

    #[tokio::test]
    async fn missing_basket_id_is_not_reported_as_transferred() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );

        let outcome = h
            .executor
            .sign_in(
                &RequestContext::new(),
                &CallerContext::default(),
                sign_in_command("Pass@word1"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.basket, BasketHandoff::NotPresented);
        assert!(!outcome.basket.moved_items());
        assert!(h.baskets.transfers().is_empty());
    }

    #[tokio::test]
    async fn sign_out_ends_the_session() {
        let h = harness(
            MockRiskScorer::with_decision("Approve"),
            MockCredentialStore::new().with_account("ada@example.com", "Pass@word1"),
        );
        let outcome = h
            .executor
            .sign_in(
                &RequestContext::new(),
                &CallerContext::default(),
                sign_in_command("Pass@word1"),
            )
            .await
            .unwrap();

        assert!(h.executor.sign_out(&outcome.session.token).await);
        assert!(!h.executor.sign_out(&outcome.session.token).await);
    }

    #[test]
    fn time_zone_rendering() {
        assert_eq!(format_time_zone(420), "-07:00:00");
        assert_eq!(format_time_zone(-330), "05:30:00");
        assert_eq!(format_time_zone(0), "00:00:00");
    }
}
