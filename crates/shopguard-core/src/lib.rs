//! Shopguard core: fraud-gated sign-in and registration.
//!
//! Every account action is assessed by an external risk scoring service before any account
//! state changes. Only an explicit `Approve` lets the action proceed; registrations always
//! report their realized outcome back under the same correlation id.

#![deny(unsafe_code)]

pub mod collaborators;
pub mod decision;
pub mod error;
pub mod executor;
pub mod flow;
pub mod gate;
pub mod mocks;
pub mod navigation;
pub mod trail;
pub mod types;
pub mod validation;

pub use collaborators::{
    AccountProfile, BasketHandoff, BasketTransfer, CredentialStore, NewAccount, Session,
    SessionManager,
};
pub use decision::{Decision, DECISION_FIELD};
pub use error::{
    AccountError, BasketError, GateError, SessionError, StoreError, ACTION_FAILED_MESSAGE,
    REGISTRATION_REJECTED_MESSAGE, SIGN_IN_FAILED_MESSAGE,
};
pub use executor::{
    format_time_zone, AccountLifecycleExecutor, CallerContext, DeviceFingerprint, ExecutorConfig,
    RegisterCommand, RegistrationOutcome, SignInCommand, SignInOutcome,
};
pub use flow::{RegistrationStage, RegistrationStageMachine, SignInStage, SignInStageMachine};
pub use gate::{Assessment, GateConfig, RiskScoringService, VerificationGate};
pub use navigation::{resolve_return_url, sign_in_form_return_url, BASKET_REDIRECT, DEFAULT_REDIRECT};
pub use trail::{AssessmentTrail, TrailEntry, TrailEntryKind, TrailRecord};
pub use types::{
    ActionKind, AddressDetails, AddressType, AssessmentRequest, AssessmentResponse,
    AssessmentType, CorrelationId, DeviceContext, DeviceContextProvider, MarketingContext,
    MarketingIncentiveType, MarketingType, OutcomeNotification, PaymentInstrument,
    PaymentInstrumentDetails, PaymentInstrumentType, RequestContext, SignInAssessment,
    SignUpAssessment, SignupStatus, SignupStatusUser, StoreFrontContext, StorefrontType,
    UserDetails, UserProfileType,
};
