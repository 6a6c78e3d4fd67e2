use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque token tying an assessment, its response and its outcome notification together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request-scoped context threaded through every call belonging to one logical action.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Start a new logical action with a fresh correlation id.
    pub fn new() -> Self {
        Self::with_correlation_id(CorrelationId::generate())
    }

    pub fn with_correlation_id(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            started_at: Utc::now(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Account action being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SignIn,
    SignUp,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignUp => "sign_up",
        }
    }
}

/// Source of the device fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceContextProvider {
    DfpFingerprinting,
    Merchant,
}

/// Device information for the assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceContext {
    /// Customer session id, or transaction id when no session is available.
    pub device_context_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub provider: DeviceContextProvider,
    /// Fingerprinting datacenter for the session id.
    #[serde(rename = "deviceContextDC", skip_serializing_if = "Option::is_none")]
    pub device_context_dc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_device_type: Option<String>,
}

impl DeviceContext {
    pub fn fingerprinted(session_id: impl Into<String>) -> Self {
        Self {
            device_context_id: session_id.into(),
            ip_address: None,
            provider: DeviceContextProvider::DfpFingerprinting,
            device_context_dc: None,
            external_device_id: None,
            external_device_type: None,
        }
    }

    pub fn with_ip_address(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_datacenter(mut self, dc: Option<String>) -> Self {
        self.device_context_dc = dc;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AddressType {
    #[default]
    Primary,
    Billing,
    Shipping,
    Alternative,
}

/// Postal/contact address embedded in assessments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_type: Option<AddressType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    /// ISO 3166 alpha-2 code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Profile types understood by the risk service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserProfileType {
    #[default]
    Consumer,
    Developer,
    Seller,
    Publisher,
    Tenant,
}

/// User information associated with an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Locale such as `EN-US`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<UserProfileType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_email_validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_validated_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_phone_number_validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number_validated_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentInstrumentType {
    CreditCard,
    DebitCard,
    PayPal,
    MobilePayment,
    GiftCard,
}

/// Payment instrument details. Card fields apply to credit/debit cards, payer fields to PayPal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstrumentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_payment_instrument_id: Option<String>,
    #[serde(rename = "type")]
    pub instrument_type: PaymentInstrumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_four_digits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_agreement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<AddressDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstrument {
    pub payment_instrument_details: PaymentInstrumentDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MarketingType {
    None,
    Email,
    Referral,
    SearchEngine,
    #[default]
    Direct,
    SocialNetwork,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MarketingIncentiveType {
    #[default]
    None,
    CashBack,
    Discount,
    FreeTrial,
    BonusPoints,
    Gift,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarketingContext {
    #[serde(rename = "type")]
    pub marketing_type: MarketingType,
    /// Referrer user id when the traffic came from a referral.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_source: Option<String>,
    pub incentive_type: MarketingIncentiveType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive_offer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StorefrontType {
    None,
    #[default]
    Web,
    Console,
    MobileApp,
    ComputerApp,
    MobileWeb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreFrontContext {
    #[serde(rename = "type")]
    pub storefront_type: StorefrontType,
    pub store_name: String,
    /// Two-letter ISO market code.
    pub market: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssessmentType {
    #[default]
    Protect,
    Evaluate,
}

/// Sign-in fact pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInAssessment {
    pub sign_in_id: String,
    pub assessment_type: AssessmentType,
    pub user: UserDetails,
    pub device_context: DeviceContext,
    pub merchant_local_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_local_date: Option<DateTime<FixedOffset>>,
}

/// Sign-up (registration) fact pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpAssessment {
    pub sign_up_id: String,
    pub assessment_type: AssessmentType,
    pub user: UserDetails,
    pub device_context: DeviceContext,
    pub merchant_local_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_local_date: Option<DateTime<FixedOffset>>,
    pub marketing_context: MarketingContext,
    pub store_front_context: StoreFrontContext,
}

/// Outbound assessment for one account action. Built once, never re-sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum AssessmentRequest {
    SignIn(SignInAssessment),
    SignUp(SignUpAssessment),
}

impl AssessmentRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::SignIn(_) => ActionKind::SignIn,
            Self::SignUp(_) => ActionKind::SignUp,
        }
    }

    pub fn device_context(&self) -> &DeviceContext {
        match self {
            Self::SignIn(assessment) => &assessment.device_context,
            Self::SignUp(assessment) => &assessment.device_context,
        }
    }

    /// Vendor-side id of the event being assessed.
    pub fn event_id(&self) -> &str {
        match self {
            Self::SignIn(assessment) => &assessment.sign_in_id,
            Self::SignUp(assessment) => &assessment.sign_up_id,
        }
    }

    /// Wire payload without the local kind tag.
    pub fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::SignIn(assessment) => serde_json::to_value(assessment),
            Self::SignUp(assessment) => serde_json::to_value(assessment),
        }
    }
}

/// Vendor result payload: an open key/value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResponse {
    #[serde(default)]
    pub result_details: BTreeMap<String, serde_json::Value>,
}

impl AssessmentResponse {
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.result_details.insert(key.into(), value.into());
        self
    }
}

/// Realized status of a sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignupStatus {
    Approved,
    Rejected,
}

impl SignupStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupStatusUser {
    pub user_id: String,
}

/// Post-decision feedback telling the risk engine how a sign-up actually ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeNotification {
    #[serde(skip)]
    pub correlation_id: CorrelationId,
    pub sign_up_id: String,
    #[serde(rename = "statusType")]
    pub status: SignupStatus,
    pub status_date: DateTime<Utc>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SignupStatusUser>,
}

impl OutcomeNotification {
    pub fn approved(
        correlation_id: CorrelationId,
        sign_up_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            sign_up_id: sign_up_id.into(),
            status: SignupStatus::Approved,
            status_date: Utc::now(),
            reason: format!("User is {}", SignupStatus::Approved.name()),
            user: Some(SignupStatusUser {
                user_id: user_id.into(),
            }),
        }
    }

    pub fn rejected(
        correlation_id: CorrelationId,
        sign_up_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            sign_up_id: sign_up_id.into(),
            status: SignupStatus::Rejected,
            status_date: Utc::now(),
            reason: reason.into(),
            user: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_context_uses_vendor_field_names() {
        let device = DeviceContext::fingerprinted("session-1")
            .with_ip_address(Some("10.0.0.1".to_string()))
            .with_datacenter(Some("uswest".to_string()));
        let value = serde_json::to_value(&device).unwrap();

        assert_eq!(value["deviceContextId"], "session-1");
        assert_eq!(value["ipAddress"], "10.0.0.1");
        assert_eq!(value["deviceContextDC"], "uswest");
        assert_eq!(value["provider"], "DFPFINGERPRINTING");
        assert!(value.get("externalDeviceId").is_none());
    }

    #[test]
    fn outcome_notification_keeps_correlation_id_off_the_wire() {
        let notification = OutcomeNotification::approved("corr-1".into(), "signup-1", "a@b.com");
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["statusType"], "Approved");
        assert_eq!(value["user"]["userId"], "a@b.com");
        assert!(value.get("correlationId").is_none());
    }

    #[test]
    fn wire_payload_drops_local_kind_tag() {
        let request = AssessmentRequest::SignIn(SignInAssessment {
            sign_in_id: "signin-1".to_string(),
            assessment_type: AssessmentType::Protect,
            user: UserDetails {
                user_id: "a@b.com".to_string(),
                ..UserDetails::default()
            },
            device_context: DeviceContext::fingerprinted("session-1"),
            merchant_local_date: Utc::now(),
            customer_local_date: None,
        });

        let wire = request.to_wire().unwrap();
        assert!(wire.get("kind").is_none());
        assert_eq!(wire["signInId"], "signin-1");
        assert_eq!(request.kind(), ActionKind::SignIn);
        assert_eq!(wire["user"]["userId"], "a@b.com");
    }
}
