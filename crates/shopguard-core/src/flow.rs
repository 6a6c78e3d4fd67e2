use crate::error::AccountError;
use crate::types::CorrelationId;

/// Stages of a sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInStage {
    Unauthenticated,
    Assessed,
    CredentialsVerified,
    Authenticated,
}

impl SignInStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Assessed => "assessed",
            Self::CredentialsVerified => "credentials_verified",
            Self::Authenticated => "authenticated",
        }
    }
}

/// Enforces unauthenticated->assessed->credentials_verified->authenticated.
///
/// Credentials are never checked before the gate has answered.
#[derive(Debug, Clone)]
pub struct SignInStageMachine {
    correlation_id: CorrelationId,
    stage: SignInStage,
}

impl SignInStageMachine {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            stage: SignInStage::Unauthenticated,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn stage(&self) -> SignInStage {
        self.stage
    }

    pub fn is_authenticated(&self) -> bool {
        self.stage == SignInStage::Authenticated
    }

    pub fn mark_assessed(&mut self) -> Result<(), AccountError> {
        self.advance(SignInStage::Unauthenticated, SignInStage::Assessed)
    }

    pub fn mark_credentials_verified(&mut self) -> Result<(), AccountError> {
        self.advance(SignInStage::Assessed, SignInStage::CredentialsVerified)
    }

    pub fn mark_authenticated(&mut self) -> Result<(), AccountError> {
        self.advance(
            SignInStage::CredentialsVerified,
            SignInStage::Authenticated,
        )
    }

    fn advance(&mut self, expected: SignInStage, next: SignInStage) -> Result<(), AccountError> {
        if self.stage != expected {
            return Err(AccountError::stage_violation(
                expected.name(),
                self.stage.name(),
            ));
        }
        self.stage = next;
        Ok(())
    }
}

/// Stages of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    NotRegistered,
    Assessed,
    AccountCreated,
    SignedIn,
    Registered,
    Rejected,
}

impl RegistrationStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Assessed => "assessed",
            Self::AccountCreated => "account_created",
            Self::SignedIn => "signed_in",
            Self::Registered => "registered",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Registered | Self::Rejected)
    }
}

/// Enforces not_registered->assessed->account_created->signed_in->registered, with
/// `rejected` reachable from any non-terminal stage after the assessment.
#[derive(Debug, Clone)]
pub struct RegistrationStageMachine {
    correlation_id: CorrelationId,
    stage: RegistrationStage,
}

impl RegistrationStageMachine {
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            stage: RegistrationStage::NotRegistered,
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn stage(&self) -> RegistrationStage {
        self.stage
    }

    pub fn mark_assessed(&mut self) -> Result<(), AccountError> {
        self.advance(RegistrationStage::NotRegistered, RegistrationStage::Assessed)
    }

    pub fn mark_account_created(&mut self) -> Result<(), AccountError> {
        self.advance(RegistrationStage::Assessed, RegistrationStage::AccountCreated)
    }

    pub fn mark_signed_in(&mut self) -> Result<(), AccountError> {
        self.advance(RegistrationStage::AccountCreated, RegistrationStage::SignedIn)
    }

    pub fn mark_registered(&mut self) -> Result<(), AccountError> {
        self.advance(RegistrationStage::SignedIn, RegistrationStage::Registered)
    }

    pub fn mark_rejected(&mut self) -> Result<(), AccountError> {
        if self.stage == RegistrationStage::NotRegistered || self.stage.is_terminal() {
            return Err(AccountError::stage_violation(
                "assessed|account_created|signed_in",
                self.stage.name(),
            ));
        }
        self.stage = RegistrationStage::Rejected;
        Ok(())
    }

    fn advance(
        &mut self,
        expected: RegistrationStage,
        next: RegistrationStage,
    ) -> Result<(), AccountError> {
        if self.stage != expected {
            return Err(AccountError::stage_violation(
                expected.name(),
                self.stage.name(),
            ));
        }
        self.stage = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_enforces_stage_order() {
        let mut machine = SignInStageMachine::new("corr-a".into());
        assert!(machine.mark_assessed().is_ok());
        assert!(machine.mark_credentials_verified().is_ok());
        assert!(machine.mark_authenticated().is_ok());
        assert!(machine.is_authenticated());
    }

    #[test]
    fn sign_in_rejects_credentials_before_assessment() {
        let mut machine = SignInStageMachine::new("corr-b".into());
        let err = machine.mark_credentials_verified().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected 'assessed', got 'unauthenticated'"));
    }

    #[test]
    fn registration_happy_path() {
        let mut machine = RegistrationStageMachine::new("corr-c".into());
        machine.mark_assessed().unwrap();
        machine.mark_account_created().unwrap();
        machine.mark_signed_in().unwrap();
        machine.mark_registered().unwrap();
        assert_eq!(machine.stage(), RegistrationStage::Registered);
    }

    #[test]
    fn registration_cannot_create_account_without_assessment() {
        let mut machine = RegistrationStageMachine::new("corr-d".into());
        assert!(machine.mark_account_created().is_err());
        assert_eq!(machine.stage(), RegistrationStage::NotRegistered);
    }

    #[test]
    fn rejection_requires_an_assessment_and_is_terminal() {
        let mut machine = RegistrationStageMachine::new("corr-e".into());
        assert!(machine.mark_rejected().is_err());

        machine.mark_assessed().unwrap();
        machine.mark_rejected().unwrap();
        assert!(machine.mark_rejected().is_err());
        assert!(machine.mark_account_created().is_err());
    }
}
