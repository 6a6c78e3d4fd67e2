use crate::decision::Decision;
use crate::error::GateError;
use crate::trail::{AssessmentTrail, TrailEntryKind, TrailRecord};
use crate::types::{
    ActionKind, AssessmentRequest, AssessmentResponse, CorrelationId, OutcomeNotification,
    RequestContext,
};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// External risk scoring collaborator.
///
/// Implementations perform exactly one outbound call per method invocation and never retry.
#[async_trait]
pub trait RiskScoringService: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn assess(
        &self,
        ctx: &RequestContext,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError>;

    async fn notify_outcome(
        &self,
        ctx: &RequestContext,
        notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError>;
}

/// Configuration for the verification gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Upper bound for a single call to the risk scoring service.
    pub timeout: Duration,
    /// Number of exchanges kept in the assessment trail.
    pub trail_capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            trail_capacity: 1024,
        }
    }
}

/// Decision obtained for one assessment.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub correlation_id: CorrelationId,
    pub kind: ActionKind,
    pub decision: Decision,
    pub response: AssessmentResponse,
}

/// Synchronous check-before-commit around the risk scoring service.
pub struct VerificationGate {
    scorer: Arc<dyn RiskScoringService>,
    trail: Arc<AssessmentTrail>,
    config: GateConfig,
}

impl VerificationGate {
    pub fn new(scorer: Arc<dyn RiskScoringService>, config: GateConfig) -> Self {
        let trail = Arc::new(AssessmentTrail::new(config.trail_capacity));
        Self {
            scorer,
            trail,
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn provider(&self) -> &'static str {
        self.scorer.provider()
    }

    pub fn trail(&self) -> Arc<AssessmentTrail> {
        self.trail.clone()
    }

    /// Submit one assessment and map the vendor payload to a [`Decision`].
    ///
    /// Timeouts and transport failures come back as `GateError::Unavailable`; the caller
    /// decides what a missing decision means for the action.
    pub async fn assess(
        &self,
        ctx: &RequestContext,
        request: &AssessmentRequest,
    ) -> Result<Assessment, GateError> {
        validate_request(ctx, request)?;

        let kind = request.kind();
        debug!(
            correlation_id = %ctx.correlation_id,
            kind = kind.name(),
            provider = self.scorer.provider(),
            "Submitting assessment"
        );

        let outcome = self.bounded(self.scorer.assess(ctx, request)).await;

        self.trail
            .append(TrailRecord {
                correlation_id: ctx.correlation_id.clone(),
                kind: TrailEntryKind::Assessment,
                label: assessment_label(kind).to_string(),
                request: serde_json::to_value(request).unwrap_or_default(),
                response: outcome
                    .as_ref()
                    .ok()
                    .map(|response| serde_json::to_value(response).unwrap_or_default()),
                error: outcome.as_ref().err().map(|err| err.to_string()),
            })
            .await;

        match outcome {
            Ok(response) => {
                let decision = Decision::from_response(&response);
                info!(
                    correlation_id = %ctx.correlation_id,
                    kind = kind.name(),
                    decision = %decision,
                    "Assessment decided"
                );
                Ok(Assessment {
                    correlation_id: ctx.correlation_id.clone(),
                    kind,
                    decision,
                    response,
                })
            }
            Err(err) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    kind = kind.name(),
                    error = %err,
                    "Assessment failed"
                );
                Err(err)
            }
        }
    }

    /// Report the realized outcome of a gated action.
    pub async fn notify_outcome(
        &self,
        ctx: &RequestContext,
        notification: &OutcomeNotification,
    ) -> Result<(), GateError> {
        if notification.correlation_id != ctx.correlation_id {
            return Err(GateError::InvalidRequest(format!(
                "outcome correlation id '{}' does not match action '{}'",
                notification.correlation_id, ctx.correlation_id
            )));
        }

        let outcome = self
            .bounded(self.scorer.notify_outcome(ctx, notification))
            .await;

        self.trail
            .append(TrailRecord {
                correlation_id: ctx.correlation_id.clone(),
                kind: TrailEntryKind::OutcomeNotification,
                label: "Signup Status".to_string(),
                request: serde_json::to_value(notification).unwrap_or_default(),
                response: outcome
                    .as_ref()
                    .ok()
                    .map(|response| serde_json::to_value(response).unwrap_or_default()),
                error: outcome.as_ref().err().map(|err| err.to_string()),
            })
            .await;

        match outcome {
            Ok(_) => {
                info!(
                    correlation_id = %ctx.correlation_id,
                    status = notification.status.name(),
                    "Outcome notification sent"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    status = notification.status.name(),
                    error = %err,
                    "Outcome notification failed"
                );
                Err(err)
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GateError>>,
    ) -> Result<T, GateError> {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GateError::timeout(self.config.timeout.as_millis())),
        }
    }
}

fn validate_request(ctx: &RequestContext, request: &AssessmentRequest) -> Result<(), GateError> {
    if ctx.correlation_id.is_empty() {
        return Err(GateError::InvalidRequest(
            "correlation id is required".to_string(),
        ));
    }
    if request.device_context().device_context_id.trim().is_empty() {
        return Err(GateError::InvalidRequest(
            "device context id is required".to_string(),
        ));
    }
    Ok(())
}

fn assessment_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::SignIn => "SignIn",
        ActionKind::SignUp => "Signup",
    }
}
