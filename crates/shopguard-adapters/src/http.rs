//! HTTP client for the external risk scoring service.

use crate::AdapterError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shopguard_core::error::GateError;
use shopguard_core::gate::RiskScoringService;
use shopguard_core::types::{
    ActionKind, AssessmentRequest, AssessmentResponse, OutcomeNotification, RequestContext,
};
use std::time::Duration;
use tracing::debug;

/// Header carrying the correlation id on every outbound call.
pub const CORRELATION_HEADER: &str = "x-ms-correlation-id";
/// Header selecting the vendor environment, when configured.
pub const ENVIRONMENT_HEADER: &str = "x-ms-dfpenvid";

const SIGN_IN_PATH: &str = "/v1.0/assessment/signin";
const SIGN_UP_PATH: &str = "/v1.0/assessment/signup";
const SIGN_UP_STATUS_PATH: &str = "/v1.0/assessment/signupstatus";

#[derive(Debug, Clone)]
pub struct HttpScoringConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub environment_id: Option<String>,
    pub timeout: Duration,
}

impl Default for HttpScoringConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            bearer_token: None,
            environment_id: None,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Risk scoring service reached over HTTP(S) JSON.
pub struct HttpRiskScoringClient {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    environment_id: Option<String>,
}

impl HttpRiskScoringClient {
    pub fn new(config: HttpScoringConfig) -> Result<Self, AdapterError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AdapterError::InvalidConfig(
                "risk scoring base url cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token.filter(|token| !token.trim().is_empty()),
            environment_id: config.environment_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<AssessmentResponse, GateError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .header(CORRELATION_HEADER, ctx.correlation_id.as_str())
            .json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(environment_id) = &self.environment_id {
            request = request.header(ENVIRONMENT_HEADER, environment_id);
        }

        debug!(correlation_id = %ctx.correlation_id, url = %url, "Calling risk scoring service");
        let response = request
            .send()
            .await
            .map_err(|e| GateError::Unavailable(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GateError::Unavailable(format!("reading {} response failed: {}", path, e)))?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(AssessmentResponse::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| GateError::Protocol(format!("invalid {} response: {}", path, e)))
    }
}

fn classify_status(status: StatusCode, body: &str) -> GateError {
    let message = format!("status {}: {}", status, truncate(body, 320));
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        GateError::Unavailable(message)
    } else {
        GateError::Protocol(message)
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut out: String = body.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl RiskScoringService for HttpRiskScoringClient {
    fn provider(&self) -> &'static str {
        "http"
    }

    async fn assess(
        &self,
        ctx: &RequestContext,
        request: &AssessmentRequest,
    ) -> Result<AssessmentResponse, GateError> {
        let path = match request.kind() {
            ActionKind::SignIn => SIGN_IN_PATH,
            ActionKind::SignUp => SIGN_UP_PATH,
        };
        let body = request
            .to_wire()
            .map_err(|e| GateError::InvalidRequest(format!("unserializable assessment: {}", e)))?;
        self.post(ctx, path, &body).await
    }

    async fn notify_outcome(
        &self,
        ctx: &RequestContext,
        notification: &OutcomeNotification,
    ) -> Result<AssessmentResponse, GateError> {
        let body = serde_json::to_value(notification)
            .map_err(|e| GateError::InvalidRequest(format!("unserializable notification: {}", e)))?;
        self.post(ctx, SIGN_UP_STATUS_PATH, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopguard_core::decision::Decision;
    use shopguard_core::mocks::sample_sign_in;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpRiskScoringClient {
        HttpRiskScoringClient::new(HttpScoringConfig {
            base_url: format!("{}/", server.uri()),
            bearer_token: Some("secret-token".to_string()),
            environment_id: None,
            timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    #[test]
    fn test_client_endpoint_normalization() {
        let client = HttpRiskScoringClient::new(HttpScoringConfig {
            base_url: "https://risk.example.com/".to_string(),
            ..HttpScoringConfig::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "https://risk.example.com");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = HttpRiskScoringClient::new(HttpScoringConfig {
            base_url: "  ".to_string(),
            ..HttpScoringConfig::default()
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sign_in_posts_with_correlation_and_auth() {
        let server = MockServer::start().await;
        let ctx = RequestContext::new();

        Mock::given(method("POST"))
            .and(path("/v1.0/assessment/signin"))
            .and(header(CORRELATION_HEADER, ctx.correlation_id.as_str()))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_partial_json(serde_json::json!({
                "deviceContext": { "deviceContextId": "session-1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "resultDetails": { "MerchantRuleDecision": "Approve" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server)
            .assess(&ctx, &sample_sign_in("session-1"))
            .await
            .unwrap();

        assert_eq!(Decision::from_response(&response), Decision::Approve);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .assess(&RequestContext::new(), &sample_sign_in("session-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Unavailable(_)));
    }

    #[tokio::test]
    async fn client_error_and_garbage_are_protocol_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/assessment/signin"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/assessment/signupstatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ctx = RequestContext::new();

        let err = client
            .assess(&ctx, &sample_sign_in("session-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Protocol(_)));

        let notification =
            OutcomeNotification::rejected(ctx.correlation_id.clone(), "signup-1", "User is Rejected");
        let err = client.notify_outcome(&ctx, &notification).await.unwrap_err();
        assert!(matches!(err, GateError::Protocol(_)));
    }

    #[tokio::test]
    async fn slow_service_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({ "resultDetails": {} })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .assess(&RequestContext::new(), &sample_sign_in("session-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Unavailable(_)));
    }

    #[tokio::test]
    async fn outcome_notification_posts_status_payload() {
        let server = MockServer::start().await;
        let ctx = RequestContext::new();

        Mock::given(method("POST"))
            .and(path("/v1.0/assessment/signupstatus"))
            .and(header(CORRELATION_HEADER, ctx.correlation_id.as_str()))
            .and(body_partial_json(serde_json::json!({
                "signUpId": "signup-1",
                "statusType": "Approved",
                "user": { "userId": "ada@example.com" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notification =
            OutcomeNotification::approved(ctx.correlation_id.clone(), "signup-1", "ada@example.com");
        let response = client_for(&server)
            .notify_outcome(&ctx, &notification)
            .await
            .unwrap();

        assert!(response.result_details.is_empty());
    }
}
