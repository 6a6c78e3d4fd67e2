use crate::types::AssessmentResponse;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result key carrying the merchant rule decision in the vendor payload.
pub const DECISION_FIELD: &str = "MerchantRuleDecision";

/// Closed set of gate decisions. Only `Approve` lets an account action proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Review,
    Reject,
    Unknown,
}

impl Decision {
    /// Translate a vendor payload into a decision.
    ///
    /// This is the only place that knows the vendor's field name and literals. Matching is
    /// exact: `"approve"` or `" Approve"` are `Unknown`, as is a non-string value or a missing
    /// field.
    pub fn from_response(response: &AssessmentResponse) -> Self {
        match response.result_details.get(DECISION_FIELD) {
            Some(serde_json::Value::String(value)) => Self::from_literal(value),
            _ => Self::Unknown,
        }
    }

    pub fn from_literal(value: &str) -> Self {
        match value {
            "Approve" => Self::Approve,
            "Review" => Self::Review,
            "Reject" => Self::Reject,
            _ => Self::Unknown,
        }
    }

    pub fn is_approving(self) -> bool {
        matches!(self, Self::Approve)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Review => "review",
            Self::Reject => "reject",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
