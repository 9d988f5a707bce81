use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum TrialsError {
    #[error("Invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("Unknown field \"{field}\". {suggestion}")]
    InvalidFieldName { field: String, suggestion: String },

    #[error("ClinicalTrials.gov rejected the request (HTTP {status}): {reason}")]
    UpstreamRejected { status: u16, reason: String },

    #[error("ClinicalTrials.gov is unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("Request exceeded the {seconds}s deadline; partial results were discarded")]
    Timeout { seconds: u64 },

    #[error("Trial '{nct_id}' not found.\n\n{suggestion}")]
    NotFound { nct_id: String, suggestion: String },

    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),
}

impl TrialsError {
    /// Stable taxonomy name reported to tool callers.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidCriteria(_) => "InvalidCriteria",
            Self::InvalidFieldName { .. } => "InvalidFieldName",
            Self::UpstreamRejected { .. } => "UpstreamRejected",
            Self::UpstreamUnavailable { .. } | Self::HttpClientInit(_) => "UpstreamUnavailable",
            Self::Timeout { .. } => "Timeout",
            Self::NotFound { .. } => "NotFound",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidFieldName { field, suggestion } => {
                Some(json!({ "field": field, "suggestion": suggestion }))
            }
            Self::UpstreamRejected { status, .. } => Some(json!({ "status": status })),
            Self::Timeout { seconds } => Some(json!({ "deadline_seconds": seconds })),
            Self::NotFound { nct_id, .. } => Some(json!({ "nct_id": nct_id })),
            _ => None,
        }
    }

    pub fn to_tool_error(&self) -> ToolError {
        ToolError {
            error_kind: self.error_kind(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

impl From<reqwest_middleware::Error> for TrialsError {
    fn from(err: reqwest_middleware::Error) -> Self {
        let reason = match &err {
            reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => {
                format!("request timed out ({inner})")
            }
            reqwest_middleware::Error::Reqwest(inner) if inner.is_connect() => {
                format!("connection failed ({inner})")
            }
            other => other.to_string(),
        };
        Self::UpstreamUnavailable { reason }
    }
}

impl From<reqwest::Error> for TrialsError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Structured error object returned by every tool on failure.
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub error_kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_carries_kind_and_details() {
        let err = TrialsError::InvalidFieldName {
            field: "Phaze".into(),
            suggestion: "Did you mean \"Phase\"?".into(),
        };
        let value = serde_json::to_value(err.to_tool_error()).unwrap();
        assert_eq!(value["error_kind"], "InvalidFieldName");
        assert_eq!(value["details"]["field"], "Phaze");
        assert!(value["message"].as_str().unwrap().contains("Phaze"));
    }

    #[test]
    fn tool_error_omits_details_when_absent() {
        let err = TrialsError::InvalidCriteria("at least one criterion is required".into());
        let value = serde_json::to_value(err.to_tool_error()).unwrap();
        assert_eq!(value["error_kind"], "InvalidCriteria");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn client_init_failure_reports_unavailable() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let err = TrialsError::HttpClientInit(source);
        assert_eq!(err.error_kind(), "UpstreamUnavailable");
        let value = serde_json::to_value(err.to_tool_error()).unwrap();
        assert_eq!(value["error_kind"], "UpstreamUnavailable");
        assert!(
            value["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to initialize HTTP client")
        );
    }
}
