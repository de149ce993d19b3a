//! Messages exchanged between the panel, the page agent and the background coordinator
//!
//! Every request kind is a variant of a closed enum with a fixed response shape, so
//! dispatch is an exhaustive `match` rather than a lookup by type string.

use serde::{Deserialize, Serialize};

/// Requests handled by the background coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Interactive Google login; answered with [`LoginResponse`]
    GoogleLogin,
    /// Categorize and summarize `text`; answered with [`SummarizeResponse`]
    SummarizeText { text: String },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::GoogleLogin => "GOOGLE_LOGIN",
            Request::SummarizeText { .. } => "SUMMARIZE_TEXT",
        }
    }
}

/// Requests handled by the page agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRequest {
    GetEmailText,
}

/// Page agent reply to [`AgentRequest::GetEmailText`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailText {
    #[serde(default)]
    pub text: String,
}

/// Categories and summary produced by the remote service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub categories: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    pub fn success(token: impl Into<String>) -> Self {
        Self { ok: true, token: Some(token.into()), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, token: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummarizeResponse {
    pub fn success(data: Summary) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(error.into()) }
    }
}

/// Coordinator reply, one variant per [`Request`] variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Login(LoginResponse),
    Summarize(SummarizeResponse),
}

/// Decode a request coming off the wire, logging anything the coordinator does not handle
pub fn decode_request(raw: &str) -> Option<Request> {
    match serde_json::from_str(raw) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::warn!("Unknown message: {} ({})", raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let login = serde_json::to_value(Request::GoogleLogin).unwrap();
        assert_eq!(login, json!({"type": "GOOGLE_LOGIN"}));

        let summarize = serde_json::to_value(Request::SummarizeText { text: "hi".into() }).unwrap();
        assert_eq!(summarize, json!({"type": "SUMMARIZE_TEXT", "text": "hi"}));

        let agent = serde_json::to_value(AgentRequest::GetEmailText).unwrap();
        assert_eq!(agent, json!({"type": "GET_EMAIL_TEXT"}));
    }

    #[test]
    fn test_unknown_message_is_rejected() {
        assert!(decode_request(r#"{"type": "OPEN_PANEL"}"#).is_none());
        assert!(decode_request(r#"{"type": "SUMMARIZE_TEXT"}"#).is_none());
        assert_eq!(
            decode_request(r#"{"type": "GOOGLE_LOGIN"}"#),
            Some(Request::GoogleLogin)
        );
    }

    #[test]
    fn test_failure_omits_payload() {
        let value = serde_json::to_value(SummarizeResponse::failure("HTTP 500")).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "HTTP 500"}));

        let value = serde_json::to_value(LoginResponse::success("tok")).unwrap();
        assert_eq!(value, json!({"ok": true, "token": "tok"}));
    }

    #[test]
    fn test_summary_from_service_body() {
        let body = r#"{"categories": ["Work", "Events"], "summary": "Conference on Aug 20."}"#;
        let summary: Summary = serde_json::from_str(body).unwrap();
        assert_eq!(summary.categories, vec!["Work", "Events"]);
        assert_eq!(summary.summary, "Conference on Aug 20.");

        assert!(serde_json::from_str::<Summary>(r#"{"error": "boom"}"#).is_err());
    }
}
