//! Error types for roadworks-api
//!
//! [`TransportFailure`] is the structured description of a failed HTTP
//! exchange. [`TransportFailure::user_message`] maps it onto the text shown
//! to field staff; the mapping is pure and needs no network.

use serde_json::Value;
use thiserror::Error;

/// Shown for any 5xx failure once retries are exhausted.
pub const SERVER_ERROR_MESSAGE: &str = "Помилка сервера. Спробуйте пізніше.";

/// Shown for network failures and timeouts.
pub const CONNECTION_ERROR_MESSAGE: &str = "Помилка з'єднання з сервером";

/// Replacement for the backend's "end before start" validation message.
pub const END_BEFORE_START_MESSAGE: &str =
    "Час завершення повинен бути пізніше часу початку роботи";

const END_FIELD: &str = "end_datetime";
const END_BEFORE_START_PATTERNS: [&str; 2] = ["повинен бути пізніше", "should be after"];

/// Status half of a failure: an HTTP status code, or a transport-level
/// failure (connection refused, DNS, timeout) that never produced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStatus {
    Http(u16),
    Network,
}

impl FailureStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            FailureStatus::Http(code) => Some(*code),
            FailureStatus::Network => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, FailureStatus::Http(code) if (400..500).contains(code))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, FailureStatus::Http(code) if *code >= 500)
    }
}

impl std::fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStatus::Http(code) => write!(f, "HTTP {}", code),
            FailureStatus::Network => write!(f, "network"),
        }
    }
}

/// One entry of a validation-error list (`{"msg": .., "loc": [..]}`).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub message: String,
    /// Path to the offending field, e.g. `["body", "end_datetime"]`.
    pub location: Vec<String>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>, location: &[&str]) -> Self {
        Self {
            message: message.into(),
            location: location.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn from_value(value: &Value) -> Self {
        let message = value
            .get("msg")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());

        let location = value
            .get("loc")
            .and_then(Value::as_array)
            .map(|loc| {
                loc.iter()
                    .map(|part| match part {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { message, location }
    }

    fn is_end_before_start(&self) -> bool {
        self.location.iter().any(|part| part == END_FIELD)
            && END_BEFORE_START_PATTERNS
                .iter()
                .any(|pattern| self.message.contains(pattern))
    }

    fn user_text(&self) -> &str {
        if self.is_end_before_start() {
            END_BEFORE_START_MESSAGE
        } else {
            &self.message
        }
    }
}

/// Payload decoded from a non-2xx response body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FailureDetails {
    Validation(Vec<ValidationIssue>),
    Text(String),
    Object(Value),
    #[default]
    Absent,
}

impl FailureDetails {
    /// Decode an error body.
    ///
    /// `{"detail": [..]}` is a validation list; otherwise `detail`, then
    /// `message`, then the whole document is kept. A body that is not JSON
    /// falls back to the status text.
    pub fn from_body(body: &[u8], status_text: &str) -> Self {
        let data: Value = match serde_json::from_slice(body) {
            Ok(data) => data,
            Err(_) => return FailureDetails::Text(status_text.to_string()),
        };

        if let Some(Value::Array(items)) = data.get("detail") {
            return FailureDetails::Validation(
                items.iter().map(ValidationIssue::from_value).collect(),
            );
        }

        let picked = data
            .get("detail")
            .filter(|v| is_truthy(v))
            .or_else(|| data.get("message").filter(|v| is_truthy(v)))
            .unwrap_or(&data);

        match picked {
            Value::String(text) => FailureDetails::Text(text.clone()),
            Value::Null => FailureDetails::Absent,
            other => FailureDetails::Object(other.clone()),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// A failed network exchange, classified.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TransportFailure {
    pub status: FailureStatus,
    pub message: String,
    pub details: FailureDetails,
}

impl TransportFailure {
    pub fn http(code: u16, status_text: &str, details: FailureDetails) -> Self {
        Self {
            status: FailureStatus::Http(code),
            message: format!("HTTP {}: {}", code, status_text),
            details,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: FailureStatus::Network,
            message: message.into(),
            details: FailureDetails::Absent,
        }
    }

    /// 5xx and transport-level failures are worth another attempt; every
    /// other status is terminal.
    pub fn is_retryable(&self) -> bool {
        match self.status {
            FailureStatus::Network => true,
            FailureStatus::Http(_) => self.status.is_server_error(),
        }
    }

    /// Text to show the end user.
    pub fn user_message(&self) -> String {
        if self.status.is_client_error() {
            return match &self.details {
                FailureDetails::Validation(issues) => issues
                    .iter()
                    .map(ValidationIssue::user_text)
                    .collect::<Vec<_>>()
                    .join(", "),
                FailureDetails::Text(text) => text.clone(),
                FailureDetails::Object(object) => match object.get("detail") {
                    Some(Value::String(detail)) => detail.clone(),
                    Some(detail) if is_truthy(detail) => detail.to_string(),
                    _ => object.to_string(),
                },
                FailureDetails::Absent => self.message.clone(),
            };
        }

        if self.status.is_server_error() {
            return SERVER_ERROR_MESSAGE.to_string();
        }

        CONNECTION_ERROR_MESSAGE.to_string()
    }
}

/// Errors returned by the typed verbs and the API facade.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The exchange itself failed
    #[error(transparent)]
    Transport(#[from] TransportFailure),

    /// Request body could not be encoded, or a 2xx body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(failure) => failure.user_message(),
            ApiError::Json(_) => SERVER_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn transport(&self) -> Option<&TransportFailure> {
        match self {
            ApiError::Transport(failure) => Some(failure),
            ApiError::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_failure(details: FailureDetails) -> TransportFailure {
        TransportFailure::http(422, "Unprocessable Entity", details)
    }

    #[test]
    fn validation_messages_are_comma_joined() {
        let failure = client_failure(FailureDetails::Validation(vec![
            ValidationIssue::new("field required", &["body", "start_datetime"]),
            ValidationIssue::new("value is not a valid float", &["body", "latitude"]),
        ]));

        assert_eq!(
            failure.user_message(),
            "field required, value is not a valid float"
        );
    }

    #[test]
    fn end_before_start_is_rewritten() {
        let failure = client_failure(FailureDetails::Validation(vec![
            ValidationIssue::new("Value error, end should be after start", &["body", "end_datetime"]),
            ValidationIssue::new("field required", &["body", "location"]),
        ]));

        assert_eq!(
            failure.user_message(),
            format!("{}, field required", END_BEFORE_START_MESSAGE)
        );
    }

    #[test]
    fn end_before_start_pattern_needs_end_field() {
        let failure = client_failure(FailureDetails::Validation(vec![ValidationIssue::new(
            "should be after start",
            &["body", "start_datetime"],
        )]));

        assert_eq!(failure.user_message(), "should be after start");
    }

    #[test]
    fn text_details_are_returned_verbatim() {
        let failure = TransportFailure::http(
            404,
            "Not Found",
            FailureDetails::Text("Ремонтна робота не знайдена".into()),
        );
        assert_eq!(failure.user_message(), "Ремонтна робота не знайдена");
    }

    #[test]
    fn nested_detail_is_unwrapped() {
        let failure = TransportFailure::http(
            409,
            "Conflict",
            FailureDetails::Object(json!({"detail": "already exists"})),
        );
        assert_eq!(failure.user_message(), "already exists");
    }

    #[test]
    fn absent_details_fall_back_to_message() {
        let failure = TransportFailure::http(400, "Bad Request", FailureDetails::Absent);
        assert_eq!(failure.user_message(), "HTTP 400: Bad Request");
    }

    #[test]
    fn server_and_network_failures_use_fixed_messages() {
        let server = TransportFailure::http(
            503,
            "Service Unavailable",
            FailureDetails::Text("db down".into()),
        );
        assert_eq!(server.user_message(), SERVER_ERROR_MESSAGE);

        let network = TransportFailure::network("connection refused");
        assert_eq!(network.user_message(), CONNECTION_ERROR_MESSAGE);
    }

    #[test]
    fn retry_classification() {
        assert!(!TransportFailure::http(404, "Not Found", FailureDetails::Absent).is_retryable());
        assert!(!TransportFailure::http(422, "", FailureDetails::Absent).is_retryable());
        assert!(TransportFailure::http(500, "", FailureDetails::Absent).is_retryable());
        assert!(TransportFailure::http(502, "", FailureDetails::Absent).is_retryable());
        assert!(TransportFailure::network("timed out").is_retryable());
        assert!(!TransportFailure::http(304, "", FailureDetails::Absent).is_retryable());
    }

    #[test]
    fn decodes_validation_list_body() {
        let body = json!({
            "detail": [
                {"loc": ["body", "end_datetime"], "msg": "bad", "type": "value_error"},
                {"loc": ["query", 0], "message": "other"}
            ]
        });
        let details = FailureDetails::from_body(body.to_string().as_bytes(), "Unprocessable");

        assert_eq!(
            details,
            FailureDetails::Validation(vec![
                ValidationIssue::new("bad", &["body", "end_datetime"]),
                ValidationIssue::new("other", &["query", "0"]),
            ])
        );
    }

    #[test]
    fn decodes_detail_and_message_fields() {
        let detail = FailureDetails::from_body(br#"{"detail": "not found"}"#, "Not Found");
        assert_eq!(detail, FailureDetails::Text("not found".into()));

        let message = FailureDetails::from_body(br#"{"message": "nope"}"#, "Bad Request");
        assert_eq!(message, FailureDetails::Text("nope".into()));

        let whole = FailureDetails::from_body(br#"{"error": "x"}"#, "Bad Request");
        assert_eq!(whole, FailureDetails::Object(json!({"error": "x"})));
    }

    #[test]
    fn undecodable_body_falls_back_to_status_text() {
        let details = FailureDetails::from_body(b"<html>oops</html>", "Bad Gateway");
        assert_eq!(details, FailureDetails::Text("Bad Gateway".into()));
    }
}
