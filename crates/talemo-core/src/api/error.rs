use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Message shown when a failed response carries no usable detail
pub const GENERIC_FAILURE_MESSAGE: &str = "Authentication failed";

/// Message shown when the backend could not be reached at all
pub const NETWORK_FAILURE_MESSAGE: &str =
    "Unable to connect to server. Check your internet connection.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Login rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in log messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build the error for a non-2xx login response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Rejected {
            status,
            message: extract_detail(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        }
    }

    /// The text the login surface shows for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::NetworkError(_) => NETWORK_FAILURE_MESSAGE.to_string(),
            ApiError::InvalidResponse(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Pull a human-readable reason out of an error body.
///
/// Looks at `detail.message` first, then `detail` when it is a string.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail")?;

    let message = match detail {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("message").and_then(Value::as_str),
        _ => None,
    }?;

    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
    }

    #[test]
    fn test_extract_detail_nested_message() {
        assert_eq!(
            extract_detail(r#"{"detail": {"message": "Account locked", "code": 42}}"#).as_deref(),
            Some("Account locked")
        );
    }

    #[test]
    fn test_extract_detail_missing() {
        assert_eq!(extract_detail(r#"{"error": "nope"}"#), None);
        assert_eq!(extract_detail(r#"{"detail": {"code": 42}}"#), None);
        assert_eq!(extract_detail(r#"{"detail": ["a"]}"#), None);
        assert_eq!(extract_detail(r#"{"detail": "  "}"#), None);
        assert_eq!(extract_detail("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_detail(""), None);
    }

    #[test]
    fn test_from_status_falls_back_to_generic_message() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream exploded");
        assert_eq!(err.user_message(), "Authentication failed");

        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"detail":"Wrong password"}"#);
        assert_eq!(err.user_message(), "Wrong password");
    }

    #[test]
    fn test_invalid_response_message() {
        let err = ApiError::InvalidResponse("missing access_token".into());
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.contains("600 total bytes"));
    }
}
