//! Client-side error type and backend error-body parsing.

use serde_json::{Map, Value};

/// Errors surfaced by the transport layer.
///
/// The transport never retries: a failed mutation is reported as-is so the
/// caller decides whether resubmitting is safe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Vec<String>,
    },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Not signed in")]
    Unauthenticated,
}

impl ApiError {
    /// Build an error from a non-2xx response.
    ///
    /// Uses `message` (then `error`) and `details` from a JSON body when the
    /// backend sends them, otherwise `HTTP <status>`. A 404 without its own
    /// message names the endpoint that was missing.
    pub fn from_response(status: u16, body: &str, path: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let obj = parsed.as_ref().and_then(Value::as_object);

        let message = obj.and_then(|o| body_message(o, status));
        let details = obj.map(body_details).unwrap_or_default();

        let message = message.unwrap_or_else(|| {
            if status == 404 {
                format!("Endpoint not found: {path}")
            } else {
                format!("HTTP {status}")
            }
        });

        ApiError::Http {
            status,
            message,
            details,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthenticated) || matches!(self.status(), Some(401) | Some(403))
    }

    pub fn details(&self) -> &[String] {
        match self {
            ApiError::Http { details, .. } => details,
            _ => &[],
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn body_message(obj: &Map<String, Value>, status: u16) -> Option<String> {
    if let Some(message) = non_empty(obj.get("message")) {
        return Some(message);
    }
    // Spring's `error` on a 404 is just "Not Found"; the endpoint name is
    // more useful there.
    if status == 404 {
        return None;
    }
    non_empty(obj.get("error"))
}

fn body_details(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("details") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(field, reason)| match reason {
                Value::String(s) => format!("{field}: {s}"),
                other => format!("{field}: {other}"),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_message_and_details_from_body() {
        let body = r#"{"message":"Validation failed","details":["name is required","price < 0"]}"#;
        let err = ApiError::from_response(400, body, "/items");
        assert_eq!(
            err,
            ApiError::Http {
                status: 400,
                message: "Validation failed".into(),
                details: vec!["name is required".into(), "price < 0".into()],
            }
        );
        assert_eq!(err.to_string(), "Validation failed");
    }

    #[test]
    fn falls_back_to_error_field() {
        let err = ApiError::from_response(409, r#"{"error":"Duplicate username"}"#, "/players");
        assert_eq!(err.to_string(), "Duplicate username");
    }

    #[test]
    fn generic_message_without_json_body() {
        let err = ApiError::from_response(502, "<html>Bad gateway</html>", "/pets");
        assert_eq!(err.to_string(), "HTTP 502");
        assert!(err.details().is_empty());
    }

    #[test]
    fn not_found_names_the_endpoint() {
        let err = ApiError::from_response(
            404,
            r#"{"status":404,"error":"Not Found","path":"/api/pets/paginated"}"#,
            "/pets/paginated",
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Endpoint not found: /pets/paginated");
    }

    #[test]
    fn object_details_are_flattened() {
        let err = ApiError::from_response(422, r#"{"details":{"email":"invalid"}}"#, "/players");
        assert_eq!(err.details(), ["email: invalid".to_string()]);
        assert_eq!(err.to_string(), "HTTP 422");
    }

    #[test]
    fn rejected_credentials_are_unauthorized() {
        assert!(ApiError::Unauthenticated.is_unauthorized());
        assert!(ApiError::from_response(401, "", "/players").is_unauthorized());
        assert!(ApiError::from_response(403, r#"{"message":"Forbidden"}"#, "/players").is_unauthorized());
        assert!(!ApiError::from_response(404, "", "/players/9").is_unauthorized());
        assert!(!ApiError::Timeout("30s".into()).is_unauthorized());
    }
}
