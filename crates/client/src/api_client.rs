//! HTTP transport for the admin REST backend.

use async_trait::async_trait;
use petadmin_shared::{AdminProfile, ApiError, LoginRequest};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use reqwest::Method;

use crate::auth_session::AuthSession;
use crate::config::ClientConfig;
use crate::routes;

/// Sends one JSON request and returns the decoded JSON response.
///
/// Implementations must not retry on their own: mutating calls would be
/// silently duplicated.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: Method, path: &str, body: Option<Value>)
        -> Result<Value, ApiError>;
}

/// HTTP client for the admin backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<AuthSession>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            session: None,
        }
    }

    /// Build a client with the configured base URL and request timeout.
    pub fn from_config(config: &ClientConfig, session: AuthSession) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            session: Some(session),
        })
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let value = self.send(Method::POST, path, Some(encode(body)?)).await?;
        decode(value)
    }

    /// Sign in and persist the issued token.
    pub async fn login(&self, username: &str, password: &str) -> Result<AdminProfile, ApiError> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: Value = self.post_json(routes::LOGIN, &request).await?;
        let (token, profile) = parse_login(&response)?;

        if let Some(session) = &self.session {
            session.login(&token, Some(&profile));
        }
        tracing::info!(username = %profile.username, "signed in");
        Ok(profile)
    }

    /// Forget the persisted token. Purely local; the backend keeps no session.
    pub fn logout(&self) {
        if let Some(session) = &self.session {
            session.logout();
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ApiClient {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = self.url(path);
        let mut rb = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");

        if let Some(token) = self.session.as_ref().and_then(AuthSession::token) {
            rb = rb.bearer_auth(token);
        }
        if let Some(body) = &body {
            rb = rb.json(body);
        }

        tracing::debug!(%method, %url, "sending request");
        let resp = rb.send().await.map_err(request_error)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            let endpoint = path.split('?').next().unwrap_or(path);
            let err = ApiError::from_response(status.as_u16(), &text, endpoint);
            tracing::warn!(%method, %url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        tracing::debug!(%method, %url, status = status.as_u16(), "request succeeded");
        if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
        }
    }
}

fn request_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

fn encode<T: Serialize>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Deserialize(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Deserialize(e.to_string()))
}

/// Pull the token and profile out of a login response.
///
/// Accepts `{token}` or `{accessToken}`, optionally wrapped in `{data: ...}`,
/// with the profile under `user` or inline.
pub fn parse_login(response: &Value) -> Result<(String, AdminProfile), ApiError> {
    let body = match response.get("data") {
        Some(data) if data.is_object() => data,
        _ => response,
    };
    let token = ["token", "accessToken"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Deserialize("login response carries no token".into()))?
        .to_string();

    let profile_value = body.get("user").unwrap_or(body);
    let profile = serde_json::from_value::<AdminProfile>(profile_value.clone()).unwrap_or_default();
    Ok((token, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_base_url_and_path() {
        let client = ApiClient::new().with_base_url("http://localhost:8080/api/");
        assert_eq!(client.url("/pets"), "http://localhost:8080/api/pets");
        assert_eq!(client.url("pets/3"), "http://localhost:8080/api/pets/3");
        assert_eq!(ApiClient::new().url("pets"), "/pets");
    }

    #[test]
    fn login_response_shapes() {
        let (token, profile) =
            parse_login(&json!({ "token": "abc", "user": { "username": "root" } })).unwrap();
        assert_eq!(token, "abc");
        assert_eq!(profile.username, "root");

        let (token, profile) =
            parse_login(&json!({ "data": { "accessToken": "xyz", "username": "mod" } })).unwrap();
        assert_eq!(token, "xyz");
        assert_eq!(profile.username, "mod");

        assert!(parse_login(&json!({ "user": {} })).is_err());
    }
}
