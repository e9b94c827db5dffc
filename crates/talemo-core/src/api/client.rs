//! HTTP client for the talemo authentication backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::session::{Credential, UserInfo};

use super::ApiError;

/// Path of the login exchange, relative to the backend URL
const LOGIN_PATH: &str = "/auth/login";

/// Header identifying which surface issued the request
pub const SURFACE_HEADER: &str = "X-Talemo-Surface";

/// Successful login payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserInfo,
}

/// The remote login exchange, as seen by the login surface.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credential: &Credential) -> Result<LoginResponse, ApiError>;
}

/// Backend API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    surface: String,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        surface: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        // Cookie store keeps whatever the backend sets, like a browser
        // sending credentials with the request.
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            surface: surface.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.backend_url(), config.surface(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn login_url(&self) -> String {
        format!("{}{}", self.base_url, LOGIN_PATH)
    }

    /// Check if response is successful, returning an error built from the body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %ApiError::truncate_body(&body), "Login request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }

    fn parse_login_response(body: &str) -> Result<LoginResponse, ApiError> {
        let parsed: LoginResponse = serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse login response: {}", e))
        })?;
        if parsed.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Login response has an empty access_token".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, credential: &Credential) -> Result<LoginResponse, ApiError> {
        let url = self.login_url();
        debug!(url = %url, email = %credential.email, "Sending login request");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(SURFACE_HEADER, &self.surface)
            .json(credential)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let body = response.text().await?;
        Self::parse_login_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:8000/", "test", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.login_url(), "http://localhost:8000/auth/login");
    }

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"access_token":"tok1","token_type":"bearer","user":{"id":"42","email":"a@x.com"}}"#;
        let parsed = ApiClient::parse_login_response(json).unwrap();
        assert_eq!(parsed.access_token, "tok1");
        assert_eq!(parsed.user.id, "42");
        assert_eq!(parsed.user.email, "a@x.com");
    }

    #[test]
    fn test_parse_login_response_rejects_malformed() {
        assert!(matches!(
            ApiClient::parse_login_response("not json"),
            Err(ApiError::InvalidResponse(_))
        ));
        assert!(matches!(
            ApiClient::parse_login_response(r#"{"access_token":"tok1"}"#),
            Err(ApiError::InvalidResponse(_))
        ));
        assert!(matches!(
            ApiClient::parse_login_response(r#"{"access_token":"","user":{"id":"1","email":"e"}}"#),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
