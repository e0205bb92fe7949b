//! Authenticated client for the remote archive API
//!
//! Wraps one base URL and one bearer-credential lifecycle. Every outbound
//! call first ensures a valid token, re-authenticating when the token is
//! absent or within the refresh threshold of expiry. A request answered
//! with 401 triggers exactly one re-auth and one retry; a second 401 is
//! surfaced to the caller.

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::DocumentPayload;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    expires_in: u64,
}

/// Result of a remote hash-existence check
#[derive(Debug, Clone, Deserialize)]
pub struct HashCheck {
    pub exists: bool,
}

struct BearerToken {
    access_token: String,
    expires_at: Instant,
}

/// Stateful HTTP client for the remote archive
pub struct BackendClient {
    http: Client,
    base_url: String,
    auth_url: String,
    username: String,
    password: String,
    refresh_threshold: Duration,
    // Serializes credential refresh across shared callers
    token: Mutex<Option<BearerToken>>,
}

impl BackendClient {
    /// Build a client from config, reading credentials from the environment
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        let username = config.username()?;
        let password = config.password()?;
        Self::new(
            &config.base_url,
            &config.auth_url,
            username,
            password,
            config.refresh_threshold_secs,
            config.timeout_secs,
        )
    }

    pub fn new(
        base_url: &str,
        auth_url: &str,
        username: String,
        password: String,
        refresh_threshold_secs: u64,
        timeout_secs: u64,
    ) -> Result<Self> {
        url::Url::parse(base_url)?;
        url::Url::parse(auth_url)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.to_string(),
            username,
            password,
            refresh_threshold: Duration::from_secs(refresh_threshold_secs),
            token: Mutex::new(None),
        })
    }

    /// Resolve an endpoint path against the base URL
    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Obtain a fresh token from the auth endpoint
    async fn fetch_token(&self) -> Result<BearerToken> {
        debug!("Authenticating against {}", self.auth_url);

        let response = self
            .http
            .post(&self.auth_url)
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned status {}",
                status.as_u16()
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;

        Ok(BearerToken {
            access_token: auth.access_token,
            expires_at: Instant::now() + Duration::from_secs(auth.expires_in),
        })
    }

    /// Ensure a valid token, refreshing if absent or about to expire
    async fn ensure_valid_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if Instant::now() + self.refresh_threshold < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!("Token within refresh threshold, re-authenticating");
        }

        let token = self.fetch_token().await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    /// Discard the cached token and authenticate again
    async fn force_refresh(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let token = self.fetch_token().await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: &str,
    ) -> Result<Response> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(json) = body {
            request = request.json(json);
        }
        Ok(request.send().await?)
    }

    /// Perform an authenticated request with the retry-once-on-401 rule
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = self.endpoint(path);
        let token = self.ensure_valid_token().await?;

        let response = self.dispatch(&method, &url, body, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Request to {} was rejected (401); refreshing token once", url);
        let token = self.force_refresh().await?;
        self.dispatch(&method, &url, body, &token).await
    }

    /// Parse a successful response body, or surface the status as a remote error
    async fn expect_success(response: Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Error::Remote {
                status: status.as_u16(),
                message,
            })
        }
    }

    // ===== Domain operations =====

    /// Check whether the remote already holds a document with this hash.
    ///
    /// A 404 from the remote means "not there", not an error.
    pub async fn check_document_hash(&self, doc_hash: &str) -> Result<HashCheck> {
        let path = format!("/document/hash/{}", doc_hash);
        let response = self.send(Method::GET, &path, None).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(HashCheck { exists: false });
        }

        let value = Self::expect_success(response).await?;
        let check: HashCheck = serde_json::from_value(value)?;
        Ok(check)
    }

    /// Create a document on the remote archive
    pub async fn create_document(&self, payload: &DocumentPayload) -> Result<Value> {
        let body = serde_json::to_value(payload)?;
        let response = self.send(Method::POST, "/document", Some(&body)).await?;
        Self::expect_success(response).await
    }

    /// Update the remote document with the given hash
    pub async fn update_document_by_hash(
        &self,
        doc_hash: &str,
        payload: &DocumentPayload,
    ) -> Result<Value> {
        let body = serde_json::to_value(payload)?;
        let path = format!("/document/hash/{}", doc_hash);
        let response = self.send(Method::PUT, &path, Some(&body)).await?;
        Self::expect_success(response).await
    }
}
