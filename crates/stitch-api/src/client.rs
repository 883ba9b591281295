//! The shared HTTP client: envelope handling, bearer auth, token refresh.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stitch_core::CredentialProvider;

use crate::{ApiEnvelope, ApiError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    access_token: String,
}

/// One client per backend; cheap to clone via the inner connection pool.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    timeout: Duration,
}

impl ApiClient {
    /// `base_url` includes the version prefix, e.g. `https://host/api/v1`.
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        // The refresh token arrives as an HTTP-only cookie on login, so the
        // client keeps a cookie jar and `/auth/refresh` sends it back.
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ApiClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            credentials,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method.clone(), url)
            .timeout(self.timeout);
        // The token is re-read on every attempt so a refreshed token is
        // picked up by the retry.
        if let Some(token) = self.credentials.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
    }

    /// Issue a request, handling auth expiry.
    ///
    /// A 401 triggers one token refresh and one retry; a second 401 (or a
    /// failed refresh) clears the credential and surfaces `Unauthorized`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let resp = self.send(&method, &url, body.as_ref()).send().await?;
        if resp.status().as_u16() != 401 {
            return Ok(resp);
        }

        if !self.refresh_token().await {
            self.credentials.clear();
            return Err(ApiError::Unauthorized);
        }
        let resp = self.send(&method, &url, body.as_ref()).send().await?;
        if resp.status().as_u16() == 401 {
            self.credentials.clear();
            return Err(ApiError::Unauthorized);
        }
        Ok(resp)
    }

    /// Issue a request and unwrap the envelope's `data` field.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let resp = self.execute(method, path, body).await?;
        let envelope = decode_envelope::<T>(resp).await?;
        envelope.data.ok_or(ApiError::MissingData)
    }

    /// Like [`request`](Self::request) for endpoints whose `data` is null.
    pub(crate) async fn request_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), ApiError> {
        let resp = self.execute(method, path, body).await?;
        decode_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// Raw binary PUT to an absolute (presigned) URL; no envelope, no auth.
    pub(crate) async fn put_raw(
        &self,
        url: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let resp = self
            .http
            .put(url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: "binary upload rejected".to_string(),
            });
        }
        Ok(())
    }

    /// `POST /auth/refresh`; on success the new access token is stored in
    /// the credential provider. Returns whether the refresh succeeded.
    async fn refresh_token(&self) -> bool {
        let url = self.url("/auth/refresh");
        let resp = match self.http.post(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(error = %err, "token refresh request failed");
                return false;
            }
        };
        if !resp.status().is_success() {
            return false;
        }
        match resp.json::<ApiEnvelope<RefreshData>>().await {
            Ok(envelope) => match envelope.data {
                Some(data) => {
                    self.credentials.store(data.access_token);
                    tracing::debug!("access token refreshed");
                    true
                }
                None => false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "token refresh response malformed");
                false
            }
        }
    }
}

async fn decode_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<ApiEnvelope<T>, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        // Error bodies still carry the envelope; fall back to the raw text.
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}
