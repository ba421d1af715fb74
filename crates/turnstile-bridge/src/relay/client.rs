//! HTTP client for the device relay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};
use turnstile_core::config::RelayConfig;

use super::{DeviceRelay, RelayError, RelayReply};
use crate::device::SetUserRequest;

/// Header older relay deployments read the shared secret from.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header current relay deployments read the shared secret from.
pub const INTERNAL_SECRET_HEADER: &str = "x-internal-secret";

/// reqwest-backed [`DeviceRelay`].
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    set_user_url: String,
}

impl RelayClient {
    /// Build a client from relay settings.
    ///
    /// The shared secret is sent under both accepted header names on every
    /// request. `timeout_secs` bounds the whole request.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(RelayError::Config("base_url is empty".into()));
        }
        if config.shared_secret.is_empty() {
            return Err(RelayError::Config("shared_secret is empty".into()));
        }

        let mut secret = HeaderValue::from_str(&config.shared_secret)
            .map_err(|_| RelayError::Config("Invalid shared secret format".into()))?;
        secret.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), secret.clone());
        headers.insert(HeaderName::from_static(INTERNAL_SECRET_HEADER), secret);

        // reqwest is built with rustls-no-provider; `Err` means a provider is
        // already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let path = config.set_user_path.trim_start_matches('/');
        Ok(Self {
            http,
            set_user_url: format!("{base}/{path}"),
        })
    }

    /// Resolved `set-user` endpoint URL.
    pub fn set_user_url(&self) -> &str {
        &self.set_user_url
    }
}

/// Decode a relay body. Non-JSON bodies are wrapped so the caller always gets
/// a JSON value to pass through.
fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "success": true, "message": text }))
}

/// Error message carried by a 2xx body, if the relay reported one.
fn logical_error(body: &Value) -> Option<String> {
    match body.get("error") {
        None | Some(Value::Null | Value::Bool(false)) => {}
        Some(Value::String(message)) => return Some(message.clone()),
        Some(other) => return Some(other.to_string()),
    }
    if body.get("success") == Some(&Value::Bool(false)) {
        return Some("relay reported success=false".to_string());
    }
    None
}

#[async_trait]
impl DeviceRelay for RelayClient {
    async fn set_user(&self, request: &SetUserRequest) -> Result<RelayReply, RelayError> {
        let resp = self
            .http
            .post(&self.set_user_url)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                employee_code = %request.employee_code,
                "Relay returned error status"
            );
            return Err(RelayError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = decode_body(&text);
        if let Some(message) = logical_error(&body) {
            warn!(employee_code = %request.employee_code, error = %message, "Relay rejected set-user");
            return Err(RelayError::Rejected { message, body });
        }

        debug!(employee_code = %request.employee_code, enabled = request.enabled, "Relay accepted set-user");
        Ok(RelayReply {
            status: status.as_u16(),
            body,
        })
    }
}
