//! Device relay ("worker") integration.
//!
//! The relay owns the terminal's native protocol. The bridge only calls its
//! `set-user` endpoint with a full desired credential state.

mod client;


use async_trait::async_trait;
use serde_json::Value;

use crate::device::SetUserRequest;

pub use client::{API_KEY_HEADER, INTERNAL_SECRET_HEADER, RelayClient};

/// Successful relay reply: HTTP status plus the decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: u16,
    pub body: Value,
}

/// Relay call errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Relay configuration error: {0}")]
    Config(String),

    /// Transport failure, including the request timeout.
    #[error("Relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Relay returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// 2xx response whose body reports an error.
    #[error("Relay rejected command: {message}")]
    Rejected { message: String, body: Value },
}

impl RelayError {
    /// Response body to keep in the sync log, when one was received.
    pub fn response_body(&self) -> Option<Value> {
        match self {
            Self::Api { status, body } => Some(
                serde_json::from_str(body)
                    .unwrap_or_else(|_| serde_json::json!({ "status": status, "body": body })),
            ),
            Self::Rejected { body, .. } => Some(body.clone()),
            Self::Config(_) | Self::Http(_) => None,
        }
    }
}

/// Synchronous delivery path to the terminal.
#[async_trait]
pub trait DeviceRelay: Send + Sync {
    /// Assert the full state of one credential on the device.
    async fn set_user(&self, request: &SetUserRequest) -> Result<RelayReply, RelayError>;
}
