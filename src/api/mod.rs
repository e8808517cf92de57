//! Wire types and the service seam for the chat backend.
//!
//! Every payload here mirrors the JSON the service speaks. [`ChatService`]
//! is the seam the session guard, profile loader and chat controller talk
//! through; [`client::ApiClient`] is the HTTP implementation.

pub mod client;
#[cfg(test)]
mod tests;

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub use client::ApiClient;

/// Identity payload returned by `user/details/` and `users/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileResponse {
    pub username: String,
    pub tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BalanceResponse {
    pub tokens: u64,
}

#[derive(Serialize)]
pub struct CredentialsRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
}

/// Successful chat exchange. The service also echoes the message and the
/// predicted intent; only the reply and the new balance matter here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub remaining_tokens: u64,
    #[serde(default)]
    pub predicted_intent: Option<String>,
}

/// Failures talking to the chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The service refused the token (401/403).
    Unauthorized { status: StatusCode },
    /// Any other non-success status, with the server's error text when present.
    Status { status: StatusCode, message: String },
    /// Connection, TLS or timeout failure before a response arrived.
    Network(String),
    /// A success response whose body did not match the expected shape.
    Decode(String),
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ApiError::Unauthorized { status };
        }
        let message = extract_error_message(body)
            .or_else(|| status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| "request failed".to_string());
        ApiError::Status { status, message }
    }

    /// True when the service rejected the session token.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// True when the service refused a chat send for lack of quota.
    pub fn is_quota_refusal(&self) -> bool {
        match self {
            ApiError::Status { status, message } => {
                *status == StatusCode::BAD_REQUEST
                    && message.to_ascii_lowercase().contains("insufficient tokens")
            }
            _ => false,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { status } => {
                write!(f, "session rejected by server ({status})")
            }
            ApiError::Status { status, message } => write!(f, "server error {status}: {message}"),
            ApiError::Network(message) => write!(f, "network error: {message}"),
            ApiError::Decode(message) => write!(f, "unexpected response: {message}"),
        }
    }
}

impl Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Pull a human-readable message out of an error body.
///
/// The service answers `{"error": "..."}`; nested `{"error": {"message": ...}}`
/// and top-level `message`/`detail` fields are accepted too.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Some(collapse_whitespace(trimmed));
    };

    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| value.get("message").and_then(|v| v.as_str().map(str::to_owned)))
        .or_else(|| value.get("detail").and_then(|v| v.as_str().map(str::to_owned)))
        .map(|text| collapse_whitespace(&text))
        .filter(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Operations the client needs from the chat service.
///
/// Every method taking a `token` sends it as `Authorization: Token <token>`.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// `GET user/details/`, used by the session guard to verify a stored token.
    async fn verify_identity(&self, token: &str) -> Result<ProfileResponse, ApiError>;

    /// `GET users/`, the profile fetch.
    async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError>;

    /// `GET tokens/balance/`.
    async fn fetch_balance(&self, token: &str) -> Result<u64, ApiError>;

    /// `POST chat/send_message/`.
    async fn send_message(
        &self,
        token: &str,
        message: &str,
    ) -> Result<SendMessageResponse, ApiError>;

    /// `POST users/`. Registration does not yield a usable session.
    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError>;

    /// `POST auth/login/`, returning the session token.
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;
}
