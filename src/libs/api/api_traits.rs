use crate::libs::api::dto::{
    AuthResponse, DiscoveryQuery, LikeResponse, OtpResponse, Profile, RemoteConversation,
    RemoteMessage, SendMessageRequest, SwipeRequest, UpdateProfileRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// The chat endpoints the synchronisation logic depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn conversations(&self) -> Result<Vec<RemoteConversation>, ApiError>;

    /// One history page, newest messages first or last as the server pleases;
    /// callers never rely on page order.
    async fn messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteMessage>, ApiError>;

    async fn send_message(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, ApiError>;
}

#[async_trait]
pub trait DatingApi: Send + Sync {
    async fn send_otp(&self, phone_number: &str) -> Result<OtpResponse, ApiError>;
    async fn verify_otp(&self, phone_number: &str, otp: &str) -> Result<AuthResponse, ApiError>;
    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError>;
    async fn discovery(&self, query: &DiscoveryQuery) -> Result<Vec<Profile>, ApiError>;
    async fn swipe(&self, request: &SwipeRequest) -> Result<LikeResponse, ApiError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Transport Error: {0}")]
    Transport(String),
    #[error("HTTP Status Error: {0}")]
    Status(u16),
    #[error("Malformed Body: {0}")]
    MalformedBody(String),
    #[error("Invalid Endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// Whether repeating the same request could succeed. Nothing retries automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status(code) => *code == 429 || (500..600).contains(code),
            ApiError::MalformedBody(_) | ApiError::InvalidEndpoint(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiError::Status(status.as_u16()),
            None if err.is_decode() => ApiError::MalformedBody(err.to_string()),
            None => ApiError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Transport("reset".into()).is_retryable());
        assert!(ApiError::Status(503).is_retryable());
        assert!(ApiError::Status(429).is_retryable());
        assert!(!ApiError::Status(404).is_retryable());
        assert!(!ApiError::MalformedBody("eof".into()).is_retryable());
    }
}
