use crate::libs::api::api_traits::{ApiError, ChatApi, DatingApi};
use crate::libs::api::dto::{
    AuthResponse, DiscoveryQuery, LikeResponse, OtpResponse, Profile, RemoteConversation,
    RemoteMessage, SendMessageRequest, SendOtpRequest, SwipeRequest, UpdateProfileRequest,
    VerifyOtpRequest,
};
use crate::libs::core::config::ClientConfig;
use crate::libs::session::session_manager::SessionManager;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Endpoints reachable without a bearer token.
const UNAUTHENTICATED_PATHS: [&[&str]; 2] = [&["auth", "send-otp"], &["auth", "verify-otp"]];

pub struct HttpApiClient {
    client: Client,
    base_url: Url,
    session: SessionManager,
}

impl HttpApiClient {
    pub fn new(config: &ClientConfig, session: SessionManager) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", config.api_base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(config.api_base_url.clone()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        build_endpoint(&self.base_url, segments)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        let builder = self.client.request(method, url);

        if !requires_auth(segments) {
            return Ok(builder);
        }

        match self.session.auth_token() {
            Ok(Some(token)) => Ok(builder.bearer_auth(token)),
            Ok(None) => Ok(builder),
            Err(err) => {
                warn!(%err, "Could not read auth token, sending request without it");
                Ok(builder)
            }
        }
    }
}

pub(crate) fn build_endpoint(base_url: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidEndpoint(base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn requires_auth(segments: &[&str]) -> bool {
    !UNAUTHENTICATED_PATHS.iter().any(|path| *path == segments)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        debug!(status = status.as_u16(), url = %response.url(), "Request failed");
        return Err(ApiError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    if body.is_empty() {
        return Err(ApiError::MalformedBody("empty response body".to_string()));
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

#[async_trait]
impl ChatApi for HttpApiClient {
    async fn conversations(&self) -> Result<Vec<RemoteConversation>, ApiError> {
        let response = self.request(Method::GET, &["conversations"])?.send().await?;
        decode(response).await
    }

    async fn messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteMessage>, ApiError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }

        let response = self
            .request(Method::GET, &["conversations", conversation_id, "messages"])?
            .query(&query)
            .send()
            .await?;
        decode(response).await
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, ApiError> {
        let response = self
            .request(Method::POST, &["conversations", conversation_id, "messages"])?
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl DatingApi for HttpApiClient {
    async fn send_otp(&self, phone_number: &str) -> Result<OtpResponse, ApiError> {
        let body = SendOtpRequest {
            phone_number: phone_number.to_string(),
        };
        let response = self
            .request(Method::POST, &["auth", "send-otp"])?
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    async fn verify_otp(&self, phone_number: &str, otp: &str) -> Result<AuthResponse, ApiError> {
        let body = VerifyOtpRequest {
            phone_number: phone_number.to_string(),
            otp: otp.to_string(),
        };
        let response = self
            .request(Method::POST, &["auth", "verify-otp"])?
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        let response = self
            .request(Method::PUT, &["auth", "profile"])?
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn discovery(&self, query: &DiscoveryQuery) -> Result<Vec<Profile>, ApiError> {
        let mut params = vec![
            ("userId", query.user_id.clone()),
            ("distance", query.max_distance_km.to_string()),
        ];
        if let Some(latitude) = query.latitude {
            params.push(("lat", latitude.to_string()));
        }
        if let Some(longitude) = query.longitude {
            params.push(("long", longitude.to_string()));
        }

        let response = self
            .request(Method::GET, &["discovery", "recommendations"])?
            .query(&params)
            .send()
            .await?;
        decode(response).await
    }

    async fn swipe(&self, request: &SwipeRequest) -> Result<LikeResponse, ApiError> {
        let response = self
            .request(Method::POST, &["discovery", "swipe"])?
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}
