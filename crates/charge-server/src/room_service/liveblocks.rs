//! Liveblocks REST client.
//!
//! | Method | Path                         | Operation        |
//! |--------|------------------------------|------------------|
//! | GET    | `/v2/rooms/{roomId}`         | `get_room`       |
//! | POST   | `/v2/rooms/{roomId}`         | `update_room`    |
//! | POST   | `/v2/rooms`                  | `create_room`    |
//! | GET    | `/v2/rooms/{roomId}/storage` | `fetch_storage`  |
//! | POST   | `/v2/identify-user`          | `identify_user`  |
//!
//! Every request carries the secret key as a bearer token and is bounded by
//! the configured request timeout.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use charge_core::{RoomAccessConfig, RoomId};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{RoomInfo, RoomService, UpstreamError};

/// Public Liveblocks API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.liveblocks.io";

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreateRoomBody<'a> {
    id: String,
    #[serde(flatten)]
    config: &'a RoomAccessConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyUserBody<'a> {
    user_id: &'a str,
    group_ids: &'a [String],
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP client for the Liveblocks room API.
///
/// Clone is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct LiveblocksClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl LiveblocksClient {
    /// Build a client for `base_url` authenticated with `secret_key`.
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("charge-worlds/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { http, base_url, secret_key: secret_key.into() })
    }

    fn room_url(&self, room_id: &RoomId) -> String {
        format!("{}/v2/rooms/{room_id}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))
    }
}

impl fmt::Debug for LiveblocksClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveblocksClient")
            .field("base_url", &self.base_url)
            .field("secret_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RoomService for LiveblocksClient {
    async fn get_room(&self, room_id: &RoomId) -> Result<Option<RoomInfo>, UpstreamError> {
        let response = self.send(self.http.get(self.room_url(room_id))).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let info = response.json().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(Some(info))
    }

    async fn update_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        let response = self.send(self.http.post(self.room_url(room_id)).json(config)).await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn create_room(
        &self,
        room_id: &RoomId,
        config: &RoomAccessConfig,
    ) -> Result<(), UpstreamError> {
        let body = CreateRoomBody { id: room_id.to_string(), config };
        let url = format!("{}/v2/rooms", self.base_url);

        let response = self.send(self.http.post(url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn fetch_storage(&self, room_id: &RoomId) -> Result<Option<String>, UpstreamError> {
        let url = format!("{}/storage", self.room_url(room_id));
        let response = self.send(self.http.get(url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let text = response.text().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(Some(text))
    }

    async fn identify_user(
        &self,
        user_id: &str,
        group_ids: &[String],
    ) -> Result<String, UpstreamError> {
        let body = IdentifyUserBody { user_id, group_ids };
        let url = format!("{}/v2/identify-user", self.base_url);

        let response = self.send(self.http.post(url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let token: TokenResponse =
            response.json().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(token.token)
    }
}

/// Turn a non-success response into [`UpstreamError::Status`].
async fn status_error(response: Response) -> UpstreamError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    UpstreamError::Status {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body: error_message(&text),
    }
}

/// Best-effort error message: the `message` or `error` field of a JSON body,
/// otherwise the trimmed raw text.
fn error_message(text: &str) -> String {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(text) {
        for key in ["message", "error"] {
            if let Some(serde_json::Value::String(message)) = fields.get(key) {
                return message.clone();
            }
        }
    }
    text.trim().to_string()
}
