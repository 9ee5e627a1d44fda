//! Production transport: HTTP request/response plus the WebSocket channel.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use parlor_core::records::ChatRecord;
use parlor_core::sync::SyncFrame;

use crate::error::{Result, SyncError};
use crate::transport::{FrameSink, FrameStream, Transport};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// WebSocket writer half type alias
type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// WebSocket reader half type alias
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Error payload returned by the remote API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Client for the remote sync service.
///
/// Four REST endpoints (sync-one-chat, sync-one-setting, fetch-all-chats,
/// fetch-all-settings) plus the live WebSocket channel carrying
/// JSON-encoded [`SyncFrame`]s.
#[derive(Debug, Clone)]
pub struct RemoteService {
    client: reqwest::Client,
    api_base_url: String,
    ws_url: String,
}

impl RemoteService {
    /// Create a new remote service client.
    ///
    /// # Arguments
    ///
    /// * `api_base_url` - Base URL of the HTTP API (e.g., "https://sync.parlor.app")
    /// * `ws_url` - WebSocket URL of the live channel (e.g., "wss://sync.parlor.app/ws")
    pub fn new(api_base_url: &str, ws_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            ws_url: ws_url.to_string(),
        }
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!("Failed to deserialize response. Body: {}, Error: {}", body, e);
            SyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check a write endpoint's response, discarding any success body.
    async fn ensure_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Err(Self::api_error(status.as_u16(), &body))
    }

    fn api_error(status: u16, body: &str) -> SyncError {
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) {
            if !error.message.is_empty() {
                return SyncError::api(status, format!("{}: {}", error.code, error.message));
            }
        }
        SyncError::api(status, format!("Request failed: {}", body))
    }
}

#[async_trait]
impl Transport for RemoteService {
    async fn connect(&self) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
        debug!("[Sync] Connecting to {}", self.ws_url);
        let (ws_stream, response) = connect_async(&self.ws_url).await?;
        debug!("[Sync] WebSocket connected, status: {}", response.status());

        let (writer, reader) = ws_stream.split();
        Ok((
            Box::new(WsFrameSink { writer }),
            Box::new(WsFrameStream { reader }),
        ))
    }

    /// POST /api/sync/chats
    async fn sync_chat(&self, chat: &ChatRecord) -> Result<()> {
        let url = format!("{}/api/sync/chats", self.api_base_url);
        let response = self.client.post(&url).json(chat).send().await?;
        Self::ensure_success(response).await
    }

    /// POST /api/sync/settings
    async fn sync_setting(&self, key: &str, value: &Value) -> Result<()> {
        let url = format!("{}/api/sync/settings", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "key": key, "value": value }))
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    /// GET /api/sync/chats
    async fn fetch_all_chats(&self) -> Result<Vec<ChatRecord>> {
        let url = format!("{}/api/sync/chats", self.api_base_url);
        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }

    /// GET /api/sync/settings
    async fn fetch_all_settings(&self) -> Result<BTreeMap<String, Value>> {
        let url = format!("{}/api/sync/settings", self.api_base_url);
        let response = self.client.get(&url).send().await?;
        Self::parse_response(response).await
    }
}

struct WsFrameSink {
    writer: WsWriter,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send(&mut self, frame: &SyncFrame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.writer.send(WsMessage::Text(text)).await?;
        Ok(())
    }
}

struct WsFrameStream {
    reader: WsReader,
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next(&mut self) -> Option<Result<SyncFrame>> {
        loop {
            match self.reader.next().await {
                Some(Ok(WsMessage::Text(text))) => match serde_json::from_str(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(err) => {
                        // A poison frame must not tear down the channel.
                        warn!("[Sync] Ignoring unparseable frame: {}", err);
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => return None,
                Some(Ok(_)) => {} // ping/pong/binary
                Some(Err(err)) => return Some(Err(err.into())),
            }
        }
    }
}
