//! Transport contract consumed by the sync client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use parlor_core::records::ChatRecord;
use parlor_core::sync::SyncFrame;

use crate::error::Result;

/// Sending half of a live sync channel.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: &SyncFrame) -> Result<()>;
}

/// Receiving half of a live sync channel.
///
/// `None` means the channel closed; an `Err` item is a transport fault
/// that also ends the channel.
#[async_trait]
pub trait FrameStream: Send {
    async fn next(&mut self) -> Option<Result<SyncFrame>>;
}

/// Remote service surface consumed by the sync client: one bidirectional
/// frame channel plus four request/response endpoints.
///
/// The client is constructed with an injected implementation; production
/// wires [`crate::remote::RemoteService`], tests wire an in-memory fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the live channel, returning its two halves.
    async fn connect(&self) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)>;

    /// Push one chat record to the remote store.
    async fn sync_chat(&self, chat: &ChatRecord) -> Result<()>;

    /// Push one setting to the remote store.
    async fn sync_setting(&self, key: &str, value: &Value) -> Result<()>;

    /// Fetch every chat the remote store holds.
    async fn fetch_all_chats(&self) -> Result<Vec<ChatRecord>>;

    /// Fetch every setting the remote store holds.
    async fn fetch_all_settings(&self) -> Result<BTreeMap<String, Value>>;
}
