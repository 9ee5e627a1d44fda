//! Local record store contract and reference implementation.

mod memory;

pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use crate::records::{BoardRecord, ChatRecord};

/// Durable local store for the three record families.
///
/// Chats and boards are keyed by record id, settings by name. Writes are
/// upserts. Implementations are assumed crash-safe at the granularity of a
/// single write; callers get no cross-record transaction.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>, StoreError>;
    async fn put_chat(&self, chat: ChatRecord) -> Result<(), StoreError>;
    async fn delete_chat(&self, id: &str) -> Result<(), StoreError>;
    /// All chats, ordered by id.
    async fn list_chats(&self) -> Result<Vec<ChatRecord>, StoreError>;
    async fn clear_chats(&self) -> Result<(), StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn put_setting(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn delete_setting(&self, key: &str) -> Result<(), StoreError>;
    async fn list_settings(&self) -> Result<BTreeMap<String, Value>, StoreError>;
    async fn clear_settings(&self) -> Result<(), StoreError>;

    async fn get_board(&self, id: &str) -> Result<Option<BoardRecord>, StoreError>;
    async fn put_board(&self, board: BoardRecord) -> Result<(), StoreError>;
    async fn delete_board(&self, id: &str) -> Result<(), StoreError>;
    /// All boards, ordered by id.
    async fn list_boards(&self) -> Result<Vec<BoardRecord>, StoreError>;
    async fn clear_boards(&self) -> Result<(), StoreError>;
}
