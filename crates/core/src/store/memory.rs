//! In-memory reference implementation of the local record store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StoreError;
use crate::records::{BoardRecord, ChatRecord};
use crate::store::LocalStore;

#[derive(Debug, Default)]
struct StoreInner {
    chats: BTreeMap<String, ChatRecord>,
    settings: BTreeMap<String, Value>,
    boards: BTreeMap<String, BoardRecord>,
}

/// Non-durable store keeping all three record families in memory.
///
/// Used as the composition-root store in tests and ephemeral sessions;
/// production wires a durable implementation behind the same trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::internal("record store lock poisoned"))
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_chat(&self, id: &str) -> Result<Option<ChatRecord>, StoreError> {
        Ok(self.lock()?.chats.get(id).cloned())
    }

    async fn put_chat(&self, chat: ChatRecord) -> Result<(), StoreError> {
        self.lock()?.chats.insert(chat.id.clone(), chat);
        Ok(())
    }

    async fn delete_chat(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.chats.remove(id);
        Ok(())
    }

    async fn list_chats(&self) -> Result<Vec<ChatRecord>, StoreError> {
        Ok(self.lock()?.chats.values().cloned().collect())
    }

    async fn clear_chats(&self) -> Result<(), StoreError> {
        self.lock()?.chats.clear();
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.settings.get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.lock()?.settings.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.settings.remove(key);
        Ok(())
    }

    async fn list_settings(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(self.lock()?.settings.clone())
    }

    async fn clear_settings(&self) -> Result<(), StoreError> {
        self.lock()?.settings.clear();
        Ok(())
    }

    async fn get_board(&self, id: &str) -> Result<Option<BoardRecord>, StoreError> {
        Ok(self.lock()?.boards.get(id).cloned())
    }

    async fn put_board(&self, board: BoardRecord) -> Result<(), StoreError> {
        self.lock()?.boards.insert(board.id.clone(), board);
        Ok(())
    }

    async fn delete_board(&self, id: &str) -> Result<(), StoreError> {
        self.lock()?.boards.remove(id);
        Ok(())
    }

    async fn list_boards(&self) -> Result<Vec<BoardRecord>, StoreError> {
        Ok(self.lock()?.boards.values().cloned().collect())
    }

    async fn clear_boards(&self) -> Result<(), StoreError> {
        self.lock()?.boards.clear();
        Ok(())
    }
}
