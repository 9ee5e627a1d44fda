//! Shared sync wire models and connection-state types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{now_millis, ChatRecord};

/// Storage key the offline queue is persisted under.
pub const OFFLINE_QUEUE_STORAGE_KEY: &str = "parlor.sync.offline-queue";

/// Fixed delay between reconnect attempts, in seconds.
pub const RECONNECT_INTERVAL_SECS: u64 = 5;

/// One message on the live sync channel.
///
/// `chat_changed` and `setting_changed` flow in both directions;
/// `bulk_import` and `all_data_cleared` are only ever produced by the
/// server, when another session imported a backup or wiped the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncFrame {
    ChatChanged { chat: ChatRecord },
    SettingChanged { key: String, value: Value },
    BulkImport,
    AllDataCleared,
}

/// One not-yet-acknowledged mutation in the offline queue.
///
/// Created when a mutation cannot be sent immediately; destroyed after a
/// confirmed transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    #[serde(flatten)]
    pub frame: SyncFrame,
    pub enqueued_at: i64,
}

impl SyncQueueItem {
    pub fn new(frame: SyncFrame) -> Self {
        Self {
            frame,
            enqueued_at: now_millis(),
        }
    }
}

/// Connection lifecycle state of the sync client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time connectivity readout for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub enabled: bool,
    pub state: ConnectionState,
    pub queued_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::now_millis;

    #[test]
    fn frame_serialization_matches_wire_contract() {
        let frames = [
            SyncFrame::SettingChanged {
                key: "theme".to_string(),
                value: serde_json::json!("dark"),
            },
            SyncFrame::BulkImport,
            SyncFrame::AllDataCleared,
        ];

        let actual = frames
            .iter()
            .map(|frame| serde_json::to_string(frame).expect("serialize frame"))
            .collect::<Vec<_>>();

        let expected = vec![
            r#"{"type":"setting_changed","key":"theme","value":"dark"}"#,
            r#"{"type":"bulk_import"}"#,
            r#"{"type":"all_data_cleared"}"#,
        ];

        assert_eq!(actual, expected);
    }

    #[test]
    fn chat_changed_frame_carries_the_wire_tag() {
        let frame = SyncFrame::ChatChanged {
            chat: ChatRecord {
                id: "c1".to_string(),
                title: "t".to_string(),
                model: None,
                messages: Vec::new(),
                created_at: 1,
                updated_at: 2,
            },
        };
        let raw = serde_json::to_string(&frame).expect("serialize frame");
        assert!(raw.starts_with(r#"{"type":"chat_changed""#));
    }

    #[test]
    fn queue_item_round_trips_with_flattened_frame() {
        let item = SyncQueueItem {
            frame: SyncFrame::SettingChanged {
                key: "language".to_string(),
                value: serde_json::json!("fr"),
            },
            enqueued_at: now_millis(),
        };

        let raw = serde_json::to_string(&item).expect("serialize queue item");
        assert!(raw.contains(r#""type":"setting_changed""#));
        assert!(raw.contains(r#""enqueuedAt""#));
        let back: SyncQueueItem = serde_json::from_str(&raw).expect("deserialize queue item");
        assert_eq!(back, item);
    }

    #[test]
    fn connection_state_serialization_matches_status_contract() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Disconnected).expect("serialize"),
            "\"disconnected\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connecting).expect("serialize"),
            "\"connecting\""
        );
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connected).expect("serialize"),
            "\"connected\""
        );
    }
}
