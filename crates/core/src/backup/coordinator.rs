//! Backup/restore coordinator over the local record store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backup::snapshot_model::{
    BackupInfo, BackupSnapshot, ItemCounts, SnapshotMetadata, VersionedSnapshot,
    BACKUP_FORMAT_VERSION,
};
use crate::errors::{Result, StoreError};
use crate::records::{now_millis, BoardRecord, ChatRecord, RecordFamily};
use crate::store::LocalStore;

/// Progress milestone reported once replace-mode clearing completes.
const CLEAR_PROGRESS: u8 = 10;

/// Cumulative progress span per family, in import order.
const CHATS_PROGRESS: (u8, u8) = (10, 40);
const SETTINGS_PROGRESS: (u8, u8) = (40, 70);
const BOARDS_PROGRESS: (u8, u8) = (70, 95);

/// Progress observer: cumulative percent plus a human-readable label.
pub type ProgressFn = dyn Fn(u8, &str) + Send + Sync;

/// Conflict policy for one import operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Upsert imported records into the existing store.
    #[default]
    Merge,
    /// Clear every record family before writing imported records.
    Replace,
}

/// Options for one import operation. Not persisted.
#[derive(Default)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub skip_chats: bool,
    pub skip_settings: bool,
    pub skip_boards: bool,
    pub on_progress: Option<Box<ProgressFn>>,
}

impl ImportOptions {
    fn report(&self, percent: u8, label: &str) {
        if let Some(on_progress) = self.on_progress.as_ref() {
            on_progress(percent, label);
        }
    }
}

/// Itemized outcome of one import operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub imported: ItemCounts,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportResult {
    fn new() -> Self {
        Self {
            success: true,
            imported: ItemCounts::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Structural validation outcome for a candidate backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// A serialized backup ready for delivery (file download, upload, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDocument {
    pub filename: String,
    pub contents: String,
}

/// Produces complete point-in-time snapshots of the local record store and
/// restores them under an explicit conflict policy.
///
/// The coordinator only talks to the local store; it never touches the
/// network. It does not lock out concurrent live mutations; callers are
/// expected to serialize an in-progress import against normal edits at the
/// UI level.
pub struct BackupCoordinator {
    store: Arc<dyn LocalStore>,
}

impl BackupCoordinator {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Read all three record families into a self-contained snapshot.
    ///
    /// Pure read; store errors propagate to the caller.
    pub async fn export_snapshot(&self, user: Option<&str>) -> Result<BackupSnapshot> {
        let chats = self.store.list_chats().await?;
        let settings = self.store.list_settings().await?;
        let boards = self.store.list_boards().await?;

        let total_size = approximate_size(&chats, &settings, &boards)?;
        let metadata = SnapshotMetadata {
            total_size,
            item_counts: ItemCounts {
                chats: chats.len(),
                settings: settings.len(),
                boards: boards.len(),
            },
        };
        debug!(
            "[Backup] Exported snapshot: {} chats, {} settings, {} boards (~{} bytes)",
            metadata.item_counts.chats,
            metadata.item_counts.settings,
            metadata.item_counts.boards,
            metadata.total_size
        );

        Ok(BackupSnapshot {
            version: BACKUP_FORMAT_VERSION.to_string(),
            timestamp: now_millis(),
            user: user.map(str::to_string),
            chats,
            settings,
            boards,
            metadata,
        })
    }

    /// Serialize a fresh snapshot into a single transportable document.
    ///
    /// Delivery is the caller's concern; for the same store state the
    /// serialized collections are byte-for-byte identical across calls.
    pub async fn export_to_document(
        &self,
        filename: Option<&str>,
        user: Option<&str>,
    ) -> Result<BackupDocument> {
        let snapshot = self.export_snapshot(user).await?;
        let contents = serde_json::to_string_pretty(&snapshot)?;
        let filename = match filename {
            Some(name) => name.to_string(),
            None => default_backup_filename(snapshot.timestamp),
        };
        Ok(BackupDocument { filename, contents })
    }

    /// Snapshot summary without materializing record payloads into the
    /// result. The store is still read in full to compute counts and size.
    pub async fn backup_info(&self) -> Result<BackupInfo> {
        let snapshot = self.export_snapshot(None).await?;
        Ok(BackupInfo {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            metadata: snapshot.metadata,
        })
    }

    /// Structural validation only: required top-level fields and container
    /// types. Per-record schemas are not checked; a structurally valid but
    /// semantically empty document is valid.
    pub fn validate_snapshot(candidate: &Value) -> SnapshotValidation {
        let mut errors = Vec::new();

        let Some(object) = candidate.as_object() else {
            return SnapshotValidation {
                valid: false,
                errors: vec!["Backup document must be a JSON object".to_string()],
            };
        };

        match object.get("version") {
            Some(Value::String(_)) => {}
            Some(_) => errors.push("Field 'version' must be a string".to_string()),
            None => errors.push("Missing required field 'version'".to_string()),
        }
        match object.get("chats") {
            Some(Value::Array(_)) => {}
            Some(_) => errors.push("Field 'chats' must be a sequence".to_string()),
            None => errors.push("Missing required field 'chats'".to_string()),
        }
        match object.get("settings") {
            Some(Value::Object(_)) => {}
            Some(_) => errors.push("Field 'settings' must be a map".to_string()),
            None => errors.push("Missing required field 'settings'".to_string()),
        }
        match object.get("boards") {
            Some(Value::Array(_)) => {}
            Some(_) => errors.push("Field 'boards' must be a sequence".to_string()),
            None => errors.push("Missing required field 'boards'".to_string()),
        }

        SnapshotValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Parse, validate and import a serialized backup document.
    ///
    /// Any parse/validation failure short-circuits with `success=false`
    /// before a single store write.
    pub async fn import_from_document(&self, raw: &str, options: ImportOptions) -> ImportResult {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                return Self::rejected(
                    &options,
                    vec![format!("Backup document is not valid JSON: {}", err)],
                );
            }
        };

        let validation = Self::validate_snapshot(&value);
        if !validation.valid {
            return Self::rejected(&options, validation.errors);
        }

        let snapshot = match VersionedSnapshot::from_value(value) {
            Ok(versioned) => versioned.into_current(),
            Err(err) => {
                return Self::rejected(
                    &options,
                    vec![format!("Backup document could not be decoded: {}", err)],
                );
            }
        };

        self.import_snapshot(snapshot, options).await
    }

    /// Apply a snapshot to the local store under the chosen policy.
    ///
    /// Replace mode clears all three families before writing anything; a
    /// clear failure aborts the whole import. A failure inside one family
    /// is recorded but does not stop the remaining families: the optional
    /// clear already happened, so a partial import beats an abort that
    /// would leave the store emptier than either the old or new state.
    /// The final progress report `(100, "Import complete")` always fires.
    pub async fn import_snapshot(
        &self,
        snapshot: BackupSnapshot,
        options: ImportOptions,
    ) -> ImportResult {
        let mut result = ImportResult::new();

        if options.mode == ImportMode::Replace {
            if let Err(err) = self.clear_all_families().await {
                warn!("[Backup] Replace-mode clear failed: {}", err);
                result.success = false;
                result
                    .errors
                    .push(format!("Failed to clear existing data: {}", err));
                options.report(100, "Import complete");
                return result;
            }
            options.report(CLEAR_PROGRESS, "Cleared existing data");
        }

        if snapshot.version != BACKUP_FORMAT_VERSION {
            result.warnings.push(format!(
                "Backup version '{}' differs from current '{}'; importing anyway",
                snapshot.version, BACKUP_FORMAT_VERSION
            ));
        }

        if !options.skip_chats {
            let (written, error) = self.import_chats(&snapshot.chats, &options).await;
            result.imported.chats = written;
            if let Some(err) = error {
                result.success = false;
                result
                    .errors
                    .push(family_failure(RecordFamily::Chats, written, &err));
            }
        }

        if !options.skip_settings {
            let (written, error) = self.import_settings(&snapshot.settings, &options).await;
            result.imported.settings = written;
            if let Some(err) = error {
                result.success = false;
                result
                    .errors
                    .push(family_failure(RecordFamily::Settings, written, &err));
            }
        }

        if !options.skip_boards {
            let (written, error) = self.import_boards(&snapshot.boards, &options).await;
            result.imported.boards = written;
            if let Some(err) = error {
                result.success = false;
                result
                    .errors
                    .push(family_failure(RecordFamily::Boards, written, &err));
            }
        }

        debug!(
            "[Backup] Import finished: success={} chats={} settings={} boards={}",
            result.success, result.imported.chats, result.imported.settings, result.imported.boards
        );
        options.report(100, "Import complete");
        result
    }

    fn rejected(options: &ImportOptions, errors: Vec<String>) -> ImportResult {
        options.report(100, "Import complete");
        ImportResult {
            success: false,
            imported: ItemCounts::default(),
            errors,
            warnings: Vec::new(),
        }
    }

    async fn clear_all_families(&self) -> std::result::Result<(), StoreError> {
        self.store.clear_chats().await?;
        self.store.clear_settings().await?;
        self.store.clear_boards().await?;
        Ok(())
    }

    async fn import_chats(
        &self,
        chats: &[ChatRecord],
        options: &ImportOptions,
    ) -> (usize, Option<StoreError>) {
        let total = chats.len();
        let mut written = 0;
        for chat in chats {
            if let Err(err) = self.store.put_chat(chat.clone()).await {
                return (written, Some(err));
            }
            written += 1;
            options.report(
                scaled_progress(CHATS_PROGRESS, written, total),
                &format!("Importing chats ({}/{})", written, total),
            );
        }
        (written, None)
    }

    async fn import_settings(
        &self,
        settings: &BTreeMap<String, Value>,
        options: &ImportOptions,
    ) -> (usize, Option<StoreError>) {
        let total = settings.len();
        let mut written = 0;
        for (key, value) in settings {
            if let Err(err) = self.store.put_setting(key, value.clone()).await {
                return (written, Some(err));
            }
            written += 1;
            options.report(
                scaled_progress(SETTINGS_PROGRESS, written, total),
                &format!("Importing settings ({}/{})", written, total),
            );
        }
        (written, None)
    }

    async fn import_boards(
        &self,
        boards: &[BoardRecord],
        options: &ImportOptions,
    ) -> (usize, Option<StoreError>) {
        let total = boards.len();
        let mut written = 0;
        for board in boards {
            if let Err(err) = self.store.put_board(board.clone()).await {
                return (written, Some(err));
            }
            written += 1;
            options.report(
                scaled_progress(BOARDS_PROGRESS, written, total),
                &format!("Importing boards ({}/{})", written, total),
            );
        }
        (written, None)
    }
}

fn family_failure(family: RecordFamily, written: usize, err: &StoreError) -> String {
    format!(
        "Import of {} failed after {} records: {}",
        family, written, err
    )
}

/// Cumulative percent for `done` of `total` records inside a family span.
fn scaled_progress(range: (u8, u8), done: usize, total: usize) -> u8 {
    let (start, end) = range;
    if total == 0 {
        return end;
    }
    let span = (end - start) as usize;
    start + (span * done / total) as u8
}

fn approximate_size(
    chats: &[ChatRecord],
    settings: &BTreeMap<String, Value>,
    boards: &[BoardRecord],
) -> Result<u64> {
    let size = serde_json::to_vec(chats)?.len()
        + serde_json::to_vec(settings)?.len()
        + serde_json::to_vec(boards)?.len();
    Ok(size as u64)
}

fn default_backup_filename(timestamp: i64) -> String {
    let stamp = Utc
        .timestamp_millis_opt(timestamp)
        .single()
        .unwrap_or_else(Utc::now);
    format!("parlor-backup-{}.json", stamp.format("%Y%m%d-%H%M%S"))
}
