//! Backup snapshot schema and the backup/restore coordinator.

mod coordinator;
mod snapshot_model;

pub use coordinator::{
    BackupCoordinator, BackupDocument, ImportMode, ImportOptions, ImportResult, ProgressFn,
    SnapshotValidation,
};
pub use snapshot_model::{
    BackupInfo, BackupSnapshot, ItemCounts, SnapshotMetadata, VersionedSnapshot,
    BACKUP_FORMAT_VERSION,
};
