//! Offline-durable sync client for Parlor's local-first layer.
//!
//! Keeps a best-effort live mirror of local mutations on a remote service:
//! mutations are transmitted immediately while connected, queued durably
//! while offline, and replayed in order once connectivity returns.
//! Connectivity and remote-change notifications are published on a typed
//! event bus.

pub mod client;
pub mod error;
pub mod events;
pub mod persist;
pub mod queue;
pub mod remote;
pub mod transport;

pub use client::{SendOutcome, SyncClient, SyncClientConfig};
pub use error::{Result, SyncError};
pub use events::{EventBus, SubscriptionToken, SyncEvent, SyncEventKind};
pub use persist::{FileKeyValueStore, KeyValuePersistence, MemoryKeyValueStore, PersistenceError};
pub use queue::OfflineQueue;
pub use remote::RemoteService;
pub use transport::{FrameSink, FrameStream, Transport};
