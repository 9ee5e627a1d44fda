//! Core domain models and services for Parlor's local-first layer.
//!
//! This crate holds the three persisted record families (chats, settings,
//! boards), the local record store contract, the shared sync wire models,
//! and the backup/restore coordinator.

pub mod backup;
pub mod errors;
pub mod records;
pub mod store;
pub mod sync;
