//! # inboxpilot-store
//!
//! Storage layer for inboxpilot.
//!
//! Provides read-only access to the messenger's append-only SQLite message
//! log and durable persistence for the pipeline's watermark (the id of the
//! last message whose dispatch was attempted).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  MessageStore   (fetch_since, seeding)       │
//! │  WatermarkStore (load / atomic save)         │
//! ├──────────────────────────────────────────────┤
//! │  Database (rusqlite read-only, busy timeout) │
//! │  watermark file (decimal text, temp+rename)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use inboxpilot_store::{Database, FileWatermarkStore, MessageStore, WatermarkStore};
//!
//! let db = Database::open_read_only("messenger.udb")?;
//! let messages = MessageStore::new(db);
//! let watermark = FileWatermarkStore::new("last_processed");
//! let new = messages.fetch_since(watermark.load()?.unwrap_or(0)).await;
//! ```

pub mod db;
pub mod error;
pub mod messages;
pub mod watermark;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use messages::{MessageStore, RawMessage};
pub use watermark::{FileWatermarkStore, WatermarkStore};
