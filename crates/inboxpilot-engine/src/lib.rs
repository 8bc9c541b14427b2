//! # inboxpilot-engine
//!
//! The orchestrator for inboxpilot.
//!
//! Drives the incremental ingestion pipeline: new rows appended to the
//! messenger store are fetched past the watermark, classified, routed to the
//! scheduling sinks, and committed by advancing the watermark, one record
//! at a time, one worker, in strictly increasing id order.
//!
//! ```text
//!  notify watcher ──(debounce+settle)──┐
//!                                      ├──► Engine::cycle
//!  poll timer ─────────────────────────┘      fetch_since → classify → route → save watermark
//! ```

pub mod engine;
pub mod error;
pub mod watcher;

pub use engine::{CycleStats, Engine, EngineConfig, Trigger, resolve_initial_watermark};
pub use error::{EngineError, EngineResult};
pub use watcher::{StoreWatcher, WatcherConfig};
