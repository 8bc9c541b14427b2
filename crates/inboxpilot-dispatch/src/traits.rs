//! Sink seams between the router and the external scheduling services.
//!
//! The router depends only on these traits; production wires in the Google
//! REST sinks, tests substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::error::DispatchResult;

/// A calendar event ready for creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    /// Event start, in the pipeline's fixed local offset.
    pub start: DateTime<FixedOffset>,
    /// Event end (start + 1 hour).
    pub end: DateTime<FixedOffset>,
    /// Priority marker; sinks map this to their own accent (color, flag...).
    pub high_priority: bool,
}

/// A task ready for creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub notes: String,
    /// Due timestamp, midnight UTC on the deadline date.
    pub due: Option<DateTime<Utc>>,
}

/// Something that can create calendar events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Create one event. Only success/failure is consumed from the service.
    async fn create_event(&self, event: &NewEvent) -> DispatchResult<()>;
}

/// Something that can create tasks.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Create one task. Only success/failure is consumed from the service.
    async fn create_task(&self, task: &NewTask) -> DispatchResult<()>;
}
