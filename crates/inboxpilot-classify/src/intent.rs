//! Classified intent types.
//!
//! The model replies with a loose JSON object ([`RawClassification`], all
//! strings); this module turns that into the typed [`Intent`] sum type that
//! the router matches on exhaustively. Adding an intent kind is a
//! compile-time-checked change: every `match` on [`Intent`] must handle it.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Typed intents
// ---------------------------------------------------------------------------

/// Priority assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse a model-supplied priority label. Unknown labels degrade to
    /// `Medium`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// A message classified as a scheduled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarIntent {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    /// Event date. `None` when the model labeled the message "calendar"
    /// without resolving a date; the router decides what to do with those.
    pub date: Option<NaiveDate>,
    /// Event start time; the router defaults this to 09:00 when absent.
    pub time: Option<NaiveTime>,
    pub category: String,
}

/// A message classified as a loose task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoIntent {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    /// Due date, dispatched as midnight UTC when present.
    pub deadline: Option<NaiveDate>,
    pub category: String,
}

/// A purely informational message; no external call is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoIntent {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub category: String,
}

/// The classifier's verdict for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a calendar event.
    Calendar(CalendarIntent),
    /// Create a task.
    Todo(TodoIntent),
    /// Log only.
    Info(InfoIntent),
}

impl Intent {
    /// The intent's title, for logging.
    pub fn title(&self) -> &str {
        match self {
            Self::Calendar(c) => &c.title,
            Self::Todo(t) => &t.title,
            Self::Info(i) => &i.title,
        }
    }

    /// The intent's priority.
    pub fn priority(&self) -> Priority {
        match self {
            Self::Calendar(c) => c.priority,
            Self::Todo(t) => t.priority,
            Self::Info(i) => i.priority,
        }
    }

    /// Short kind label, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Calendar(_) => "calendar",
            Self::Todo(_) => "todo",
            Self::Info(_) => "info",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire-level classification object
// ---------------------------------------------------------------------------

/// The JSON object the model is instructed to reply with.
///
/// Every field is a plain string on the wire; dates and times are validated
/// during conversion so a hallucinated value degrades to `None` instead of
/// failing the whole classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawClassification {
    /// Intent kind: `"calendar"`, `"todo"`, or `"info"`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Event date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    /// Event start time, `HH:MM`.
    #[serde(default)]
    pub time: Option<String>,
    /// Due date, `YYYY-MM-DD`.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Parse a `YYYY-MM-DD` field, degrading blank or malformed values to `None`.
fn parse_date(field: &'static str, value: &Option<String>) -> Option<NaiveDate> {
    let raw = value.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            debug!(field, value = raw, "discarding unparsable date field");
            None
        }
    }
}

/// Parse an `HH:MM` field, degrading blank or malformed values to `None`.
fn parse_time(value: &Option<String>) -> Option<NaiveTime> {
    let raw = value.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            debug!(value = raw, "discarding unparsable time field");
            None
        }
    }
}

impl RawClassification {
    /// Convert the wire object into a typed [`Intent`], applying the
    /// date-dominance rule: a "todo" carrying any resolved date or deadline
    /// becomes a calendar intent, because a record with a due date is
    /// operationally a scheduled event, whatever the model labeled it.
    pub fn into_intent(self) -> Intent {
        let priority = Priority::parse(self.priority.as_deref().unwrap_or(""));
        let title = self.title.clone().unwrap_or_default();
        let description = self.description.clone().unwrap_or_default();
        let category = self
            .category
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "other".to_owned());

        let date = parse_date("date", &self.date);
        let deadline = parse_date("deadline", &self.deadline);
        let time = parse_time(&self.time);

        match self.kind.trim().to_ascii_lowercase().as_str() {
            "todo" if date.is_some() || deadline.is_some() => {
                debug!(title = %title, "date evidence on todo, promoting to calendar");
                Intent::Calendar(CalendarIntent {
                    priority,
                    title,
                    description,
                    date: date.or(deadline),
                    time,
                    category,
                })
            }
            "todo" => Intent::Todo(TodoIntent {
                priority,
                title,
                description,
                deadline,
                category,
            }),
            "info" => Intent::Info(InfoIntent {
                priority,
                title,
                description,
                category,
            }),
            // "calendar", and anything unrecognized: the rubric biases toward
            // calendar, so unknown labels land there too.
            _ => Intent::Calendar(CalendarIntent {
                priority,
                title,
                description,
                date,
                time,
                category,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate to at most `max` characters, not bytes (message titles and
/// bodies are routinely CJK text).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
