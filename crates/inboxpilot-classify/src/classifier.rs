//! Message-to-intent classification.
//!
//! [`LlmClassifier`] renders a fixed instruction template around the message,
//! submits it at near-deterministic temperature, and recovers a
//! [`RawClassification`] from the reply in two stages: parse the whole reply,
//! then the substring between the first `{` and the last `}` (models love to
//! wrap JSON in prose or code fences). Anything still unparsable, and any
//! transport failure, collapses into a conservative fallback intent:
//! a medium-priority calendar entry for today at 09:00. Missing a real
//! deadline costs more than a spurious calendar entry, so failures
//! over-schedule rather than under-schedule.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, warn};

use crate::error::{ClassifyError, ClassifyResult};
use crate::intent::{CalendarIntent, Intent, Priority, RawClassification, truncate_chars};
use crate::llm::LlmClient;

/// Sampling temperature for classification, near-deterministic.
const CLASSIFY_TEMPERATURE: f64 = 0.1;

/// Max characters of the original title carried into the fallback intent.
const FALLBACK_TITLE_CHARS: usize = 50;

/// Max characters of the original content carried into the fallback intent.
const FALLBACK_DESCRIPTION_CHARS: usize = 100;

/// System instruction demanding JSON-only output.
const SYSTEM_PROMPT: &str = "You are a classifier that replies with a single JSON object and \
     nothing else. Classify workplace messages with a calendar-first bias.";

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Classification seam used by the orchestrator.
///
/// Infallible by contract: implementations must map every failure to a
/// well-formed [`Intent`] rather than propagate it into the poll cycle.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify one message.
    async fn classify(&self, content: &str, sender: &str, title: &str) -> Intent;
}

// ---------------------------------------------------------------------------
// LLM-backed implementation
// ---------------------------------------------------------------------------

/// Classifier backed by an external chat-completion model.
pub struct LlmClassifier {
    client: LlmClient,
}

impl LlmClassifier {
    /// Create a classifier over the given client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    async fn classify_inner(
        &self,
        content: &str,
        sender: &str,
        title: &str,
        today: NaiveDate,
    ) -> ClassifyResult<Intent> {
        let prompt = render_prompt(content, sender, title, today);
        let reply = self
            .client
            .complete(SYSTEM_PROMPT, &prompt, CLASSIFY_TEMPERATURE)
            .await?;

        debug!(reply_len = reply.len(), "model reply received");

        let raw = parse_reply(&reply)?;
        Ok(raw.into_intent())
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, content: &str, sender: &str, title: &str) -> Intent {
        let today = chrono::Local::now().date_naive();
        match self.classify_inner(content, sender, title, today).await {
            Ok(intent) => {
                info!(kind = intent.kind(), title = %intent.title(), "message classified");
                intent
            }
            Err(e) => {
                warn!(error = %e, title, "classification failed, using fallback intent");
                fallback_intent(title, content, today)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

/// Render the classification instruction for one message.
///
/// Relative-date anchors (today, tomorrow, next Monday) are computed per
/// call so the rubric's examples always resolve against the current date.
pub fn render_prompt(content: &str, sender: &str, title: &str, today: NaiveDate) -> String {
    let tomorrow = today + Duration::days(1);
    let next_monday = today + Duration::days(7 - i64::from(today.weekday().num_days_from_monday()));
    let weekday = today.format("%A");

    format!(
        r#"The following is a message received through a workplace messenger.
Extract any schedule or task from it.

Sender: {sender}
Title: {title}
Content: {content}

Classification priority:
1. CALENDAR first: any mention of a date, time, or activity at a specific moment is "calendar".
2. Meetings, events, classes, activities, gatherings, timetables = "calendar".
3. Assignments or submissions with a deadline = "calendar" (the deadline is the schedule).
4. Things that only need an acknowledgement, reply, or preparation = "todo".
5. Announcements and notices with nothing to do = "info".

Reply with JSON only, in exactly this shape:
{{
    "type": "calendar|todo|info",
    "priority": "high|medium|low",
    "title": "short title",
    "description": "details",
    "date": "YYYY-MM-DD",
    "time": "HH:MM",
    "deadline": "YYYY-MM-DD",
    "category": "meeting|class|event|assignment|other"
}}

Date resolution rules (today is {today}, a {weekday}):
- "today" = {today}
- "tomorrow" = {tomorrow}
- "next Monday" = {next_monday}
- Times: "2 pm" = 14:00, "9:30" = 09:30
- Omit "date", "time" or "deadline" entirely when the message gives none.

Important: if a date or time is mentioned at all, classify as "calendar"!"#
    )
}

// ---------------------------------------------------------------------------
// Reply recovery
// ---------------------------------------------------------------------------

/// Parse the model reply into a [`RawClassification`].
///
/// Stage one parses the whole reply; stage two retries on the substring from
/// the first `{` to the last `}`.
pub fn parse_reply(reply: &str) -> ClassifyResult<RawClassification> {
    if let Ok(raw) = serde_json::from_str::<RawClassification>(reply) {
        return Ok(raw);
    }

    let start = reply.find('{');
    let end = reply.rfind('}');
    if let (Some(start), Some(end)) = (start, end)
        && start < end
    {
        let candidate = &reply[start..=end];
        debug!("full parse failed, retrying on embedded json object");
        return serde_json::from_str::<RawClassification>(candidate).map_err(|e| {
            ClassifyError::UnparsableReply {
                reason: format!("embedded object is not a classification: {e}"),
            }
        });
    }

    Err(ClassifyError::UnparsableReply {
        reason: "no json object found in reply".into(),
    })
}

/// The conservative default produced when classification fails outright.
pub fn fallback_intent(title: &str, content: &str, today: NaiveDate) -> Intent {
    let title = title.trim();
    let content = content.trim();

    Intent::Calendar(CalendarIntent {
        priority: Priority::Medium,
        title: if title.is_empty() {
            "Message".to_owned()
        } else {
            truncate_chars(title, FALLBACK_TITLE_CHARS)
        },
        description: if content.is_empty() {
            "No content".to_owned()
        } else {
            truncate_chars(content, FALLBACK_DESCRIPTION_CHARS)
        },
        date: Some(today),
        time: NaiveTime::from_hms_opt(9, 0, 0),
        category: "other".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
