//! Intent routing.
//!
//! One classified intent, one dispatch decision: calendar intents with a
//! date become events, todos become tasks, informational intents are logged
//! only. The match over [`Intent`] is exhaustive, so a new intent kind
//! cannot be added without deciding its routing here.
//!
//! Sink failures are caught at this boundary and reported as a
//! [`DispatchOutcome`], never an error, the orchestrator advances the
//! watermark regardless of dispatch success, and the outcome feeds the cycle
//! stats.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use tracing::{error, info, warn};

use inboxpilot_classify::{Intent, Priority};

use crate::traits::{EventSink, NewEvent, NewTask, TaskSink};

/// Event start time used when the classifier resolved a date but no time.
fn default_event_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Fixed event duration.
const EVENT_DURATION_HOURS: i64 = 1;

/// What happened to one intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A calendar event was created.
    EventCreated,
    /// A task was created.
    TaskCreated,
    /// Informational intent, nothing dispatched.
    Informational,
    /// Calendar intent without a date: deliberately not dispatched.
    SkippedDateless,
    /// The sink rejected or could not complete the call.
    Failed { reason: String },
}

/// Routes classified intents to the configured sinks.
pub struct Router {
    events: Arc<dyn EventSink>,
    tasks: Arc<dyn TaskSink>,
    /// Fixed local offset for event timestamps.
    offset: FixedOffset,
}

impl Router {
    /// Create a router over the given sinks.
    pub fn new(events: Arc<dyn EventSink>, tasks: Arc<dyn TaskSink>, offset: FixedOffset) -> Self {
        Self {
            events,
            tasks,
            offset,
        }
    }

    /// Dispatch one intent. Exactly one external call (or none, for info and
    /// dateless calendar intents); all failures are absorbed into the
    /// outcome.
    pub async fn route(&self, intent: &Intent) -> DispatchOutcome {
        match intent {
            Intent::Calendar(cal) => {
                let Some(date) = cal.date else {
                    // Inventing a date here would file confidently-wrong
                    // events; surface the record in the log instead.
                    warn!(title = %cal.title, "calendar intent without a date, skipping dispatch");
                    return DispatchOutcome::SkippedDateless;
                };

                let Some(start) = self.local_start(date, cal.time) else {
                    warn!(title = %cal.title, %date, "event start not representable, skipping");
                    return DispatchOutcome::SkippedDateless;
                };

                let event = NewEvent {
                    title: cal.title.clone(),
                    description: cal.description.clone(),
                    start,
                    end: start + Duration::hours(EVENT_DURATION_HOURS),
                    high_priority: cal.priority == Priority::High,
                };

                match self.events.create_event(&event).await {
                    Ok(()) => DispatchOutcome::EventCreated,
                    Err(e) => {
                        error!(title = %cal.title, error = %e, "event creation failed");
                        DispatchOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }

            Intent::Todo(todo) => {
                let task = NewTask {
                    title: todo.title.clone(),
                    notes: todo.description.clone(),
                    due: todo
                        .deadline
                        .map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
                };

                match self.tasks.create_task(&task).await {
                    Ok(()) => DispatchOutcome::TaskCreated,
                    Err(e) => {
                        error!(title = %todo.title, error = %e, "task creation failed");
                        DispatchOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                }
            }

            Intent::Info(info) => {
                info!(title = %info.title, category = %info.category, "informational message");
                DispatchOutcome::Informational
            }
        }
    }

    /// Combine date and (optional) time into a start timestamp in the
    /// configured offset.
    fn local_start(
        &self,
        date: chrono::NaiveDate,
        time: Option<NaiveTime>,
    ) -> Option<DateTime<FixedOffset>> {
        date.and_time(time.unwrap_or_else(default_event_time))
            .and_local_timezone(self.offset)
            .earliest()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    use inboxpilot_classify::{CalendarIntent, InfoIntent, TodoIntent};

    use crate::error::{DispatchError, DispatchResult};

    #[derive(Default)]
    struct RecordingSinks {
        events: Mutex<Vec<NewEvent>>,
        tasks: Mutex<Vec<NewTask>>,
        fail: bool,
    }

    #[async_trait]
    impl EventSink for RecordingSinks {
        async fn create_event(&self, event: &NewEvent) -> DispatchResult<()> {
            if self.fail {
                return Err(DispatchError::ApiError {
                    service: "calendar",
                    status: 403,
                    body: "quota".into(),
                });
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl TaskSink for RecordingSinks {
        async fn create_task(&self, task: &NewTask) -> DispatchResult<()> {
            if self.fail {
                return Err(DispatchError::ApiError {
                    service: "tasks",
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.tasks.lock().unwrap().push(task.clone());
            Ok(())
        }
    }

    fn router_with(fail: bool) -> (Arc<RecordingSinks>, Router) {
        let sinks = Arc::new(RecordingSinks {
            fail,
            ..Default::default()
        });
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let router = Router::new(sinks.clone(), sinks.clone(), offset);
        (sinks, router)
    }

    fn calendar(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Intent {
        Intent::Calendar(CalendarIntent {
            priority: Priority::High,
            title: "sports day".into(),
            description: "field".into(),
            date,
            time,
            category: "event".into(),
        })
    }

    #[tokio::test]
    async fn dated_calendar_creates_a_one_hour_event() {
        let (sinks, router) = router_with(false);
        let date = NaiveDate::from_ymd_opt(2025, 6, 3);
        let time = NaiveTime::from_hms_opt(14, 0, 0);

        let outcome = router.route(&calendar(date, time)).await;
        assert_eq!(outcome, DispatchOutcome::EventCreated);

        let events = sinks.events.lock().unwrap();
        let event = &events[0];
        assert_eq!(
            event.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            "2025-06-03T14:00:00+09:00"
        );
        assert_eq!(event.end - event.start, Duration::hours(1));
        assert!(event.high_priority);
    }

    #[tokio::test]
    async fn missing_time_defaults_to_nine_am() {
        let (sinks, router) = router_with(false);
        let date = NaiveDate::from_ymd_opt(2025, 6, 3);

        router.route(&calendar(date, None)).await;

        let events = sinks.events.lock().unwrap();
        assert_eq!(
            events[0].start.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            "2025-06-03T09:00:00+09:00"
        );
    }

    #[tokio::test]
    async fn dateless_calendar_is_skipped_not_dispatched() {
        let (sinks, router) = router_with(false);

        let outcome = router.route(&calendar(None, None)).await;
        assert_eq!(outcome, DispatchOutcome::SkippedDateless);
        assert!(sinks.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn todo_with_deadline_gets_midnight_utc_due() {
        let (sinks, router) = router_with(false);
        let intent = Intent::Todo(TodoIntent {
            priority: Priority::Medium,
            title: "submit form".into(),
            description: "field trip consent".into(),
            deadline: NaiveDate::from_ymd_opt(2025, 6, 5),
            category: "assignment".into(),
        });

        let outcome = router.route(&intent).await;
        assert_eq!(outcome, DispatchOutcome::TaskCreated);

        let tasks = sinks.tasks.lock().unwrap();
        let due = tasks[0].due.unwrap();
        assert_eq!(due.to_rfc3339(), "2025-06-05T00:00:00+00:00");
    }

    #[tokio::test]
    async fn info_makes_no_external_call() {
        let (sinks, router) = router_with(false);
        let intent = Intent::Info(InfoIntent {
            priority: Priority::Low,
            title: "newsletter".into(),
            description: String::new(),
            category: "other".into(),
        });

        let outcome = router.route(&intent).await;
        assert_eq!(outcome, DispatchOutcome::Informational);
        assert!(sinks.events.lock().unwrap().is_empty());
        assert!(sinks.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_is_absorbed_into_the_outcome() {
        let (_, router) = router_with(true);
        let date = NaiveDate::from_ymd_opt(2025, 6, 3);

        let outcome = router.route(&calendar(date, None)).await;
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    }
}
