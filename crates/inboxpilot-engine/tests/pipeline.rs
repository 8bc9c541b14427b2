//! End-to-end pipeline tests over an in-memory messenger store with fake
//! classifier and sinks: watermark monotonicity, at-most-once reads,
//! tombstone exclusion, and failure semantics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::watch;

use inboxpilot_classify::{CalendarIntent, InfoIntent, Intent, IntentClassifier, Priority, TodoIntent};
use inboxpilot_dispatch::{
    DispatchError, DispatchResult, EventSink, NewEvent, NewTask, Router, TaskSink,
};
use inboxpilot_engine::{Engine, EngineConfig, resolve_initial_watermark};
use inboxpilot_store::{Database, MessageStore, StoreResult, WatermarkStore};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn fixture_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db
}

async fn create_schema(db: &Database) {
    db.execute(|conn| {
        conn.execute_batch(
            "CREATE TABLE tbl_recv (
                MessageKey    INTEGER PRIMARY KEY,
                MessageBody   TEXT,
                MessageText   TEXT,
                Title         TEXT,
                Sender        TEXT,
                SenderKey     TEXT,
                MessageType   INTEGER,
                ReceiveDate   TEXT,
                ReferenceList TEXT,
                CCList        TEXT,
                FilePath      TEXT,
                IsUnRead      INTEGER DEFAULT 1,
                DeletedDate   TEXT
            )",
        )?;
        Ok(())
    })
    .await
    .unwrap();
}

async fn insert_message(db: &Database, id: i64, body: Option<&str>, received: &str, deleted: bool) {
    let body = body.map(str::to_string);
    let received = received.to_string();
    db.execute(move |conn| {
        conn.execute(
            "INSERT INTO tbl_recv (MessageKey, MessageBody, Title, Sender, ReceiveDate, DeletedDate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id,
                body,
                format!("title {id}"),
                "homeroom teacher",
                received,
                if deleted { Some("2025-05-29 10:00:00") } else { None }
            ],
        )?;
        Ok(())
    })
    .await
    .unwrap();
}

/// Classifier that derives the intent from content markers and records what
/// it saw.
#[derive(Default)]
struct MarkerClassifier {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl IntentClassifier for MarkerClassifier {
    async fn classify(&self, content: &str, _sender: &str, _title: &str) -> Intent {
        self.seen.lock().unwrap().push(content.to_owned());

        if content.contains("meeting") {
            Intent::Calendar(CalendarIntent {
                priority: Priority::Medium,
                title: content.to_owned(),
                description: String::new(),
                date: NaiveDate::from_ymd_opt(2025, 6, 3),
                time: None,
                category: "meeting".into(),
            })
        } else if content.contains("todo") {
            Intent::Todo(TodoIntent {
                priority: Priority::Medium,
                title: content.to_owned(),
                description: String::new(),
                deadline: None,
                category: "assignment".into(),
            })
        } else {
            Intent::Info(InfoIntent {
                priority: Priority::Low,
                title: content.to_owned(),
                description: String::new(),
                category: "other".into(),
            })
        }
    }
}

/// Sinks that record calls, optionally failing every one of them.
#[derive(Default)]
struct FakeSinks {
    events: Mutex<Vec<NewEvent>>,
    tasks: Mutex<Vec<NewTask>>,
    fail: bool,
}

#[async_trait]
impl EventSink for FakeSinks {
    async fn create_event(&self, event: &NewEvent) -> DispatchResult<()> {
        if self.fail {
            return Err(DispatchError::ApiError {
                service: "calendar",
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskSink for FakeSinks {
    async fn create_task(&self, task: &NewTask) -> DispatchResult<()> {
        if self.fail {
            return Err(DispatchError::ApiError {
                service: "tasks",
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.tasks.lock().unwrap().push(task.clone());
        Ok(())
    }
}

/// In-memory watermark store that records every save.
#[derive(Default)]
struct MemoryWatermark {
    current: Mutex<Option<i64>>,
    saves: Mutex<Vec<i64>>,
}

impl WatermarkStore for MemoryWatermark {
    fn load(&self) -> StoreResult<Option<i64>> {
        Ok(*self.current.lock().unwrap())
    }

    fn save(&self, id: i64) -> StoreResult<()> {
        *self.current.lock().unwrap() = Some(id);
        self.saves.lock().unwrap().push(id);
        Ok(())
    }
}

struct Harness {
    db: Database,
    engine: Arc<Engine>,
    classifier: Arc<MarkerClassifier>,
    sinks: Arc<FakeSinks>,
    watermarks: Arc<MemoryWatermark>,
    shutdown: watch::Receiver<bool>,
    shutdown_tx: watch::Sender<bool>,
}

async fn harness(initial_watermark: i64, fail_sinks: bool) -> Harness {
    let db = fixture_db();
    create_schema(&db).await;

    let classifier = Arc::new(MarkerClassifier::default());
    let sinks = Arc::new(FakeSinks {
        fail: fail_sinks,
        ..Default::default()
    });
    let watermarks = Arc::new(MemoryWatermark::default());
    let offset = chrono::FixedOffset::east_opt(9 * 3600).unwrap();

    let engine = Arc::new(Engine::new(
        MessageStore::new(db.clone()),
        watermarks.clone(),
        classifier.clone(),
        Router::new(sinks.clone(), sinks.clone(), offset),
        EngineConfig {
            poll_interval: Duration::from_secs(60),
            pace: Duration::ZERO,
        },
        initial_watermark,
    ));

    let (shutdown_tx, shutdown) = watch::channel(false);
    Harness {
        db,
        engine,
        classifier,
        sinks,
        watermarks,
        shutdown,
        shutdown_tx,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_flow_through_classify_route_persist() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, Some("staff meeting friday"), "2025-05-29 09:00:00", false).await;
    insert_message(&h.db, 2, Some("todo: reply to survey"), "2025-05-29 09:05:00", false).await;
    insert_message(&h.db, 3, Some("newsletter"), "2025-05-29 09:10:00", false).await;

    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.classified, 3);
    assert_eq!(stats.events_created, 1);
    assert_eq!(stats.tasks_created, 1);
    assert_eq!(stats.informational, 1);
    assert_eq!(h.sinks.events.lock().unwrap().len(), 1);
    assert_eq!(h.sinks.tasks.lock().unwrap().len(), 1);
    assert_eq!(h.engine.watermark().await, 3);
}

#[tokio::test]
async fn watermark_advances_once_per_record_in_order() {
    let h = harness(0, false).await;
    insert_message(&h.db, 5, Some("meeting"), "2025-05-29 09:00:00", false).await;
    insert_message(&h.db, 8, Some("notice"), "2025-05-29 09:05:00", false).await;
    insert_message(&h.db, 9, Some("meeting"), "2025-05-29 09:10:00", false).await;

    h.engine.cycle(&h.shutdown).await;

    let saves = h.watermarks.saves.lock().unwrap().clone();
    assert_eq!(saves, vec![5, 8, 9]);
    assert!(saves.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn second_cycle_reads_nothing_new() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, Some("meeting"), "2025-05-29 09:00:00", false).await;
    insert_message(&h.db, 2, Some("notice"), "2025-05-29 09:05:00", false).await;

    let first = h.engine.cycle(&h.shutdown).await;
    assert_eq!(first.fetched, 2);

    // At-most-once: everything at or below the watermark is never re-read.
    let second = h.engine.cycle(&h.shutdown).await;
    assert_eq!(second.fetched, 0);
    assert_eq!(h.classifier.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn rows_appended_between_cycles_are_picked_up() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, Some("meeting one"), "2025-05-29 09:00:00", false).await;
    h.engine.cycle(&h.shutdown).await;

    insert_message(&h.db, 2, Some("meeting two"), "2025-05-29 10:00:00", false).await;
    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.fetched, 1);
    let seen = h.classifier.seen.lock().unwrap().clone();
    assert_eq!(seen, vec!["meeting one".to_string(), "meeting two".to_string()]);
}

#[tokio::test]
async fn tombstoned_rows_are_invisible_end_to_end() {
    let h = harness(9, false).await;
    insert_message(&h.db, 10, Some("meeting"), "2025-05-29 09:00:00", false).await;
    insert_message(&h.db, 11, Some("meeting deleted"), "2025-05-29 09:05:00", true).await;
    insert_message(&h.db, 12, Some("notice"), "2025-05-29 09:10:00", false).await;

    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.fetched, 2);
    let seen = h.classifier.seen.lock().unwrap().clone();
    assert!(!seen.iter().any(|c| c.contains("deleted")));
    // The watermark still passes over the tombstoned id.
    assert_eq!(h.engine.watermark().await, 12);
}

#[tokio::test]
async fn dispatch_failure_still_advances_the_watermark() {
    let h = harness(0, true).await;
    insert_message(&h.db, 1, Some("meeting"), "2025-05-29 09:00:00", false).await;
    insert_message(&h.db, 2, Some("todo: collect forms"), "2025-05-29 09:05:00", false).await;

    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.dispatch_failures, 2);
    assert_eq!(h.engine.watermark().await, 2);
    assert_eq!(h.watermarks.saves.lock().unwrap().clone(), vec![1, 2]);

    // No redelivery: the failed records are gone for good.
    let second = h.engine.cycle(&h.shutdown).await;
    assert_eq!(second.fetched, 0);
}

#[tokio::test]
async fn blank_records_advance_the_watermark_without_classification() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, None, "2025-05-29 09:00:00", false).await;

    // A row whose body is NULL still has a non-blank fixture title, so blank
    // everything explicitly.
    h.db.execute(|conn| {
        conn.execute("UPDATE tbl_recv SET Title = NULL, Sender = NULL", [])?;
        Ok(())
    })
    .await
    .unwrap();

    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.skipped_blank, 1);
    assert_eq!(stats.classified, 0);
    assert_eq!(h.engine.watermark().await, 1);
}

#[tokio::test]
async fn shutdown_before_a_record_leaves_it_for_the_next_run() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, Some("meeting"), "2025-05-29 09:00:00", false).await;

    h.shutdown_tx.send(true).unwrap();
    let stats = h.engine.cycle(&h.shutdown).await;

    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.classified, 0);
    assert_eq!(h.engine.watermark().await, 0);
}

#[tokio::test]
async fn missing_watermark_seeds_past_prior_days() {
    let h = harness(0, false).await;
    // Records exist only for a long-gone day: the seed must skip them all.
    insert_message(&h.db, 41, Some("old meeting"), "2020-01-06 09:00:00", false).await;
    insert_message(&h.db, 42, Some("old notice"), "2020-01-06 10:00:00", false).await;

    let store = MessageStore::new(h.db.clone());
    let seed = resolve_initial_watermark(&store, h.watermarks.as_ref()).await;
    assert_eq!(seed, 42);
}

#[tokio::test]
async fn todays_records_are_included_by_the_seed() {
    let h = harness(0, false).await;
    let today = chrono::Local::now().date_naive();
    let stamp = format!("{} 09:00:00", today.format("%Y-%m-%d"));
    insert_message(&h.db, 41, Some("old"), "2020-01-06 09:00:00", false).await;
    insert_message(&h.db, 50, Some("today's meeting"), &stamp, false).await;

    let store = MessageStore::new(h.db.clone());
    let seed = resolve_initial_watermark(&store, h.watermarks.as_ref()).await;
    assert_eq!(seed, 49);
}

#[tokio::test]
async fn persisted_watermark_wins_over_seeding() {
    let h = harness(0, false).await;
    insert_message(&h.db, 1, Some("meeting"), "2025-05-29 09:00:00", false).await;
    h.watermarks.save(7).unwrap();

    let store = MessageStore::new(h.db.clone());
    let seed = resolve_initial_watermark(&store, h.watermarks.as_ref()).await;
    assert_eq!(seed, 7);
}
