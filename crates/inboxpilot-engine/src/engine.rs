//! The poll/react orchestrator.
//!
//! Both trigger sources (the debounced store watcher and the periodic
//! timer) funnel into one consumer loop, and the cycle itself runs under
//! the watermark lock, so two cycles can never read the same unadvanced
//! watermark and double-dispatch. Each record is one atomic unit of work:
//! classify, route, persist the watermark, in that order, with the
//! watermark advancing after the dispatch attempt whether or not the
//! dispatch succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use inboxpilot_classify::{IntentClassifier, Priority};
use inboxpilot_dispatch::{DispatchOutcome, Router};
use inboxpilot_store::{MessageStore, RawMessage, WatermarkStore};

/// Why a cycle is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The messenger database file changed.
    StoreChanged,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Fixed polling interval (the timer trigger).
    pub poll_interval: Duration,
    /// Delay between records within a cycle; external API rate-limit
    /// courtesy, not a correctness requirement.
    pub pace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            pace: Duration::from_secs(1),
        }
    }
}

/// Counters for one cycle, logged after each run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Records returned by `fetch_since`.
    pub fetched: usize,
    /// Records classified and routed.
    pub classified: usize,
    /// Calendar events created.
    pub events_created: usize,
    /// Tasks created.
    pub tasks_created: usize,
    /// Informational messages (no external call).
    pub informational: usize,
    /// Calendar intents skipped for lack of a date.
    pub skipped_dateless: usize,
    /// Records with no usable content (watermark still advanced).
    pub skipped_blank: usize,
    /// Dispatch attempts the sink rejected (watermark still advanced).
    pub dispatch_failures: usize,
}

/// The single-worker ingestion engine.
pub struct Engine {
    messages: MessageStore,
    watermark_store: Arc<dyn WatermarkStore>,
    classifier: Arc<dyn IntentClassifier>,
    router: Router,
    config: EngineConfig,
    /// In-memory watermark. The lock is held for a whole cycle, which is
    /// what serializes notification-triggered and timer-triggered runs.
    watermark: tokio::sync::Mutex<i64>,
}

impl Engine {
    /// Create an engine starting from `initial_watermark` (see
    /// [`resolve_initial_watermark`]).
    pub fn new(
        messages: MessageStore,
        watermark_store: Arc<dyn WatermarkStore>,
        classifier: Arc<dyn IntentClassifier>,
        router: Router,
        config: EngineConfig,
        initial_watermark: i64,
    ) -> Self {
        Self {
            messages,
            watermark_store,
            classifier,
            router,
            config,
            watermark: tokio::sync::Mutex::new(initial_watermark),
        }
    }

    /// The current in-memory watermark.
    pub async fn watermark(&self) -> i64 {
        *self.watermark.lock().await
    }

    /// Drive the engine until `shutdown` flips to `true`.
    ///
    /// Runs one cycle immediately (first-run catch-up), then reacts to
    /// store-change triggers and the poll timer. Shutdown is honored
    /// between records: the in-flight record finishes its dispatch attempt
    /// and watermark write first.
    pub async fn run(
        self: Arc<Self>,
        mut triggers: mpsc::Receiver<Trigger>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "engine started"
        );

        self.cycle(&shutdown).await;

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    debug!("poll timer fired");
                    self.cycle(&shutdown).await;
                }
                trigger = triggers.recv() => {
                    match trigger {
                        Some(t) => {
                            debug!(trigger = ?t, "change trigger fired");
                            self.cycle(&shutdown).await;
                        }
                        None => break,
                    }
                }
            }
        }

        info!("engine stopped");
    }

    /// Run one classify→route→persist cycle over all new records.
    ///
    /// Safe to call directly (the `once` subcommand does); the watermark
    /// lock serializes concurrent callers.
    pub async fn cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleStats {
        let mut watermark = self.watermark.lock().await;
        let batch = self.messages.fetch_since(*watermark).await;

        let mut stats = CycleStats {
            fetched: batch.len(),
            ..Default::default()
        };

        for (i, message) in batch.iter().enumerate() {
            if *shutdown.borrow() {
                info!(
                    remaining = batch.len() - i,
                    "shutdown requested, ending cycle early"
                );
                break;
            }
            if i > 0 && !self.config.pace.is_zero() {
                tokio::time::sleep(self.config.pace).await;
            }

            self.process_one(message, &mut stats).await;

            // The dispatch attempt is done; this record is committed.
            *watermark = message.id;
            if let Err(e) = self.watermark_store.save(message.id) {
                // The in-memory watermark has advanced, so no double
                // dispatch within this process; after a crash the record
                // may be re-read.
                error!(id = message.id, error = %e, "failed to persist watermark");
            }
        }

        if stats.fetched > 0 {
            info!(
                fetched = stats.fetched,
                classified = stats.classified,
                events = stats.events_created,
                tasks = stats.tasks_created,
                informational = stats.informational,
                skipped_dateless = stats.skipped_dateless,
                skipped_blank = stats.skipped_blank,
                failures = stats.dispatch_failures,
                watermark = *watermark,
                "cycle complete"
            );
        }

        stats
    }

    /// Classify and route one record, updating the stats.
    async fn process_one(&self, message: &RawMessage, stats: &mut CycleStats) {
        let Some(content) = message.content() else {
            debug!(id = message.id, "message has no usable content, skipping classification");
            stats.skipped_blank += 1;
            return;
        };
        let sender = message.sender.as_deref().unwrap_or("");
        let title = message.title.as_deref().unwrap_or("");

        info!(
            id = message.id,
            sender,
            title,
            received_at = message.received_at.as_deref().unwrap_or(""),
            "processing message"
        );

        let intent = self.classifier.classify(content, sender, title).await;
        let outcome = self.router.route(&intent).await;

        // Attachments and high-priority verdicts get an extra marker so they
        // stand out when scanning the log.
        if message.file_path.is_some() || intent.priority() == Priority::High {
            info!(
                id = message.id,
                attachment = message.file_path.as_deref().unwrap_or(""),
                priority = ?intent.priority(),
                "flagged message"
            );
        }

        stats.classified += 1;
        match outcome {
            DispatchOutcome::EventCreated => stats.events_created += 1,
            DispatchOutcome::TaskCreated => stats.tasks_created += 1,
            DispatchOutcome::Informational => stats.informational += 1,
            DispatchOutcome::SkippedDateless => stats.skipped_dateless += 1,
            DispatchOutcome::Failed { reason } => {
                warn!(id = message.id, reason, "dispatch failed, record will not be retried");
                stats.dispatch_failures += 1;
            }
        }
    }
}

/// Load the persisted watermark, seeding one from the message store when
/// absent or unreadable.
pub async fn resolve_initial_watermark(
    messages: &MessageStore,
    watermark_store: &dyn WatermarkStore,
) -> i64 {
    match watermark_store.load() {
        Ok(Some(id)) => {
            info!(watermark = id, "resuming from persisted watermark");
            id
        }
        Ok(None) => {
            let today = chrono::Local::now().date_naive();
            let seed = messages.seed_watermark(today).await;
            info!(watermark = seed, "no persisted watermark, seeded from store");
            seed
        }
        Err(e) => {
            warn!(error = %e, "watermark unreadable, seeding from store");
            let today = chrono::Local::now().date_naive();
            messages.seed_watermark(today).await
        }
    }
}
