//! Change source adapter over the messenger's `tbl_recv` table.
//!
//! The messenger stores every received message as an append-only row keyed
//! by a monotonically increasing `MessageKey`. Deletion is a tombstone
//! (`DeletedDate` set, row kept), so ingestion filters on
//! `DeletedDate IS NULL` rather than row presence.
//!
//! [`MessageStore::fetch_since`] is deliberately infallible: the messenger
//! process may hold a write lock at any moment, and a transiently unreadable
//! store must degrade to "no new messages" instead of failing the poll
//! cycle.

use chrono::NaiveDate;
use rusqlite::params;
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::StoreResult;

/// One received message, as stored by the messenger.
///
/// All columns except the key are nullable in the wild; treat every text
/// field as optional.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Monotonically increasing, unique ordering key (`MessageKey`).
    pub id: i64,
    /// Raw message body (`MessageBody`).
    pub body: Option<String>,
    /// Pre-rendered plain text, preferred over `body` when present
    /// (`MessageText`).
    pub text: Option<String>,
    /// Message title (`Title`).
    pub title: Option<String>,
    /// Display name of the sender (`Sender`).
    pub sender: Option<String>,
    /// Stable sender identity key (`SenderKey`).
    pub sender_key: Option<String>,
    /// Messenger-internal message type tag (`MessageType`).
    pub message_type: Option<i64>,
    /// Receive timestamp in the store's native text format (`ReceiveDate`).
    pub received_at: Option<String>,
    /// Recipient reference list (`ReferenceList`).
    pub reference_list: Option<String>,
    /// CC list (`CCList`).
    pub cc_list: Option<String>,
    /// Path of an attached file, if any (`FilePath`).
    pub file_path: Option<String>,
    /// Unread flag (`IsUnRead`).
    pub unread: bool,
}

impl RawMessage {
    /// Resolve the text to classify: pre-rendered text first, then the raw
    /// body, then the title. Returns `None` when all three are blank.
    pub fn content(&self) -> Option<&str> {
        [&self.text, &self.body, &self.title]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// Read-only view over the messenger's received-message table.
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    /// Wrap an opened [`Database`].
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Fetch all live messages with `id > watermark`, ascending by id.
    ///
    /// Tombstoned rows (`DeletedDate` set) are excluded. A locked or
    /// unreadable store yields an empty vec and a warning, never an error,
    /// so a concurrent messenger write can only delay ingestion, not abort
    /// the cycle.
    pub async fn fetch_since(&self, watermark: i64) -> Vec<RawMessage> {
        let result = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT MessageKey, MessageBody, MessageText, Title, Sender, SenderKey,
                            MessageType, ReceiveDate, ReferenceList, CCList, FilePath, IsUnRead
                     FROM tbl_recv
                     WHERE MessageKey > ?1 AND DeletedDate IS NULL
                     ORDER BY MessageKey ASC",
                )?;
                let rows = stmt
                    .query_map(params![watermark], |row| {
                        Ok(RawMessage {
                            id: row.get(0)?,
                            body: row.get(1)?,
                            text: row.get(2)?,
                            title: row.get(3)?,
                            sender: row.get(4)?,
                            sender_key: row.get(5)?,
                            message_type: row.get(6)?,
                            received_at: row.get(7)?,
                            reference_list: row.get(8)?,
                            cc_list: row.get(9)?,
                            file_path: row.get(10)?,
                            unread: row.get::<_, Option<i64>>(11)?.unwrap_or(0) != 0,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await;

        match result {
            Ok(rows) => {
                debug!(watermark, count = rows.len(), "fetched new messages");
                rows
            }
            Err(e) => {
                warn!(watermark, error = %e, "message store unreadable, skipping this read");
                Vec::new()
            }
        }
    }

    /// Minimum live message id received on the given calendar day.
    pub async fn min_live_id_on_day(&self, day: NaiveDate) -> StoreResult<Option<i64>> {
        let day = day.format("%Y-%m-%d").to_string();
        self.db
            .execute(move |conn| {
                let min: Option<i64> = conn.query_row(
                    "SELECT MIN(MessageKey) FROM tbl_recv
                     WHERE DATE(ReceiveDate) = DATE(?1) AND DeletedDate IS NULL",
                    params![day],
                    |row| row.get(0),
                )?;
                Ok(min)
            })
            .await
    }

    /// Maximum message id currently in the store, tombstoned rows included.
    pub async fn max_id(&self) -> StoreResult<Option<i64>> {
        self.db
            .execute(|conn| {
                let max: Option<i64> =
                    conn.query_row("SELECT MAX(MessageKey) FROM tbl_recv", [], |row| row.get(0))?;
                Ok(max)
            })
            .await
    }

    /// Compute the initial watermark when none has been persisted yet.
    ///
    /// Seeds to one before today's first live message so the whole current
    /// day is ingested on first run. With no messages today, seeds to the
    /// store's maximum id (only strictly future messages are processed).
    /// An empty or unreadable store seeds to zero.
    pub async fn seed_watermark(&self, today: NaiveDate) -> i64 {
        match self.min_live_id_on_day(today).await {
            Ok(Some(min)) => min - 1,
            Ok(None) => match self.max_id().await {
                Ok(max) => max.unwrap_or(0),
                Err(e) => {
                    warn!(error = %e, "max-id query failed while seeding, starting from 0");
                    0
                }
            },
            Err(e) => {
                warn!(error = %e, "seed query failed, starting from 0");
                0
            }
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
