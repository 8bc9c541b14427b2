//! Store-change notification.
//!
//! Watches the directory containing the messenger database and turns raw
//! filesystem events into at most one [`Trigger::StoreChanged`] per burst:
//! repeats within the debounce window are swallowed, then a settle delay
//! runs before the trigger fires so the engine never reads a store the
//! messenger is still writing.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::engine::Trigger;
use crate::error::{EngineError, EngineResult};

/// Debounce/settle tuning for the store watcher.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Window during which repeat change signals are ignored.
    pub debounce: Duration,
    /// Delay between the last signal and the triggered read.
    pub settle: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            settle: Duration::from_secs(2),
        }
    }
}

/// Watches the messenger database file and feeds the engine's trigger
/// channel.
///
/// Dropping the watcher stops the underlying filesystem subscription; the
/// debounce task then drains and exits on its own.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
}

impl StoreWatcher {
    /// Start watching `store_path` and send coalesced triggers into
    /// `trigger_tx`.
    pub fn spawn(
        store_path: &Path,
        config: WatcherConfig,
        trigger_tx: mpsc::Sender<Trigger>,
    ) -> EngineResult<Self> {
        let parent = store_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| EngineError::UnwatchablePath {
                path: store_path.display().to_string(),
            })?;
        let file_name: OsString = store_path
            .file_name()
            .ok_or_else(|| EngineError::UnwatchablePath {
                path: store_path.display().to_string(),
            })?
            .to_owned();

        // Raw events out of the notify callback thread. Capacity 1: while a
        // burst is being debounced, further signals carry no information.
        let (raw_tx, raw_rx) = mpsc::channel::<()>(1);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()))
                    {
                        let _ = raw_tx.try_send(());
                    }
                }
                Err(e) => error!(error = %e, "store watcher error"),
            }
        })?;
        watcher.watch(parent, RecursiveMode::NonRecursive)?;

        info!(path = %store_path.display(), "watching messenger store for changes");
        tokio::spawn(debounce_loop(raw_rx, config, trigger_tx));

        Ok(Self { _watcher: watcher })
    }
}

/// Collapse bursts of raw events into single settled triggers.
async fn debounce_loop(
    mut raw_rx: mpsc::Receiver<()>,
    config: WatcherConfig,
    trigger_tx: mpsc::Sender<Trigger>,
) {
    while raw_rx.recv().await.is_some() {
        debug!("store change detected");

        // Swallow repeats for the debounce window.
        let window = tokio::time::sleep(config.debounce);
        tokio::pin!(window);
        loop {
            tokio::select! {
                _ = &mut window => break,
                more = raw_rx.recv() => {
                    if more.is_none() {
                        break;
                    }
                }
            }
        }

        // Let the messenger finish its write before anyone reads.
        tokio::time::sleep(config.settle).await;

        if trigger_tx.send(Trigger::StoreChanged).await.is_err() {
            // Engine gone; nothing left to notify.
            break;
        }
    }
    debug!("store watcher debounce loop stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            debounce: Duration::from_millis(50),
            settle: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn burst_of_writes_yields_one_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("messenger.udb");
        std::fs::write(&store_path, b"seed").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let _watcher = StoreWatcher::spawn(&store_path, fast_config(), tx).unwrap();

        for i in 0..5 {
            std::fs::write(&store_path, format!("write {i}")).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let trigger = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher should fire within the timeout")
            .expect("channel open");
        assert_eq!(trigger, Trigger::StoreChanged);

        // The whole burst fell inside one debounce window: no second trigger.
        let extra = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(extra.is_err(), "burst should coalesce into a single trigger");
    }

    #[tokio::test]
    async fn sibling_files_do_not_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("messenger.udb");
        std::fs::write(&store_path, b"seed").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let _watcher = StoreWatcher::spawn(&store_path, fast_config(), tx).unwrap();

        std::fs::write(dir.path().join("unrelated.log"), b"noise").unwrap();

        let got = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(got.is_err(), "writes to other files must be filtered out");
    }

    #[test]
    fn bare_file_name_without_directory_is_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        let result = StoreWatcher::spawn(Path::new("messenger.udb"), fast_config(), tx);
        assert!(matches!(result, Err(EngineError::UnwatchablePath { .. })));
    }
}

