//! Dependency watcher.
//!
//! ```text
//! notify ─► std mpsc ─► bridge thread ─► tokio mpsc ─► Debouncer
//!                                                         │ batch
//!                                                         ▼
//!                                  Pipeline::apply_changes ─► Broadcaster
//! ```
//!
//! The watcher is created before the task starts so events that arrive while
//! the task is being scheduled are buffered, not lost.

mod debouncer;
mod index;

pub use debouncer::{ChangeKind, DEBOUNCE_MS, Debouncer, is_temp_file};
pub use index::WatchedFileIndex;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::reload::{Broadcaster, ReloadMessage};
use crate::registry::Pipeline;
use crate::log;

/// How long `stop` waits for an in-flight batch before aborting the task.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Running watcher task.
pub struct WatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Start watching the pipeline's static root. Must be called from within
    /// a tokio runtime.
    pub fn spawn(pipeline: Arc<Pipeline>, broadcaster: Broadcaster) -> notify::Result<Self> {
        let root = pipeline.static_root().to_path_buf();

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let (event_tx, event_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(watcher, event_rx, shutdown_rx, pipeline, broadcaster));

        log!("watch"; "watching {}", root.display());
        Ok(Self { shutdown, task })
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let mut task = self.task;
        if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
            crate::debug!("watch"; "watch task did not stop in time, aborting");
            task.abort();
            let _ = task.await;
        }
    }
}

/// Event loop. Owns the notify watcher so watching ends with the task.
async fn run(
    _watcher: RecommendedWatcher,
    mut events: mpsc::Receiver<notify::Event>,
    mut shutdown: watch::Receiver<bool>,
    pipeline: Arc<Pipeline>,
    broadcaster: Broadcaster,
) {
    let mut debouncer = Debouncer::new();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => debouncer.add_event(&event),
                None => {
                    log!("watch"; "event stream closed");
                    break;
                }
            },
            _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                let Some(batch) = debouncer.take_if_ready() else {
                    continue;
                };
                for (path, kind) in &batch {
                    crate::debug!("watch"; "{}: {}", kind.label(), path.display());
                }
                let paths: Vec<PathBuf> = batch.into_iter().map(|(p, _)| p).collect();
                process_batch(&pipeline, &broadcaster, &paths, Some(&shutdown)).await;
            }
        }
    }

    crate::debug!("watch"; "watch task stopped");
}

/// Rebuild what `paths` affect and notify clients. Returns the affected
/// component names.
///
/// No reload is sent for batches that touch nothing, or once `shutdown`
/// has been signalled.
pub(crate) async fn process_batch(
    pipeline: &Pipeline,
    broadcaster: &Broadcaster,
    paths: &[PathBuf],
    shutdown: Option<&watch::Receiver<bool>>,
) -> Vec<String> {
    let affected = pipeline.apply_changes(paths).await;
    if affected.is_empty() {
        return affected;
    }
    if shutdown.is_some_and(|rx| *rx.borrow()) {
        return affected;
    }

    log!("reload"; "{}", affected.join(", "));
    let reason = format!("changed: {}", affected.join(", "));
    let report = broadcaster.broadcast(&ReloadMessage::reload_with_reason(reason));
    if report.dropped > 0 {
        crate::debug!("reload"; "dropped {} dead connection(s)", report.dropped);
    }
    affected
}
