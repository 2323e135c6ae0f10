//! Debouncer: pure timing and per-path event deduplication.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{MetadataKind, ModifyKind};
use rustc_hash::FxHashMap;

use crate::utils::normalize_path;

/// Quiet period after the last event before a batch is released.
pub const DEBOUNCE_MS: u64 = 100;
/// Minimum gap between two released batches.
pub const REBUILD_COOLDOWN_MS: u64 = 200;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Editor artifacts and dotfiles.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Map a notify event kind to a change, or `None` to ignore it.
///
/// Metadata events are kept only when they may carry a new mtime: touching a
/// file must invalidate its bundle, reading it must not.
fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Metadata(meta)) => match meta {
            MetadataKind::WriteTime | MetadataKind::Any => Some(ChangeKind::Modified),
            _ => None,
        },
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

pub struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    last_batch: Option<Instant>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_batch: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Removed then Created/Modified: Modified (the file existed before)
    /// - Modified then Removed: Removed
    /// - Created then Removed: discarded
    /// - otherwise the first event wins
    pub fn add_event(&mut self, event: &notify::Event) {
        let Some(kind) = classify(&event.kind) else {
            return;
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            let path = normalize_path(path);

            match self.changes.get(&path).copied() {
                None => {
                    self.changes.insert(path, kind);
                }
                Some(ChangeKind::Removed) if kind != ChangeKind::Removed => {
                    self.changes.insert(path, ChangeKind::Modified);
                }
                Some(ChangeKind::Modified) if kind == ChangeKind::Removed => {
                    self.changes.insert(path, ChangeKind::Removed);
                }
                Some(ChangeKind::Created) if kind == ChangeKind::Removed => {
                    self.changes.remove(&path);
                }
                Some(_) => continue,
            }
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the pending batch, sorted by path, once debounce and cooldown
    /// have elapsed.
    pub fn take_if_ready(&mut self) -> Option<Vec<(PathBuf, ChangeKind)>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;
        self.last_batch = Some(Instant::now());

        let mut batch: Vec<_> = changes.into_iter().collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        Some(batch)
    }

    pub fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }
        if let Some(last_batch) = self.last_batch
            && last_batch.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }
        !self.changes.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    /// Precise sleep duration until the next possible ready time.
    pub fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());
        let cooldown_remaining = self
            .last_batch
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};

    fn event(paths: &[&str], kind: EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Any))
    }

    fn create() -> EventKind {
        EventKind::Create(CreateKind::File)
    }

    fn remove() -> EventKind {
        EventKind::Remove(RemoveKind::File)
    }

    #[test]
    fn test_debouncer_empty() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.is_ready());
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn test_dedup_rules() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&event(&["/tmp/bw/a.css"], remove()));
        debouncer.add_event(&event(&["/tmp/bw/a.css"], create()));
        debouncer.add_event(&event(&["/tmp/bw/b.css"], modify()));
        debouncer.add_event(&event(&["/tmp/bw/b.css"], remove()));
        debouncer.add_event(&event(&["/tmp/bw/c.css"], create()));
        debouncer.add_event(&event(&["/tmp/bw/c.css"], remove()));
        // Replaced, then deleted again: still a deletion of a known file
        debouncer.add_event(&event(&["/tmp/bw/d.css"], remove()));
        debouncer.add_event(&event(&["/tmp/bw/d.css"], create()));
        debouncer.add_event(&event(&["/tmp/bw/d.css"], remove()));

        assert_eq!(debouncer.changes.len(), 3);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/bw/a.css")],
            ChangeKind::Modified
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/bw/d.css")],
            ChangeKind::Removed
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/bw/b.css")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_temp_files_ignored() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&event(
            &["/tmp/bw/a.css~", "/tmp/bw/.a.css.swp", "/tmp/bw/a.bak"],
            modify(),
        ));
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn test_metadata_filtering() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&event(
            &["/tmp/bw/read.css"],
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
        ));
        debouncer.add_event(&event(&["/tmp/bw/open.css"], EventKind::Access(AccessKind::Any)));
        assert_eq!(debouncer.pending(), 0);

        debouncer.add_event(&event(
            &["/tmp/bw/touched.css"],
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
        ));
        assert_eq!(debouncer.pending(), 1);
    }

    #[test]
    fn test_batch_released_after_quiet_period() {
        let mut debouncer = Debouncer::new();
        debouncer.add_event(&event(&["/tmp/bw/b.css", "/tmp/bw/a.css"], modify()));
        assert!(debouncer.take_if_ready().is_none());

        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
        let batch = debouncer.take_if_ready().unwrap();
        let paths: Vec<_> = batch.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/tmp/bw/a.css"), PathBuf::from("/tmp/bw/b.css")]
        );
        assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn test_sleep_duration_idle_is_long() {
        let debouncer = Debouncer::new();
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
    }
}
