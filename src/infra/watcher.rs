//! Save watcher
//!
//! Watches the workspace directory recursively and hands batches of saved
//! paths to a callback. Events are collected until the tree has been quiet
//! for the settle delay, so an editor writing several files at once yields
//! one batch. Every path carries the time its first event arrived, not the
//! time the batch was handed over.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::core::driver::SavedPath;
use crate::error::WatchError;

/// Watcher settings
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Quiet period that ends a batch
    pub settle: Duration,
    /// Directory names whose contents are never reported
    pub ignore: Vec<String>,
}

/// A running watcher; dropping it stops watching
pub struct SaveWatcher {
    _watcher: RecommendedWatcher,
    _batcher: JoinHandle<()>,
}

/// Start watching `root`
///
/// `on_saved` runs on the watcher's own thread. Returning `false` from it
/// stops batching.
pub fn watch<F>(root: &Path, options: WatchOptions, on_saved: F) -> Result<SaveWatcher, WatchError>
where
    F: FnMut(Vec<SavedPath>) -> bool + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let start_error = |e: notify::Error| WatchError::Start {
        path: root.to_path_buf(),
        error: e.to_string(),
    };

    let mut watcher = notify::recommended_watcher(tx).map_err(start_error)?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(start_error)?;

    let filter = SaveFilter {
        root: root.to_path_buf(),
        ignore: options.ignore,
    };
    let settle = options.settle;
    let batcher = thread::Builder::new()
        .name("onsave-watch".to_string())
        .spawn(move || batch(&rx, settle, &filter, on_saved))
        .map_err(|e| WatchError::Thread {
            error: e.to_string(),
        })?;

    tracing::info!("watching {}", root.display());
    Ok(SaveWatcher {
        _watcher: watcher,
        _batcher: batcher,
    })
}

fn batch<F>(rx: &Receiver<notify::Result<Event>>, settle: Duration, filter: &SaveFilter, mut on_saved: F)
where
    F: FnMut(Vec<SavedPath>) -> bool,
{
    let mut open = true;
    while open {
        let Ok(first) = rx.recv() else {
            break;
        };

        let mut saved = BTreeMap::new();
        filter.collect(first, Instant::now(), &mut saved);
        loop {
            match rx.recv_timeout(settle) {
                Ok(event) => filter.collect(event, Instant::now(), &mut saved),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    open = false;
                    break;
                }
            }
        }

        if saved.is_empty() {
            continue;
        }
        tracing::debug!("{} paths saved", saved.len());
        let saved = saved
            .into_iter()
            .map(|(path, observed)| SavedPath { path, observed })
            .collect();
        if !on_saved(saved) {
            break;
        }
    }
    tracing::debug!("watcher stopped");
}

/// Decides which events count as saves
#[derive(Debug)]
struct SaveFilter {
    root: PathBuf,
    ignore: Vec<String>,
}

impl SaveFilter {
    /// Add the event's saved paths, keeping the earliest observation of each
    fn collect(
        &self,
        event: notify::Result<Event>,
        observed: Instant,
        saved: &mut BTreeMap<PathBuf, Instant>,
    ) {
        match event {
            Ok(event) if is_save(&event.kind) => {
                for path in event.paths.into_iter().filter(|p| !self.is_ignored(p)) {
                    saved.entry(path).or_insert(observed);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|component| match component {
            Component::Normal(name) => self
                .ignore
                .iter()
                .any(|ignored| name.to_str() == Some(ignored.as_str())),
            _ => false,
        })
    }
}

fn is_save(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
    use tempfile::TempDir;

    fn filter() -> SaveFilter {
        SaveFilter {
            root: PathBuf::from("/ws"),
            ignore: vec!["target".to_string(), ".git".to_string()],
        }
    }

    #[test]
    fn test_ignored_directories() {
        let filter = filter();
        assert!(filter.is_ignored(Path::new("/ws/core/target/debug/out")));
        assert!(filter.is_ignored(Path::new("/ws/.git/index")));
        assert!(!filter.is_ignored(Path::new("/ws/core/src/lib.rs")));
        // Only whole names match
        assert!(!filter.is_ignored(Path::new("/ws/targets.txt")));
    }

    #[test]
    fn test_ignore_applies_below_root_only() {
        let filter = SaveFilter {
            root: PathBuf::from("/home/target/ws"),
            ignore: vec!["target".to_string()],
        };
        assert!(!filter.is_ignored(Path::new("/home/target/ws/src/main.rs")));
    }

    #[test]
    fn test_save_kinds() {
        assert!(is_save(&EventKind::Create(CreateKind::File)));
        assert!(is_save(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(!is_save(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
        assert!(!is_save(&EventKind::Access(AccessKind::Read)));
    }

    #[test]
    fn test_collect_filters_events() {
        let filter = filter();
        let mut saved = BTreeMap::new();
        let now = Instant::now();

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/ws/a/src/x.rs"))
            .add_path(PathBuf::from("/ws/a/target/x.o"));
        filter.collect(Ok(event), now, &mut saved);
        filter.collect(
            Ok(Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/ws/b"))),
            now,
            &mut saved,
        );
        filter.collect(Err(notify::Error::generic("boom")), now, &mut saved);

        assert_eq!(
            saved.into_keys().collect::<Vec<_>>(),
            vec![PathBuf::from("/ws/a/src/x.rs")]
        );
    }

    #[test]
    fn test_collect_keeps_first_observation() {
        let filter = filter();
        let mut saved = BTreeMap::new();
        let first = Instant::now();
        let later = first + Duration::from_millis(100);
        let save = || {
            Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
                .add_path(PathBuf::from("/ws/a/src/x.rs")))
        };

        filter.collect(save(), first, &mut saved);
        filter.collect(save(), later, &mut saved);

        assert_eq!(saved[Path::new("/ws/a/src/x.rs")], first);
    }

    #[test]
    fn test_batch_coalesces_until_quiet() {
        let (tx, rx) = mpsc::channel();
        for name in ["a.rs", "b.rs", "a.rs"] {
            tx.send(Ok(
                Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/ws").join(name))
            ))
            .unwrap();
        }
        drop(tx);

        let mut batches = Vec::new();
        batch(&rx, Duration::from_millis(20), &filter(), |saved| {
            batches.push(saved.into_iter().map(|save| save.path).collect::<Vec<_>>());
            true
        });

        assert_eq!(
            batches,
            vec![vec![PathBuf::from("/ws/a.rs"), PathBuf::from("/ws/b.rs")]]
        );
    }

    #[test]
    fn test_watch_reports_saved_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let (tx, rx) = mpsc::channel();

        let _watcher = watch(
            &root,
            WatchOptions {
                settle: Duration::from_millis(50),
                ignore: Vec::new(),
            },
            move |paths| tx.send(paths).is_ok(),
        )
        .unwrap();

        let before = Instant::now();
        std::fs::write(root.join("saved.txt"), "content").unwrap();

        let saved: Vec<SavedPath> = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let save = saved.iter().find(|s| s.path.ends_with("saved.txt")).unwrap();
        // Stamped on arrival, before the settle delay elapsed
        assert!(save.observed >= before);
        assert!(save.observed.elapsed() >= Duration::from_millis(50));
    }
}
