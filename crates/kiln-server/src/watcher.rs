//! File watching.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::event::ModifyKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File or directory was created
    Created(PathBuf),

    /// File was written or renamed
    Modified(PathBuf),

    /// File or directory was deleted
    Deleted(PathBuf),
}

impl WatchEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Created(p) | WatchEvent::Modified(p) | WatchEvent::Deleted(p) => p,
        }
    }
}

/// Watcher over a set of directories, recursive unless added with
/// [`FileWatcher::watch`] in non-recursive mode.
///
/// Paths are canonicalized before they are watched, so event paths are
/// absolute. Coalescing of rapid edits is left to the consumer.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher for the given paths. Missing paths are
    /// skipped.
    ///
    /// Returns the watcher and a channel to receive events. Dropping the
    /// watcher stops the events.
    pub fn new(
        paths: &[PathBuf],
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(256);

        let watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            match res {
                Ok(event) => {
                    let _ = sync_tx.send(event);
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })
        .map_err(std::io::Error::other)?;

        let mut file_watcher = Self { watcher };
        for path in paths {
            file_watcher.watch(path, RecursiveMode::Recursive)?;
        }

        // Forward from the notify thread into the async world
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                for path in &event.paths {
                    if let Some(e) = classify_event(path, &event.kind) {
                        if async_tx.blocking_send(e).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((file_watcher, async_rx))
    }

    /// Add a path. A missing path is skipped.
    pub fn watch(&mut self, path: &Path, mode: RecursiveMode) -> Result<(), std::io::Error> {
        if !path.exists() {
            tracing::debug!("Not watching missing path {}", path.display());
            return Ok(());
        }

        let path = path.canonicalize()?;
        self.watcher
            .watch(&path, mode)
            .map_err(std::io::Error::other)?;
        tracing::debug!("Watching {} ({:?})", path.display(), mode);
        Ok(())
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
        // Permission and timestamp changes do not change content
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(WatchEvent::Modified(path.to_path_buf())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind};
    use notify::EventKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn classifies_event_kinds() {
        let path = Path::new("/site/src/scss/main.scss");

        assert_eq!(
            classify_event(path, &EventKind::Create(CreateKind::File)),
            Some(WatchEvent::Created(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(WatchEvent::Modified(path.to_path_buf()))
        );
        assert_eq!(
            classify_event(path, &EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
        assert_eq!(classify_event(path, &EventKind::Access(AccessKind::Any)), None);
    }

    #[tokio::test]
    async fn watches_file_changes() {
        let temp = tempdir().unwrap();
        let test_file = temp.path().join("main.scss");

        // Create the watcher first (so it catches file creation)
        let (watcher, mut rx) = FileWatcher::new(&[temp.path().to_path_buf()]).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(&test_file, "body {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        assert!(event.is_ok(), "timeout waiting for file watch event");
        let event = event.unwrap().expect("channel should not be closed");
        assert_eq!(event.path().file_name(), test_file.file_name());
    }

    #[tokio::test]
    async fn shallow_watch_ignores_subdirectories() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();

        let (mut watcher, mut rx) = FileWatcher::new(&[]).unwrap();
        watcher
            .watch(temp.path(), RecursiveMode::NonRecursive)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(temp.path().join("src/nested.json"), "{}").unwrap();
        fs::write(temp.path().join("data.json"), "{}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("timeout waiting for file watch event")
            .expect("channel should not be closed");

        assert_eq!(event.path().file_name().unwrap(), "data.json");
    }

    #[test]
    fn skips_missing_paths() {
        let temp = tempdir().unwrap();
        assert!(FileWatcher::new(&[temp.path().join("absent")]).is_ok());
    }
}
