// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folder watcher — forwards "file appeared" notifications from the platform
// notification service into a tokio channel.
//
// The notify callback runs on the watcher's own thread; it never blocks and
// only translates and forwards. A notification error is forwarded as a
// `Watch` error, which ends watching.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use postwerk_core::error::{PostwerkError, Result};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, info, instrument};

use crate::filter::FileEvent;

/// What the watcher delivers: a new file, or the reason watching failed.
pub type WatchMessage = Result<FileEvent>;

/// Keeps the platform watcher alive; dropping it stops the notifications
/// and closes the channel.
pub struct FolderWatcher {
    folder: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FolderWatcher {
    /// Start watching `folder` (not recursively).
    #[instrument(fields(folder = %folder.display()))]
    pub fn start(folder: &Path) -> Result<(Self, UnboundedReceiver<WatchMessage>)> {
        let (tx, rx) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            for message in translate(result) {
                if tx.send(message).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| PostwerkError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(folder, RecursiveMode::NonRecursive)
            .map_err(|e| PostwerkError::Watch(format!("failed to watch {}: {e}", folder.display())))?;

        info!("Watching folder");
        Ok((
            Self {
                folder: folder.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

/// Files created in, or renamed into, the folder. Everything else is dropped.
fn translate(result: notify::Result<Event>) -> Vec<WatchMessage> {
    match result {
        Ok(event) => match event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                event.paths.into_iter().map(|path| Ok(FileEvent::new(path))).collect()
            }
            // Both the old and the new name; only the new one is a new file.
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .into_iter()
                .last()
                .map(|path| vec![Ok(FileEvent::new(path))])
                .unwrap_or_default(),
            kind => {
                debug!(?kind, "Ignoring folder event");
                Vec::new()
            }
        },
        Err(err) => vec![Err(PostwerkError::Watch(err.to_string()))],
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use notify::event::{CreateKind, RemoveKind};

    use super::*;

    fn paths(messages: Vec<WatchMessage>) -> Vec<PathBuf> {
        messages
            .into_iter()
            .map(|message| message.expect("file event").path)
            .collect()
    }

    #[test]
    fn creations_and_renames_into_the_folder_are_forwarded() {
        let created = Event::new(EventKind::Create(CreateKind::File)).add_path("/d/order-1.pdf".into());
        assert_eq!(paths(translate(Ok(created))), vec![PathBuf::from("/d/order-1.pdf")]);

        let renamed = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/d/order-1.pdf.part".into())
            .add_path("/d/order-1.pdf".into());
        assert_eq!(paths(translate(Ok(renamed))), vec![PathBuf::from("/d/order-1.pdf")]);
    }

    #[test]
    fn other_events_are_dropped() {
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/d/order-1.pdf".into());
        assert!(translate(Ok(removed)).is_empty());
    }

    #[test]
    fn notification_errors_become_watch_errors() {
        let messages = translate(Err(notify::Error::generic("queue overflow")));
        assert!(matches!(messages.as_slice(), [Err(PostwerkError::Watch(_))]));
    }

    #[tokio::test]
    async fn new_file_is_delivered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_watcher, mut rx) = FolderWatcher::start(dir.path()).expect("start watcher");

        let path = dir.path().join("order-1.pdf");
        std::fs::write(&path, b"%PDF-1.5").expect("write");

        let delivered = tokio::time::timeout(Duration::from_secs(10), async {
            while let Some(message) = rx.recv().await {
                let event = message.expect("file event");
                if event.file_name() == Some("order-1.pdf") {
                    return true;
                }
            }
            false
        })
        .await
        .expect("event within timeout");
        assert!(delivered);
    }

    #[test]
    fn missing_folder_cannot_be_watched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = FolderWatcher::start(&dir.path().join("absent"));
        assert!(matches!(result, Err(PostwerkError::Watch(_))));
    }
}
