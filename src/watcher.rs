// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Inbox watcher: new timetable photos dropped into a folder get scanned

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::image_store::{is_image_file, SCAN_FILE_NAME};
use crate::Result;

/// What the inbox reported
#[derive(Debug, Clone, PartialEq)]
pub enum InboxEvent {
    /// A photo appeared (created or renamed into place)
    PhotoArrived(PathBuf),
    /// The underlying watcher failed or went away
    Error(String),
}

/// Watches inbox directories for arriving photos
pub struct InboxWatcher {
    watcher: RecommendedWatcher,
    inboxes: Vec<PathBuf>,
    rx: Receiver<notify::Result<Event>>,
}

impl InboxWatcher {
    pub fn new() -> Result<Self> {
        let (tx, rx) = channel();
        let config = Config::default().with_poll_interval(Duration::from_secs(2));
        let watcher = RecommendedWatcher::new(tx, config)?;

        Ok(Self {
            watcher,
            inboxes: Vec::new(),
            rx,
        })
    }

    /// Add an inbox directory, creating it if needed
    pub fn watch(&mut self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            info!("Created inbox: {:?}", dir);
        }

        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.inboxes.push(dir.to_path_buf());
        info!("Watching inbox: {:?}", dir);
        Ok(())
    }

    pub fn inboxes(&self) -> &[PathBuf] {
        &self.inboxes
    }

    /// Next photo arrival, waiting at most `timeout`
    pub fn next_event(&self, timeout: Duration) -> Option<InboxEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(Ok(event)) => {
                    if let Some(path) = arrived_photo(&event) {
                        return Some(InboxEvent::PhotoArrived(path));
                    }
                }
                Ok(Err(e)) => return Some(InboxEvent::Error(e.to_string())),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    return Some(InboxEvent::Error("Inbox watcher disconnected".to_string()))
                }
            }
        }
    }
}

/// The photo a notify event brought into the inbox, if any
fn arrived_photo(event: &Event) -> Option<PathBuf> {
    let path = match event.kind {
        EventKind::Create(_) => event.paths.first(),
        // Renames report (from, to); the destination is what landed
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first(),
        _ => None,
    }?;

    should_process(path).then(|| path.clone())
}

/// Whether an inbox file is a photo worth scanning
pub fn should_process(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let hidden = name.starts_with('.');
    let partial = [".tmp", ".part", ".crdownload", ".partial", ".download"]
        .iter()
        .any(|ext| name.ends_with(ext));
    let system = ["desktop.ini", "thumbs.db", SCAN_FILE_NAME]
        .iter()
        .any(|n| name.eq_ignore_ascii_case(n));

    !hidden && !partial && !system && is_image_file(path)
}

/// Photos already sitting in an inbox, sorted by path
pub fn existing_images(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && should_process(p))
            .collect(),
        Err(e) => {
            warn!("Cannot read inbox {:?}: {}", dir, e);
            Vec::new()
        }
    };
    found.sort();
    found
}

/// Wait until the photo has stopped growing. False if it vanished.
pub async fn wait_for_stable(path: &Path, max_wait: Duration) -> bool {
    wait_for_stable_every(path, max_wait, Duration::from_millis(500)).await
}

async fn wait_for_stable_every(path: &Path, max_wait: Duration, interval: Duration) -> bool {
    let started = Instant::now();
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let mut last_size = meta.len();

    loop {
        tokio::time::sleep(interval).await;

        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        let size = meta.len();
        if size == last_size {
            return true;
        }
        if started.elapsed() > max_wait {
            warn!("{:?} still changing after {:?}, scanning anyway", path, max_wait);
            return true;
        }

        debug!("{:?} still being written ({} bytes)", path, size);
        last_size = size;
    }
}
