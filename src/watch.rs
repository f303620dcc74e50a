//! Filesystem change notifications.
//!
//! Wraps a `notify` watcher on the corpus root and turns its raw events into
//! [`ChangeEvent`]s delivered over a tokio channel. Paths outside the
//! store's include/exclude globs are dropped.

use std::path::Path;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::store::fs::FsStore;
use crate::store::ChangeEvent;

/// A running watcher. Dropping it stops the notifications.
pub struct CorpusWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

impl CorpusWatcher {
    /// Next change, or `None` once the watcher has shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

/// Start watching the store's root recursively.
pub fn watch(store: &FsStore) -> Result<CorpusWatcher> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mapper = store.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event, |p| mapper.id_of(p)) {
                    let _ = tx.send(change);
                }
            }
            Err(e) => warn!("watch error: {:?}", e),
        },
        notify::Config::default(),
    )
    .context("Failed to create filesystem watcher")?;

    watcher
        .watch(store.root(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", store.root().display()))?;

    Ok(CorpusWatcher {
        _watcher: watcher,
        rx,
    })
}

/// Map one raw event to zero or more changes, using `id_of` to resolve
/// (and filter) paths.
pub fn translate<F>(event: &Event, id_of: F) -> Vec<ChangeEvent>
where
    F: Fn(&Path) -> Option<String>,
{
    let ids: Vec<String> = event
        .paths
        .iter()
        .filter_map(|p| id_of(p.as_path()))
        .collect();

    match &event.kind {
        EventKind::Create(_) => ids.into_iter().map(ChangeEvent::Created).collect(),
        EventKind::Remove(_) => ids.into_iter().map(ChangeEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let from = event.paths.first().and_then(|p| id_of(p.as_path()));
            let to = event.paths.get(1).and_then(|p| id_of(p.as_path()));
            match (from, to) {
                (Some(from), Some(to)) => vec![ChangeEvent::Renamed { from, to }],
                (Some(from), None) => vec![ChangeEvent::Deleted(from)],
                // Atomic saves land here: a temp file renamed over the document.
                (None, Some(to)) => vec![
                    ChangeEvent::Created(to.clone()),
                    ChangeEvent::Modified(to),
                ],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            ids.into_iter().map(ChangeEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            ids.into_iter().map(ChangeEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter_map(|p| {
                let id = id_of(p.as_path())?;
                Some(if p.exists() {
                    ChangeEvent::Created(id)
                } else {
                    ChangeEvent::Deleted(id)
                })
            })
            .collect(),
        EventKind::Modify(_) => ids.into_iter().map(ChangeEvent::Modified).collect(),
        _ => Vec::new(),
    }
}
