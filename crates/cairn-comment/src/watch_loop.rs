//! Live watch loop: re-runs the publish cycle whenever the report document
//! (or a separate trigger file) settles after a change.
//!
//! The watcher instance is constructed by and owned by the loop. A
//! single-permit gate serializes reconciliation: events arriving while a
//! cycle is in flight are dropped, never queued, so a burst of filesystem
//! events collapses to at most one extra cycle. Cycle errors are logged
//! and swallowed; the loop only exits if the watcher channel dies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Semaphore};

/// One full publish/update cycle, injected by the facade.
#[async_trait]
pub trait ReconcileCycle: Send + Sync {
    async fn run(&self, update: bool) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct WatchLoopConfig {
    pub document: PathBuf,
    /// Optional separate trigger file; deleted after a cycle it triggered,
    /// unless the triggering event was itself a deletion.
    pub trigger: Option<PathBuf>,
    /// Quiet period a file must hold before a change is considered
    /// settled, so partially-written files are not published.
    pub stability_window: Duration,
    /// Update flag for the first reaction; later reactions always update
    /// so re-publication edits the existing comment.
    pub initial_update: bool,
}

impl WatchLoopConfig {
    pub fn new(document: PathBuf) -> Self {
        Self {
            document,
            trigger: None,
            stability_window: Duration::from_millis(500),
            initial_update: true,
        }
    }
}

pub struct WatchLoop {
    config: WatchLoopConfig,
    gate: Arc<Semaphore>,
}

#[derive(Debug, Clone, Copy)]
struct SettledChange {
    trigger_written: bool,
}

type WatchResult = std::result::Result<notify::Event, notify::Error>;

impl WatchLoop {
    pub fn new(config: WatchLoopConfig) -> Self {
        Self {
            config,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    /// Watches until the process is terminated externally; an `Err` return
    /// means the watcher itself broke, not that a cycle failed.
    pub async fn run(&self, cycle: Arc<dyn ReconcileCycle>) -> Result<()> {
        let document = normalize_path(&self.config.document);
        let trigger = self.config.trigger.as_deref().map(normalize_path);

        let (tx, mut rx) = mpsc::unbounded_channel::<WatchResult>();
        let mut watcher = RecommendedWatcher::new(
            move |result| {
                let _ = tx.send(result);
            },
            notify::Config::default(),
        )
        .context("initialize file watcher")?;

        let mut roots = vec![parent_dir(&document)];
        if let Some(trigger) = &trigger {
            let root = parent_dir(trigger);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        for root in &roots {
            watcher
                .watch(root, RecursiveMode::NonRecursive)
                .with_context(|| format!("watch {}", root.display()))?;
        }
        tracing::debug!(document = %document.display(), "watching for changes");

        let mut first_reaction = true;
        loop {
            let Some(result) = rx.recv().await else {
                bail!("watcher channel closed");
            };
            let Some(settled) = self
                .settle(result, &mut rx, &document, trigger.as_deref())
                .await
            else {
                continue;
            };

            let Ok(permit) = self.gate.clone().try_acquire_owned() else {
                tracing::debug!("reconciliation already in flight; dropping event");
                continue;
            };

            let update = if first_reaction {
                self.config.initial_update
            } else {
                true
            };
            first_reaction = false;

            // Never delete the document itself, even when it doubles as
            // the trigger.
            let trigger_to_delete = trigger
                .clone()
                .filter(|path| settled.trigger_written && *path != document);
            let cycle = Arc::clone(&cycle);
            tokio::spawn(async move {
                if let Err(error) = cycle.run(update).await {
                    tracing::warn!(error = %format!("{error:#}"), "watch cycle failed; continuing");
                }
                if let Some(path) = trigger_to_delete {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                        Err(error) => {
                            tracing::warn!(
                                trigger = %path.display(),
                                error = %error,
                                "failed to delete trigger file"
                            );
                        }
                    }
                }
                drop(permit);
            });
        }
    }

    // Waits out the stability window, folding any further relevant events
    // into one settled change. Returns None when nothing relevant arrived.
    async fn settle(
        &self,
        first: WatchResult,
        rx: &mut mpsc::UnboundedReceiver<WatchResult>,
        document: &Path,
        trigger: Option<&Path>,
    ) -> Option<SettledChange> {
        let mut change = match classify(first, document, trigger) {
            Some(change) => change,
            None => return None,
        };
        loop {
            match tokio::time::timeout(self.config.stability_window, rx.recv()).await {
                Err(_) => return Some(change),
                Ok(None) => return Some(change),
                Ok(Some(result)) => {
                    if let Some(next) = classify(result, document, trigger) {
                        change.trigger_written |= next.trigger_written;
                    }
                }
            }
        }
    }
}

fn classify(result: WatchResult, document: &Path, trigger: Option<&Path>) -> Option<SettledChange> {
    let event = match result {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(error = %error, "file watcher error");
            return None;
        }
    };
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    ) {
        return None;
    }
    let touches_document = event.paths.iter().any(|path| path == document);
    let touches_trigger = trigger
        .map(|trigger| event.paths.iter().any(|path| path == trigger))
        .unwrap_or(false);
    if !touches_document && !touches_trigger {
        return None;
    }
    let removal = matches!(event.kind, EventKind::Remove(_));
    Some(SettledChange {
        trigger_written: touches_trigger && !removal,
    })
}

fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // The file may not exist yet (trigger files usually appear later);
    // anchor it to its canonical parent so event paths still compare.
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
