// Watch dispatcher
//
// A polling watcher scans the private HLS root and forwards create/modify
// notifications into a channel. One task drains the channel and awaits each
// strategy callback before taking the next notification, so callbacks see
// files in the order they appeared.

use crate::classifier::Classifier;
use crate::strategy::WatcherStrategy;
use hlsrelay_core::{Error, Result};
use notify::{Config, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notification {
    path: PathBuf,
    created: bool,
}

fn notifications(event: Event) -> Vec<Notification> {
    let created = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(_) => false,
        // Removals and access events carry nothing to publish
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| Notification { path, created })
        .collect()
}

pub struct Dispatcher {
    classifier: Classifier,
    strategy: Arc<WatcherStrategy>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(classifier: Classifier, strategy: Arc<WatcherStrategy>, poll_interval: Duration) -> Self {
        Self {
            classifier,
            strategy,
            poll_interval,
        }
    }

    /// Start watching. Fails if the root cannot be watched.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self, cancel: CancellationToken) -> Result<DispatcherHandle> {
        let root = self.classifier.root().to_path_buf();
        // PollWatcher accepts a missing path and simply never reports
        if !root.is_dir() {
            return Err(Error::Watch(format!(
                "Watch root {} is not a directory",
                root.display()
            )));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = PollWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for notification in notifications(event) {
                        if event_tx.send(notification).is_err() {
                            // consumer is gone, shutting down
                            return;
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(|e| Error::Watch(format!("Failed to create watcher: {e}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(format!("Failed to watch {}: {e}", root.display())))?;

        tracing::info!(
            root = %root.display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watching transcoder output"
        );

        let task = tokio::spawn(run(self.classifier, self.strategy, event_rx, cancel.clone()));

        Ok(DispatcherHandle {
            watcher,
            task,
            cancel,
        })
    }
}

async fn run(
    classifier: Classifier,
    strategy: Arc<WatcherStrategy>,
    mut event_rx: mpsc::UnboundedReceiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            () = cancel.cancelled() => break,
            next = event_rx.recv() => match next {
                Some(notification) => notification,
                None => break,
            },
        };
        dispatch(&classifier, &strategy, notification).await;
    }

    tracing::info!("Watch dispatcher stopped");
}

async fn dispatch(classifier: &Classifier, strategy: &WatcherStrategy, notification: Notification) {
    let Notification { path, created } = notification;

    let is_dir = tokio::fs::metadata(&path)
        .await
        .is_ok_and(|m| m.is_dir());
    // Directories only matter when they appear
    if is_dir && !created {
        return;
    }

    let kind = classifier.classify(&path, is_dir);
    if let Err(e) = strategy.handle(kind, &path).await {
        tracing::warn!(path = %path.display(), kind = ?kind, "Dropped notification: {}", e);
    }
}

/// Keeps the watcher alive; stops it on `shutdown`
pub struct DispatcherHandle {
    watcher: PollWatcher,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl DispatcherHandle {
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.watcher);
        if let Err(e) = self.task.await {
            tracing::error!("Watch dispatcher task failed: {}", e);
        }
    }
}
