//! Shared task registry for guild background work.
//!
//! Event handlers, verification waits and scheduled unbans all run as tasks
//! tracked here, so shutting the registry down stops every one of them.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Tracks spawned tasks and stops them together
#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a task that is dropped at its next await point once shutdown
    /// is signalled. After shutdown the task never starts.
    pub fn spawn_cancellable<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            if *shutdown_rx.borrow_and_update() {
                return;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        self.track(handle);
    }

    /// Shutdown has been signalled
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Tasks spawned and not yet finished
    pub fn active_tasks(&self) -> usize {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Signal shutdown and abort every tracked task
    pub fn shutdown(&self) {
        // `send` drops the value when no task is subscribed.
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_cancellable_tasks() {
        let registry = TaskRegistry::new();
        let finished = Arc::new(AtomicBool::new(false));

        let flag = finished.clone();
        registry.spawn_cancellable(async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(registry.active_tasks(), 1);

        registry.shutdown();
        tokio::time::sleep(Duration::from_secs(7200)).await;

        assert!(registry.is_shutdown());
        assert!(!finished.load(Ordering::SeqCst));
        assert_eq!(registry.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned() {
        let registry = TaskRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry.spawn_cancellable(async move {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        tokio::task::yield_now().await;

        registry.spawn_cancellable(std::future::pending());
        assert!(registry.active_tasks() <= 2);
        registry.shutdown();
    }

    #[test]
    fn test_shutdown_without_live_tasks() {
        let registry = TaskRegistry::new();
        assert!(!registry.is_shutdown());
        registry.shutdown();
        assert!(registry.is_shutdown());
    }

    #[tokio::test]
    async fn test_task_spawned_after_shutdown_never_runs() {
        let registry = TaskRegistry::new();
        registry.shutdown();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        registry.spawn_cancellable(async move {
            flag.store(true, Ordering::SeqCst);
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!ran.load(Ordering::SeqCst));
    }
}
