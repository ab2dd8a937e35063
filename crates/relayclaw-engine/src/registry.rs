//! Live job registry: at most one running task per key.
//!
//! Starting a job under an occupied key cancels the old task first.
//! Cancellation is cooperative — jobs receive a [`CancelSignal`] and must
//! check it at each loop top and before each per-destination delivery.
//! Finished jobs deregister themselves on their terminal branch; entries are
//! generation-tagged so a job that was replaced never evicts its successor.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Cooperative cancellation handle passed into every job.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Non-blocking check, used between deliveries.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Used inside `select!` against
    /// the job's sleep so a cancelled job never sleeps out its full interval.
    pub async fn cancelled(&mut self) {
        // Closed sender also counts as cancellation.
        let _ = self.rx.wait_for(|c| *c).await;
    }

    /// A signal that never reports cancelled, for one-pass deliveries that
    /// run outside the registry.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }
}

struct Entry {
    generation: u64,
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Entry>,
    next_generation: u64,
}

/// Shared registry of live tasks. Cheap to clone; all clones see one map.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `job` under `key`, cancelling and replacing any existing task.
    /// After this returns, exactly one live task is registered under `key`.
    pub async fn start<F, Fut>(&self, key: &str, job: F)
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;

        if let Some(old) = inner.tasks.remove(key) {
            tracing::info!("replacing live task under key '{key}'");
            let _ = old.cancel.send(true);
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let signal = CancelSignal { rx: cancel_rx };
        let registry = self.clone();
        let owned_key = key.to_string();
        let fut = job(signal);

        let join = tokio::spawn(async move {
            fut.await;
            registry.deregister(&owned_key, generation).await;
        });

        inner.tasks.insert(
            key.to_string(),
            Entry {
                generation,
                cancel: cancel_tx,
                join,
            },
        );
    }

    /// Cancel and remove the task under `key`. Returns false if absent (no-op).
    pub async fn stop(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.tasks.remove(key) {
            Some(entry) => {
                let _ = entry.cancel.send(true);
                tracing::info!("stopped task '{key}'");
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every task.
    pub async fn stop_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let n = inner.tasks.len();
        for (key, entry) in inner.tasks.drain() {
            let _ = entry.cancel.send(true);
            tracing::debug!("stopped task '{key}'");
        }
        n
    }

    /// Number of registered tasks.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.tasks.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.tasks.contains_key(key)
    }

    /// Defensive sweep: drop entries whose task already finished but has not
    /// yet run its deregistration (or was aborted out-of-band). The terminal
    /// branch normally keeps the map clean; this is the maintenance pass.
    pub async fn sweep_finished(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|_, e| !e.join.is_finished());
        before - inner.tasks.len()
    }

    /// Remove `key` only if it still holds the task of `generation`.
    async fn deregister(&self, key: &str, generation: u64) {
        let mut inner = self.inner.lock().await;
        let matches = inner
            .tasks
            .get(key)
            .is_some_and(|e| e.generation == generation);
        if matches {
            inner.tasks.remove(key);
            tracing::debug!("task '{key}' finished and deregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_start_registers_exactly_one() {
        let registry = TaskRegistry::new();
        registry
            .start("k", |mut signal| async move {
                signal.cancelled().await;
            })
            .await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains("k").await);
    }

    #[tokio::test]
    async fn test_replacement_cancels_previous() {
        let registry = TaskRegistry::new();
        let first_cancelled = Arc::new(AtomicBool::new(false));

        let flag = first_cancelled.clone();
        registry
            .start("k", |mut signal| async move {
                signal.cancelled().await;
                flag.store(true, Ordering::SeqCst);
            })
            .await;

        registry
            .start("k", |mut signal| async move {
                signal.cancelled().await;
            })
            .await;

        // Let the first task observe its cancellation.
        sleep(Duration::from_millis(50)).await;
        assert!(first_cancelled.load(Ordering::SeqCst));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_stop_absent_is_noop() {
        let registry = TaskRegistry::new();
        assert!(!registry.stop("nothing").await);
    }

    #[tokio::test]
    async fn test_finished_task_self_deregisters() {
        let registry = TaskRegistry::new();
        registry.start("quick", |_signal| async move {}).await;
        // The job body is empty; give its terminal branch a moment to run.
        sleep(Duration::from_millis(50)).await;
        assert!(!registry.contains("quick").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_stop_all_clears_everything() {
        let registry = TaskRegistry::new();
        for key in ["a", "b", "c"] {
            registry
                .start(key, |mut signal| async move {
                    signal.cancelled().await;
                })
                .await;
        }
        assert_eq!(registry.stop_all().await, 3);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_replacement_survives_predecessor_exit() {
        let registry = TaskRegistry::new();
        registry.start("k", |_signal| async move {}).await;
        registry
            .start("k", |mut signal| async move {
                signal.cancelled().await;
            })
            .await;
        sleep(Duration::from_millis(50)).await;
        // The finished first task must not have evicted its replacement.
        assert!(registry.contains("k").await);
    }
}
