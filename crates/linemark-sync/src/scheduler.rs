use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

#[derive(Debug)]
struct PendingTask {
    id: u64,
    abort: AbortHandle,
}

type Registry<K> = Arc<Mutex<HashMap<K, PendingTask>>>;

/// Debounces work per key: scheduling under a key cancels whatever was still
/// waiting under it.
///
/// A burst of schedules inside one quiet period therefore fires once, after
/// the last of them. Tasks run on the Tokio runtime that was current when
/// they were scheduled and see whatever state exists when they fire.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use linemark_sync::ChangeScheduler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = ChangeScheduler::new(Duration::from_millis(10));
/// scheduler.schedule("doc", || println!("first"));
/// scheduler.schedule("doc", || println!("only this one fires"));
/// assert_eq!(scheduler.pending_count(), 1);
/// # }
/// ```
#[derive(Debug)]
pub struct ChangeScheduler<K>
where
    K: Eq + Hash,
{
    quiet_period: Duration,
    pending: Registry<K>,
    next_id: AtomicU64,
}

impl<K> ChangeScheduler<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Schedule `task` to run one quiet period from now.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule<F>(&self, key: K, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_after(key, self.quiet_period, task);
    }

    /// Schedule `task` to run after `delay`, superseding any task still
    /// waiting under `key`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule_after<F>(&self, key: K, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Holding the lock across spawn keeps the new task from looking itself
        // up before it has been registered.
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.remove(&key) {
            previous.abort.abort();
            tracing::trace!(?key, "Superseded pending recompute");
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_current = {
                let mut pending = registry.lock();
                match pending.get(&task_key) {
                    Some(entry) if entry.id == id => {
                        pending.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };
            if still_current {
                tracing::trace!(key = ?task_key, "Debounced task fired");
                task();
            }
        });

        pending.insert(
            key,
            PendingTask {
                id,
                abort: handle.abort_handle(),
            },
        );
    }

    /// Cancel the task waiting under `key`. Returns whether one was waiting.
    ///
    /// Cancelling a key with nothing pending, or whose task already fired, is
    /// a no-op.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.lock().remove(key) {
            Some(task) => {
                task.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every waiting task.
    pub fn cancel_all(&self) {
        for (_, task) in self.pending.lock().drain() {
            task.abort.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<K> Drop for ChangeScheduler<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        for (_, task) in self.pending.lock().drain() {
            task.abort.abort();
        }
    }
}
