//! Work an event has started but not finished.
//!
//! Background cache writes and revalidation fetches are spawned into the
//! owning event's `PendingWork`. The event is only settled once every task in
//! the set has completed, so the host knows when the engine may be torn down.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Set of detached tasks owned by one event.
///
/// Clones share the same set. Dropping the last clone, or a `settled()` call
/// mid-wait, detaches whatever is still running. Detached tasks run to
/// completion on the runtime but can no longer be awaited.
#[derive(Clone, Default)]
pub struct PendingWork {
    inner: Arc<Tracked>,
}

#[derive(Default)]
struct Tracked {
    tasks: Mutex<JoinSet<()>>,
    /// Tasks taken out of `tasks` by a running `settled()`.
    draining: AtomicUsize,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.tasks.get_mut().detach_all();
    }
}

/// A batch being joined by `settled()`.
struct Draining<'a> {
    batch: JoinSet<()>,
    count: &'a AtomicUsize,
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(self.batch.len(), Ordering::SeqCst);
        self.batch.detach_all();
    }
}

impl PendingWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a unit of work with no return path to the caller.
    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.lock().await.spawn(task);
    }

    /// Number of tasks not yet finished, including any a `settled()` call is waiting on.
    pub async fn len(&self) -> usize {
        let tasks = self.inner.tasks.lock().await;
        tasks.len() + self.inner.draining.load(Ordering::SeqCst)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait until every spawned task, including ones spawned meanwhile, has finished.
    pub async fn settled(&self) {
        loop {
            let batch = {
                let mut tasks = self.inner.tasks.lock().await;
                let batch = std::mem::take(&mut *tasks);
                self.inner.draining.fetch_add(batch.len(), Ordering::SeqCst);
                batch
            };
            if batch.is_empty() {
                return;
            }

            let mut draining = Draining { batch, count: &self.inner.draining };
            while let Some(result) = draining.batch.join_next().await {
                draining.count.fetch_sub(1, Ordering::SeqCst);
                if let Err(e) = result {
                    tracing::warn!(error = %e, "pending task did not complete");
                }
            }
        }
    }
}

impl std::fmt::Debug for PendingWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWork").finish_non_exhaustive()
    }
}
