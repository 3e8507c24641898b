use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Fan-out executor used by every parallel phase.
///
/// `parallelism == 0` spawns everything at once (one task per item, no
/// limit). Any other value caps the number of tasks running their body at
/// the same time; the rest wait for a permit. [`TaskPool::join_all`] is the
/// barrier that ends a phase.
pub struct TaskPool<T> {
    tasks: JoinSet<T>,
    permits: Option<Arc<Semaphore>>,
}

impl<T: Send + 'static> TaskPool<T> {
    pub fn new(parallelism: usize) -> Self {
        let permits = if parallelism == 0 {
            None
        } else {
            Some(Arc::new(Semaphore::new(parallelism)))
        };
        Self {
            tasks: JoinSet::new(),
            permits,
        }
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tasks.spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            task.await
        });
    }

    /// Wait for every spawned task. Panicked tasks come back as `Err`.
    pub async fn join_all(mut self) -> Vec<Result<T, JoinError>> {
        let mut out = Vec::with_capacity(self.tasks.len());
        while let Some(res) = self.tasks.join_next().await {
            out.push(res);
        }
        out
    }
}
