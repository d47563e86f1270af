//! Deferred execution capabilities handed to the sync service.

use futures_util::future::BoxFuture;
use std::sync::Mutex;

/// Boxed unit of work queued by the sync service.
pub type Task = BoxFuture<'static, ()>;

/// Accepts work to run outside the caller's critical path.
pub trait TaskScheduler: Send + Sync {
    /// Queue `task` for later execution.
    fn schedule(&self, task: Task);
}

/// Spawns every task onto the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        tokio::spawn(task);
    }
}

/// Collects tasks so they can be run once the current response has been produced.
#[derive(Default)]
pub struct DeferredTasks {
    tasks: Mutex<Vec<Task>>,
}

impl DeferredTasks {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the queue and run each task to completion, in submission order.
    pub async fn run_all(&self) {
        let tasks = std::mem::take(&mut *self.lock());
        for task in tasks {
            task.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskScheduler for DeferredTasks {
    fn schedule(&self, task: Task) {
        self.lock().push(task);
    }
}
