//! Named periodic tasks with scoped lifetimes.
//!
//! Every polling loop in Classgate is a [`Scheduler`] task: a Tokio task
//! that runs a job on each tick of its [`TickScheduler`] and whenever its
//! trigger is notified. The [`TaskHandle`] returned by
//! [`Scheduler::spawn`] owns the task:
//!
//! ```text
//! spawn() ──→ TaskHandle ──→ stop() / drop
//!                 │               │
//!                 ▼               ▼
//!          task registered   task aborted + unregistered
//! ```
//!
//! Because stopping happens in `Drop`, every exit path of the owner
//! (early return, `?`, panic unwinding) releases the timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;
use tokio::task::AbortHandle;

use crate::{TickConfig, TickScheduler};

/// One registry entry per running task.
struct RegisteredTask {
    name: String,
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
}

impl RegisteredTask {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }
}

#[derive(Default)]
struct Registry {
    tasks: Mutex<HashMap<u64, RegisteredTask>>,
    next_id: AtomicU64,
}

impl Registry {
    fn tasks(&self) -> MutexGuard<'_, HashMap<u64, RegisteredTask>> {
        // A panic while holding this lock can't leave the map half-updated
        // (every mutation is a single insert/remove), so poisoning is ignored.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of named periodic tasks.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct Scheduler {
    registry: Arc<Registry>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a periodic task named `name`.
    ///
    /// `job` runs on every tick of a ticker built from `config` and every
    /// time `trigger` is notified. It does NOT run at spawn time: callers
    /// that need an immediate evaluation do it themselves before spawning.
    ///
    /// The task lives until the returned [`TaskHandle`] is stopped or
    /// dropped, or until [`shutdown`](Self::shutdown).
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(
        &self,
        name: impl Into<String>,
        config: TickConfig,
        trigger: Arc<Notify>,
        mut job: F,
    ) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));

        let task_cancelled = Arc::clone(&cancelled);
        let task_name = name.clone();
        let join = tokio::spawn(async move {
            let mut ticker = TickScheduler::new(config);
            loop {
                tokio::select! {
                    _ = trigger.notified() => {
                        tracing::trace!(task = %task_name, "task triggered");
                    }
                    tick = ticker.wait_for_tick() => {
                        tracing::trace!(task = %task_name, tick, "task tick");
                    }
                }
                // A stop that lands while we were waiting must win over
                // the wake-up that raced it.
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                job();
            }
        });

        self.registry.tasks().insert(
            id,
            RegisteredTask {
                name: name.clone(),
                abort: join.abort_handle(),
                cancelled: Arc::clone(&cancelled),
            },
        );

        tracing::debug!(task = %name, id, "periodic task started");

        TaskHandle {
            id,
            name,
            cancelled,
            abort: join.abort_handle(),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Names of the tasks still running, sorted.
    pub fn active_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .tasks()
            .values()
            .map(|task| task.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.registry.tasks().len()
    }

    /// Returns `true` if no task is running.
    pub fn is_empty(&self) -> bool {
        self.registry.tasks().is_empty()
    }

    /// Stops every task. Outstanding handles become inert.
    pub fn shutdown(&self) {
        let drained: Vec<RegisteredTask> =
            self.registry.tasks().drain().map(|(_, task)| task).collect();
        for task in &drained {
            task.cancel();
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "scheduler shut down");
        }
    }
}

/// Owner of one periodic task. Stops the task when dropped.
pub struct TaskHandle {
    id: u64,
    name: String,
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
    registry: Weak<Registry>,
}

impl TaskHandle {
    /// The task's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the task has been stopped (by this handle or a shutdown).
    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stops the task. Idempotent.
    pub fn stop(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.abort.abort();
        if let Some(registry) = self.registry.upgrade() {
            registry.tasks().remove(&self.id);
        }
        tracing::debug!(task = %self.name, id = self.id, "periodic task stopped");
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_registers_named_task() {
        let scheduler = Scheduler::new();
        let _a = scheduler.spawn(
            "sessionCheck",
            TickConfig::exact(Duration::from_secs(30)),
            Arc::new(Notify::new()),
            || {},
        );
        let _b = scheduler.spawn(
            "warningCheck",
            TickConfig::exact(Duration::from_secs(10)),
            Arc::new(Notify::new()),
            || {},
        );

        assert_eq!(scheduler.active_tasks(), vec!["sessionCheck", "warningCheck"]);
        assert_eq!(scheduler.len(), 2);
    }

    #[tokio::test]
    async fn test_drop_handle_unregisters_task() {
        let scheduler = Scheduler::new();
        let handle = scheduler.spawn(
            "sessionCheck",
            TickConfig::exact(Duration::from_secs(30)),
            Arc::new(Notify::new()),
            || {},
        );
        assert_eq!(scheduler.len(), 1);

        drop(handle);

        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let scheduler = Scheduler::new();
        let mut handle = scheduler.spawn(
            "sessionCheck",
            TickConfig::exact(Duration::from_secs(30)),
            Arc::new(Notify::new()),
            || {},
        );

        handle.stop();
        handle.stop();

        assert!(handle.is_stopped());
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_marks_handles_stopped() {
        let scheduler = Scheduler::new();
        let handle = scheduler.spawn(
            "warningCheck",
            TickConfig::exact(Duration::from_secs(10)),
            Arc::new(Notify::new()),
            || {},
        );

        scheduler.shutdown();

        assert!(handle.is_stopped());
        assert!(scheduler.active_tasks().is_empty());
    }
}
