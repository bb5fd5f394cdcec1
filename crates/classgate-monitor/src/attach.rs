//! The timer + listener pair every monitor owns.
//!
//! A monitor recomputes on two kinds of wake-up: its own period and any
//! auth change. Both must be torn down together, so they live in one
//! value whose `Drop` releases them:
//!
//! ```text
//!   SessionManager ──listener──→ trigger.notify_one()
//!                                     │
//!   Scheduler task: select! { trigger.notified(), ticker.wait_for_tick() }
//!                                     │
//!                                     ▼
//!                                   job()
//! ```
//!
//! The listener only pokes the trigger. It never runs the job itself, so a
//! job that clears the session (and so notifies) can't re-enter itself.

use std::sync::Arc;

use classgate_session::{ListenerId, SessionManager};
use classgate_tick::{Scheduler, TaskHandle, TickConfig};
use tokio::sync::Notify;

pub(crate) struct Attachment {
    manager: Arc<SessionManager>,
    listener: Option<ListenerId>,
    task: Option<TaskHandle>,
}

impl Attachment {
    /// Registers the listener and spawns the named task running `job`.
    pub(crate) fn new<F>(
        manager: &Arc<SessionManager>,
        scheduler: &Scheduler,
        name: &'static str,
        tick: TickConfig,
        job: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());

        let listener_trigger = Arc::clone(&trigger);
        let listener = manager.add_listener(move || listener_trigger.notify_one());
        let task = scheduler.spawn(name, tick, trigger, job);

        Self {
            manager: Arc::clone(manager),
            listener: Some(listener),
            task: Some(task),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Removes the listener and stops the task. Idempotent.
    pub(crate) fn detach(&mut self) {
        if let Some(id) = self.listener.take() {
            self.manager.remove_listener(id);
        }
        if let Some(mut task) = self.task.take() {
            task.stop();
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        self.detach();
    }
}
