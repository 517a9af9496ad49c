//! Cancellable, awaitable task handle.
//!
//! A [`DeferredTask`] wraps a spawned asynchronous unit of work (one
//! message loop run) with an observable lifecycle state, a single-claim
//! result slot, and a best-effort [`DeferredTask::kill`]. Killing aborts
//! the task at its next await point, so history is left at whatever state
//! the last completed append produced.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::error::{OverseerError, Result};

/// Lifecycle state of a [`DeferredTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created but not yet polled by the runtime.
    Pending,
    /// Currently executing.
    Running,
    /// Finished with a success value.
    Completed,
    /// Finished with an error.
    Failed,
    /// Aborted via [`DeferredTask::kill`].
    Cancelled,
}

/// A spawned unit of work with a single result slot.
///
/// The result may be claimed by at most one logical caller via
/// [`DeferredTask::result`]; a second claim errors rather than hanging.
pub struct DeferredTask {
    state: Arc<Mutex<TaskState>>,
    handle: Mutex<Option<JoinHandle<Result<String>>>>,
}

impl DeferredTask {
    /// Spawn `future` onto the runtime and wrap it.
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<String>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(TaskState::Pending));
        let task_state = Arc::clone(&state);

        let handle = tokio::spawn(async move {
            set_state(&task_state, TaskState::Running);
            let outcome = future.await;
            let next = match &outcome {
                Ok(_) => TaskState::Completed,
                Err(_) => TaskState::Failed,
            };
            set_state(&task_state, next);
            outcome
        });

        Self {
            state,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the task is still doing work.
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), TaskState::Pending | TaskState::Running)
    }

    /// Await the task's result.
    ///
    /// Suspends until completion and returns the task's value, or raises
    /// its failure. May be called by at most one logical caller; a second
    /// call returns a `Task` error.
    pub async fn result(&self) -> Result<String> {
        let handle = {
            let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        let handle = handle.ok_or_else(|| {
            OverseerError::Task("task result already claimed".to_string())
        })?;

        match handle.await {
            Ok(outcome) => outcome,
            Err(join) if join.is_cancelled() => Err(OverseerError::Cancelled),
            Err(join) => Err(OverseerError::Fatal(format!("task panicked: {}", join))),
        }
    }

    /// Abort the task.
    ///
    /// Safe to call whether or not the task has already completed, and
    /// safe to call repeatedly. A task that already finished keeps its
    /// terminal state.
    pub fn kill(&self) {
        let slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.as_ref() {
            handle.abort();
        }
        drop(slot);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*state, TaskState::Pending | TaskState::Running) {
            *state = TaskState::Cancelled;
        }
    }
}

fn set_state(state: &Arc<Mutex<TaskState>>, next: TaskState) {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    // kill() wins over a racing completion write
    if *guard != TaskState::Cancelled {
        *guard = next;
    }
}
