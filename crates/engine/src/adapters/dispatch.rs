// crates/engine/src/adapters/dispatch.rs

//! Deferred task execution.
//!
//! Long-running or fire-and-forget work (audit flushes, delayed retries) is
//! handed to a dispatcher instead of blocking the calling thread.
//! Cancellation is advisory: a task already handed to a worker may run to
//! completion regardless.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::error::EngineResult;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

pub trait TaskDispatcher: Send + Sync {
  /// Schedule `task` to run after `delay`. `on_independent_thread` asks for
  /// a dedicated worker rather than the shared pool.
  fn dispatch(&self, task: Task, delay: Duration, on_independent_thread: bool) -> TaskId;

  /// Best-effort cancellation of one task. The return value reports whether
  /// the attempt took hold, not that the task never ran.
  fn cancel(&self, id: TaskId) -> bool;

  /// Best-effort cancellation of everything still scheduled.
  fn cancel_all(&self);
}

/// Default dispatcher backed by a dedicated tokio runtime.
pub struct TokioTaskDispatcher {
  runtime: tokio::runtime::Runtime,
  next_id: AtomicU64,
  tasks: Mutex<HashMap<TaskId, tokio::task::JoinHandle<()>>>,
}

impl TokioTaskDispatcher {
  pub fn new() -> EngineResult<Self> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
      .worker_threads(2)
      .enable_time()
      .thread_name("seal-dispatch")
      .build()?;
    Ok(Self {
      runtime,
      next_id: AtomicU64::new(0),
      tasks: Mutex::new(HashMap::new()),
    })
  }
}

impl TaskDispatcher for TokioTaskDispatcher {
  fn dispatch(&self, task: Task, delay: Duration, on_independent_thread: bool) -> TaskId {
    let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let handle = self.runtime.spawn(async move {
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      if on_independent_thread {
        let _ = tokio::task::spawn_blocking(task).await;
      } else {
        task();
      }
    });
    if let Ok(mut tasks) = self.tasks.lock() {
      tasks.retain(|_, h| !h.is_finished());
      tasks.insert(id, handle);
    }
    id
  }

  fn cancel(&self, id: TaskId) -> bool {
    let handle = self.tasks.lock().ok().and_then(|mut tasks| tasks.remove(&id));
    match handle {
      Some(handle) if !handle.is_finished() => {
        handle.abort();
        true
      }
      _ => false,
    }
  }

  fn cancel_all(&self) {
    if let Ok(mut tasks) = self.tasks.lock() {
      for (_, handle) in tasks.drain() {
        handle.abort();
      }
    }
  }
}

impl fmt::Debug for TokioTaskDispatcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokioTaskDispatcher").finish_non_exhaustive()
  }
}
