//! Bounded background task executor.
//!
//! A fixed-size pool of worker threads runs submitted work off the calling
//! thread. Tasks are tracked by caller-supplied id from submission until
//! their completion or error notification has been produced, and each task
//! delivers exactly one notification through its [`TaskHandle`].
//!
//! The executor guarantees only that the work itself runs off the caller's
//! thread; work must not mutate caller-owned state except through a
//! thread-safe channel. No ordering is guaranteed between tasks with
//! different ids, and the executor does not deduplicate work; at-most-once
//! policies belong to the layer that submits.
//!
//! Cancellation is best-effort and only effective before a task starts:
//! queued work can be dequeued unrun, running work is never preempted. A
//! panic inside work is caught and surfaced through the task's error
//! notification; it never takes down the worker or other in-flight tasks.

use crate::error::{LupeError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

/// Default worker count when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Queued,
    Running,
    /// Cancelled before start; the entry is retired when the queue drains it.
    Cancelled,
}

struct QueuedTask {
    id: String,
    work: Box<dyn FnOnce() + Send>,
}

struct Shared {
    queue: Mutex<VecDeque<QueuedTask>>,
    work_available: Condvar,
    tasks: Mutex<HashMap<String, TaskState>>,
    shutting_down: AtomicBool,
}

/// Handle to a submitted task.
///
/// The completion or error notification is delivered exactly once. A task
/// cancelled before it started resolves to [`LupeError::TaskCancelled`].
pub struct TaskHandle<T> {
    id: String,
    receiver: Receiver<Result<T>>,
    shared: Arc<Shared>,
}

impl<T> TaskHandle<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the task is still tracked by the executor (queued or running).
    pub fn is_tracked(&self) -> bool {
        matches!(
            self.shared.tasks.lock().get(&self.id),
            Some(TaskState::Queued | TaskState::Running)
        )
    }

    /// Block until the task produces its result or error.
    pub fn wait(self) -> Result<T> {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => Err(LupeError::TaskCancelled(self.id)),
        }
    }

    /// Non-blocking poll; `None` while the task is still pending or running.
    pub fn try_wait(&self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LupeError::TaskCancelled(self.id.clone()))),
        }
    }
}

/// Fixed-size worker pool with id-tracked tasks.
pub struct TaskExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    max_workers: usize,
}

impl TaskExecutor {
    /// Spawn a pool with `max_workers` worker threads (clamped to at least 1).
    pub fn new(max_workers: usize) -> Result<Self> {
        let max_workers = max_workers.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            work_available: Condvar::new(),
            tasks: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(max_workers);
        for index in 0..max_workers {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("lupe-worker-{index}"))
                .spawn(move || worker_loop(&shared))?;
            workers.push(handle);
        }

        tracing::info!(max_workers, "task executor started");
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            max_workers,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Submit work under a unique task id.
    ///
    /// Rejects ids that are still tracked (queued, running, or cancelled but
    /// not yet drained) and any submission after shutdown. Returns a handle
    /// carrying the single-shot result channel.
    pub fn submit<T, F>(&self, task_id: impl Into<String>, work: F) -> Result<TaskHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task_id = task_id.into();
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(LupeError::Executor(format!(
                "executor is shut down, rejecting task '{task_id}'"
            )));
        }

        {
            let mut tasks = self.shared.tasks.lock();
            if tasks.contains_key(&task_id) {
                return Err(LupeError::Executor(format!("task id '{task_id}' is already tracked")));
            }
            tasks.insert(task_id.clone(), TaskState::Queued);
        }

        let (sender, receiver) = mpsc::channel();
        let worker_id = task_id.clone();
        let task_shared = Arc::clone(&self.shared);
        let wrapped = Box::new(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(result) => result,
                Err(payload) => Err(LupeError::Executor(format!(
                    "task '{worker_id}' panicked: {}",
                    panic_message(payload.as_ref())
                ))),
            };
            if let Err(e) = &result {
                tracing::warn!(task = %worker_id, "background task failed: {e}");
            }
            // Retire the task before delivering its notification, so a
            // received result implies the id is no longer tracked.
            task_shared.tasks.lock().remove(&worker_id);
            // The receiver may be gone; a dropped handle is not an error.
            let _ = sender.send(result);
        });

        self.shared.queue.lock().push_back(QueuedTask {
            id: task_id.clone(),
            work: wrapped,
        });
        self.shared.work_available.notify_one();
        tracing::debug!(task = %task_id, "task queued");

        Ok(TaskHandle {
            id: task_id,
            receiver,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Attempt to cancel a task.
    ///
    /// Succeeds only while the task is still queued: the work body will never
    /// run and the handle resolves to a cancelled error. Returns false for
    /// running or unknown tasks; callers must not assume cancellation stops
    /// in-progress work.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut tasks = self.shared.tasks.lock();
        match tasks.get(task_id) {
            Some(TaskState::Queued) => {
                tasks.insert(task_id.to_string(), TaskState::Cancelled);
                tracing::info!(task = %task_id, "cancelled queued task");
                true
            }
            _ => false,
        }
    }

    /// Whether a task is still tracked (queued or running).
    pub fn is_running(&self, task_id: &str) -> bool {
        matches!(
            self.shared.tasks.lock().get(task_id),
            Some(TaskState::Queued | TaskState::Running)
        )
    }

    /// Number of tracked tasks (queued or running).
    pub fn active_count(&self) -> usize {
        self.shared
            .tasks
            .lock()
            .values()
            .filter(|state| matches!(state, TaskState::Queued | TaskState::Running))
            .count()
    }

    /// Shut the pool down.
    ///
    /// New submissions fail immediately. Work already queued still drains.
    /// With `wait = true` this blocks until every worker has exited; with
    /// `wait = false` workers are detached and finish best-effort. Safe to
    /// call more than once.
    pub fn shutdown(&self, wait: bool) {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            if wait {
                self.join_workers();
            }
            return;
        }
        tracing::info!("shutting down task executor");
        self.shared.work_available.notify_all();
        if wait {
            self.join_workers();
            tracing::info!("task executor shutdown complete");
        } else {
            self.workers.lock().clear();
        }
    }

    fn join_workers(&self) {
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("executor worker panicked during shutdown");
            }
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        // Signal shutdown so idle workers exit instead of waiting forever.
        self.shutdown(false);
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                if shared.shutting_down.load(Ordering::Acquire) {
                    return;
                }
                shared.work_available.wait(&mut queue);
            }
        };

        let should_run = {
            let mut tasks = shared.tasks.lock();
            match tasks.get(&task.id) {
                Some(TaskState::Queued) => {
                    tasks.insert(task.id.clone(), TaskState::Running);
                    true
                }
                // Cancelled (or already retired): drop the work unrun.
                _ => {
                    tasks.remove(&task.id);
                    false
                }
            }
        };

        if should_run {
            // The wrapped work retires its own tracking entry.
            (task.work)();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_bounded_concurrency_and_exactly_once_delivery() {
        let executor = TaskExecutor::new(2).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let current = Arc::clone(&current);
                let high_water = Arc::clone(&high_water);
                executor
                    .submit(format!("task-{i}"), move || {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(25));
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(i)
                    })
                    .unwrap()
            })
            .collect();

        let mut completed = 0;
        for handle in handles {
            handle.wait().unwrap();
            completed += 1;
        }

        assert_eq!(completed, 10);
        assert_eq!(high_water.load(Ordering::SeqCst), 2);
        assert_eq!(executor.active_count(), 0);
    }

    #[test]
    fn test_duplicate_task_id_rejected() {
        let executor = TaskExecutor::new(1).unwrap();
        let _blocker = executor
            .submit("same-id", || {
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            })
            .unwrap();

        let duplicate = executor.submit("same-id", || Ok(()));
        assert!(matches!(duplicate, Err(LupeError::Executor(_))));
    }

    #[test]
    fn test_cancel_before_start_never_runs_work() {
        let executor = TaskExecutor::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();

        let blocker = executor
            .submit("blocker", move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(100));
                Ok(())
            })
            .unwrap();
        started_rx.recv().unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let queued = executor
            .submit("queued", move || {
                ran_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert!(executor.cancel("queued"));
        assert!(!executor.is_running("queued"));

        assert!(matches!(queued.wait(), Err(LupeError::TaskCancelled(_))));
        blocker.wait().unwrap();
        assert!(!ran.load(Ordering::SeqCst), "cancelled work must never run");
    }

    #[test]
    fn test_cancel_after_start_returns_false() {
        let executor = TaskExecutor::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();

        let handle = executor
            .submit("running", move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                Ok(42)
            })
            .unwrap();
        started_rx.recv().unwrap();

        assert!(!executor.cancel("running"));
        assert_eq!(handle.wait().unwrap(), 42);
    }

    #[test]
    fn test_cancel_unknown_task_returns_false() {
        let executor = TaskExecutor::new(1).unwrap();
        assert!(!executor.cancel("never-submitted"));
    }

    #[test]
    fn test_work_error_surfaces_through_handle() {
        let executor = TaskExecutor::new(2).unwrap();
        let handle = executor
            .submit("failing", || -> Result<()> { Err(LupeError::validation("bad input")) })
            .unwrap();

        assert!(matches!(handle.wait(), Err(LupeError::Validation { .. })));
        assert_eq!(executor.active_count(), 0);
    }

    #[test]
    fn test_panic_is_captured_and_pool_survives() {
        let executor = TaskExecutor::new(1).unwrap();
        let panicking = executor
            .submit("panicking", || -> Result<()> { panic!("boom") })
            .unwrap();

        let err = panicking.wait().unwrap_err();
        assert!(err.to_string().contains("panicked"));
        assert!(err.to_string().contains("boom"));

        // The same worker must still serve subsequent tasks.
        let follow_up = executor.submit("follow-up", || Ok(7)).unwrap();
        assert_eq!(follow_up.wait().unwrap(), 7);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let executor = TaskExecutor::new(1).unwrap();
        executor.shutdown(true);

        let result = executor.submit("late", || Ok(()));
        assert!(matches!(result, Err(LupeError::Executor(_))));
    }

    #[test]
    fn test_shutdown_waits_for_queued_work() {
        let executor = TaskExecutor::new(1).unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);

        let _handle = executor
            .submit("slow", move || {
                std::thread::sleep(Duration::from_millis(50));
                flag_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        executor.shutdown(true);
        assert!(flag.load(Ordering::SeqCst), "queued work should drain before shutdown returns");
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let executor = TaskExecutor::new(2).unwrap();
        executor.shutdown(true);
        executor.shutdown(true);
        executor.shutdown(false);
    }

    #[test]
    fn test_try_wait_polls_without_blocking() {
        let executor = TaskExecutor::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let handle = executor
            .submit("slow", move || {
                started_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(50));
                Ok("done")
            })
            .unwrap();

        started_rx.recv().unwrap();
        assert!(handle.try_wait().is_none());
        assert!(handle.is_tracked());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(handle.try_wait().unwrap().unwrap(), "done");
        assert!(!handle.is_tracked());
    }

    #[test]
    fn test_worker_count_clamped_to_one() {
        let executor = TaskExecutor::new(0).unwrap();
        assert_eq!(executor.max_workers(), 1);
        let handle = executor.submit("only", || Ok(true)).unwrap();
        assert!(handle.wait().unwrap());
    }
}
