//! Bounded-concurrency dispatch primitives.
//!
//! Two interchangeable primitives enforce "at most K decode tasks in flight":
//!
//! - [`AdmissionQueue`] reproduces the legacy scheduling exactly: tasks are
//!   reaped in admission order, so once the cap is reached a new submission
//!   blocks on the *oldest admitted* task even if younger tasks finished
//!   first (head-of-line blocking).
//! - [`WorkerPool`] is the redesigned scheme: a semaphore caps how many
//!   wrapped futures run at once, submission never blocks, and results are
//!   reaped in completion order. Same in-flight bound, strictly better
//!   throughput.
//!
//! Both are generic over the task output, carry no work stealing, priorities
//! or per-task cancellation, and leave retry policy to the caller. Region
//! output is identical under either primitive because tile patches land in
//! disjoint destination rectangles.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};

/// Default maximum number of decode tasks in flight per region request.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Which dispatch primitive a compositor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Legacy-exact scheduling: reap in admission order (head-of-line).
    AdmissionOrdered,

    /// Reap in completion order via a semaphore-capped pool.
    #[default]
    CompletionOrdered,
}

// =============================================================================
// Admission-Ordered Queue
// =============================================================================

/// Bounded task queue that reaps in admission order.
///
/// Every submitted task starts immediately. When the number of admitted,
/// not-yet-reaped tasks reaches the cap, `submit` awaits the oldest admitted
/// task and yields its result before returning; `drain` awaits the rest in
/// admission order. A slow early task therefore stalls admission of later
/// ones — that head-of-line behavior is the point of this variant.
pub struct AdmissionQueue<T> {
    max_in_flight: usize,
    inflight: VecDeque<JoinHandle<T>>,
}

impl<T: Send + 'static> AdmissionQueue<T> {
    /// Create a queue with the given in-flight cap.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero.
    pub fn new(max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be at least 1");
        Self {
            max_in_flight,
            inflight: VecDeque::new(),
        }
    }

    /// Number of admitted, not-yet-reaped tasks.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    /// Whether no tasks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }

    /// Start a task, reaping the oldest admitted task first when at the cap.
    ///
    /// Returns the oldest task's result when the cap forced a reap, `None`
    /// otherwise. A returned `Err` is the join failure of the *reaped* task
    /// (it panicked or was aborted), not of the one just submitted.
    pub async fn submit<F>(&mut self, task: F) -> Option<Result<T, JoinError>>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.inflight.push_back(tokio::spawn(task));
        if self.inflight.len() >= self.max_in_flight {
            // Queue is non-empty here, so the pop cannot fail.
            let oldest = self.inflight.pop_front()?;
            return Some(oldest.await);
        }
        None
    }

    /// Await every outstanding task, in admission order.
    pub async fn drain(&mut self) -> Vec<Result<T, JoinError>> {
        let mut results = Vec::with_capacity(self.inflight.len());
        while let Some(handle) = self.inflight.pop_front() {
            results.push(handle.await);
        }
        results
    }
}

// =============================================================================
// Completion-Ordered Pool
// =============================================================================

/// Semaphore-capped task pool that reaps in completion order.
///
/// All submitted futures are spawned immediately, but each waits for one of
/// `max_in_flight` permits before running its work, so at most that many
/// tasks make progress at once. `join_next` yields results as tasks finish.
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool with the given in-flight cap.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero.
    pub fn new(max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be at least 1");
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            tasks: JoinSet::new(),
        }
    }

    /// Number of tasks not yet reaped (running or waiting for a permit).
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are outstanding.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Submit a task. Never blocks; the task runs once a permit frees up.
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore lives as long as the pool and is never closed.
            let _permit = permits
                .acquire_owned()
                .await
                .expect("dispatch semaphore closed");
            task.await
        });
    }

    /// Await the next task to finish. `None` once the pool is empty.
    pub async fn join_next(&mut self) -> Option<Result<T, JoinError>> {
        self.tasks.join_next().await
    }
}

// =============================================================================
// Tests
// =============================================================================
