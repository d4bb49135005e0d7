//! Per-worker FIFO of zero-argument closures: the worker's event loop
//! backbone. Lifecycle commands, mailbox drains, and timer updates are
//! all just tasks pushed onto this queue.

use std::collections::VecDeque;

use parking_lot::Mutex;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A low-frequency, mutex-guarded FIFO. Unlike the mailbox there is only
/// ever one consumer (the owning worker thread) and pushes are rare
/// enough that a plain mutex (no spin-then-park tuning) is plenty.
pub struct TaskQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, task: Task) {
        self.inner.lock().push_back(task);
    }

    /// Pops and returns the next task, if any, without blocking.
    pub fn pop(&self) -> Option<Task> {
        self.inner.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        TaskQueue::new()
    }
}
