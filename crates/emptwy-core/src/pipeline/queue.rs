//! FIFO queue with join semantics.
//!
//! Every `put` increments an unfinished counter and every successful `get`
//! must eventually be matched by one `task_done`. `join` resolves once the
//! counter is back at zero.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{EmptwyError, Result};

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items put but not yet marked done
    unfinished: usize,
}

/// Multi-producer, multi-consumer queue with a join barrier
pub struct JoinableQueue<T> {
    state: Mutex<QueueState<T>>,
    item_ready: Notify,
    all_done: Notify,
}

impl<T> JoinableQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                unfinished: 0,
            }),
            item_ready: Notify::new(),
            all_done: Notify::new(),
        }
    }

    /// Append to the tail and wake one waiting consumer
    pub fn put(&self, item: T) {
        {
            let mut state = self.state.lock();
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.item_ready.notify_one();
    }

    /// Pop the head, waiting while the queue is empty
    pub async fn get(&self) -> T {
        loop {
            // Register interest before checking so a put in between is not lost
            let notified = self.item_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_get() {
                return item;
            }
            notified.await;
        }
    }

    pub fn try_get(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.items.pop_front();
        let more = !state.items.is_empty();
        drop(state);

        // Pass the wakeup along so one notify per item is never swallowed
        if item.is_some() && more {
            self.item_ready.notify_one();
        }
        item
    }

    /// Mark one previously dequeued item as finished
    pub fn task_done(&self) -> Result<()> {
        let remaining = {
            let mut state = self.state.lock();
            if state.unfinished == 0 {
                return Err(EmptwyError::Worker(
                    "task_done called more times than items were put".to_string(),
                ));
            }
            state.unfinished -= 1;
            state.unfinished
        };

        if remaining == 0 {
            self.all_done.notify_waiters();
        }
        Ok(())
    }

    /// Wait until every item put so far has been marked done
    pub async fn join(&self) {
        loop {
            let notified = self.all_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn unfinished(&self) -> usize {
        self.state.lock().unfinished
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for JoinableQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
