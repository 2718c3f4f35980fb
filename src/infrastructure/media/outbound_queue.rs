//! Bounded outbound frame queue
//!
//! When full, the oldest queued frame is dropped so playback latency stays
//! bounded by the queue length.

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

pub struct OutboundQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    capacity: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> OutboundQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue an item, returning how many old items were dropped to make room
    ///
    /// Items pushed after [`close`](Self::close) are discarded and count as dropped.
    pub fn push(&self, item: T) -> usize {
        let dropped = {
            let mut inner = self.lock();
            if inner.closed {
                return 1;
            }
            let mut dropped = 0;
            while inner.items.len() >= self.capacity {
                inner.items.pop_front();
                dropped += 1;
            }
            inner.items.push_back(item);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    /// Wait for the next item; `None` once closed and drained
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Stop accepting items; pending items can still be drained
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        // A poisoned queue still holds valid frames
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
