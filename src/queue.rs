// src/queue.rs

//! Bounded blocking FIFO shared between producer and consumer threads.

use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct State<T> {
    items: VecDeque<T>,
    exiting: bool,
}

/// Fixed-capacity queue: `push` blocks while full, `pop` blocks while empty.
///
/// Once [`JobQueue::shutdown`] is called every blocked caller wakes; from then
/// on `pop` returns `None` and `push` drops its item. There is no way back.
pub struct JobQueue<T> {
    state: Mutex<State<T>>,
    changed: Condvar,
    capacity: usize,
}

impl<T> JobQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        JobQueue {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                exiting: false,
            }),
            changed: Condvar::new(),
            capacity,
        }
    }

    /// A queue pre-filled with `items`; at most `capacity` of them are kept.
    pub fn with_items(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let queue = JobQueue::new(capacity);
        {
            let mut state = queue.state.lock();
            state.items.extend(items.into_iter().take(capacity));
        }
        queue
    }

    /// Appends `item`, waiting for room. Returns `false` (and drops the item)
    /// if the queue is shutting down.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.exiting {
            self.changed.wait(&mut state);
        }
        if state.exiting {
            return false;
        }
        state.items.push_back(item);
        self.changed.notify_all();
        true
    }

    /// Removes the oldest item, waiting for one. `None` once shutting down.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.items.is_empty() && !state.exiting {
            self.changed.wait(&mut state);
        }
        if state.exiting {
            return None;
        }
        let item = state.items.pop_front();
        self.changed.notify_all();
        item
    }

    /// Wakes every waiter and refuses further pushes and pops.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.exiting {
            state.exiting = true;
            debug!("Job queue shutting down with {} queued items", state.items.len());
        }
        self.changed.notify_all();
    }

    /// Empties a shut-down queue, returning what was left in it.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.items.drain(..).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn is_exiting(&self) -> bool {
        self.state.lock().exiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let queue = JobQueue::new(4);
        for i in 0..4 {
            assert!(queue.push(i));
        }
        assert_eq!(queue.len(), 4);
        let popped: Vec<_> = (0..4).map(|_| queue.pop().unwrap()).collect();
        assert_eq!(popped, vec![0, 1, 2, 3]);
    }

    #[test]
    fn with_items_respects_capacity() {
        let queue = JobQueue::with_items(2, 0..5);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn push_blocks_while_full() {
        let queue = Arc::new(JobQueue::new(1));
        queue.push(1);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(1));
        assert!(producer.join().unwrap());
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(JobQueue::new(2));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(50));
        queue.push(7);
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn shutdown_wakes_all_waiters() {
        let empty = Arc::new(JobQueue::<u32>::new(1));
        let full = Arc::new(JobQueue::with_items(1, [0u32]));
        let popper = {
            let q = Arc::clone(&empty);
            thread::spawn(move || q.pop())
        };
        let pusher = {
            let q = Arc::clone(&full);
            thread::spawn(move || q.push(1))
        };
        thread::sleep(Duration::from_millis(50));
        empty.shutdown();
        full.shutdown();
        assert_eq!(popper.join().unwrap(), None);
        assert!(!pusher.join().unwrap());
        assert!(full.is_exiting());
        assert_eq!(full.pop(), None);
        assert!(!full.push(3));
        assert_eq!(full.drain(), vec![0]);
    }
}
