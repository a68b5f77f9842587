use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Result of a bounded wait on the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the wait.
    Empty,
    /// The queue is closed and fully drained.
    Closed,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Unbounded FIFO handoff between the receive loop and the processing loop.
///
/// `push` never blocks. Closing the queue only stops consumers from waiting
/// once it is empty; queued items are still delivered.
#[derive(Debug)]
pub struct DispatchQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DispatchQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: T) {
        self.lock().items.push_back(item);
        self.ready.notify_one();
    }

    /// Wait at most `timeout` for the next item.
    pub fn pop_timeout(&self, timeout: Duration) -> Pop<T> {
        let mut state = self.lock();
        if state.items.is_empty() && !state.closed {
            state = self
                .ready
                .wait_timeout_while(state, timeout, |s| s.items.is_empty() && !s.closed)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        match state.items.pop_front() {
            Some(item) => Pop::Item(item),
            None if state.closed => Pop::Closed,
            None => Pop::Empty,
        }
    }

    /// Wait until an item is available, waking every `poll_interval`.
    ///
    /// Returns `None` only once the queue is closed and empty.
    pub fn pop_blocking(&self, poll_interval: Duration) -> Option<T> {
        loop {
            match self.pop_timeout(poll_interval) {
                Pop::Item(item) => return Some(item),
                Pop::Closed => return None,
                Pop::Empty => {}
            }
        }
    }

    /// Wake waiting consumers; no more items are expected.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Drop everything still queued and return how many items that was.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.items.len();
        state.items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = DispatchQueue::new();
        queue.push("A");
        queue.push("B");
        queue.push("C");
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_timeout(Duration::ZERO), Pop::Item("A"));
        assert_eq!(queue.pop_timeout(Duration::ZERO), Pop::Item("B"));
        assert_eq!(queue.pop_timeout(Duration::ZERO), Pop::Item("C"));
        assert_eq!(queue.pop_timeout(Duration::ZERO), Pop::Empty);
    }

    #[test]
    fn order_survives_concurrent_push_and_pop() {
        let queue = Arc::new(DispatchQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    queue.push(i);
                }
                queue.close();
            })
        };

        let mut received = Vec::with_capacity(10_000);
        while let Some(item) = queue.pop_blocking(Duration::from_millis(5)) {
            received.push(item);
        }
        producer.join().unwrap();

        assert_eq!(received, (0..10_000).collect::<Vec<_>>());
    }

    #[test]
    fn pop_timeout_waits_then_reports_empty() {
        let queue: DispatchQueue<u8> = DispatchQueue::new();
        let start = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)), Pop::Empty);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn push_wakes_waiting_consumer() {
        let queue = Arc::new(DispatchQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(7u8);
        assert_eq!(consumer.join().unwrap(), Pop::Item(7));
    }

    #[test]
    fn close_delivers_remaining_items_first() {
        let queue = DispatchQueue::new();
        queue.push(1);
        queue.close();
        assert_eq!(queue.pop_blocking(Duration::from_millis(1)), Some(1));
        assert_eq!(queue.pop_blocking(Duration::from_millis(1)), None);
        assert_eq!(queue.pop_timeout(Duration::from_millis(1)), Pop::Closed);
    }

    #[test]
    fn clear_counts_dropped_items() {
        let queue = DispatchQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
