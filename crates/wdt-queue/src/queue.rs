use crate::block::ByteSource;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of [`SourceQueue::get_next_source`] (spec §4.2 "Consumer
/// contract").
#[derive(Debug)]
pub enum PollResult {
    /// A block is ready to be sent.
    Source(ByteSource),
    /// The enumerator has closed the queue and every source has been
    /// drained; no more sources will ever arrive.
    EndOfQueue,
    /// No source was available within the requested timeout, but the queue
    /// is not (yet) closed.
    Timeout,
}

#[derive(Default)]
struct Inner {
    deque: VecDeque<ByteSource>,
    closed: bool,
}

/// Thread-safe single-producer, multi-consumer work queue of [`ByteSource`]
/// blocks (spec §4.2).
///
/// Fresh blocks are appended at the tail by the enumerator thread via
/// [`SourceQueue::push_fresh`]. Retried blocks are reinserted at the head by
/// [`SourceQueue::return_to_queue`] so they are picked up before any
/// not-yet-attempted work, per spec §4.2 "Return path" and §5 "Ordering
/// guarantees". The queue is closed exactly once, by the enumerator, after
/// which consumers drain remaining entries and then observe
/// [`PollResult::EndOfQueue`] forever.
pub struct SourceQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl SourceQueue {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            not_empty: Condvar::new(),
        })
    }

    /// Appends a freshly discovered block at the tail.
    ///
    /// # Panics
    ///
    /// Panics if called after [`SourceQueue::close`]; the enumerator is the
    /// only producer and must not push after closing.
    pub fn push_fresh(&self, source: ByteSource) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(!inner.closed, "push_fresh called after the queue was closed");
        inner.deque.push_back(source);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Reinserts a block at the head of the queue, ahead of fresh work
    /// (spec §4.2 "Return path"). Used when a worker's connection fails and
    /// its in-flight history is rewound (spec §4.5).
    pub fn return_to_queue(&self, source: ByteSource) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.deque.push_front(source);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Reinserts several blocks at the head, preserving their relative order
    /// (spec §4.5 "rewind_all... in original emission order").
    pub fn return_all_to_queue(&self, sources: impl DoubleEndedIterator<Item = ByteSource>) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for source in sources.rev() {
            inner.deque.push_front(source);
        }
        drop(inner);
        self.not_empty.notify_all();
    }

    /// Marks the queue closed: once drained, all consumers observe
    /// [`PollResult::EndOfQueue`]. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
    }

    /// Blocks up to `timeout` waiting for a source, returning as soon as one
    /// is available, the queue closes, or the timeout elapses (spec §4.2
    /// "Consumer contract").
    pub fn get_next_source(&self, timeout: Duration) -> PollResult {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if let Some(source) = inner.deque.pop_front() {
                return PollResult::Source(source);
            }
            if inner.closed {
                return PollResult::EndOfQueue;
            }
            let now = Instant::now();
            if now >= deadline {
                return PollResult::Timeout;
            }
            let (guard, timeout_result) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner = guard;
            if timeout_result.timed_out() && inner.deque.is_empty() && !inner.closed {
                return PollResult::Timeout;
            }
        }
    }

    /// Number of sources currently queued (fresh plus returned, not counting
    /// in-flight ones held by a worker's transfer history).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).deque.len()
    }

    /// Returns `true` if the queue has no queued sources right now.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once [`SourceQueue::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FileMetadata;

    fn block(offset: u64) -> ByteSource {
        let file = Arc::new(FileMetadata::new("f", Some(100), 0o644, 0));
        ByteSource::new(file, offset, 10)
    }

    #[test]
    fn fifo_for_fresh_sources() {
        let queue = SourceQueue::new();
        queue.push_fresh(block(0));
        queue.push_fresh(block(10));
        match queue.get_next_source(Duration::from_millis(10)) {
            PollResult::Source(b) => assert_eq!(b.offset(), 0),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn returned_sources_jump_the_line() {
        let queue = SourceQueue::new();
        queue.push_fresh(block(0));
        queue.return_to_queue(block(99));
        match queue.get_next_source(Duration::from_millis(10)) {
            PollResult::Source(b) => assert_eq!(b.offset(), 99),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn closed_and_drained_queue_reports_end_of_queue() {
        let queue = SourceQueue::new();
        queue.push_fresh(block(0));
        queue.close();
        assert!(matches!(
            queue.get_next_source(Duration::from_millis(10)),
            PollResult::Source(_)
        ));
        assert!(matches!(
            queue.get_next_source(Duration::from_millis(10)),
            PollResult::EndOfQueue
        ));
    }

    #[test]
    fn open_empty_queue_times_out() {
        let queue = SourceQueue::new();
        assert!(matches!(
            queue.get_next_source(Duration::from_millis(20)),
            PollResult::Timeout
        ));
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        let queue = SourceQueue::new();
        let producer_queue = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            for i in 0..50 {
                producer_queue.push_fresh(block(i));
            }
            producer_queue.close();
        });

        let mut count = 0;
        loop {
            match queue.get_next_source(Duration::from_millis(200)) {
                PollResult::Source(_) => count += 1,
                PollResult::EndOfQueue => break,
                PollResult::Timeout => panic!("producer stalled"),
            }
        }
        handle.join().unwrap();
        assert_eq!(count, 50);
    }
}
