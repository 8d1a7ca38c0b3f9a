use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Cooperative cancellation flag shared by every worker of one side of a
/// transfer (spec §4.9).
///
/// `AbortChecker` is cheap to clone (it is an `Arc` around a single atomic
/// bool) so each worker thread, the directory enumerator, and an optional
/// abort-after-seconds timer thread can all hold a handle. Setting the flag
/// is a release-ordered store; every blocking operation in the engine polls
/// [`AbortChecker::is_aborted`] with an acquire load both before entry and on
/// return, satisfying invariant 4 in spec §3 ("observed within one
/// blocking-operation quantum").
#[derive(Clone, Debug, Default)]
pub struct AbortChecker {
    flag: Arc<AtomicBool>,
}

impl AbortChecker {
    /// Creates a fresh, unset checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the abort flag. Idempotent.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once [`AbortChecker::abort`] has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Spawns a detached timer thread that calls [`AbortChecker::abort`]
    /// after `seconds`, implementing `--abort_after_seconds` (spec §6, §8
    /// scenario 6). Returns a join handle the caller may discard; the thread
    /// exits immediately if the checker is already aborted when it wakes.
    pub fn abort_after(&self, seconds: u64) -> thread::JoinHandle<()> {
        let checker = self.clone();
        thread::Builder::new()
            .name("wdt-abort-timer".into())
            .spawn(move || {
                thread::sleep(Duration::from_secs(seconds));
                checker.abort();
            })
            .expect("failed to spawn abort timer thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unaborted() {
        let checker = AbortChecker::new();
        assert!(!checker.is_aborted());
    }

    #[test]
    fn abort_is_observed_by_clones() {
        let checker = AbortChecker::new();
        let clone = checker.clone();
        checker.abort();
        assert!(clone.is_aborted());
    }

    #[test]
    fn abort_after_fires() {
        let checker = AbortChecker::new();
        let handle = checker.abort_after(0);
        handle.join().unwrap();
        assert!(checker.is_aborted());
    }
}
