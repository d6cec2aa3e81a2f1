//! Stable identifiers for traced threads.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<u64> = Cell::new(0);
}

/// A process-unique identifier for a traced thread.
///
/// Handles are assigned lazily the first time a thread asks for one and never
/// reused, unlike OS thread IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadHandle(u64);

impl ThreadHandle {
    /// The handle of the calling thread.
    pub fn current() -> Self {
        CURRENT.with(|c| {
            if c.get() == 0 {
                c.set(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed));
            }
            ThreadHandle(c.get())
        })
    }

    /// The raw handle value, never 0.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_current_is_stable() {
        assert_eq!(ThreadHandle::current(), ThreadHandle::current());
    }

    #[test]
    fn test_unique_per_thread() {
        let here = ThreadHandle::current();
        let there = thread::spawn(ThreadHandle::current).join().unwrap();

        assert_ne!(here, there);
        assert_ne!(there.as_u64(), 0);
    }
}
