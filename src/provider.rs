//! The hardware counter library a [`ThreadCounterContext`] samples from.
//!
//! [`ThreadCounterContext`]: ../context/struct.ThreadCounterContext.html

use crate::error::Error;
use crate::thread::ThreadHandle;

/// Component (counter source) event sets are bound to - the CPU.
pub const DEFAULT_COMPONENT: u32 = 0;

/// Operations a hardware counter library must provide.
///
/// An event set groups the counters of one thread; it is created, filled and
/// started on the thread that owns it and never touched by any other thread.
/// Implementations must tolerate concurrent `register_thread` and
/// `create_event_set` calls from different threads.
///
/// Errors returned here are re-classified by the caller, so any
/// [`ErrorKind`] describing the underlying failure is appropriate.
///
/// [`ErrorKind`]: ../error/enum.ErrorKind.html
pub trait CounterProvider {
    /// Handle to a group of counters sampled together.
    type EventSet;

    /// Process-wide library setup, run once before any thread initialises.
    fn init_library(&self, multiplex: bool) -> Result<(), Error>;

    /// Make the calling thread known to the library.
    fn register_thread(&self, thread: ThreadHandle) -> Result<(), Error>;

    /// Create an empty event set for the calling thread.
    fn create_event_set(&self) -> Result<Self::EventSet, Error>;

    /// Bind `set` to a counter source, see [`DEFAULT_COMPONENT`].
    fn bind_component(&self, set: &mut Self::EventSet, component: u32) -> Result<(), Error>;

    /// Switch `set` to multiplexed counting. Must be called before any event
    /// is added.
    fn enable_multiplex(&self, set: &mut Self::EventSet) -> Result<(), Error>;

    /// Add the event called `name` to `set`, returning the library's id for
    /// it.
    fn add_named_event(&self, set: &mut Self::EventSet, name: &str) -> Result<u32, Error>;

    /// Start counting every event in `set`.
    fn start(&self, set: &mut Self::EventSet) -> Result<(), Error>;

    /// Zero all counters in `set`.
    fn reset(&self, set: &mut Self::EventSet) -> Result<(), Error>;

    /// Add the counts since the previous read (or reset) to `out`, one value
    /// per event in the order they were added, and restart counting from
    /// zero.
    fn accumulate_read(&self, set: &mut Self::EventSet, out: &mut [i64]) -> Result<(), Error>;

    /// Stop and release `set`.
    fn destroy_event_set(&self, set: Self::EventSet);
}

impl<'a, P: CounterProvider + ?Sized> CounterProvider for &'a P {
    type EventSet = P::EventSet;

    fn init_library(&self, multiplex: bool) -> Result<(), Error> {
        (**self).init_library(multiplex)
    }

    fn register_thread(&self, thread: ThreadHandle) -> Result<(), Error> {
        (**self).register_thread(thread)
    }

    fn create_event_set(&self) -> Result<Self::EventSet, Error> {
        (**self).create_event_set()
    }

    fn bind_component(&self, set: &mut Self::EventSet, component: u32) -> Result<(), Error> {
        (**self).bind_component(set, component)
    }

    fn enable_multiplex(&self, set: &mut Self::EventSet) -> Result<(), Error> {
        (**self).enable_multiplex(set)
    }

    fn add_named_event(&self, set: &mut Self::EventSet, name: &str) -> Result<u32, Error> {
        (**self).add_named_event(set, name)
    }

    fn start(&self, set: &mut Self::EventSet) -> Result<(), Error> {
        (**self).start(set)
    }

    fn reset(&self, set: &mut Self::EventSet) -> Result<(), Error> {
        (**self).reset(set)
    }

    fn accumulate_read(&self, set: &mut Self::EventSet, out: &mut [i64]) -> Result<(), Error> {
        (**self).accumulate_read(set, out)
    }

    fn destroy_event_set(&self, set: Self::EventSet) {
        (**self).destroy_event_set(set)
    }
}
