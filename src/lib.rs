#![warn(missing_docs)]

//! `pmc-trace` records hardware performance counter samples from the threads
//! of a parallel runtime into compact per-thread binary trace streams.
//!
//! Each traced thread owns a [`ThreadCounterContext`] holding one event set
//! with every configured counter. Instrumentation call sites (task switches,
//! barriers, lock acquisitions...) hand the context a timestamp; at most once
//! per [`MIN_SAMPLE_INTERVAL`] the accumulated counter values are read and
//! appended to the thread's [`TraceEncoder`].
//!
//! ```no_run
//! use pmc_trace::*;
//!
//! let config = ConfigLoader::default().load()?;
//! setup(&config, &Pmc)?;
//!
//! // On each traced thread:
//! let mut ctx = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current())?;
//! let mut trace = TraceEncoder::new(ctx.thread().as_u64(), DEFAULT_BUFFER_CAPACITY);
//! ctx.write_descriptions(&config, &mut trace)?;
//!
//! // At every instrumented event:
//! trace_counters(&mut ctx, clock::cycles(), &mut trace, &Abort);
//! #
//! # Ok::<(), Error>(())
//! ```
//!
//! The counters come from a [`CounterProvider`]; [`Pmc`] uses [`libpmc`] and
//! the [`hwpmc`] kernel module on [`FreeBSD`].
//!
//! [`FreeBSD`]: https://www.freebsd.org/
//! [`hwpmc`]: https://www.freebsd.org/cgi/man.cgi?query=hwpmc
//! [`libpmc`]: https://www.freebsd.org/cgi/man.cgi?query=pmc
//!

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate libc;
#[cfg(target_os = "freebsd")]
extern crate pmc_sys;

mod signal;
#[cfg(not(target_os = "freebsd"))]
mod stubs;

pub mod clock;
pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod pmc;
pub mod provider;
pub mod sampler;
pub mod supervisor;
pub mod thread;

pub use self::config::{ConfigLoader, ProcessCounterConfig};
pub use self::context::{setup, ThreadCounterContext};
pub use self::encoder::{TraceEncoder, TraceReader, DEFAULT_BUFFER_CAPACITY};
pub use self::error::{Error, ErrorKind};
pub use self::pmc::Pmc;
pub use self::provider::CounterProvider;
pub use self::sampler::sample;
pub use self::supervisor::{trace_counters, Abort, Supervisor};
pub use self::thread::ThreadHandle;

/// Maximum number of counters a process can trace.
pub const MAX_EVENTS: usize = 16;

/// Minimum time between two counter reads on a thread, in [`clock`] units
/// (CPU cycles on `x86_64`).
///
/// Reading counters has a fixed cost; without a floor, fine-grained
/// instrumentation points would spend most of their time in the read.
///
/// [`clock`]: clock/index.html
pub const MIN_SAMPLE_INTERVAL: u64 = 100_000;
