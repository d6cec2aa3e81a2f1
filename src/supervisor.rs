//! Handling of errors the trace cannot recover from.
//!
//! A failed counter read, reset or trace write means the stream would carry
//! values it has no way to mark as wrong. The instrumentation layer hands such
//! errors to a [`Supervisor`], which normally ends the process.

use std::process;

use crate::context::ThreadCounterContext;
use crate::encoder::TraceEncoder;
use crate::error::Error;
use crate::provider::CounterProvider;
use crate::sampler;

/// Exit status used by [`Abort`].
pub const FATAL_EXIT_CODE: i32 = 1;

/// Receives fatal errors.
pub trait Supervisor {
    /// Handle a fatal error. Implementations used outside of tests should not
    /// return.
    fn fatal(&self, err: &Error);
}

/// Logs the error and exits the process.
///
/// Without a logger installed the error goes to stderr instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct Abort;

impl Supervisor for Abort {
    fn fatal(&self, err: &Error) {
        if logging_enabled() {
            error!("fatal hardware counter error: {}", err);
        } else {
            eprintln!("pmc-trace: fatal hardware counter error: {}", err);
        }
        process::exit(FATAL_EXIT_CODE);
    }
}

fn logging_enabled() -> bool {
    log::max_level() >= log::LevelFilter::Error
}

impl<'a, S: Supervisor + ?Sized> Supervisor for &'a S {
    fn fatal(&self, err: &Error) {
        (**self).fatal(err)
    }
}

/// Sample `ctx`, passing any error to `supervisor`.
///
/// This is the entry point for instrumentation call sites.
pub fn trace_counters<P, S>(
    ctx: &mut ThreadCounterContext<P>,
    timestamp: u64,
    sink: &mut TraceEncoder,
    supervisor: &S,
) where
    P: CounterProvider,
    S: Supervisor + ?Sized,
{
    if let Err(e) = sampler::sample(ctx, timestamp, sink) {
        supervisor.fatal(&e);
    }
}

/// Unwrap the result of a trace write, passing an error to `supervisor`.
///
/// Returns false if the write failed (only reachable when `supervisor`
/// returns).
pub fn check_write<S: Supervisor + ?Sized>(res: Result<(), Error>, supervisor: &S) -> bool {
    match res {
        Ok(()) => true,
        Err(e) => {
            supervisor.fatal(&e);
            false
        }
    }
}
