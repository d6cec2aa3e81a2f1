//! Reading counters into the trace.

use crate::context::ThreadCounterContext;
use crate::encoder::TraceEncoder;
use crate::error::Error;
use crate::provider::CounterProvider;
use crate::MIN_SAMPLE_INTERVAL;

/// Record the current counter values of `ctx` at `timestamp`.
///
/// Called from every instrumented event. Does nothing for a disabled context.
/// Otherwise the counters are reset on the first call after (re)start, and
/// read at most once per [`MIN_SAMPLE_INTERVAL`]; every read writes one
/// sample record per counter to `sink`.
///
/// All errors returned are [fatal]: the counters or the trace can no longer
/// be trusted.
///
/// [`MIN_SAMPLE_INTERVAL`]: ../constant.MIN_SAMPLE_INTERVAL.html
/// [fatal]: ../error/struct.Error.html#method.is_fatal
pub fn sample<P: CounterProvider>(
    ctx: &mut ThreadCounterContext<P>,
    timestamp: u64,
    sink: &mut TraceEncoder,
) -> Result<(), Error> {
    if !ctx.counters_enabled {
        return Ok(());
    }

    if ctx.needs_reset {
        ctx.reset_counters()?;
    }

    // A timestamp older than the last sample counts as no time elapsed.
    let elapsed = timestamp.saturating_sub(ctx.last_sample_timestamp);
    if elapsed <= MIN_SAMPLE_INTERVAL {
        return Ok(());
    }

    sink.reserve_samples(ctx.counter_ids().len())?;
    ctx.accumulate()?;

    let collection_id = sink.collection_id();
    for (id, value) in ctx.counter_ids().iter().zip(ctx.accumulators()) {
        sink.write_sample(collection_id, *id, timestamp, *value)?;
    }

    trace!(
        "thread {}: sampled {} counters at {}",
        ctx.thread(),
        ctx.counter_ids().len(),
        timestamp
    );

    ctx.last_sample_timestamp = timestamp;
    Ok(())
}
