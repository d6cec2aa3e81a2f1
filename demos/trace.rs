use std::thread;

use pmc_trace::*;

const THREADS: usize = 4;

fn main() {
    env_logger::init();

    // PMC_TRACE_EVENTS=ex_ret_instr,ls_dc_accesses cargo run --example trace
    let config = ConfigLoader::default()
        .load()
        .expect("failed to load counter configuration");

    setup(&config, &Pmc).expect("failed to initialise libpmc");

    let sizes: Vec<usize> = thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| s.spawn(|| run_worker(&config)))
            .collect();

        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for (i, bytes) in sizes.iter().enumerate() {
        println!("thread {}: {} trace bytes", i, bytes);
    }
}

fn run_worker(config: &ProcessCounterConfig) -> usize {
    let thread = ThreadHandle::current();
    let mut ctx = ThreadCounterContext::init(config, Pmc, thread)
        .unwrap_or_else(|e| panic!("thread {}: {}", thread, e));

    let mut trace = TraceEncoder::new(thread.as_u64(), DEFAULT_BUFFER_CAPACITY);
    supervisor::check_write(ctx.write_descriptions(config, &mut trace), &Abort);

    let mut acc = 0u64;
    for i in 0..1_000_000u64 {
        // Do some stuff...
        acc = acc.wrapping_mul(31).wrapping_add(i);

        if i % 1000 == 0 {
            trace_counters(&mut ctx, clock::cycles(), &mut trace, &Abort);
        }
    }

    ctx.shutdown();
    println!("thread {}: result {}", thread, acc);

    trace.len()
}
