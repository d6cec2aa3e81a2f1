//! Tests against the real hwpmc counters.

use pmc_trace::error::ErrorKind;
use pmc_trace::*;

#[cfg(target_os = "freebsd")]
mod hardware {
    use super::*;
    use pmc_trace::encoder::CounterSample;

    fn config(names: &[&str]) -> ProcessCounterConfig {
        ProcessCounterConfig::new(names, false).expect("invalid config")
    }

    #[test]
    fn test_process_counter() {
        let config = config(&["ex_ret_instr"]);
        setup(&config, &Pmc).expect("failed to init libpmc");

        let mut ctx = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current())
            .expect("failed to allocate PMC");
        let mut trace = TraceEncoder::new(1, DEFAULT_BUFFER_CAPACITY);
        ctx.write_descriptions(&config, &mut trace).unwrap();

        let mut ts = 0;
        for _ in 1..100 {
            ts += MIN_SAMPLE_INTERVAL + 1;
            sample(&mut ctx, ts, &mut trace).expect("unable to read counter");
        }
        ctx.shutdown();

        let mut r = TraceReader::new(trace.as_bytes());
        assert_eq!(r.read_description().unwrap().name, "ex_ret_instr");

        let mut last = 0;
        while !r.is_empty() {
            let CounterSample { value, .. } = r.read_sample().unwrap();
            if value < last {
                panic!("counter decremented")
            }
            last = value;
        }
    }

    #[test]
    fn test_counter_bad_name() {
        let config = config(&["inst_retired.any"]);
        setup(&config, &Pmc).expect("failed to init libpmc");

        let err = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current())
            .expect_err("expected to fail allocating PMC");

        assert_eq!(err.kind(), &ErrorKind::UnknownOrUnsupportedCounter);
    }

    #[test]
    fn test_null_in_counter_name() {
        let config = config(&["instru\0ctions"]);

        let err = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current())
            .expect_err("expected to fail allocating PMC");

        assert_eq!(err.kind(), &ErrorKind::UnknownOrUnsupportedCounter);
        assert!(err.to_string().contains("invalid event specification"));
    }
}

#[test]
fn test_multiplex_unsupported() {
    let config = ProcessCounterConfig::new(&["ex_ret_instr"], true).unwrap();

    let err = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current())
        .expect_err("hwpmc cannot multiplex");

    if cfg!(target_os = "freebsd") {
        assert_eq!(err.kind(), &ErrorKind::MultiplexSetupFailed);
    } else {
        assert_eq!(err.kind(), &ErrorKind::EventSetCreationFailed);
    }
}

#[test]
fn test_no_counters_needs_no_pmc() {
    let config = ProcessCounterConfig::default();
    setup(&config, &Pmc).unwrap();

    let mut ctx = ThreadCounterContext::init(&config, Pmc, ThreadHandle::current()).unwrap();
    let mut trace = TraceEncoder::new(1, DEFAULT_BUFFER_CAPACITY);

    sample(&mut ctx, u64::MAX, &mut trace).unwrap();
    assert!(trace.is_empty());
}
