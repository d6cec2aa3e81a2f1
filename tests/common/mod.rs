#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard};

use pmc_trace::error::{Error, ErrorKind};
use pmc_trace::*;

/// A provider call, as recorded by [`MockProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    InitLibrary(bool),
    RegisterThread,
    CreateEventSet,
    Bind(u32),
    EnableMultiplex,
    Add(String),
    Start,
    Reset,
    Read,
    Destroy,
}

/// Operations a [`MockProvider`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Register,
    Create,
    Bind,
    Multiplex,
    Start,
    Reset,
    Read,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    fail: Option<Op>,
    reject: Option<String>,
}

/// An in-memory counter provider.
///
/// Counter `i` advances by `(i + 1) * 10` between two reads. Every call is
/// recorded, and any operation can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
pub struct MockSet {
    events: usize,
    multiplexed: bool,
}

impl MockProvider {
    pub fn failing(op: Op) -> Self {
        let p = Self::default();
        p.state().fail = Some(op);
        p
    }

    pub fn rejecting(name: &str) -> Self {
        let p = Self::default();
        p.state().reject = Some(name.to_string());
        p
    }

    /// Fail `op` from now on.
    pub fn fail(&self, op: Op) {
        self.state().fail = Some(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: Call, op: Option<Op>) -> Result<(), Error> {
        let mut s = self.state();
        s.calls.push(call);
        match (op, s.fail) {
            (Some(op), Some(fail)) if op == fail => Err(injected()),
            _ => Ok(()),
        }
    }
}

fn injected() -> Error {
    Error::with_cause(ErrorKind::Unknown, "injected failure")
}

impl CounterProvider for MockProvider {
    type EventSet = MockSet;

    fn init_library(&self, multiplex: bool) -> Result<(), Error> {
        self.record(Call::InitLibrary(multiplex), None)
    }

    fn register_thread(&self, _thread: ThreadHandle) -> Result<(), Error> {
        self.record(Call::RegisterThread, Some(Op::Register))
    }

    fn create_event_set(&self) -> Result<MockSet, Error> {
        self.record(Call::CreateEventSet, Some(Op::Create))?;
        Ok(MockSet {
            events: 0,
            multiplexed: false,
        })
    }

    fn bind_component(&self, _set: &mut MockSet, component: u32) -> Result<(), Error> {
        self.record(Call::Bind(component), Some(Op::Bind))
    }

    fn enable_multiplex(&self, set: &mut MockSet) -> Result<(), Error> {
        self.record(Call::EnableMultiplex, Some(Op::Multiplex))?;
        // Like the real libraries, multiplexing a non-empty set is refused.
        if set.events > 0 {
            return Err(Error::with_cause(ErrorKind::Unknown, "set is not empty"));
        }
        set.multiplexed = true;
        Ok(())
    }

    fn add_named_event(&self, set: &mut MockSet, name: &str) -> Result<u32, Error> {
        self.record(Call::Add(name.to_string()), None)?;
        if self.state().reject.as_deref() == Some(name) {
            return Err(Error::with_cause(ErrorKind::InvalidEventSpec, "no such event"));
        }
        set.events += 1;
        Ok(set.events as u32 - 1)
    }

    fn start(&self, _set: &mut MockSet) -> Result<(), Error> {
        self.record(Call::Start, Some(Op::Start))
    }

    fn reset(&self, _set: &mut MockSet) -> Result<(), Error> {
        self.record(Call::Reset, Some(Op::Reset))
    }

    fn accumulate_read(&self, set: &mut MockSet, out: &mut [i64]) -> Result<(), Error> {
        self.record(Call::Read, Some(Op::Read))?;
        assert_eq!(out.len(), set.events, "accumulator length mismatch");
        for (i, v) in out.iter_mut().enumerate() {
            *v += (i as i64 + 1) * 10;
        }
        Ok(())
    }

    fn destroy_event_set(&self, _set: MockSet) {
        let _ = self.record(Call::Destroy, None);
    }
}

/// A supervisor that records fatal errors instead of exiting.
#[derive(Debug, Default)]
pub struct Recorder {
    errors: RefCell<Vec<ErrorKind>>,
}

impl Recorder {
    pub fn errors(&self) -> Vec<ErrorKind> {
        self.errors.borrow().clone()
    }
}

impl Supervisor for Recorder {
    fn fatal(&self, err: &Error) {
        assert!(err.is_fatal(), "non-fatal error reached supervisor: {}", err);
        self.errors.borrow_mut().push(*err.kind());
    }
}

pub fn config(names: &[&str]) -> ProcessCounterConfig {
    ProcessCounterConfig::new(names, false).expect("invalid config")
}

pub fn init(
    config: &ProcessCounterConfig,
    provider: &MockProvider,
) -> ThreadCounterContext<MockProvider> {
    ThreadCounterContext::init(config, provider.clone(), ThreadHandle::current())
        .expect("failed to init context")
}
