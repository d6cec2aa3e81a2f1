//! Per-thread counter state.

use std::fmt;

use planck_noalloc::vec::ArrayVec;

use crate::config::ProcessCounterConfig;
use crate::encoder::TraceEncoder;
use crate::error::{new_error, Error, ErrorKind};
use crate::provider::{CounterProvider, DEFAULT_COMPONENT};
use crate::thread::ThreadHandle;
use crate::MAX_EVENTS;

/// Run the process-wide provider setup for `config`.
///
/// Must complete before any thread calls [`ThreadCounterContext::init`]. Does
/// nothing when no counters are configured.
pub fn setup<P: CounterProvider>(
    config: &ProcessCounterConfig,
    provider: &P,
) -> Result<(), Error> {
    if config.is_empty() {
        return Ok(());
    }

    provider
        .init_library(config.multiplex_enabled())
        .map_err(|e| {
            error!("could not initialise counter library: {}", e);
            e
        })
}

/// Per-thread counter state.
///
/// A context is created on, and only ever used by, the thread it samples.
/// It owns that thread's event set.
pub struct ThreadCounterContext<P: CounterProvider> {
    provider: P,
    thread: ThreadHandle,
    event_set: Option<P::EventSet>,

    pub(crate) counters_enabled: bool,
    pub(crate) needs_reset: bool,
    pub(crate) last_sample_timestamp: u64,

    raw_accumulators: [i64; MAX_EVENTS],
    counter_index_mapping: ArrayVec<u32, MAX_EVENTS>,
}

impl<P: CounterProvider> ThreadCounterContext<P> {
    /// Build the calling thread's context.
    ///
    /// With no configured counters this returns a disabled context without
    /// touching `provider`. Otherwise one event set holding every configured
    /// counter is created and started; on failure nothing is left running.
    pub fn init(
        config: &ProcessCounterConfig,
        provider: P,
        thread: ThreadHandle,
    ) -> Result<Self, Error> {
        let mut ctx = Self {
            provider,
            thread,
            event_set: None,
            counters_enabled: false,
            needs_reset: false,
            last_sample_timestamp: 0,
            raw_accumulators: [0; MAX_EVENTS],
            counter_index_mapping: ArrayVec::new(),
        };

        if config.is_empty() {
            debug!("thread {}: no hardware counters configured", thread);
            return Ok(ctx);
        }

        let set = ctx.build_event_set(config).map_err(|e| {
            error!("thread {}: {}", thread, e);
            e
        })?;

        ctx.event_set = Some(set);
        ctx.counters_enabled = true;
        ctx.needs_reset = true;

        debug!(
            "thread {}: started {} hardware counters",
            thread,
            ctx.counter_index_mapping.len()
        );

        Ok(ctx)
    }

    fn build_event_set(&mut self, config: &ProcessCounterConfig) -> Result<P::EventSet, Error> {
        let p = &self.provider;

        p.register_thread(self.thread).map_err(|e| {
            e.wrap(ErrorKind::EventSetCreationFailed)
                .with_context(format!("register thread {}", self.thread))
        })?;

        let mut set = p.create_event_set().map_err(|e| {
            e.wrap(ErrorKind::EventSetCreationFailed)
                .with_context("create event set")
        })?;

        if let Err(e) = self.fill_event_set(&mut set, config) {
            self.provider.destroy_event_set(set);
            self.counter_index_mapping = ArrayVec::new();
            return Err(e);
        }

        Ok(set)
    }

    fn fill_event_set(
        &mut self,
        set: &mut P::EventSet,
        config: &ProcessCounterConfig,
    ) -> Result<(), Error> {
        let p = &self.provider;

        p.bind_component(set, DEFAULT_COMPONENT).map_err(|e| {
            e.wrap(ErrorKind::EventSetCreationFailed)
                .with_context(format!("bind component {}", DEFAULT_COMPONENT))
        })?;

        // Multiplexing can only be switched on while the set is empty.
        if config.multiplex_enabled() {
            p.enable_multiplex(set).map_err(|e| {
                e.wrap(ErrorKind::MultiplexSetupFailed)
                    .with_context("enable multiplexing")
            })?;
        }

        for (slot, name) in config.counter_names().iter().enumerate() {
            p.add_named_event(set, name).map_err(|e| {
                e.wrap(ErrorKind::UnknownOrUnsupportedCounter)
                    .with_context(format!("add counter {:?}", name))
            })?;

            // The slot index doubles as the on-disk counter ID.
            self.counter_index_mapping.push(slot as u32);
        }

        p.start(set).map_err(|e| {
            e.wrap(ErrorKind::EventSetCreationFailed)
                .with_context("start counters")
        })
    }

    /// The thread this context belongs to.
    pub fn thread(&self) -> ThreadHandle {
        self.thread
    }

    /// True while samples are being taken.
    pub fn counters_enabled(&self) -> bool {
        self.counters_enabled
    }

    /// True until the first sample after initialisation or [`resume`].
    ///
    /// [`resume`]: #method.resume
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }

    /// Timestamp of the last accepted sample, 0 if none was taken yet.
    pub fn last_sample_timestamp(&self) -> u64 {
        self.last_sample_timestamp
    }

    /// On-disk counter ID of each counter, by slot.
    pub fn counter_ids(&self) -> &[u32] {
        self.counter_index_mapping.as_slice()
    }

    /// Accumulated value of each counter, by slot.
    pub fn accumulators(&self) -> &[i64] {
        &self.raw_accumulators[..self.counter_index_mapping.len()]
    }

    /// Stop sampling until [`resume`] is called.
    ///
    /// [`resume`]: #method.resume
    pub fn pause(&mut self) {
        self.counters_enabled = false;
    }

    /// Resume sampling after [`pause`].
    ///
    /// The counters are zeroed before the next sample, so values restart
    /// from the resume point. A context without counters stays disabled.
    ///
    /// [`pause`]: #method.pause
    pub fn resume(&mut self) {
        if self.event_set.is_none() {
            return;
        }
        self.counters_enabled = true;
        self.needs_reset = true;
        self.raw_accumulators = [0; MAX_EVENTS];
    }

    /// Write a description record for every configured counter.
    ///
    /// Must be called before the first sample reaches `sink`.
    pub fn write_descriptions(
        &self,
        config: &ProcessCounterConfig,
        sink: &mut TraceEncoder,
    ) -> Result<(), Error> {
        for (id, name) in self.counter_ids().iter().zip(config.counter_names()) {
            sink.write_description(*id, name)?;
            debug!("thread {}: wrote description of {} ({})", self.thread, name, id);
        }
        Ok(())
    }

    /// Stop and release the event set.
    pub fn shutdown(mut self) {
        self.counters_enabled = false;
        if let Some(set) = self.event_set.take() {
            self.provider.destroy_event_set(set);
            debug!("thread {}: released hardware counters", self.thread);
        }
    }

    /// Reset the event set, clearing `needs_reset`.
    pub(crate) fn reset_counters(&mut self) -> Result<(), Error> {
        let thread = self.thread;
        if let Some(set) = self.event_set.as_mut() {
            self.provider.reset(set).map_err(|e| {
                e.wrap(ErrorKind::CounterResetFailed)
                    .with_context(format!("thread {}", thread))
            })?;
        }
        self.needs_reset = false;
        Ok(())
    }

    /// Add the counts since the last read to the accumulators.
    pub(crate) fn accumulate(&mut self) -> Result<(), Error> {
        let n = self.counter_index_mapping.len();
        let thread = self.thread;
        let set = match self.event_set.as_mut() {
            Some(set) => set,
            None => {
                return Err(new_error(ErrorKind::CounterReadFailed)
                    .with_context(format!("thread {} has no event set", thread)))
            }
        };

        self.provider
            .accumulate_read(set, &mut self.raw_accumulators[..n])
            .map_err(|e| {
                e.wrap(ErrorKind::CounterReadFailed)
                    .with_context(format!("thread {}", thread))
            })
    }
}

impl<P: CounterProvider> fmt::Debug for ThreadCounterContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCounterContext")
            .field("thread", &self.thread)
            .field("counters_enabled", &self.counters_enabled)
            .field("needs_reset", &self.needs_reset)
            .field("last_sample_timestamp", &self.last_sample_timestamp)
            .field("counter_ids", &self.counter_ids())
            .field("accumulators", &self.accumulators())
            .finish()
    }
}
