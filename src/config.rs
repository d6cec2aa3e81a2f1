//! Counter selection read from the environment.

use std::env;
use std::fmt;

use planck_noalloc::vec::ArrayVec;

use crate::error::{new_error, Error, ErrorKind};
use crate::MAX_EVENTS;

/// Default environment variable holding the comma-separated counter names.
pub const EVENTS_ENV_VAR: &str = "PMC_TRACE_EVENTS";

/// Default environment variable enabling counter multiplexing.
pub const MULTIPLEX_ENV_VAR: &str = "PMC_TRACE_MULTIPLEX";

/// Multiplexing setting used when the multiplex variable is unset.
pub const DEFAULT_MULTIPLEX: bool = false;

/// The set of counters traced by every thread of the process.
///
/// Built once by a [`ConfigLoader`] before any thread samples, then shared by
/// reference with each [`ThreadCounterContext`].
///
/// [`ThreadCounterContext`]: ../context/struct.ThreadCounterContext.html
pub struct ProcessCounterConfig {
    counter_names: ArrayVec<String, MAX_EVENTS>,
    multiplex_enabled: bool,
}

impl ProcessCounterConfig {
    /// Build a configuration from an explicit list of counter names.
    pub fn new<I, S>(names: I, multiplex_enabled: bool) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counter_names = ArrayVec::new();
        for name in names {
            push_name(&mut counter_names, name.as_ref())?;
        }

        Ok(Self {
            counter_names,
            multiplex_enabled,
        })
    }

    /// The configured counter names, in the order given by the user.
    pub fn counter_names(&self) -> &[String] {
        self.counter_names.as_slice()
    }

    /// Whether event sets are switched to multiplexed counting.
    pub fn multiplex_enabled(&self) -> bool {
        self.multiplex_enabled
    }

    /// Number of configured counters.
    pub fn len(&self) -> usize {
        self.counter_names.len()
    }

    /// True when counter tracing is configured but unused.
    pub fn is_empty(&self) -> bool {
        self.counter_names.is_empty()
    }
}

impl Default for ProcessCounterConfig {
    fn default() -> Self {
        Self {
            counter_names: ArrayVec::new(),
            multiplex_enabled: DEFAULT_MULTIPLEX,
        }
    }
}

impl fmt::Debug for ProcessCounterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessCounterConfig")
            .field("counter_names", &self.counter_names())
            .field("multiplex_enabled", &self.multiplex_enabled)
            .finish()
    }
}

/// Load a [`ProcessCounterConfig`] from the environment.
///
/// ```no_run
/// # use pmc_trace::config::ConfigLoader;
/// let config = ConfigLoader::default()
///     .events_var("MY_APP_COUNTERS")
///     .load()?;
///
/// println!("tracing {} counters", config.len());
/// #
/// # Ok::<(), pmc_trace::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    events_var: String,
    multiplex_var: String,
    multiplex_default: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            events_var: EVENTS_ENV_VAR.to_string(),
            multiplex_var: MULTIPLEX_ENV_VAR.to_string(),
            multiplex_default: DEFAULT_MULTIPLEX,
        }
    }
}

impl ConfigLoader {
    /// Read counter names from `name` instead of [`EVENTS_ENV_VAR`].
    pub fn events_var(self, name: impl Into<String>) -> Self {
        Self {
            events_var: name.into(),
            ..self
        }
    }

    /// Read the multiplex flag from `name` instead of [`MULTIPLEX_ENV_VAR`].
    pub fn multiplex_var(self, name: impl Into<String>) -> Self {
        Self {
            multiplex_var: name.into(),
            ..self
        }
    }

    /// Multiplexing setting used when the flag is unset or unrecognised.
    pub fn multiplex_default(self, enabled: bool) -> Self {
        Self {
            multiplex_default: enabled,
            ..self
        }
    }

    /// Load the configuration from the process environment.
    ///
    /// A counter list that is not valid UTF-8 is rejected with
    /// [`ErrorKind::NotUnicode`]; a multiplex flag that is not valid UTF-8 is
    /// treated like any other unrecognised value.
    ///
    /// [`ErrorKind::NotUnicode`]: ../error/enum.ErrorKind.html#variant.NotUnicode
    pub fn load(&self) -> Result<ProcessCounterConfig, Error> {
        if let Some(v) = env::var_os(&self.events_var) {
            if v.to_str().is_none() {
                error!("{} is not valid UTF-8", self.events_var);
                return Err(new_error(ErrorKind::NotUnicode).with_context(self.events_var.clone()));
            }
        }

        self.load_from(|name| {
            env::var_os(name).map(|v| v.to_string_lossy().into_owned())
        })
    }

    /// Load the configuration, resolving variables through `lookup`.
    pub fn load_from<F>(&self, lookup: F) -> Result<ProcessCounterConfig, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let events = match lookup(&self.events_var) {
            Some(v) if !v.is_empty() => v,
            _ => {
                error!(
                    "hardware counter tracing enabled but {} is undefined or empty",
                    self.events_var
                );
                return Err(
                    new_error(ErrorKind::MissingConfig).with_context(self.events_var.clone())
                );
            }
        };

        let counter_names = parse_counter_names(&events).map_err(|e| {
            error!("failed to parse {}: {}", self.events_var, e);
            e
        })?;

        let multiplex = lookup(&self.multiplex_var);
        let multiplex_enabled = parse_multiplex(multiplex.as_deref(), self.multiplex_default);
        match multiplex.as_deref() {
            None | Some("") | Some("0") | Some("1") => (),
            Some(v) => warn!(
                "ignoring unrecognised {} value {:?}, using default ({})",
                self.multiplex_var, v, self.multiplex_default
            ),
        }

        debug!(
            "loaded {} hardware counters (multiplex: {})",
            counter_names.len(),
            multiplex_enabled
        );

        Ok(ProcessCounterConfig {
            counter_names,
            multiplex_enabled,
        })
    }
}

/// Split a comma-separated counter list into names.
///
/// Names are kept exactly as written; whether they exist is only checked
/// when a thread adds them to its event set. Empty entries between commas
/// are skipped.
pub(crate) fn parse_counter_names(list: &str) -> Result<ArrayVec<String, MAX_EVENTS>, Error> {
    let mut names = ArrayVec::new();
    for name in list.split(',').filter(|s| !s.is_empty()) {
        push_name(&mut names, name)?;
    }
    Ok(names)
}

/// Interpret a multiplex flag value.
///
/// Only the literals `"0"` and `"1"` are recognised, anything else falls back
/// to `default`.
pub fn parse_multiplex(value: Option<&str>, default: bool) -> bool {
    match value {
        Some("0") => false,
        Some("1") => true,
        _ => default,
    }
}

fn push_name(names: &mut ArrayVec<String, MAX_EVENTS>, name: &str) -> Result<(), Error> {
    if names.is_full() {
        return Err(new_error(ErrorKind::TooManyEvents)
            .with_context(format!("limit is {}", MAX_EVENTS)));
    }

    let mut owned = String::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| new_error(ErrorKind::OutOfMemory).with_context(format!("counter {:?}", name)))?;
    owned.push_str(name);

    names.push(owned);
    Ok(())
}
