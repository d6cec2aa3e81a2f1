#![allow(missing_docs)]

use std::{error, fmt, io};

/// An error raised while configuring, sampling or encoding counters.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    cause: Option<Box<dyn error::Error + Send + Sync>>,
}

/// The broad category an [`ErrorKind`] belongs to.
///
/// The class decides how a failure is handled: configuration and
/// initialisation errors are returned to the caller, sampling and write
/// errors leave the trace unusable and are [fatal].
///
/// [fatal]: struct.Error.html#method.is_fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Init,
    Sample,
    Write,
    Provider,
    Decode,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// The counter list variable is unset or empty.
    MissingConfig,

    /// More counters were requested than [`MAX_EVENTS`] allows.
    ///
    /// [`MAX_EVENTS`]: ../constant.MAX_EVENTS.html
    TooManyEvents,

    /// Storage for the parsed counter names could not be allocated.
    OutOfMemory,

    /// The counter list variable is set but not valid UTF-8.
    NotUnicode,

    /// The provider rejected a configured counter name.
    UnknownOrUnsupportedCounter,

    /// Multiplexing was requested but could not be enabled on the event set.
    MultiplexSetupFailed,

    /// The per-thread event set could not be created, bound or started.
    EventSetCreationFailed,

    /// Zeroing the event set before the first sample failed.
    CounterResetFailed,

    /// Reading the accumulated counter values failed.
    CounterReadFailed,

    /// The trace buffer has no room left for the record.
    BufferWriteFailed,

    /// An unknown error
    Unknown,

    /// The signal handler received an unrecognised signal.
    UnexpectedSignal,

    /// Failed to initialise [`libpmc`].
    ///
    /// [`libpmc`]: https://www.freebsd.org/cgi/man.cgi?query=pmc
    Init,

    /// The platform or CPU does not support the requested operation.
    Unsupported,

    /// The kernel PMC interface differs from what this crate is using.
    ///
    /// This usually means FreeBSD/hwpmc has been updated - recompiling the
    /// application might help.
    VersionMismatch,

    /// The provided event specification is not recognised.
    InvalidEventSpec,

    /// `AllocInit` is returned for generic counter allocation errors, and
    /// unfortunately can be caused by other errors (such as
    /// [`InvalidEventSpec`]) without providing any more information.
    ///
    /// [`InvalidEventSpec`]: #variant.InvalidEventSpec
    AllocInit,

    /// The [`hwpmc`] kernel module has been unloaded.
    ///
    /// [`hwpmc`]: https://www.freebsd.org/cgi/man.cgi?query=hwpmc
    Unloaded,

    /// A process scoped counter is not attached to a target process.
    NotAttached,

    /// The counter is already attached to the requested process.
    AlreadyAttached,

    /// The requested target PID does not exist.
    BadTarget,

    /// The caller does not have the appropriate permissions.
    Forbidden,

    /// A trace record ends before all of its fields were read.
    TruncatedRecord,

    /// A counter description carries a name that is not valid UTF-8.
    InvalidName,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::MissingConfig
            | ErrorKind::TooManyEvents
            | ErrorKind::OutOfMemory
            | ErrorKind::NotUnicode => ErrorClass::Config,
            ErrorKind::UnknownOrUnsupportedCounter
            | ErrorKind::MultiplexSetupFailed
            | ErrorKind::EventSetCreationFailed => ErrorClass::Init,
            ErrorKind::CounterResetFailed | ErrorKind::CounterReadFailed => ErrorClass::Sample,
            ErrorKind::BufferWriteFailed => ErrorClass::Write,
            ErrorKind::TruncatedRecord | ErrorKind::InvalidName => ErrorClass::Decode,
            _ => ErrorClass::Provider,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ErrorKind::MissingConfig => "no hardware counters configured",
            ErrorKind::TooManyEvents => "too many hardware counters requested",
            ErrorKind::OutOfMemory => "out of memory parsing counter names",
            ErrorKind::NotUnicode => "hardware counter list is not valid UTF-8",
            ErrorKind::UnknownOrUnsupportedCounter => "unknown or unsupported counter",
            ErrorKind::MultiplexSetupFailed => "failed to enable multiplexing",
            ErrorKind::EventSetCreationFailed => "failed to set up event set",
            ErrorKind::CounterResetFailed => "failed to reset counters",
            ErrorKind::CounterReadFailed => "failed to read counters",
            ErrorKind::BufferWriteFailed => "trace buffer full",
            ErrorKind::UnexpectedSignal => "unexpected signal",
            ErrorKind::Init => "missing hwpmc in kernel",
            ErrorKind::Unloaded => "hwpmc unloaded from kernel",
            ErrorKind::Unsupported => "unsupported by platform",
            ErrorKind::VersionMismatch => "unexpected hwpmc version",
            ErrorKind::InvalidEventSpec => "invalid event specification",
            ErrorKind::AllocInit => "failed to allocate counter",
            ErrorKind::BadTarget => "target PID does not exist",
            ErrorKind::NotAttached => "PMC not attached to target processes",
            ErrorKind::AlreadyAttached => "PMC already attached to target process",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::TruncatedRecord => "truncated trace record",
            ErrorKind::InvalidName => "counter name is not valid UTF-8",
            ErrorKind::Unknown => "unknown error",
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.cause {
            None => None,
            Some(ref b) => Some(b.as_ref()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.description())?;
        if let Some(ref ctx) = self.context {
            write!(f, " ({})", ctx)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

#[doc(hidden)]
impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.kind == other.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        new_error(kind)
    }
}

impl Error {
    /// Create an error of `kind` caused by `cause`.
    ///
    /// For [`CounterProvider`] implementations reporting library failures.
    ///
    /// [`CounterProvider`]: ../provider/trait.CounterProvider.html
    pub fn with_cause<E>(kind: ErrorKind, cause: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Error {
            kind,
            context: None,
            cause: Some(cause.into()),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The operation, counter or thread the error was raised for, if known.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Sampling and write failures leave the trace in a state it cannot
    /// represent, so they must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind.class(), ErrorClass::Sample | ErrorClass::Write)
    }

    /// Attach the operation, counter or thread the error was raised for.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Re-classify a provider error as `kind`, keeping the original as the
    /// cause.
    pub(crate) fn wrap(self, kind: ErrorKind) -> Self {
        if self.kind == kind {
            return self;
        }
        Error {
            kind,
            context: None,
            cause: Some(Box::new(self)),
        }
    }
}

pub(crate) fn new_os_error(kind: ErrorKind) -> Error {
    // Get the last OS error to reference as the cause
    Error {
        kind,
        context: None,
        cause: Some(Box::new(io::Error::last_os_error())),
    }
}

pub(crate) fn new_error(kind: ErrorKind) -> Error {
    Error {
        kind,
        context: None,
        cause: None,
    }
}
