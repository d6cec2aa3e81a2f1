//! A [`CounterProvider`] backed by FreeBSD's [`libpmc`].
//!
//! Each event is a process-mode counting PMC attached to the calling process.
//! Note that [`hwpmc`] counts process-mode PMCs for the whole process, so on a
//! multi-threaded process every thread's event set observes events from all
//! threads.
//!
//! hwpmc has no multiplexing support; requesting it fails with
//! [`ErrorKind::Unsupported`]. On platforms other than FreeBSD every operation
//! fails with [`ErrorKind::Unsupported`].
//!
//! [`CounterProvider`]: ../provider/trait.CounterProvider.html
//! [`ErrorKind::Unsupported`]: ../error/enum.ErrorKind.html#variant.Unsupported
//! [`libpmc`]: https://www.freebsd.org/cgi/man.cgi?query=pmc
//! [`hwpmc`]: https://www.freebsd.org/cgi/man.cgi?query=hwpmc

use std::ffi::CString;
use std::io;
use std::sync::Mutex;

#[cfg(target_os = "freebsd")]
use libc::{EDOOFUS, EPROGMISMATCH};
#[cfg(target_os = "freebsd")]
use pmc_sys::{
    pmc_allocate, pmc_attach, pmc_id_t, pmc_init, pmc_mode_PMC_MODE_TC, pmc_read, pmc_release,
    pmc_start, pmc_stop,
};

#[cfg(not(target_os = "freebsd"))]
use super::stubs::*;

use crate::error::{new_error, new_os_error, Error, ErrorKind};
use crate::provider::{CounterProvider, DEFAULT_COMPONENT};
use crate::signal;
use crate::thread::ThreadHandle;

/// Allocate counters on any CPU.
const CPU_ANY: i32 = -1;

/// PID 0 attaches a PMC to the calling process.
const SELF_PID: i32 = 0;

lazy_static! {
    static ref PMC_INIT_STATUS: InitStatus = run_pmc_init();
    static ref BIG_FAT_LOCK: Mutex<u32> = Mutex::new(42);
}

/// The libpmc counter provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pmc;

/// The PMCs of one thread.
#[derive(Debug, Default)]
pub struct PmcEventSet {
    events: Vec<PmcEvent>,
    bound: bool,
    running: bool,
}

#[derive(Debug)]
struct PmcEvent {
    id: pmc_id_t,
    // Hardware value at the last read or reset.
    baseline: u64,
}

impl Drop for PmcEvent {
    fn drop(&mut self) {
        let _guard = lock();

        // BUG: do not attempt to detach from pid 0 or risk live-locking the
        // machine - releasing the PMC detaches it.
        //
        //      https://bugs.freebsd.org/bugzilla/show_bug.cgi?id=227041
        //
        unsafe {
            pmc_release(self.id);
        }
    }
}

impl Drop for PmcEventSet {
    fn drop(&mut self) {
        if self.running {
            for e in &self.events {
                unsafe { pmc_stop(e.id) };
            }
        }
    }
}

impl CounterProvider for Pmc {
    type EventSet = PmcEventSet;

    fn init_library(&self, multiplex: bool) -> Result<(), Error> {
        let _guard = lock();
        init_pmc_once()?;

        if multiplex {
            return Err(new_error(ErrorKind::Unsupported).with_context("hwpmc multiplexing"));
        }
        Ok(())
    }

    fn register_thread(&self, _thread: ThreadHandle) -> Result<(), Error> {
        // libpmc keeps no per-thread state.
        signal::check()
    }

    fn create_event_set(&self) -> Result<PmcEventSet, Error> {
        let _guard = lock();
        init_pmc_once()?;
        signal::check()?;

        Ok(PmcEventSet::default())
    }

    fn bind_component(&self, set: &mut PmcEventSet, component: u32) -> Result<(), Error> {
        if component != DEFAULT_COMPONENT {
            return Err(
                new_error(ErrorKind::Unsupported).with_context(format!("component {}", component))
            );
        }
        set.bound = true;
        Ok(())
    }

    fn enable_multiplex(&self, _set: &mut PmcEventSet) -> Result<(), Error> {
        Err(new_error(ErrorKind::Unsupported).with_context("hwpmc multiplexing"))
    }

    fn add_named_event(&self, set: &mut PmcEventSet, name: &str) -> Result<u32, Error> {
        if !set.bound {
            return Err(new_error(ErrorKind::AllocInit).with_context("event set not bound"));
        }

        let event = allocate(name)?;
        set.events.push(event);
        Ok(set.events.len() as u32 - 1)
    }

    fn start(&self, set: &mut PmcEventSet) -> Result<(), Error> {
        signal::check()?;

        for e in &set.events {
            if unsafe { pmc_start(e.id) } != 0 {
                return match io::Error::raw_os_error(&io::Error::last_os_error()) {
                    Some(EDOOFUS) | Some(libc::ENXIO) => {
                        Err(new_os_error(ErrorKind::Unsupported))
                    }
                    _ => Err(new_os_error(ErrorKind::Unknown)),
                };
            }
            set.running = true;
        }

        Ok(())
    }

    fn reset(&self, set: &mut PmcEventSet) -> Result<(), Error> {
        signal::check()?;

        for e in set.events.iter_mut() {
            e.baseline = read(e.id)?;
        }
        Ok(())
    }

    fn accumulate_read(&self, set: &mut PmcEventSet, out: &mut [i64]) -> Result<(), Error> {
        signal::check()?;

        for (e, acc) in set.events.iter_mut().zip(out.iter_mut()) {
            let now = read(e.id)?;
            *acc = acc.wrapping_add(now.wrapping_sub(e.baseline) as i64);
            e.baseline = now;
        }
        Ok(())
    }

    fn destroy_event_set(&self, set: PmcEventSet) {
        drop(set)
    }
}

fn lock() -> std::sync::MutexGuard<'static, u32> {
    // A panic while holding the lock leaves nothing inconsistent.
    BIG_FAT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn allocate(name: &str) -> Result<PmcEvent, Error> {
    // It appears pmc_allocate isn't thread safe, so take a lock while
    // calling it.
    let guard = lock();

    init_pmc_once()?;
    signal::check()?;

    let c_spec = CString::new(name).map_err(|_| new_error(ErrorKind::InvalidEventSpec))?;

    let mut id = 0;
    if unsafe {
        pmc_allocate(
            c_spec.as_ptr(),
            pmc_mode_PMC_MODE_TC,
            0,
            CPU_ANY,
            &mut id,
            0,
        )
    } != 0
    {
        return match io::Error::raw_os_error(&io::Error::last_os_error()) {
            Some(libc::EINVAL) => Err(new_os_error(ErrorKind::AllocInit)),
            _ => Err(new_os_error(ErrorKind::Unknown)),
        };
    }

    // Dropping the event from here on releases the PMC.
    let event = PmcEvent { id, baseline: 0 };

    if unsafe { pmc_attach(id, SELF_PID) } != 0 {
        let err = match io::Error::raw_os_error(&io::Error::last_os_error()) {
            Some(libc::EEXIST) => new_os_error(ErrorKind::AlreadyAttached),
            Some(libc::EPERM) => new_os_error(ErrorKind::Forbidden),
            Some(libc::EINVAL) | Some(libc::ESRCH) => new_os_error(ErrorKind::BadTarget),
            _ => new_os_error(ErrorKind::Unknown),
        };

        // Releasing the event takes the lock.
        drop(guard);
        drop(event);
        return Err(err);
    }

    Ok(event)
}

fn read(id: pmc_id_t) -> Result<u64, Error> {
    let mut value: u64 = 0;
    if unsafe { pmc_read(id, &mut value) } != 0 {
        return Err(new_os_error(ErrorKind::Unknown));
    }
    Ok(value)
}

/// Outcome of `pmc_init`: the kind, errno and context of a failure.
type InitStatus = Result<(), (ErrorKind, Option<i32>, &'static str)>;

fn init_pmc_once() -> Result<(), Error> {
    init_result(&PMC_INIT_STATUS)
}

// A failed pmc_init is never retried, every caller sees the same error.
fn init_result(status: &InitStatus) -> Result<(), Error> {
    match *status {
        Ok(()) => Ok(()),
        Err((kind, Some(errno), ctx)) => {
            Err(Error::with_cause(kind, io::Error::from_raw_os_error(errno)).with_context(ctx))
        }
        Err((kind, None, ctx)) => Err(new_error(kind).with_context(ctx)),
    }
}

fn run_pmc_init() -> InitStatus {
    if cfg!(not(target_os = "freebsd")) {
        return Err((ErrorKind::Unsupported, None, "libpmc requires FreeBSD"));
    }

    if unsafe { pmc_init() } != 0 {
        let errno = io::Error::last_os_error().raw_os_error();
        let kind = match errno {
            Some(libc::ENOENT) => ErrorKind::Init,
            Some(libc::ENXIO) => ErrorKind::Unsupported,
            Some(EPROGMISMATCH) => ErrorKind::VersionMismatch,
            _ => ErrorKind::Unknown,
        };
        return Err((kind, errno, "pmc_init"));
    }

    // Register the signal handler
    signal::watch_for(&[libc::SIGBUS, libc::SIGIO]);
    Ok(())
}
