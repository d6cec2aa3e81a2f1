//! hwpmc reports some failures asynchronously, by signalling the process.
//!
//! The handler only records the signal; [`check`] turns it into an error the
//! next time the counters are used.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{new_error, Error, ErrorKind};

static LAST_SIG: AtomicUsize = AtomicUsize::new(0);

extern "C" fn interrupt(sig: libc::c_int) {
    LAST_SIG.store(sig as usize, Ordering::SeqCst);
}

pub fn check() -> Result<(), Error> {
    let sig = LAST_SIG.load(Ordering::SeqCst) as libc::c_int;
    match sig {
        0 => Ok(()),
        libc::SIGIO => Err(new_error(ErrorKind::NotAttached)),
        libc::SIGBUS => Err(new_error(ErrorKind::Unloaded)),
        _ => Err(new_error(ErrorKind::UnexpectedSignal).with_context(format!("signal {}", sig))),
    }
}

pub fn watch_for(sigs: &[libc::c_int]) {
    for sig in sigs {
        unsafe {
            libc::signal(*sig, interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t);
        }
    }
}
