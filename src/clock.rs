//! Timestamps for samples.
//!
//! On `x86_64` this is the raw time stamp counter, so the minimum sample
//! interval is measured in CPU cycles. Elsewhere it falls back to nanoseconds
//! since the first call in the process.

use std::time::Instant;

lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

/// Read the current timestamp.
#[inline]
pub fn cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: rdtsc is available on every x86_64 CPU.
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        nanos()
    }
}

/// Nanoseconds since the process epoch, regardless of architecture.
pub fn nanos() -> u64 {
    EPOCH.elapsed().as_nanos() as u64
}
