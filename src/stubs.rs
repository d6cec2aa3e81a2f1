//! Stand-ins for the libpmc bindings on platforms without hwpmc.
//!
//! Nothing calls these: library initialisation fails with
//! `ErrorKind::Unsupported` first. They fail like a missing hwpmc would.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use libc::c_char;

pub type pmc_id_t = u32;

pub const pmc_mode_PMC_MODE_TC: u32 = 2;

pub const EDOOFUS: i32 = 88;
pub const EPROGMISMATCH: i32 = 75;

pub unsafe fn pmc_init() -> i32 {
    -1
}

pub unsafe fn pmc_allocate(
    _ctrspec: *const c_char,
    _mode: u32,
    _flags: u32,
    _cpu: i32,
    _pmcid: *mut pmc_id_t,
    _count: u64,
) -> i32 {
    -1
}

pub unsafe fn pmc_attach(_pmcid: pmc_id_t, _pid: i32) -> i32 {
    -1
}

pub unsafe fn pmc_read(_pmc: pmc_id_t, _value: *mut u64) -> i32 {
    -1
}

pub unsafe fn pmc_release(_pmc: pmc_id_t) -> i32 {
    -1
}

pub unsafe fn pmc_start(_pmc: pmc_id_t) -> i32 {
    -1
}

pub unsafe fn pmc_stop(_pmc: pmc_id_t) -> i32 {
    -1
}
