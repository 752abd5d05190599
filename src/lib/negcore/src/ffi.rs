//! C-ABI opaque-handle boundary, feature `ffi`.
//!
//! `negcore_buffer` is an owning raw buffer (`data`/`len`/`cap`), freed by
//! a paired `_free` function that reconstructs the owning `Vec`); every
//! entry point is `#[unsafe(no_mangle)] pub unsafe extern "C" fn`, and no
//! internal panic is ever allowed to cross the boundary — `catch_unwind`
//! turns it into [`crate::error::Status::NumericalFault`] instead.

use crate::error::Status;
use crate::reg::RegInputs;
use crate::{SimConfig, Simulation};
use libc::{c_char, c_void};
use std::ffi::CString;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Owning buffer handed back across the FFI boundary. Paired with
/// [`negcore_buffer_free`] — never freed any other way.
#[repr(C)]
pub struct negcore_buffer {
    pub data: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl negcore_buffer {
    fn from_vec(mut v: Vec<u8>) -> Self {
        let data = v.as_mut_ptr();
        let len = v.len();
        let cap = v.capacity();
        std::mem::forget(v);
        negcore_buffer { data, len, cap }
    }

    fn empty() -> Self {
        negcore_buffer {
            data: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }
}

/// Free a buffer previously returned by this crate's FFI functions.
///
/// # Safety
/// `buf` must have been produced by one of this module's functions and not
/// freed already.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_buffer_free(buf: negcore_buffer) {
    if buf.data.is_null() {
        return;
    }
    unsafe {
        drop(Vec::from_raw_parts(buf.data, buf.len, buf.cap));
    }
}

struct Handle {
    sim: Simulation,
    last_error_cstring: CString,
}

/// Create a simulation from a `SimConfig` passed by value. Returns null on
/// any configuration failure; the caller should not attempt to query a
/// null handle for an error message (there is nowhere to store one).
///
/// # Safety
/// `config` must point to a valid, initialized `SimConfig`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_create(config: *const SimConfig) -> *mut c_void {
    if config.is_null() {
        return std::ptr::null_mut();
    }
    let config = unsafe { &*config };
    let result = catch_unwind(AssertUnwindSafe(|| Simulation::create(config)));
    match result {
        Ok(Ok(sim)) => {
            let handle = Box::new(Handle {
                sim,
                last_error_cstring: CString::default(),
            });
            Box::into_raw(handle) as *mut c_void
        }
        _ => std::ptr::null_mut(),
    }
}

/// Release a handle created by [`negcore_create`].
///
/// # Safety
/// `handle` must have been returned by `negcore_create` and not yet
/// destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_destroy(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    unsafe {
        drop(Box::from_raw(handle as *mut Handle));
    }
}

unsafe fn with_handle<R>(handle: *mut c_void, f: impl FnOnce(&mut Handle) -> R) -> Option<R> {
    if handle.is_null() {
        return None;
    }
    let handle = unsafe { &mut *(handle as *mut Handle) };
    Some(f(handle))
}

/// Advance the simulation by `dt_seconds`. Returns a numeric status code;
/// never panics across the boundary.
///
/// # Safety
/// `handle` must be a live handle from `negcore_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_step(
    handle: *mut c_void,
    dt_seconds: f64,
    rainfall_flux: f64,
) -> i32 {
    let outcome = unsafe {
        with_handle(handle, |h| {
            catch_unwind(AssertUnwindSafe(|| h.sim.step(dt_seconds, rainfall_flux, RegInputs::default())))
        })
    };
    match outcome {
        Some(Ok(status)) => status as i32,
        Some(Err(_)) => Status::NumericalFault as i32,
        None => Status::InvalidHandle as i32,
    }
}

/// Restore state from a binary snapshot buffer.
///
/// # Safety
/// `handle` must be live; `data`/`len` must describe a valid readable
/// buffer of at least `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_reset_from_binary(
    handle: *mut c_void,
    data: *const u8,
    len: usize,
) -> i32 {
    if data.is_null() {
        return Status::InvalidConfig as i32;
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    let outcome = unsafe { with_handle(handle, |h| h.sim.reset_from_binary(bytes)) };
    match outcome {
        Some(status) => status as i32,
        None => Status::InvalidHandle as i32,
    }
}

/// Fetch the binary snapshot as a freshly allocated buffer.
///
/// # Safety
/// `handle` must be a live handle. The returned buffer must eventually be
/// freed with [`negcore_buffer_free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_state_binary(handle: *mut c_void) -> negcore_buffer {
    let outcome = unsafe { with_handle(handle, |h| h.sim.state_binary()) };
    match outcome {
        Some(bytes) => negcore_buffer::from_vec(bytes),
        None => negcore_buffer::empty(),
    }
}

/// Size in bytes of the binary snapshot this handle would currently
/// produce.
///
/// # Safety
/// `handle` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_state_binary_size(handle: *mut c_void) -> usize {
    unsafe { with_handle(handle, |h| h.sim.state_binary_size()) }.unwrap_or(0)
}

/// Fetch the JSON snapshot as a freshly allocated, NUL-free UTF-8 buffer.
///
/// # Safety
/// See [`negcore_get_state_binary`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_state_json(handle: *mut c_void) -> negcore_buffer {
    let outcome = unsafe { with_handle(handle, |h| h.sim.state_json().into_bytes()) };
    match outcome {
        Some(bytes) => negcore_buffer::from_vec(bytes),
        None => negcore_buffer::empty(),
    }
}

/// Returns the XXH3 state hash, or 0 for a null/invalid handle.
///
/// # Safety
/// `handle` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_state_hash(handle: *mut c_void) -> u64 {
    unsafe { with_handle(handle, |h| h.sim.state_hash()) }.unwrap_or(0)
}

/// Returns the accumulated OR-folded warning flags, or 0 for an invalid
/// handle.
///
/// # Safety
/// `handle` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_error_flags(handle: *mut c_void) -> u32 {
    unsafe { with_handle(handle, |h| h.sim.error_flags()) }.unwrap_or(0)
}

/// Returns a pointer into the handle's own scratch `CString`, valid until
/// the next call on this handle. Null if there is no handle or no error
/// has been recorded yet.
///
/// # Safety
/// `handle` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn negcore_get_last_error(handle: *mut c_void) -> *const c_char {
    unsafe {
        with_handle(handle, |h| {
            let message = h.sim.last_error().unwrap_or("").to_string();
            h.last_error_cstring = CString::new(message).unwrap_or_default();
            h.last_error_cstring.as_ptr()
        })
    }
    .unwrap_or(std::ptr::null())
}
