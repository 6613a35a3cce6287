//! The AFL++ custom-mutator C ABI surface (`afl_custom_*`), the cdylib half of this crate.
//!
//! Each function here is a thin, panic-free wrapper around [`crate::dispatcher::Mutator`]: the
//! host owns an opaque `void*` handle produced by `afl_custom_init` and hands it back on every
//! subsequent call.

use core::ffi::{c_char, c_void};
use std::path::PathBuf;

use crate::dispatcher::Mutator;

struct MutatorHandle {
    mutator: Mutator,
    last_output: Vec<u8>,
    last_description: Vec<u8>,
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// # Safety
/// `afl` is opaque to us and never dereferenced. The returned pointer must be passed back
/// unmodified to every other `afl_custom_*` call and finally to `afl_custom_deinit`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn afl_custom_init(_afl: *mut c_void, seed: u32) -> *mut c_void {
    match crate::init::init(&seed.to_le_bytes(), &executable_dir()) {
        Ok(mutator) => Box::into_raw(Box::new(MutatorHandle {
            mutator,
            last_output: Vec::new(),
            last_description: Vec::new(),
        })) as *mut c_void,
        Err(err) => {
            tracing::error!(%err, "afl_custom_init failed");
            std::ptr::null_mut()
        }
    }
}

/// # Safety
/// `data` must be a live handle from `afl_custom_init`. `buf`/`add_buf` must point to at least
/// `buf_size`/`add_buf_size` readable bytes (`add_buf` may be null iff `add_buf_size` is 0).
/// `out_buf` must point to a writable `*mut u8` slot; the bytes it is set to point at remain
/// valid only until the next call through this handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn afl_custom_fuzz(
    data: *mut c_void,
    buf: *mut u8,
    buf_size: usize,
    out_buf: *mut *mut u8,
    add_buf: *mut u8,
    add_buf_size: usize,
    max_size: usize,
) -> usize {
    let handle = unsafe { &mut *data.cast::<MutatorHandle>() };
    let buffer = unsafe { std::slice::from_raw_parts(buf, buf_size) };
    let aux: &[u8] = if add_buf.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(add_buf, add_buf_size) }
    };

    handle.last_output = handle.mutator.fuzz(buffer, aux, max_size);
    unsafe {
        *out_buf = handle.last_output.as_mut_ptr();
    }
    handle.last_output.len()
}

/// # Safety
/// `data` must be a live handle from `afl_custom_init`. The returned pointer is a
/// NUL-terminated C string owned by the handle, valid until the next call through it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn afl_custom_describe(data: *mut c_void, max_description_len: usize) -> *const c_char {
    let handle = unsafe { &mut *data.cast::<MutatorHandle>() };
    let mut bytes = handle.mutator.describe(max_description_len);
    bytes.push(0);
    handle.last_description = bytes;
    handle.last_description.as_ptr().cast()
}

/// # Safety
/// `data` must be a live handle from `afl_custom_init`. The returned pointer is a
/// NUL-terminated C string owned by the handle, valid until the next call through it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn afl_custom_introspection(data: *mut c_void) -> *const c_char {
    let handle = unsafe { &mut *data.cast::<MutatorHandle>() };
    let mut bytes = handle.mutator.introspection();
    bytes.push(0);
    handle.last_description = bytes;
    handle.last_description.as_ptr().cast()
}

/// # Safety
/// `data` must be a live handle from `afl_custom_init`, and must not be used again afterward.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn afl_custom_deinit(data: *mut c_void) {
    if data.is_null() {
        return;
    }
    let mut handle = unsafe { Box::from_raw(data.cast::<MutatorHandle>()) };
    handle.mutator.deinit();
}
