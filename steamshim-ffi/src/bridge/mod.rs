//! `extern "C"` exports, grouped by concern.

pub mod abi;
pub mod accessors;
pub mod loopback;

use std::ffi::{CStr, c_char};

/// Helper: read a C string pointer into a Rust String, returning None on null or invalid UTF-8.
pub(crate) unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(String::from)
}
