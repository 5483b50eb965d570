//! Records backed by Rust closures instead of foreign function pointers.
//!
//! The closure is boxed into the record's `context`; monomorphized
//! trampolines unbox it on dispatch and drop it on release.

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::record::CallbackRecord;

/// A payload struct the SDK delivers for one callback id.
///
/// # Safety
///
/// `Self` must be `#[repr(C)]` and match the SDK struct for [`Self::ID`]
/// byte for byte, including padding and packing.
pub unsafe trait CallbackPayload: Copy + Send + 'static {
    const ID: i32;

    fn size() -> i32 {
        std::mem::size_of::<Self>() as i32
    }
}

/// Record that calls `f` with every payload.
pub fn persistent_record<P, F>(f: F) -> CallbackRecord
where
    P: CallbackPayload,
    F: FnMut(&P) + Send + 'static,
{
    let context = Box::into_raw(Box::new(f)).cast::<c_void>();
    CallbackRecord::persistent(P::size(), context, run_persistent::<P, F>, drop_context::<F>)
}

/// Record that calls `f` once with the call's result and its I/O failure flag.
pub fn call_result_record<P, F>(f: F) -> CallbackRecord
where
    P: CallbackPayload,
    F: FnOnce(&P, bool) + Send + 'static,
{
    let context = Box::into_raw(Box::new(Some(f))).cast::<c_void>();
    CallbackRecord::call_result(P::size(), context, run_call_result::<P, F>, drop_context::<Option<F>>)
}

unsafe extern "C" fn run_persistent<P, F>(_this: *mut c_void, context: *mut c_void, payload: *mut c_void)
where
    P: CallbackPayload,
    F: FnMut(&P) + Send + 'static,
{
    let f = unsafe { &mut *context.cast::<F>() };
    let payload = unsafe { payload.cast::<P>().read_unaligned() };
    if catch_unwind(AssertUnwindSafe(|| f(&payload))).is_err() {
        tracing::error!(callback_id = P::ID, "panic in callback handler (caught at FFI boundary)");
    }
}

unsafe extern "C" fn run_call_result<P, F>(
    _this: *mut c_void,
    context: *mut c_void,
    payload: *mut c_void,
    io_failed: bool,
    call: u64,
) where
    P: CallbackPayload,
    F: FnOnce(&P, bool) + Send + 'static,
{
    let Some(f) = (unsafe { &mut *context.cast::<Option<F>>() }).take() else {
        return;
    };
    let payload = unsafe { payload.cast::<P>().read_unaligned() };
    if catch_unwind(AssertUnwindSafe(|| f(&payload, io_failed))).is_err() {
        tracing::error!(callback_id = P::ID, call, "panic in call result handler (caught at FFI boundary)");
    }
}

unsafe extern "C" fn drop_context<T>(_this: *mut c_void, context: *mut c_void) {
    drop(unsafe { Box::from_raw(context.cast::<T>()) });
}
