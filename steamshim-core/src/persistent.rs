//! Callbacks that fire on every event of one kind until their owner drops them.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::SdkBackend;
use crate::error::Result;
use crate::record::CallbackRecord;
use crate::vtable::{CallbackBase, CallbackFlags, CallbackVTable};

static VTABLE: CallbackVTable = CallbackVTable::new(run, run_with_status, size_bytes);

#[repr(C)]
struct Adapter {
    base: CallbackBase,
    payload_size: i32,
    record: Option<CallbackRecord>,
    backend: Arc<dyn SdkBackend>,
}

/// Owning handle to a registered callback.
///
/// Dropping the handle unregisters the adapter from the SDK and then calls
/// the record's `release`, exactly once.
pub struct PersistentCallback {
    adapter: NonNull<Adapter>,
    event_id: i32,
}

// Safety: the handle only reads immutable adapter fields; the SDK side is
// serialized by the backend. Destruction needs `self` by value.
unsafe impl Send for PersistentCallback {}
unsafe impl Sync for PersistentCallback {}

impl PersistentCallback {
    /// Build an adapter for `record` and register it for `event_id`.
    ///
    /// `flags` may only carry [`CallbackFlags::GAME_SERVER`]; the registered
    /// bit belongs to the SDK and is stripped.
    pub fn create(
        backend: Arc<dyn SdkBackend>,
        flags: CallbackFlags,
        event_id: i32,
        record: CallbackRecord,
    ) -> Result<Self> {
        record.validate_persistent()?;
        let flags = flags & CallbackFlags::GAME_SERVER;
        let adapter = Box::new(Adapter {
            base: CallbackBase::new(&VTABLE, flags, event_id),
            payload_size: record.payload_size,
            record: Some(record),
            backend,
        });
        let adapter = NonNull::from(Box::leak(adapter));
        unsafe {
            let backend = &(*adapter.as_ptr()).backend;
            backend.register_callback(adapter.as_ptr().cast(), event_id);
        }
        tracing::debug!(event_id, game_server = flags.contains(CallbackFlags::GAME_SERVER), "registered callback");
        Ok(Self { adapter, event_id })
    }

    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    /// Address the SDK dispatches to; also the `this` seen by the record.
    pub fn as_ptr(&self) -> *mut c_void {
        self.adapter.as_ptr().cast()
    }

    /// Current flag byte, including the SDK-maintained registered bit.
    pub fn flags(&self) -> CallbackFlags {
        unsafe { (*self.adapter.as_ptr()).base.flags() }
    }
}

impl Drop for PersistentCallback {
    fn drop(&mut self) {
        let this = self.adapter.as_ptr();
        unsafe {
            (*this).backend.unregister_callback(this.cast());
            let mut adapter = Box::from_raw(this);
            if let Some(record) = adapter.record.take() {
                record.release(this.cast());
            }
        }
        tracing::debug!(event_id = self.event_id, "unregistered callback");
    }
}

// Nothing below may touch `this` after the foreign dispatch returns: the
// handler is allowed to drop its own handle from inside the call.

unsafe extern "C" fn run(this: *mut CallbackBase, payload: *mut c_void) {
    let adapter = this.cast::<Adapter>();
    let target = unsafe { (*adapter).record.as_ref().map(CallbackRecord::target) };
    if let Some(target) = target {
        unsafe { target.dispatch(this.cast(), payload) }
    }
}

unsafe extern "C" fn run_with_status(this: *mut CallbackBase, payload: *mut c_void, _io_failed: bool, _call: u64) {
    unsafe { run(this, payload) }
}

unsafe extern "C" fn size_bytes(this: *mut CallbackBase) -> i32 {
    unsafe { (*this.cast::<Adapter>()).payload_size }
}
