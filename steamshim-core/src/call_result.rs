//! One-shot waiters for a single asynchronous API call.
//!
//! A waiter is owned by nobody once registered. It moves through
//!
//! ```text
//! Registered --(matching fire | cancel)--> Retiring --(freed)--> Retired
//! ```
//!
//! and only the party that wins the `Registered -> Retiring` transition may
//! touch the adapter afterwards. The state lives in a separate allocation so
//! [`CallResultHandle`] can observe it after the adapter is gone.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::backend::SdkBackend;
use crate::error::Result;
use crate::record::CallbackRecord;
use crate::vtable::{CallbackBase, CallbackFlags, CallbackVTable};

const REGISTERED: u8 = 0;
const RETIRING: u8 = 1;
const RETIRED: u8 = 2;

static VTABLE: CallbackVTable = CallbackVTable::new(run, run_with_status, size_bytes);

/// Runs after the record has been released, whichever way the waiter retired.
pub type RetireHook = Box<dyn FnOnce() + Send + 'static>;

#[repr(C)]
struct Adapter {
    base: CallbackBase,
    payload_size: i32,
    call: u64,
    state: Arc<AtomicU8>,
    record: Option<CallbackRecord>,
    backend: Arc<dyn SdkBackend>,
    on_retire: Option<RetireHook>,
}

/// Non-owning handle to a registered waiter.
///
/// The waiter frees itself when its call completes, so the handle may be
/// dropped freely. It is only needed to cancel early.
#[derive(Clone)]
pub struct CallResultHandle {
    adapter: NonNull<Adapter>,
    state: Arc<AtomicU8>,
    call: u64,
}

// Safety: the adapter is only dereferenced by whoever wins the state
// transition, and dispatch is serialized by the SDK.
unsafe impl Send for CallResultHandle {}
unsafe impl Sync for CallResultHandle {}

impl std::fmt::Debug for CallResultHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallResultHandle")
            .field("call", &self.call)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Build a waiter for `record` and register it against `call`.
///
/// `event_id` is the callback id of the result struct the call produces;
/// `on_retire` runs once after the record is released.
pub fn create(
    backend: Arc<dyn SdkBackend>,
    record: CallbackRecord,
    call: u64,
    event_id: i32,
    on_retire: Option<RetireHook>,
) -> Result<CallResultHandle> {
    record.validate_call_result()?;
    let state = Arc::new(AtomicU8::new(REGISTERED));
    let adapter = Box::new(Adapter {
        base: CallbackBase::new(&VTABLE, CallbackFlags::empty(), event_id),
        payload_size: record.payload_size,
        call,
        state: state.clone(),
        record: Some(record),
        backend,
        on_retire,
    });
    let adapter = NonNull::from(Box::leak(adapter));
    unsafe {
        let backend = &(*adapter.as_ptr()).backend;
        backend.register_call_result(adapter.as_ptr().cast(), call);
    }
    tracing::debug!(call, event_id, "registered call result");
    Ok(CallResultHandle { adapter, state, call })
}

impl CallResultHandle {
    pub fn call(&self) -> u64 {
        self.call
    }

    /// Whether the waiter is still registered and has not started firing.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == REGISTERED
    }

    /// Whether the waiter has been freed.
    pub fn is_retired(&self) -> bool {
        self.state.load(Ordering::Acquire) == RETIRED
    }

    /// Unregister and release a waiter whose call has not completed yet.
    ///
    /// Returns `false` without touching anything if the waiter already fired,
    /// is firing right now, or was cancelled before.
    ///
    /// # Safety
    ///
    /// Must not race a dispatch running on another thread.
    pub unsafe fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(REGISTERED, RETIRING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tracing::debug!(call = self.call, "cancelling call result");
        unsafe { retire(self.adapter.as_ptr()) };
        true
    }
}

/// Unregister, release and free. Caller must have won the transition.
unsafe fn retire(adapter: *mut Adapter) {
    unsafe {
        let call = (*adapter).call;
        (*adapter).backend.unregister_call_result(adapter.cast(), call);
        let mut owned = Box::from_raw(adapter);
        if let Some(record) = owned.record.take() {
            record.release(adapter.cast());
        }
        let hook = owned.on_retire.take();
        owned.state.store(RETIRED, Ordering::Release);
        drop(owned);
        if let Some(hook) = hook {
            hook();
        }
    }
}

unsafe fn complete(this: *mut CallbackBase, payload: *mut c_void, io_failed: bool, call: u64) {
    let adapter = this.cast::<Adapter>();
    let (state, target) = unsafe { (&(*adapter).state, (*adapter).record.as_ref().map(CallbackRecord::target)) };
    if state
        .compare_exchange(REGISTERED, RETIRING, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }
    tracing::trace!(call, io_failed, "call result fired");
    if let Some(target) = target {
        unsafe { target.dispatch_with_status(this.cast(), payload, io_failed, call) };
    }
    unsafe { retire(adapter) };
}

/// Payload-only fire: the SDK had no status to report, so this counts as a
/// successful completion of the awaited call.
unsafe extern "C" fn run(this: *mut CallbackBase, payload: *mut c_void) {
    let call = unsafe { (*this.cast::<Adapter>()).call };
    unsafe { complete(this, payload, false, call) }
}

unsafe extern "C" fn run_with_status(this: *mut CallbackBase, payload: *mut c_void, io_failed: bool, call: u64) {
    if call != unsafe { (*this.cast::<Adapter>()).call } {
        return;
    }
    unsafe { complete(this, payload, io_failed, call) }
}

unsafe extern "C" fn size_bytes(this: *mut CallbackBase) -> i32 {
    unsafe { (*this.cast::<Adapter>()).payload_size }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Loopback;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Probe {
        fires: Mutex<Vec<(bool, u64)>>,
        released: AtomicUsize,
    }

    unsafe extern "C" fn probe_dispatch(_: *mut c_void, context: *mut c_void, _: *mut c_void, io_failed: bool, call: u64) {
        unsafe { &*(context as *const Probe) }.fires.lock().push((io_failed, call));
    }

    unsafe extern "C" fn probe_release(_: *mut c_void, context: *mut c_void) {
        unsafe { &*(context as *const Probe) }.released.fetch_add(1, Ordering::SeqCst);
    }

    fn record(probe: &Probe) -> CallbackRecord {
        CallbackRecord::call_result(8, probe as *const Probe as *mut c_void, probe_dispatch, probe_release)
    }

    #[test]
    fn mismatched_handle_is_ignored() {
        let loopback = Arc::new(Loopback::new());
        let probe = Probe::default();
        let handle = create(loopback.clone(), record(&probe), 7, 1100, None).unwrap();

        let mut payload = [0u8; 8];
        unsafe { CallbackBase::run_with_status(handle.adapter.as_ptr().cast(), payload.as_mut_ptr().cast(), false, 8) };
        assert!(probe.fires.lock().is_empty());
        assert!(handle.is_pending());
        assert_eq!(loopback.registered_call_results(), 1);

        unsafe { CallbackBase::run_with_status(handle.adapter.as_ptr().cast(), payload.as_mut_ptr().cast(), true, 7) };
        assert_eq!(*probe.fires.lock(), vec![(true, 7)]);
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
        assert!(handle.is_retired());
        assert_eq!(loopback.registered_call_results(), 0);
    }

    #[test]
    fn payload_only_fire_counts_as_success() {
        let loopback = Arc::new(Loopback::new());
        let probe = Probe::default();
        let handle = create(loopback.clone(), record(&probe), 42, 1100, None).unwrap();

        let mut payload = [0u8; 8];
        unsafe { CallbackBase::run(handle.adapter.as_ptr().cast(), payload.as_mut_ptr().cast()) };
        assert_eq!(*probe.fires.lock(), vec![(false, 42)]);
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
        assert!(handle.is_retired());
    }

    #[test]
    fn cancel_releases_once_and_runs_hook() {
        let loopback = Arc::new(Loopback::new());
        let probe = Probe::default();
        let hooked = Arc::new(AtomicUsize::new(0));
        let hook_counter = hooked.clone();
        let handle = create(
            loopback.clone(),
            record(&probe),
            3,
            1100,
            Some(Box::new(move || {
                hook_counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        assert!(unsafe { handle.cancel() });
        assert!(!unsafe { handle.cancel() });
        assert!(probe.fires.lock().is_empty());
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
        assert_eq!(hooked.load(Ordering::SeqCst), 1);
        assert_eq!(loopback.registered_call_results(), 0);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let loopback = Arc::new(Loopback::new());
        let probe = Probe::default();
        let handle = create(loopback.clone(), record(&probe), 5, 1100, None).unwrap();
        let copy = handle.clone();

        let mut payload = [0u8; 8];
        unsafe { CallbackBase::run(handle.adapter.as_ptr().cast(), payload.as_mut_ptr().cast()) };
        assert!(!unsafe { copy.cancel() });
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    }
}
