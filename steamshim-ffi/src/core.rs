//! Session — the process-wide bridge state behind the C ABI.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use steamshim_core::{Bridge, CallResultHandle, PersistentCallback, ShimConfig};

/// The active session, if any.
static SESSION: Lazy<RwLock<Option<Arc<Session>>>> = Lazy::new(|| RwLock::new(None));

/// Monotonic handle counter shared by both tables; 0 is never issued.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

pub fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Per-process bridge state. Created by `steamshim_configure`/`steamshim_init`,
/// torn down by `steamshim_shutdown`.
pub struct Session {
    pub bridge: Bridge,
    pub config: ShimConfig,
    /// Persistent callbacks, owned here on behalf of the foreign caller.
    pub callbacks: DashMap<u64, PersistentCallback>,
    /// Pending call-result waiters. Entries remove themselves on retire.
    pub call_results: Arc<DashMap<u64, CallResultHandle>>,
}

impl Session {
    pub fn new(bridge: Bridge, config: ShimConfig) -> Self {
        Self {
            bridge,
            config,
            callbacks: DashMap::new(),
            call_results: Arc::new(DashMap::new()),
        }
    }

    /// Track a freshly registered waiter under `handle`.
    ///
    /// A waiter that already fired on another thread ran its retire hook
    /// before it was in the table, so its entry is dropped here instead.
    pub fn track_call_result(&self, handle: u64, waiter: CallResultHandle) {
        let observer = waiter.clone();
        self.call_results.insert(handle, waiter);
        if !observer.is_pending() {
            self.call_results.remove(&handle);
        }
    }

    /// Release every registration still held, then shut the SDK down.
    ///
    /// Entries are pulled out of the tables before being torn down, so a
    /// release function calling back into the ABI cannot deadlock on a shard.
    pub fn teardown(&self) {
        let keys: Vec<u64> = self.callbacks.iter().map(|e| *e.key()).collect();
        let mut dropped = 0usize;
        for key in keys {
            if let Some((_, callback)) = self.callbacks.remove(&key) {
                drop(callback);
                dropped += 1;
            }
        }

        let keys: Vec<u64> = self.call_results.iter().map(|e| *e.key()).collect();
        let mut cancelled = 0usize;
        for key in keys {
            if let Some((_, waiter)) = self.call_results.remove(&key) {
                // Safety: dispatch happens on the thread calling shutdown, if at all.
                if unsafe { waiter.cancel() } {
                    cancelled += 1;
                }
            }
        }

        tracing::info!(callbacks = dropped, call_results = cancelled, "released outstanding registrations");
        self.bridge.shutdown();
    }
}

/// Clone out the active session. The global lock is never held while calling
/// into the bridge, since handlers may re-enter the ABI during dispatch.
pub fn session() -> Option<Arc<Session>> {
    SESSION.read().clone()
}

/// Return the active session, creating one from `make` if there is none.
pub fn get_or_create(make: impl FnOnce() -> Option<Session>) -> Option<Arc<Session>> {
    if let Some(existing) = session() {
        return Some(existing);
    }
    let mut slot = SESSION.write();
    if let Some(existing) = slot.as_ref() {
        return Some(existing.clone());
    }
    let created = Arc::new(make()?);
    *slot = Some(created.clone());
    Some(created)
}

/// Detach the active session.
pub fn take() -> Option<Arc<Session>> {
    SESSION.write().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::ffi::c_void;
    use steamshim_core::CallbackRecord;
    use steamshim_core::backend::Loopback;

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn ignore_status(_: *mut c_void, _: *mut c_void, _: *mut c_void, _: bool, _: u64) {}

    unsafe extern "C" fn count_release(_: *mut c_void, _: *mut c_void) {
        RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    fn loopback_session() -> Session {
        Session::new(Bridge::new(Arc::new(Loopback::new())), ShimConfig::default())
    }

    fn waiter(session: &Session, call: u64) -> CallResultHandle {
        let record = CallbackRecord::call_result(4, std::ptr::null_mut(), ignore_status, count_release);
        session.bridge.register_call_result(record, call, 1, None).unwrap()
    }

    #[test]
    fn test_track_pending_waiter() {
        let session = loopback_session();
        let pending = waiter(&session, 11);
        session.track_call_result(1, pending);
        assert_eq!(session.call_results.len(), 1);
        session.teardown();
        assert_eq!(session.call_results.len(), 0);
    }

    #[test]
    fn test_track_waiter_that_already_fired() {
        let session = loopback_session();
        let fired = waiter(&session, 12);
        assert!(unsafe { fired.cancel() });
        assert!(fired.is_retired());

        session.track_call_result(2, fired);
        assert!(session.call_results.is_empty());
    }
}
