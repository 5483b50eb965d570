//! The foreign runtime's half of a callback registration.

use std::ffi::c_void;

use crate::error::{Result, ShimError};

/// Normal fire: `(this, context, payload)`.
pub type DispatchFn = unsafe extern "C" fn(this: *mut c_void, context: *mut c_void, payload: *mut c_void);

/// Status-bearing fire: `(this, context, payload, io_failed, call)`.
pub type DispatchWithStatusFn = unsafe extern "C" fn(
    this: *mut c_void,
    context: *mut c_void,
    payload: *mut c_void,
    io_failed: bool,
    call: u64,
);

/// Teardown: `(this, context)`. Called exactly once.
pub type ReleaseFn = unsafe extern "C" fn(this: *mut c_void, context: *mut c_void);

/// Describes how to reach one handler in the foreign runtime.
///
/// `this` in every function is the address of the adapter object the record
/// is embedded in; `context` is handed back untouched.
///
/// The record is move-only and [`CallbackRecord::release`] consumes it, so an
/// adapter that owns one can release it at most once.
#[repr(C)]
#[derive(Debug)]
pub struct CallbackRecord {
    /// Byte size of the payload struct; reported verbatim to the SDK.
    pub payload_size: i32,
    pub context: *mut c_void,
    pub dispatch: Option<DispatchFn>,
    pub dispatch_with_status: Option<DispatchWithStatusFn>,
    pub release: Option<ReleaseFn>,
}

// Safety: the record never dereferences `context`. The foreign runtime owns
// it and guarantees it may be used from the SDK's dispatch thread.
unsafe impl Send for CallbackRecord {}

impl CallbackRecord {
    /// Record for a persistent callback.
    pub fn persistent(payload_size: i32, context: *mut c_void, dispatch: DispatchFn, release: ReleaseFn) -> Self {
        Self {
            payload_size,
            context,
            dispatch: Some(dispatch),
            dispatch_with_status: None,
            release: Some(release),
        }
    }

    /// Record for a call-result waiter.
    pub fn call_result(
        payload_size: i32,
        context: *mut c_void,
        dispatch_with_status: DispatchWithStatusFn,
        release: ReleaseFn,
    ) -> Self {
        Self {
            payload_size,
            context,
            dispatch: None,
            dispatch_with_status: Some(dispatch_with_status),
            release: Some(release),
        }
    }

    /// Checks that a persistent callback can be built from this record.
    pub fn validate_persistent(&self) -> Result<()> {
        self.validate_common()?;
        if self.dispatch.is_none() {
            return Err(ShimError::MissingFunction("dispatch"));
        }
        Ok(())
    }

    /// Checks that a call-result waiter can be built from this record. Either
    /// dispatch function will do; the plain one just never sees the status.
    pub fn validate_call_result(&self) -> Result<()> {
        self.validate_common()?;
        if self.dispatch_with_status.is_none() && self.dispatch.is_none() {
            return Err(ShimError::MissingFunction("dispatch_with_status"));
        }
        Ok(())
    }

    fn validate_common(&self) -> Result<()> {
        if self.payload_size < 0 {
            return Err(ShimError::InvalidPayloadSize(self.payload_size));
        }
        if self.release.is_none() {
            return Err(ShimError::MissingFunction("release"));
        }
        Ok(())
    }

    /// Copy out what a fire needs, so no borrow of the adapter outlives the
    /// call into foreign code (which may destroy the adapter).
    pub(crate) fn target(&self) -> DispatchTarget {
        DispatchTarget {
            context: self.context,
            dispatch: self.dispatch,
            dispatch_with_status: self.dispatch_with_status,
        }
    }

    /// Hand `context` back to the foreign runtime.
    ///
    /// # Safety
    ///
    /// No dispatch through this record may happen afterwards.
    pub(crate) unsafe fn release(self, this: *mut c_void) {
        if let Some(release) = self.release {
            unsafe { release(this, self.context) }
        }
    }
}

/// The dispatch half of a [`CallbackRecord`], by value.
#[derive(Clone, Copy)]
pub(crate) struct DispatchTarget {
    context: *mut c_void,
    dispatch: Option<DispatchFn>,
    dispatch_with_status: Option<DispatchWithStatusFn>,
}

impl DispatchTarget {
    /// Forward a normal fire.
    ///
    /// # Safety
    ///
    /// `payload` must be valid for the foreign handler's expectations.
    pub(crate) unsafe fn dispatch(self, this: *mut c_void, payload: *mut c_void) {
        if let Some(dispatch) = self.dispatch {
            unsafe { dispatch(this, self.context, payload) }
        }
    }

    /// Forward a status-bearing fire, degrading to [`DispatchTarget::dispatch`]
    /// when the record has no status-aware function.
    ///
    /// # Safety
    ///
    /// Same as [`DispatchTarget::dispatch`].
    pub(crate) unsafe fn dispatch_with_status(self, this: *mut c_void, payload: *mut c_void, io_failed: bool, call: u64) {
        match self.dispatch_with_status {
            Some(dispatch) => unsafe { dispatch(this, self.context, payload, io_failed, call) },
            None => unsafe { self.dispatch(this, payload) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn dispatch(_: *mut c_void, _: *mut c_void, _: *mut c_void) {}
    unsafe extern "C" fn release(_: *mut c_void, context: *mut c_void) {
        unsafe { &*(context as *const AtomicUsize) }.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn persistent_requires_dispatch_and_release() {
        let record = CallbackRecord::persistent(8, std::ptr::null_mut(), dispatch, release);
        assert!(record.validate_persistent().is_ok());

        let mut record = CallbackRecord::persistent(8, std::ptr::null_mut(), dispatch, release);
        record.dispatch = None;
        assert!(matches!(record.validate_persistent(), Err(ShimError::MissingFunction("dispatch"))));

        let mut record = CallbackRecord::persistent(8, std::ptr::null_mut(), dispatch, release);
        record.release = None;
        assert!(matches!(record.validate_persistent(), Err(ShimError::MissingFunction("release"))));
    }

    #[test]
    fn negative_payload_size_is_rejected() {
        let record = CallbackRecord::persistent(-4, std::ptr::null_mut(), dispatch, release);
        assert!(matches!(record.validate_persistent(), Err(ShimError::InvalidPayloadSize(-4))));
    }

    #[test]
    fn call_result_accepts_plain_dispatch() {
        let record = CallbackRecord::persistent(8, std::ptr::null_mut(), dispatch, release);
        assert!(record.validate_call_result().is_ok());

        let mut record = CallbackRecord::persistent(8, std::ptr::null_mut(), dispatch, release);
        record.dispatch = None;
        assert!(record.validate_call_result().is_err());
    }

    #[test]
    fn release_passes_context_through() {
        let released = AtomicUsize::new(0);
        let record = CallbackRecord::persistent(
            4,
            &released as *const AtomicUsize as *mut c_void,
            dispatch,
            release,
        );
        unsafe { record.release(std::ptr::null_mut()) };
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
