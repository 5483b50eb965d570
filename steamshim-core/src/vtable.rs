//! Rust rendition of the SDK's `CCallbackBase`.
//!
//! ```text
//! class CCallbackBase {
//!     virtual void Run(void *pvParam) = 0;
//!     virtual void Run(void *pvParam, bool bIOFailure, SteamAPICall_t hSteamAPICall) = 0;
//!     virtual int GetCallbackSizeBytes() = 0;
//!     uint8 m_nCallbackFlags;
//!     int m_iCallback;
//! };
//! ```
//!
//! The SDK reads the flags and callback id directly and calls through the
//! vtable, so [`CallbackBase`] has to match that layout exactly and every
//! adapter must embed it as its first field.

use std::ffi::c_void;

use bitflags::bitflags;

#[cfg(all(target_arch = "x86", target_env = "msvc"))]
compile_error!("32-bit MSVC uses thiscall for virtual methods and is not supported");

pub type RunFn = unsafe extern "C" fn(this: *mut CallbackBase, payload: *mut c_void);
pub type RunWithStatusFn = unsafe extern "C" fn(
    this: *mut CallbackBase,
    payload: *mut c_void,
    io_failed: bool,
    call: u64,
);
pub type SizeBytesFn = unsafe extern "C" fn(this: *mut CallbackBase) -> i32;

/// Virtual function table for [`CallbackBase`].
///
/// MSVC groups overloaded virtuals and emits them in reverse declaration
/// order, so the two `Run` slots swap places there.
#[repr(C)]
pub struct CallbackVTable {
    #[cfg(not(target_env = "msvc"))]
    run: RunFn,
    run_with_status: RunWithStatusFn,
    #[cfg(target_env = "msvc")]
    run: RunFn,
    size_bytes: SizeBytesFn,
}

impl CallbackVTable {
    pub const fn new(run: RunFn, run_with_status: RunWithStatusFn, size_bytes: SizeBytesFn) -> Self {
        Self {
            run,
            run_with_status,
            size_bytes,
        }
    }
}

bitflags! {
    /// `m_nCallbackFlags` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallbackFlags: u8 {
        /// Set by the SDK while the object sits in its dispatch table.
        const REGISTERED = 0x01;
        /// Subscribe to the game-server event stream instead of the client one.
        const GAME_SERVER = 0x02;
    }
}

#[repr(C)]
pub struct CallbackBase {
    vtable: &'static CallbackVTable,
    flags: u8,
    callback_id: i32,
}

impl CallbackBase {
    pub fn new(vtable: &'static CallbackVTable, flags: CallbackFlags, callback_id: i32) -> Self {
        Self {
            vtable,
            flags: flags.bits(),
            callback_id,
        }
    }

    pub fn callback_id(&self) -> i32 {
        self.callback_id
    }

    pub fn flags(&self) -> CallbackFlags {
        CallbackFlags::from_bits_retain(self.flags)
    }

    /// Overwrite the flag byte. Backends use this to emulate the SDK, which
    /// maintains [`CallbackFlags::REGISTERED`] itself.
    pub fn set_flags(&mut self, flags: CallbackFlags) {
        self.flags = flags.bits();
    }

    /// Invoke the payload-only `Run` slot.
    ///
    /// # Safety
    ///
    /// `this` must point to a live, registered adapter. The callee may free
    /// the object, so `this` must not be used after the call returns.
    pub unsafe fn run(this: *mut CallbackBase, payload: *mut c_void) {
        unsafe {
            let run = (*this).vtable.run;
            run(this, payload)
        }
    }

    /// Invoke the status-bearing `Run` slot.
    ///
    /// # Safety
    ///
    /// Same contract as [`CallbackBase::run`].
    pub unsafe fn run_with_status(this: *mut CallbackBase, payload: *mut c_void, io_failed: bool, call: u64) {
        unsafe {
            let run_with_status = (*this).vtable.run_with_status;
            run_with_status(this, payload, io_failed, call)
        }
    }

    /// Invoke `GetCallbackSizeBytes`.
    ///
    /// # Safety
    ///
    /// `this` must point to a live adapter.
    pub unsafe fn size_bytes(this: *mut CallbackBase) -> i32 {
        unsafe {
            let size_bytes = (*this).vtable.size_bytes;
            size_bytes(this)
        }
    }
}
