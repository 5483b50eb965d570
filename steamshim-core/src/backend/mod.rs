//! The seam between the adapters and the SDK.

use std::ffi::c_void;
use std::net::Ipv4Addr;

use crate::error::Result;
use crate::subsystem::Subsystem;
use crate::vtable::CallbackBase;

pub mod loopback;
#[cfg(feature = "steam-sdk")]
mod steam;

pub use loopback::{Loopback, Stream};
#[cfg(feature = "steam-sdk")]
pub use steam::SteamApi;

/// What the bridge needs from the SDK.
///
/// The registration methods take raw pointers the backend keeps until the
/// matching unregister call. Unregistration must take effect synchronously:
/// once it returns, the backend never dispatches to that pointer again.
pub trait SdkBackend: Send + Sync {
    /// `SteamAPI_RegisterCallback`.
    ///
    /// # Safety
    ///
    /// `base` must stay valid until [`SdkBackend::unregister_callback`].
    unsafe fn register_callback(&self, base: *mut CallbackBase, callback_id: i32);

    /// `SteamAPI_UnregisterCallback`.
    ///
    /// # Safety
    ///
    /// `base` must have been registered with this backend.
    unsafe fn unregister_callback(&self, base: *mut CallbackBase);

    /// `SteamAPI_RegisterCallResult`.
    ///
    /// # Safety
    ///
    /// `base` must stay valid until [`SdkBackend::unregister_call_result`].
    unsafe fn register_call_result(&self, base: *mut CallbackBase, call: u64);

    /// `SteamAPI_UnregisterCallResult`.
    ///
    /// # Safety
    ///
    /// `base` must have been registered with this backend for `call`.
    unsafe fn unregister_call_result(&self, base: *mut CallbackBase, call: u64);

    /// Initialize the client API.
    fn init(&self) -> Result<()>;

    /// Initialize the game-server API.
    fn init_game_server(&self, init: &ServerInit) -> Result<()>;

    /// Pump pending client callbacks on the calling thread.
    fn run_callbacks(&self);

    /// Pump pending game-server callbacks on the calling thread.
    fn run_game_server_callbacks(&self);

    /// Tear the SDK down. Registered objects are not touched.
    fn shutdown(&self);

    /// Raw pointer to an SDK singleton, or null if unavailable.
    fn subsystem(&self, subsystem: Subsystem) -> *mut c_void;

    /// Downcast hook for the in-process backend.
    fn as_loopback(&self) -> Option<&Loopback> {
        None
    }
}

/// Authentication mode for a game server (`EServerMode`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Don't authenticate user logins; the server is not listed.
    NoAuthentication = 1,
    /// Authenticate users; listed, no VAC.
    Authentication = 2,
    /// Authenticate users and run VAC.
    AuthenticationAndSecure = 3,
}

impl TryFrom<i32> for ServerMode {
    type Error = i32;

    fn try_from(raw: i32) -> std::result::Result<Self, i32> {
        match raw {
            1 => Ok(Self::NoAuthentication),
            2 => Ok(Self::Authentication),
            3 => Ok(Self::AuthenticationAndSecure),
            other => Err(other),
        }
    }
}

/// Game-server bootstrap parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    /// Bind address. The SDK does not support IPv6.
    pub ip: Ipv4Addr,
    pub steam_port: u16,
    pub game_port: u16,
    pub query_port: u16,
    pub mode: ServerMode,
    pub version: String,
}
