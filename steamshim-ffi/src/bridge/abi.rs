//! C ABI exports — session lifecycle and callback registration.
//!
//! All functions are `extern "C"` and `#[no_mangle]`.
//! Registrations are opaque `u64` handles into the session's tables; `0`
//! means failure and the cause is logged via tracing.

use std::ffi::{CString, c_char, c_void};
use std::net::Ipv4Addr;
use std::sync::Arc;

use steamshim_core::record::{DispatchFn, DispatchWithStatusFn, ReleaseFn};
use steamshim_core::{ApiCall, Bridge, CallbackFlags, CallbackRecord, ServerInit, ServerMode, ShimConfig, ShimError};

use crate::bridge::read_c_str;
use crate::core::{self, Session};
use crate::error::FfiResult;

unsafe fn parse_config(config_json: *const c_char) -> Result<ShimConfig, FfiResult> {
    if config_json.is_null() {
        return Ok(ShimConfig::default());
    }
    let Some(json) = (unsafe { read_c_str(config_json) }) else {
        crate::init_logging(&ShimConfig::default());
        tracing::error!("steamshim: config_json is not valid UTF-8");
        return Err(FfiResult::InvalidArgument);
    };
    ShimConfig::from_json(&json).map_err(|e| {
        crate::init_logging(&ShimConfig::default());
        tracing::error!("steamshim: invalid config: {e}");
        FfiResult::InvalidArgument
    })
}

fn open_session(config: ShimConfig) -> Result<Arc<Session>, FfiResult> {
    crate::init_logging(&config);
    let mut failure = FfiResult::Internal;
    let session = core::get_or_create(|| match Bridge::from_config(&config) {
        Ok(bridge) => {
            tracing::info!(backend = ?config.backend, "session created");
            Some(Session::new(bridge, config))
        }
        Err(e) => {
            tracing::error!("steamshim: cannot create bridge: {e}");
            failure = match e {
                ShimError::BackendUnavailable(_) => FfiResult::Unsupported,
                _ => FfiResult::InvalidArgument,
            };
            None
        }
    });
    session.ok_or(failure)
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Create the session without initializing the SDK.
///
/// Dedicated servers that never call `steamshim_init` use this to pick a
/// configuration before `steamshim_game_server_init`. If a session already
/// exists it is kept and `config_json` is ignored.
///
/// # Safety
///
/// `config_json` must be a valid, NUL-terminated UTF-8 C string, or null for defaults.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_configure(config_json: *const c_char) -> i32 {
    let config = match unsafe { parse_config(config_json) } {
        Ok(config) => config,
        Err(code) => return code as i32,
    };
    match open_session(config) {
        Ok(_) => FfiResult::Ok as i32,
        Err(code) => code as i32,
    }
}

/// Create the session (if needed) and initialize the client API.
///
/// Returns false if the configuration is invalid or the SDK refuses to
/// initialize (no Steam client running, unknown app id, ...).
///
/// # Safety
///
/// `config_json` must be a valid, NUL-terminated UTF-8 C string, or null for defaults.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_init(config_json: *const c_char) -> bool {
    let config = match unsafe { parse_config(config_json) } {
        Ok(config) => config,
        Err(_) => return false,
    };
    let Ok(session) = open_session(config) else {
        return false;
    };
    match session.bridge.init() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("steamshim_init: {e}");
            false
        }
    }
}

/// Initialize the game-server API.
///
/// `ip` is the IPv4 bind address in host byte order (0 for any).
/// `server_mode`: 1 = no authentication, 2 = authentication, 3 = authentication + VAC.
///
/// # Safety
///
/// `version` must be a valid, NUL-terminated UTF-8 C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_game_server_init(
    ip: u32,
    steam_port: u16,
    game_port: u16,
    query_port: u16,
    server_mode: i32,
    version: *const c_char,
) -> bool {
    let Ok(mode) = ServerMode::try_from(server_mode) else {
        tracing::error!("steamshim_game_server_init: unknown server mode {server_mode}");
        return false;
    };
    let Some(version) = (unsafe { read_c_str(version) }) else {
        tracing::error!("steamshim_game_server_init: null or invalid version string");
        return false;
    };
    let Ok(session) = open_session(ShimConfig::default()) else {
        return false;
    };
    let init = ServerInit {
        ip: Ipv4Addr::from(ip),
        steam_port,
        game_port,
        query_port,
        mode,
        version,
    };
    match session.bridge.init_game_server(&init) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("steamshim_game_server_init: {e}");
            false
        }
    }
}

/// Dispatch pending client callbacks on the calling thread.
///
/// Handlers run synchronously inside this call and may call back into any
/// `steamshim_*` function, including unregistering themselves.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_run_callbacks() {
    if let Some(session) = core::session() {
        session.bridge.run_callbacks();
    }
}

/// Dispatch pending game-server callbacks on the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_game_server_run_callbacks() {
    if let Some(session) = core::session() {
        session.bridge.run_game_server_callbacks();
    }
}

/// Release every outstanding registration (each `release` runs exactly once)
/// and shut the SDK down. Handles issued before this call become invalid.
///
/// Safe to call multiple times — second call is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_shutdown() {
    if let Some(session) = core::take() {
        session.teardown();
    }
}

// ─── Persistent callbacks ────────────────────────────────────────────

/// Register a callback for every event with `event_id`.
///
/// `flags` bit `0x02` subscribes to the game-server stream. `payload_size`
/// must equal the size of the SDK's payload struct for `event_id`; it is
/// reported to the SDK verbatim and not checked.
///
/// Returns a non-zero handle, or 0 on failure. On failure `release` is not
/// called and the caller keeps ownership of `context`.
///
/// # Safety
///
/// `dispatch` and `release` must be valid function pointers. `context` must
/// remain valid until `release` is called with it.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_register_callback(
    payload_size: i32,
    context: *mut c_void,
    dispatch: Option<DispatchFn>,
    release: Option<ReleaseFn>,
    event_id: i32,
    flags: u8,
) -> u64 {
    let Some(session) = core::session() else {
        tracing::error!("steamshim_register_callback: no session");
        return 0;
    };
    let record = CallbackRecord {
        payload_size,
        context,
        dispatch,
        dispatch_with_status: None,
        release,
    };
    let flags = CallbackFlags::from_bits_truncate(flags);
    match session.bridge.register_callback(flags, event_id, record) {
        Ok(callback) => {
            let handle = core::next_handle();
            session.callbacks.insert(handle, callback);
            tracing::debug!("steamshim_register_callback: event {event_id} -> handle {handle}");
            handle
        }
        Err(e) => {
            tracing::error!("steamshim_register_callback: {e}");
            0
        }
    }
}

/// Unregister a callback and release its context.
///
/// Returns `InvalidHandle` for unknown or already destroyed handles, so a
/// second call is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_unregister_callback(handle: u64) -> i32 {
    let Some(session) = core::session() else {
        return FfiResult::NotInitialized as i32;
    };
    match session.callbacks.remove(&handle) {
        Some((_, callback)) => {
            let event_id = callback.event_id();
            drop(callback);
            tracing::debug!("steamshim_unregister_callback: destroyed handle {handle} (event {event_id})");
            FfiResult::Ok as i32
        }
        None => FfiResult::InvalidHandle as i32,
    }
}

// ─── Call results ────────────────────────────────────────────────────

/// Wait for the completion of API call `call`, whose result struct has
/// callback id `event_id`.
///
/// The waiter fires at most once, then unregisters itself and calls
/// `release`; the returned handle may be discarded. Returns 0 on failure.
///
/// # Safety
///
/// Same contract as [`steamshim_register_callback`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_register_call_result(
    payload_size: i32,
    context: *mut c_void,
    dispatch_with_status: Option<DispatchWithStatusFn>,
    release: Option<ReleaseFn>,
    call: u64,
    event_id: i32,
) -> u64 {
    let Some(session) = core::session() else {
        tracing::error!("steamshim_register_call_result: no session");
        return 0;
    };
    if !ApiCall(call).is_valid() {
        tracing::error!("steamshim_register_call_result: invalid call handle");
        return 0;
    }
    let record = CallbackRecord {
        payload_size,
        context,
        dispatch: None,
        dispatch_with_status,
        release,
    };
    let handle = core::next_handle();
    let table = session.call_results.clone();
    let on_retire = Box::new(move || {
        table.remove(&handle);
    });
    match session.bridge.register_call_result(record, call, event_id, Some(on_retire)) {
        Ok(waiter) => {
            session.track_call_result(handle, waiter);
            tracing::debug!("steamshim_register_call_result: call {call} -> handle {handle}");
            handle
        }
        Err(e) => {
            tracing::error!("steamshim_register_call_result: {e}");
            0
        }
    }
}

/// Cancel a waiter before its call completes and release its context.
///
/// Returns `InvalidHandle` if the waiter already fired or was cancelled.
/// Must be called on the thread that pumps callbacks.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_unregister_call_result(handle: u64) -> i32 {
    let Some(session) = core::session() else {
        return FfiResult::NotInitialized as i32;
    };
    let Some((_, waiter)) = session.call_results.remove(&handle) else {
        return FfiResult::InvalidHandle as i32;
    };
    if unsafe { waiter.cancel() } {
        tracing::debug!("steamshim_unregister_call_result: cancelled handle {handle}");
        FfiResult::Ok as i32
    } else {
        FfiResult::InvalidHandle as i32
    }
}

// ─── Diagnostics ─────────────────────────────────────────────────────

/// Get a JSON snapshot of the session state.
///
/// Returns a heap-allocated C string that must be freed with
/// `steamshim_free_string`, or null when there is no session.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_snapshot_json() -> *mut c_char {
    let Some(session) = core::session() else {
        return std::ptr::null_mut();
    };
    let loopback = session.bridge.loopback().map(|l| {
        serde_json::json!({
            "registered_callbacks": l.registered_callbacks(),
            "registered_call_results": l.registered_call_results(),
        })
    });
    let snapshot = serde_json::json!({
        "backend": session.config.backend,
        "callbacks": session.callbacks.len(),
        "call_results": session.call_results.len(),
        "loopback": loopback,
    });
    match CString::new(snapshot.to_string()) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by a `steamshim_*` function.
///
/// # Safety
///
/// `ptr` must have been returned by a `steamshim_*` function, or be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
