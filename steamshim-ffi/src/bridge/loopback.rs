//! C ABI exports — driving the loopback backend from a foreign test harness.
//!
//! Each function returns `Unsupported` (or 0) when the active session runs
//! against the real SDK.

use std::sync::Arc;

use steamshim_core::backend::Stream;

use crate::core::{self, Session};
use crate::error::FfiResult;

fn stream(game_server: bool) -> Stream {
    if game_server { Stream::GameServer } else { Stream::Client }
}

unsafe fn payload<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        return Some(&[]);
    }
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(ptr, len) })
}

fn loopback_session() -> Result<Arc<Session>, FfiResult> {
    let session = core::session().ok_or(FfiResult::NotInitialized)?;
    if session.bridge.loopback().is_none() {
        return Err(FfiResult::Unsupported);
    }
    Ok(session)
}

/// Queue an event for every callback registered for `event_id`, delivered on
/// the next `steamshim_run_callbacks` (or `steamshim_game_server_run_callbacks`
/// when `game_server` is true).
///
/// # Safety
///
/// `payload` must point to `len` readable bytes, or be null when `len` is 0.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_loopback_post(
    event_id: i32,
    game_server: bool,
    payload_ptr: *const u8,
    len: usize,
) -> i32 {
    let session = match loopback_session() {
        Ok(session) => session,
        Err(code) => return code as i32,
    };
    let Some(bytes) = (unsafe { payload(payload_ptr, len) }) else {
        return FfiResult::InvalidArgument as i32;
    };
    if let Some(loopback) = session.bridge.loopback() {
        loopback.post(stream(game_server), event_id, bytes);
    }
    FfiResult::Ok as i32
}

/// Hand out a fresh API call handle, or 0 when not on the loopback backend.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_loopback_issue_call() -> u64 {
    match loopback_session() {
        Ok(session) => session.bridge.loopback().map_or(0, |l| l.issue_call()),
        Err(_) => 0,
    }
}

/// Queue the completion of `call` with result struct `event_id`.
///
/// # Safety
///
/// `payload` must point to `len` readable bytes, or be null when `len` is 0.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn steamshim_loopback_complete_call(
    call: u64,
    event_id: i32,
    payload_ptr: *const u8,
    len: usize,
    io_failed: bool,
    game_server: bool,
) -> i32 {
    let session = match loopback_session() {
        Ok(session) => session,
        Err(code) => return code as i32,
    };
    if call == 0 {
        return FfiResult::InvalidArgument as i32;
    }
    let Some(bytes) = (unsafe { payload(payload_ptr, len) }) else {
        return FfiResult::InvalidArgument as i32;
    };
    if let Some(loopback) = session.bridge.loopback() {
        loopback.complete_call(stream(game_server), call, event_id, bytes, io_failed);
    }
    FfiResult::Ok as i32
}
