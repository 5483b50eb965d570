//! Drive the bridge through its C entry points, the way a foreign runtime does.

use std::ffi::{CString, c_void};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use steamshim::bridge::abi::*;
use steamshim::bridge::loopback::*;

static LOCK: Mutex<()> = Mutex::new(());

/// Per-test record of what the handlers saw. Passed as `context`.
#[derive(Default)]
struct Probe {
    payloads: Vec<Vec<u8>>,
    completions: Vec<(bool, u64)>,
    releases: usize,
    /// Handle the handler destroys from inside its own dispatch.
    self_handle: AtomicU64,
}

unsafe extern "C" fn on_event(_this: *mut c_void, context: *mut c_void, payload: *mut c_void) {
    let probe = unsafe { &mut *(context as *mut Probe) };
    let bytes = unsafe { std::slice::from_raw_parts(payload as *const u8, 4) };
    probe.payloads.push(bytes.to_vec());
}

unsafe extern "C" fn on_event_then_destroy(this: *mut c_void, context: *mut c_void, payload: *mut c_void) {
    unsafe { on_event(this, context, payload) };
    let probe = unsafe { &*(context as *const Probe) };
    steamshim_unregister_callback(probe.self_handle.load(Ordering::SeqCst));
}

unsafe extern "C" fn on_complete(_this: *mut c_void, context: *mut c_void, payload: *mut c_void, io_failed: bool, call: u64) {
    let probe = unsafe { &mut *(context as *mut Probe) };
    let bytes = unsafe { std::slice::from_raw_parts(payload as *const u8, 4) };
    probe.payloads.push(bytes.to_vec());
    probe.completions.push((io_failed, call));
}

unsafe extern "C" fn on_release(_this: *mut c_void, context: *mut c_void) {
    let probe = unsafe { &mut *(context as *mut Probe) };
    probe.releases += 1;
}

fn start() {
    steamshim_shutdown();
    let config = CString::new(r#"{"backend":"loopback"}"#).unwrap();
    assert!(unsafe { steamshim_init(config.as_ptr()) });
}

fn ctx(probe: &mut Probe) -> *mut c_void {
    probe as *mut Probe as *mut c_void
}

#[test]
fn persistent_callback_sees_every_event_in_order() {
    let _guard = LOCK.lock();
    start();
    let mut probe = Probe::default();

    let handle = unsafe { steamshim_register_callback(4, ctx(&mut probe), Some(on_event), Some(on_release), 304, 0) };
    assert_ne!(handle, 0);

    unsafe {
        assert_eq!(steamshim_loopback_post(304, false, [1u8, 0, 0, 0].as_ptr(), 4), 0);
        assert_eq!(steamshim_loopback_post(999, false, [9u8, 9, 9, 9].as_ptr(), 4), 0);
        assert_eq!(steamshim_loopback_post(304, false, [2u8, 0, 0, 0].as_ptr(), 4), 0);
    }
    steamshim_run_callbacks();
    assert_eq!(probe.payloads, vec![vec![1, 0, 0, 0], vec![2, 0, 0, 0]]);

    assert_eq!(steamshim_unregister_callback(handle), 0);
    assert_eq!(probe.releases, 1);

    unsafe { steamshim_loopback_post(304, false, [3u8, 0, 0, 0].as_ptr(), 4) };
    steamshim_run_callbacks();
    assert_eq!(probe.payloads.len(), 2);
    steamshim_shutdown();
    assert_eq!(probe.releases, 1);
}

#[test]
fn game_server_callbacks_use_their_own_pump() {
    let _guard = LOCK.lock();
    start();
    let mut client = Probe::default();
    let mut server = Probe::default();

    unsafe {
        assert_ne!(steamshim_register_callback(4, ctx(&mut client), Some(on_event), Some(on_release), 101, 0), 0);
        assert_ne!(steamshim_register_callback(4, ctx(&mut server), Some(on_event), Some(on_release), 101, 0x02), 0);
        steamshim_loopback_post(101, true, [5u8, 5, 5, 5].as_ptr(), 4);
    }

    steamshim_run_callbacks();
    assert!(server.payloads.is_empty());
    steamshim_game_server_run_callbacks();
    assert_eq!(server.payloads, vec![vec![5, 5, 5, 5]]);
    assert!(client.payloads.is_empty());

    steamshim_shutdown();
    assert_eq!(client.releases, 1);
    assert_eq!(server.releases, 1);
}

#[test]
fn handler_can_destroy_its_own_callback() {
    let _guard = LOCK.lock();
    start();
    let mut probe = Probe::default();

    let handle = unsafe {
        steamshim_register_callback(4, ctx(&mut probe), Some(on_event_then_destroy), Some(on_release), 42, 0)
    };
    assert_ne!(handle, 0);
    probe.self_handle.store(handle, Ordering::SeqCst);

    unsafe {
        steamshim_loopback_post(42, false, [1u8, 1, 1, 1].as_ptr(), 4);
        steamshim_loopback_post(42, false, [2u8, 2, 2, 2].as_ptr(), 4);
    }
    steamshim_run_callbacks();

    assert_eq!(probe.payloads, vec![vec![1, 1, 1, 1]]);
    assert_eq!(probe.releases, 1);
    assert_eq!(steamshim_unregister_callback(handle), 1);
    steamshim_shutdown();
    assert_eq!(probe.releases, 1);
}

#[test]
fn call_results_fire_once_for_their_own_call() {
    let _guard = LOCK.lock();
    start();
    let mut first = Probe::default();
    let mut second = Probe::default();

    let h1 = steamshim_loopback_issue_call();
    let h2 = steamshim_loopback_issue_call();
    unsafe {
        assert_ne!(steamshim_register_call_result(4, ctx(&mut first), Some(on_complete), Some(on_release), h1, 513), 0);
        assert_ne!(steamshim_register_call_result(4, ctx(&mut second), Some(on_complete), Some(on_release), h2, 513), 0);
        steamshim_loopback_complete_call(h2, 513, [2u8, 0, 0, 0].as_ptr(), 4, true, false);
    }
    steamshim_run_callbacks();

    assert!(first.completions.is_empty());
    assert_eq!(second.completions, vec![(true, h2)]);
    assert_eq!(second.releases, 1);

    unsafe {
        steamshim_loopback_complete_call(h1, 513, [1u8, 0, 0, 0].as_ptr(), 4, false, false);
        steamshim_loopback_complete_call(h1, 513, [1u8, 0, 0, 0].as_ptr(), 4, false, false);
    }
    steamshim_run_callbacks();
    assert_eq!(first.completions, vec![(false, h1)]);
    assert_eq!(first.payloads, vec![vec![1, 0, 0, 0]]);
    assert_eq!(first.releases, 1);

    steamshim_shutdown();
    assert_eq!(first.releases, 1);
    assert_eq!(second.releases, 1);
}

#[test]
fn cancelled_waiter_never_fires() {
    let _guard = LOCK.lock();
    start();
    let mut probe = Probe::default();

    let call = steamshim_loopback_issue_call();
    let handle =
        unsafe { steamshim_register_call_result(4, ctx(&mut probe), Some(on_complete), Some(on_release), call, 7) };
    assert_eq!(steamshim_unregister_call_result(handle), 0);
    assert_eq!(probe.releases, 1);

    unsafe { steamshim_loopback_complete_call(call, 7, [0u8; 4].as_ptr(), 4, false, false) };
    steamshim_run_callbacks();
    assert!(probe.completions.is_empty());
    steamshim_shutdown();
    assert_eq!(probe.releases, 1);
}

#[test]
fn shutdown_releases_pending_waiters() {
    let _guard = LOCK.lock();
    start();
    let mut probe = Probe::default();

    let call = steamshim_loopback_issue_call();
    unsafe {
        assert_ne!(steamshim_register_call_result(4, ctx(&mut probe), Some(on_complete), Some(on_release), call, 7), 0);
    }
    steamshim_shutdown();
    assert_eq!(probe.releases, 1);
    assert!(probe.completions.is_empty());
}
