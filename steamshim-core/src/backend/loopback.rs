//! In-process stand-in for the SDK's callback manager.
//!
//! Keeps a registration table, queues posted events and call completions,
//! and delivers them through the adapters' vtables when pumped, the way
//! `SteamAPI_RunCallbacks` does. Used by the test suites and by foreign
//! runtimes that want to exercise their handlers without a Steam client.

use std::collections::VecDeque;
use std::ffi::{CString, c_void};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{SdkBackend, ServerInit};
use crate::error::{Result, ShimError};
use crate::subsystem::Subsystem;
use crate::vtable::{CallbackBase, CallbackFlags};

/// Which pump an event is delivered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Client,
    GameServer,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Slot(NonNull<CallbackBase>);

// Safety: slots are only dereferenced on the pumping thread, outside the lock.
unsafe impl Send for Slot {}

enum Pending {
    Event {
        callback_id: i32,
        payload: Vec<u8>,
    },
    CallCompleted {
        call: u64,
        callback_id: i32,
        payload: Vec<u8>,
        io_failed: bool,
    },
}

#[derive(Default)]
struct Table {
    initialized: bool,
    server: Option<ServerInit>,
    callbacks: Vec<(Slot, i32)>,
    call_results: Vec<(Slot, u64)>,
    client_queue: VecDeque<Pending>,
    server_queue: VecDeque<Pending>,
}

impl Table {
    fn queue(&mut self, stream: Stream) -> &mut VecDeque<Pending> {
        match stream {
            Stream::Client => &mut self.client_queue,
            Stream::GameServer => &mut self.server_queue,
        }
    }
}

pub struct Loopback {
    table: Mutex<Table>,
    next_call: AtomicU64,
    fail_init: AtomicBool,
    fail_server_init: AtomicBool,
    tokens: Box<[u8; Subsystem::ALL.len()]>,
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Loopback {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::default()),
            next_call: AtomicU64::new(1),
            fail_init: AtomicBool::new(false),
            fail_server_init: AtomicBool::new(false),
            tokens: Box::new([0; Subsystem::ALL.len()]),
        }
    }

    /// Make subsequent `init` calls fail, as when no Steam client is running.
    pub fn set_init_failure(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent `init_game_server` calls fail.
    pub fn set_server_init_failure(&self, fail: bool) {
        self.fail_server_init.store(fail, Ordering::Relaxed);
    }

    /// Hand out a fresh API call handle. Never returns the invalid handle 0.
    pub fn issue_call(&self) -> u64 {
        self.next_call.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue an event for every callback registered for `callback_id` on
    /// `stream`. Delivered on the next pump of that stream.
    pub fn post(&self, stream: Stream, callback_id: i32, payload: &[u8]) {
        self.table.lock().queue(stream).push_back(Pending::Event {
            callback_id,
            payload: payload.to_vec(),
        });
    }

    /// Queue the completion of `call`, delivered to waiters registered for it.
    pub fn complete_call(&self, stream: Stream, call: u64, callback_id: i32, payload: &[u8], io_failed: bool) {
        self.table.lock().queue(stream).push_back(Pending::CallCompleted {
            call,
            callback_id,
            payload: payload.to_vec(),
            io_failed,
        });
    }

    pub fn registered_callbacks(&self) -> usize {
        self.table.lock().callbacks.len()
    }

    pub fn registered_call_results(&self) -> usize {
        self.table.lock().call_results.len()
    }

    pub fn pending(&self, stream: Stream) -> usize {
        self.table.lock().queue(stream).len()
    }

    pub fn server_init(&self) -> Option<ServerInit> {
        self.table.lock().server.clone()
    }

    fn pump(&self, stream: Stream) {
        // Events posted by handlers during this pump wait for the next one.
        let batch = std::mem::take(self.table.lock().queue(stream));
        for pending in batch {
            match pending {
                Pending::Event { callback_id, payload } => self.deliver_event(stream, callback_id, &payload),
                Pending::CallCompleted {
                    call,
                    callback_id,
                    payload,
                    io_failed,
                } => self.deliver_call(call, callback_id, &payload, io_failed),
            }
        }
    }

    fn deliver_event(&self, stream: Stream, callback_id: i32, payload: &[u8]) {
        let want_server = stream == Stream::GameServer;
        let targets: Vec<Slot> = {
            let table = self.table.lock();
            table
                .callbacks
                .iter()
                .filter(|(slot, id)| {
                    let flags = unsafe { slot.0.as_ref().flags() };
                    *id == callback_id && flags.contains(CallbackFlags::GAME_SERVER) == want_server
                })
                .map(|(slot, _)| *slot)
                .collect()
        };
        for slot in targets {
            // An earlier handler may have destroyed this one.
            if !self.table.lock().callbacks.iter().any(|(s, _)| *s == slot) {
                continue;
            }
            let mut buffer = unsafe { PayloadBuffer::sized_for(slot.0.as_ptr(), payload) };
            unsafe { CallbackBase::run(slot.0.as_ptr(), buffer.as_mut_ptr()) };
        }
    }

    fn deliver_call(&self, call: u64, callback_id: i32, payload: &[u8], io_failed: bool) {
        let targets: Vec<Slot> = {
            let table = self.table.lock();
            table
                .call_results
                .iter()
                .filter(|(_, c)| *c == call)
                .map(|(slot, _)| *slot)
                .collect()
        };
        if targets.is_empty() {
            tracing::trace!(call, "call completed with no waiter");
        }
        for slot in targets {
            if !self.table.lock().call_results.iter().any(|(s, c)| *s == slot && *c == call) {
                continue;
            }
            let expected = unsafe { slot.0.as_ref().callback_id() };
            if expected != callback_id {
                tracing::warn!(call, expected, callback_id, "call result kind mismatch, not delivered");
                continue;
            }
            let mut buffer = unsafe { PayloadBuffer::sized_for(slot.0.as_ptr(), payload) };
            unsafe { CallbackBase::run_with_status(slot.0.as_ptr(), buffer.as_mut_ptr(), io_failed, call) };
        }
    }
}

/// Payload copy sized by the callback's own `GetCallbackSizeBytes`, aligned
/// for any plain struct.
struct PayloadBuffer(Vec<u64>);

impl PayloadBuffer {
    unsafe fn sized_for(base: *mut CallbackBase, payload: &[u8]) -> Self {
        let declared = unsafe { CallbackBase::size_bytes(base) }.max(0) as usize;
        if declared != payload.len() {
            tracing::warn!(declared, actual = payload.len(), "payload size differs from declared size");
        }
        let mut words = vec![0u64; declared.div_ceil(8).max(1)];
        let len = declared.min(payload.len());
        unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), words.as_mut_ptr().cast::<u8>(), len) };
        Self(words)
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

impl SdkBackend for Loopback {
    unsafe fn register_callback(&self, base: *mut CallbackBase, callback_id: i32) {
        let Some(ptr) = NonNull::new(base) else { return };
        unsafe {
            let flags = (*base).flags() | CallbackFlags::REGISTERED;
            (*base).set_flags(flags);
        }
        self.table.lock().callbacks.push((Slot(ptr), callback_id));
    }

    unsafe fn unregister_callback(&self, base: *mut CallbackBase) {
        let Some(ptr) = NonNull::new(base) else { return };
        self.table.lock().callbacks.retain(|(slot, _)| *slot != Slot(ptr));
        unsafe {
            let flags = (*base).flags() - CallbackFlags::REGISTERED;
            (*base).set_flags(flags);
        }
    }

    unsafe fn register_call_result(&self, base: *mut CallbackBase, call: u64) {
        let Some(ptr) = NonNull::new(base) else { return };
        self.table.lock().call_results.push((Slot(ptr), call));
    }

    unsafe fn unregister_call_result(&self, base: *mut CallbackBase, call: u64) {
        let Some(ptr) = NonNull::new(base) else { return };
        self.table
            .lock()
            .call_results
            .retain(|(slot, c)| !(*slot == Slot(ptr) && *c == call));
    }

    fn init(&self) -> Result<()> {
        if self.fail_init.load(Ordering::Relaxed) {
            return Err(ShimError::InitFailed);
        }
        self.table.lock().initialized = true;
        Ok(())
    }

    fn init_game_server(&self, init: &ServerInit) -> Result<()> {
        CString::new(init.version.as_str())?;
        if self.fail_server_init.load(Ordering::Relaxed) {
            return Err(ShimError::ServerInitFailed);
        }
        self.table.lock().server = Some(init.clone());
        Ok(())
    }

    fn run_callbacks(&self) {
        self.pump(Stream::Client);
    }

    fn run_game_server_callbacks(&self) {
        self.pump(Stream::GameServer);
    }

    fn shutdown(&self) {
        let mut table = self.table.lock();
        table.initialized = false;
        table.server = None;
        table.client_queue.clear();
        table.server_queue.clear();
    }

    fn subsystem(&self, subsystem: Subsystem) -> *mut c_void {
        let table = self.table.lock();
        let available = if subsystem.is_game_server() {
            table.server.is_some()
        } else {
            table.initialized
        };
        if !available {
            return std::ptr::null_mut();
        }
        let index = Subsystem::ALL
            .iter()
            .position(|s| *s == subsystem)
            .unwrap_or_default();
        (&self.tokens[index] as *const u8).cast_mut().cast()
    }

    fn as_loopback(&self) -> Option<&Loopback> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn server_init() -> ServerInit {
        ServerInit {
            ip: Ipv4Addr::UNSPECIFIED,
            steam_port: 8766,
            game_port: 27015,
            query_port: 27016,
            mode: super::super::ServerMode::Authentication,
            version: "1.0.0".to_string(),
        }
    }

    #[test]
    fn subsystems_need_init() {
        let loopback = Loopback::new();
        assert!(loopback.subsystem(Subsystem::Friends).is_null());
        loopback.init().unwrap();
        let friends = loopback.subsystem(Subsystem::Friends);
        assert!(!friends.is_null());
        assert_eq!(friends, loopback.subsystem(Subsystem::Friends));
        assert_ne!(friends, loopback.subsystem(Subsystem::Utils));
        assert!(loopback.subsystem(Subsystem::GameServer).is_null());

        loopback.init_game_server(&server_init()).unwrap();
        assert!(!loopback.subsystem(Subsystem::GameServerApps).is_null());

        loopback.shutdown();
        assert!(loopback.subsystem(Subsystem::Friends).is_null());
        assert!(loopback.subsystem(Subsystem::GameServer).is_null());
    }

    #[test]
    fn init_failures_are_reported() {
        let loopback = Loopback::new();
        loopback.set_init_failure(true);
        assert!(matches!(loopback.init(), Err(ShimError::InitFailed)));
        loopback.set_server_init_failure(true);
        assert!(matches!(loopback.init_game_server(&server_init()), Err(ShimError::ServerInitFailed)));

        let mut bad = server_init();
        bad.version = "1.0\0beta".to_string();
        loopback.set_server_init_failure(false);
        assert!(matches!(loopback.init_game_server(&bad), Err(ShimError::InteriorNul(_))));
        assert!(loopback.server_init().is_none());
    }

    #[test]
    fn issued_calls_are_unique_and_valid() {
        let loopback = Loopback::new();
        let a = loopback.issue_call();
        let b = loopback.issue_call();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn pump_drains_only_its_stream() {
        let loopback = Loopback::new();
        loopback.post(Stream::Client, 1, &[1]);
        loopback.post(Stream::GameServer, 1, &[2]);
        loopback.run_callbacks();
        assert_eq!(loopback.pending(Stream::Client), 0);
        assert_eq!(loopback.pending(Stream::GameServer), 1);
        loopback.run_game_server_callbacks();
        assert_eq!(loopback.pending(Stream::GameServer), 0);
    }
}
