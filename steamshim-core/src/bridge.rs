//! Rust-side registration facade.

use std::ffi::c_void;
use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::{Loopback, SdkBackend, ServerInit};
use crate::call_result::{self, CallResultHandle, RetireHook};
use crate::closure::{self, CallbackPayload};
use crate::config::{BackendKind, ShimConfig};
use crate::error::Result;
use crate::ids::ApiCall;
use crate::persistent::PersistentCallback;
use crate::record::CallbackRecord;
use crate::subsystem::Subsystem;
use crate::vtable::CallbackFlags;

/// Entry point for creating registrations against one SDK backend.
pub struct Bridge {
    backend: Arc<dyn SdkBackend>,
    subsystems: DashMap<Subsystem, usize>,
}

impl Bridge {
    pub fn new(backend: Arc<dyn SdkBackend>) -> Self {
        Self {
            backend,
            subsystems: DashMap::new(),
        }
    }

    /// Build the backend the configuration asks for.
    pub fn from_config(config: &ShimConfig) -> Result<Self> {
        let backend: Arc<dyn SdkBackend> = match config.backend {
            BackendKind::Loopback => Arc::new(Loopback::new()),
            #[cfg(feature = "steam-sdk")]
            BackendKind::Steam => Arc::new(crate::backend::SteamApi::new(&config.interfaces)?),
            #[cfg(not(feature = "steam-sdk"))]
            BackendKind::Steam => return Err(crate::error::ShimError::BackendUnavailable("steam")),
        };
        Ok(Self::new(backend))
    }

    pub fn backend(&self) -> &Arc<dyn SdkBackend> {
        &self.backend
    }

    /// The in-process backend, if that is what this bridge drives.
    pub fn loopback(&self) -> Option<&Loopback> {
        self.backend.as_loopback()
    }

    pub fn init(&self) -> Result<()> {
        self.backend.init()?;
        tracing::info!("SDK initialized");
        Ok(())
    }

    pub fn init_game_server(&self, init: &ServerInit) -> Result<()> {
        self.backend.init_game_server(init)?;
        tracing::info!(
            ip = %init.ip,
            game_port = init.game_port,
            query_port = init.query_port,
            mode = ?init.mode,
            "game server initialized"
        );
        Ok(())
    }

    pub fn run_callbacks(&self) {
        self.backend.run_callbacks();
    }

    pub fn run_game_server_callbacks(&self) {
        self.backend.run_game_server_callbacks();
    }

    /// Forget cached singletons and shut the SDK down. Registrations still
    /// alive must be dropped or cancelled by their owners first.
    pub fn shutdown(&self) {
        self.subsystems.clear();
        self.backend.shutdown();
        tracing::info!("SDK shut down");
    }

    /// Register a raw record for every event with `event_id`.
    pub fn register_callback(
        &self,
        flags: CallbackFlags,
        event_id: i32,
        record: CallbackRecord,
    ) -> Result<PersistentCallback> {
        PersistentCallback::create(self.backend.clone(), flags, event_id, record)
    }

    /// Register a raw record waiting for `call`.
    pub fn register_call_result(
        &self,
        record: CallbackRecord,
        call: u64,
        event_id: i32,
        on_retire: Option<RetireHook>,
    ) -> Result<CallResultHandle> {
        call_result::create(self.backend.clone(), record, call, event_id, on_retire)
    }

    /// Call `f` with every `P` delivered on the client stream.
    pub fn subscribe<P, F>(&self, f: F) -> Result<PersistentCallback>
    where
        P: CallbackPayload,
        F: FnMut(&P) + Send + 'static,
    {
        self.register_callback(CallbackFlags::empty(), P::ID, closure::persistent_record::<P, F>(f))
    }

    /// Call `f` with every `P` delivered on the game-server stream.
    pub fn subscribe_server<P, F>(&self, f: F) -> Result<PersistentCallback>
    where
        P: CallbackPayload,
        F: FnMut(&P) + Send + 'static,
    {
        self.register_callback(CallbackFlags::GAME_SERVER, P::ID, closure::persistent_record::<P, F>(f))
    }

    /// Call `f` once when `call` completes with a `P`.
    pub fn await_call<P, F>(&self, call: ApiCall, f: F) -> Result<CallResultHandle>
    where
        P: CallbackPayload,
        F: FnOnce(&P, bool) + Send + 'static,
    {
        self.register_call_result(closure::call_result_record::<P, F>(f), call.0, P::ID, None)
    }

    /// SDK singleton pointer, null until the owning API is initialized.
    /// Once non-null the same pointer is returned until shutdown.
    pub fn subsystem(&self, subsystem: Subsystem) -> *mut c_void {
        if let Some(ptr) = self.subsystems.get(&subsystem) {
            return *ptr as *mut c_void;
        }
        let ptr = self.backend.subsystem(subsystem);
        if ptr.is_null() {
            tracing::debug!(?subsystem, "subsystem not available");
            return ptr;
        }
        *self.subsystems.entry(subsystem).or_insert(ptr as usize) as *mut c_void
    }
}
