//! Backend driving the real `steam_api` library.

use std::ffi::{CString, c_char, c_int, c_void};

use super::{SdkBackend, ServerInit};
use crate::config::InterfaceVersions;
use crate::error::{Result, ShimError};
use crate::subsystem::Subsystem;
use crate::vtable::CallbackBase;

type HSteamPipe = i32;
type HSteamUser = i32;

#[repr(C)]
struct ISteamClient(c_void);

unsafe extern "C" {
    fn SteamAPI_Init() -> bool;
    fn SteamAPI_Shutdown();
    fn SteamAPI_RunCallbacks();
    fn SteamAPI_GetHSteamPipe() -> HSteamPipe;
    fn SteamAPI_GetHSteamUser() -> HSteamUser;

    fn SteamAPI_RegisterCallback(callback: *mut CallbackBase, callback_id: c_int);
    fn SteamAPI_UnregisterCallback(callback: *mut CallbackBase);
    fn SteamAPI_RegisterCallResult(callback: *mut CallbackBase, call: u64);
    fn SteamAPI_UnregisterCallResult(callback: *mut CallbackBase, call: u64);

    fn SteamInternal_GameServer_Init(
        ip: u32,
        steam_port: u16,
        game_port: u16,
        query_port: u16,
        server_mode: c_int,
        version: *const c_char,
    ) -> bool;
    fn SteamGameServer_Shutdown();
    fn SteamGameServer_RunCallbacks();
    fn SteamGameServer_GetHSteamPipe() -> HSteamPipe;
    fn SteamGameServer_GetHSteamUser() -> HSteamUser;

    fn SteamInternal_CreateInterface(version: *const c_char) -> *mut ISteamClient;

    fn SteamAPI_ISteamClient_GetISteamUser(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamGameServer(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamFriends(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamUtils(client: *mut ISteamClient, pipe: HSteamPipe, version: *const c_char)
    -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamMatchmaking(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamApps(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
    fn SteamAPI_ISteamClient_GetISteamNetworking(
        client: *mut ISteamClient,
        user: HSteamUser,
        pipe: HSteamPipe,
        version: *const c_char,
    ) -> *mut c_void;
}

/// Thin forwarding layer over the flat `steam_api` exports.
pub struct SteamApi {
    versions: Vec<(Subsystem, CString)>,
}

impl SteamApi {
    pub fn new(interfaces: &InterfaceVersions) -> Result<Self> {
        let mut versions = Vec::with_capacity(Subsystem::ALL.len());
        for subsystem in Subsystem::ALL {
            versions.push((subsystem, CString::new(interfaces.for_subsystem(subsystem))?));
        }
        Ok(Self { versions })
    }

    fn version(&self, subsystem: Subsystem) -> *const c_char {
        self.versions
            .iter()
            .find(|(s, _)| *s == subsystem)
            .map_or(std::ptr::null(), |(_, v)| v.as_ptr())
    }

    fn client_version(&self) -> *const c_char {
        self.version(Subsystem::Client)
    }
}

impl SdkBackend for SteamApi {
    unsafe fn register_callback(&self, base: *mut CallbackBase, callback_id: i32) {
        unsafe { SteamAPI_RegisterCallback(base, callback_id) }
    }

    unsafe fn unregister_callback(&self, base: *mut CallbackBase) {
        unsafe { SteamAPI_UnregisterCallback(base) }
    }

    unsafe fn register_call_result(&self, base: *mut CallbackBase, call: u64) {
        unsafe { SteamAPI_RegisterCallResult(base, call) }
    }

    unsafe fn unregister_call_result(&self, base: *mut CallbackBase, call: u64) {
        unsafe { SteamAPI_UnregisterCallResult(base, call) }
    }

    fn init(&self) -> Result<()> {
        if unsafe { SteamAPI_Init() } {
            Ok(())
        } else {
            Err(ShimError::InitFailed)
        }
    }

    fn init_game_server(&self, init: &ServerInit) -> Result<()> {
        let version = CString::new(init.version.as_str())?;
        let ok = unsafe {
            SteamInternal_GameServer_Init(
                init.ip.into(),
                init.steam_port,
                init.game_port,
                init.query_port,
                init.mode as c_int,
                version.as_ptr(),
            )
        };
        if ok { Ok(()) } else { Err(ShimError::ServerInitFailed) }
    }

    fn run_callbacks(&self) {
        unsafe { SteamAPI_RunCallbacks() }
    }

    fn run_game_server_callbacks(&self) {
        unsafe { SteamGameServer_RunCallbacks() }
    }

    fn shutdown(&self) {
        unsafe {
            SteamGameServer_Shutdown();
            SteamAPI_Shutdown();
        }
    }

    fn subsystem(&self, subsystem: Subsystem) -> *mut c_void {
        unsafe {
            let client = SteamInternal_CreateInterface(self.client_version());
            if client.is_null() {
                return std::ptr::null_mut();
            }
            if subsystem == Subsystem::Client {
                return client.cast();
            }
            let (user, pipe) = if subsystem.is_game_server() {
                (SteamGameServer_GetHSteamUser(), SteamGameServer_GetHSteamPipe())
            } else {
                (SteamAPI_GetHSteamUser(), SteamAPI_GetHSteamPipe())
            };
            if pipe == 0 {
                return std::ptr::null_mut();
            }
            let version = self.version(subsystem);
            match subsystem {
                Subsystem::Client => client.cast(),
                Subsystem::Matchmaking => SteamAPI_ISteamClient_GetISteamMatchmaking(client, user, pipe, version),
                Subsystem::Utils => SteamAPI_ISteamClient_GetISteamUtils(client, pipe, version),
                Subsystem::Apps | Subsystem::GameServerApps => {
                    SteamAPI_ISteamClient_GetISteamApps(client, user, pipe, version)
                }
                Subsystem::Friends => SteamAPI_ISteamClient_GetISteamFriends(client, user, pipe, version),
                Subsystem::User => SteamAPI_ISteamClient_GetISteamUser(client, user, pipe, version),
                Subsystem::GameServer => SteamAPI_ISteamClient_GetISteamGameServer(client, user, pipe, version),
                Subsystem::Networking => SteamAPI_ISteamClient_GetISteamNetworking(client, user, pipe, version),
            }
        }
    }
}
