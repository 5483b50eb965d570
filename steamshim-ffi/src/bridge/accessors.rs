//! C ABI exports — SDK interface accessors and packed-id helpers.
//!
//! Accessors return the SDK singleton for a subsystem, or null when there is
//! no session or the owning API is not initialized.

use std::ffi::c_void;

use steamshim_core::{ApiCall, GameId, SteamId, Subsystem};

use crate::core;

fn accessor(subsystem: Subsystem) -> *mut c_void {
    match core::session() {
        Some(session) => session.bridge.subsystem(subsystem),
        None => std::ptr::null_mut(),
    }
}

// ─── Client interfaces ───────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_client() -> *mut c_void {
    accessor(Subsystem::Client)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_matchmaking() -> *mut c_void {
    accessor(Subsystem::Matchmaking)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_utils() -> *mut c_void {
    accessor(Subsystem::Utils)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_apps() -> *mut c_void {
    accessor(Subsystem::Apps)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_friends() -> *mut c_void {
    accessor(Subsystem::Friends)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_user() -> *mut c_void {
    accessor(Subsystem::User)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_networking() -> *mut c_void {
    accessor(Subsystem::Networking)
}

// ─── Game-server interfaces ──────────────────────────────────────────

/// Null until `steamshim_game_server_init` succeeds.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_game_server() -> *mut c_void {
    accessor(Subsystem::GameServer)
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_game_server_apps() -> *mut c_void {
    accessor(Subsystem::GameServerApps)
}

// ─── Id helpers ──────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_steam_id_is_valid(id: u64) -> bool {
    SteamId(id).is_valid()
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_steam_id_account_id(id: u64) -> u32 {
    SteamId(id).account_id()
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_steam_id_instance(id: u64) -> u32 {
    SteamId(id).instance()
}

/// Raw `EAccountType` nibble.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_steam_id_account_type(id: u64) -> u8 {
    SteamId(id).raw_account_type()
}

/// Raw `EUniverse` byte.
#[unsafe(no_mangle)]
pub extern "C" fn steamshim_steam_id_universe(id: u64) -> u8 {
    SteamId(id).raw_universe()
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_game_id_is_valid(id: u64) -> bool {
    GameId(id).is_valid()
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_game_id_app_id(id: u64) -> u32 {
    GameId(id).app_id()
}

#[unsafe(no_mangle)]
pub extern "C" fn steamshim_api_call_is_valid(call: u64) -> bool {
    ApiCall(call).is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::abi::{steamshim_game_server_init, steamshim_shutdown};
    use crate::test_support::{TEST_LOCK, loopback_session};
    use std::ffi::CString;
    use steamshim_core::ids::{AccountType, Universe};

    #[test]
    fn test_accessors_without_session() {
        let _guard = TEST_LOCK.lock();
        steamshim_shutdown();
        assert!(steamshim_client().is_null());
        assert!(steamshim_user().is_null());
        assert!(steamshim_game_server().is_null());
    }

    #[test]
    fn test_client_accessors_are_stable() {
        let _guard = TEST_LOCK.lock();
        let _session = loopback_session();

        let client = steamshim_client();
        assert!(!client.is_null());
        assert_eq!(client, steamshim_client());
        assert_ne!(client, steamshim_friends());
        assert!(!steamshim_matchmaking().is_null());
        assert!(!steamshim_utils().is_null());
        assert!(!steamshim_apps().is_null());
        assert!(!steamshim_networking().is_null());

        // Game server not initialized yet
        assert!(steamshim_game_server().is_null());
        assert!(steamshim_game_server_apps().is_null());
        steamshim_shutdown();
    }

    #[test]
    fn test_game_server_accessors_after_init() {
        let _guard = TEST_LOCK.lock();
        let _session = loopback_session();

        let version = CString::new("1.0").unwrap();
        assert!(unsafe { steamshim_game_server_init(0, 8766, 27015, 27016, 1, version.as_ptr()) });
        let server = steamshim_game_server();
        assert!(!server.is_null());
        assert_eq!(server, steamshim_game_server());
        assert!(!steamshim_game_server_apps().is_null());
        steamshim_shutdown();
    }

    #[test]
    fn test_steam_id_helpers() {
        let id = SteamId::from_parts(12345, 1, AccountType::Individual, Universe::Public).raw();
        assert!(steamshim_steam_id_is_valid(id));
        assert_eq!(steamshim_steam_id_account_id(id), 12345);
        assert_eq!(steamshim_steam_id_instance(id), 1);
        assert_eq!(steamshim_steam_id_account_type(id), AccountType::Individual as u8);
        assert_eq!(steamshim_steam_id_universe(id), Universe::Public as u8);
        assert!(!steamshim_steam_id_is_valid(0));
    }

    #[test]
    fn test_game_id_and_call_helpers() {
        let id = GameId::from_app_id(480).0;
        assert!(steamshim_game_id_is_valid(id));
        assert_eq!(steamshim_game_id_app_id(id), 480);
        assert!(!steamshim_game_id_is_valid(0));
        assert!(steamshim_api_call_is_valid(7));
        assert!(!steamshim_api_call_is_valid(0));
    }
}
