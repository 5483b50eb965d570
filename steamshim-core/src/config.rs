//! Bridge configuration.
//!
//! The foreign runtime passes a JSON document to `steamshim_init`; every
//! field is optional:
//!
//! ```json
//! {
//!   "backend": "loopback",
//!   "log_filter": "steamshim=debug",
//!   "log_json": false,
//!   "interfaces": { "friends": "SteamFriends015" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::subsystem::Subsystem;

/// Default tracing directive when neither the config nor `RUST_LOG` set one.
pub const DEFAULT_LOG_FILTER: &str = "steamshim=info";

/// Which [`crate::SdkBackend`] to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The real `steam_api` library.
    Steam,
    /// The in-process emulation.
    Loopback,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "steam-sdk") {
            BackendKind::Steam
        } else {
            BackendKind::Loopback
        }
    }
}

/// Interface version strings passed to `ISteamClient::GetISteam*`.
///
/// These must match the headers of the SDK the library was built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceVersions {
    pub client: String,
    pub matchmaking: String,
    pub utils: String,
    pub apps: String,
    pub friends: String,
    pub user: String,
    pub game_server: String,
    pub networking: String,
}

impl Default for InterfaceVersions {
    fn default() -> Self {
        Self {
            client: "SteamClient017".to_string(),
            matchmaking: "SteamMatchMaking009".to_string(),
            utils: "SteamUtils009".to_string(),
            apps: "STEAMAPPS_INTERFACE_VERSION008".to_string(),
            friends: "SteamFriends015".to_string(),
            user: "SteamUser019".to_string(),
            game_server: "SteamGameServer012".to_string(),
            networking: "SteamNetworking005".to_string(),
        }
    }
}

impl InterfaceVersions {
    /// Version string for a subsystem. Game-server apps share the apps
    /// interface, fetched through the server pipe.
    pub fn for_subsystem(&self, subsystem: Subsystem) -> &str {
        match subsystem {
            Subsystem::Client => &self.client,
            Subsystem::Matchmaking => &self.matchmaking,
            Subsystem::Utils => &self.utils,
            Subsystem::Apps | Subsystem::GameServerApps => &self.apps,
            Subsystem::Friends => &self.friends,
            Subsystem::User => &self.user,
            Subsystem::GameServer => &self.game_server,
            Subsystem::Networking => &self.networking,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    pub backend: BackendKind,
    pub interfaces: InterfaceVersions,
    /// `EnvFilter` directive. Falls back to `RUST_LOG`, then [`DEFAULT_LOG_FILTER`].
    pub log_filter: Option<String>,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl ShimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The directive the subscriber should be built from.
    pub fn effective_log_filter(&self) -> String {
        self.log_filter
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ShimConfig::from_json("{}").unwrap();
        assert_eq!(config, ShimConfig::default());
        assert!(!config.log_json);
        assert_eq!(config.interfaces.client, "SteamClient017");
    }

    #[test]
    fn partial_interface_override() {
        let config =
            ShimConfig::from_json(r#"{"backend":"loopback","interfaces":{"friends":"SteamFriends017"}}"#).unwrap();
        assert_eq!(config.backend, BackendKind::Loopback);
        assert_eq!(config.interfaces.friends, "SteamFriends017");
        assert_eq!(config.interfaces.utils, "SteamUtils009");
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(ShimConfig::from_json(r#"{"backend":"carrier-pigeon"}"#).is_err());
        assert!(ShimConfig::from_json("not json").is_err());
    }

    #[test]
    fn explicit_filter_wins() {
        let config = ShimConfig {
            log_filter: Some("steamshim=trace".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_log_filter(), "steamshim=trace");
    }

    #[test]
    fn server_apps_share_the_apps_version() {
        let versions = InterfaceVersions::default();
        assert_eq!(
            versions.for_subsystem(Subsystem::GameServerApps),
            versions.for_subsystem(Subsystem::Apps)
        );
    }
}
