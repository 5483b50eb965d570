//! SDK singleton interfaces exposed to the foreign runtime.

/// One of the SDK's singleton interfaces.
///
/// The pointers are owned by the SDK and stay valid until it shuts down; the
/// bridge never frees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Client,
    Matchmaking,
    Utils,
    Apps,
    Friends,
    User,
    GameServer,
    GameServerApps,
    Networking,
}

impl Subsystem {
    pub const ALL: [Subsystem; 9] = [
        Subsystem::Client,
        Subsystem::Matchmaking,
        Subsystem::Utils,
        Subsystem::Apps,
        Subsystem::Friends,
        Subsystem::User,
        Subsystem::GameServer,
        Subsystem::GameServerApps,
        Subsystem::Networking,
    ];

    /// Whether the interface hangs off the game-server pipe rather than the
    /// client one.
    pub fn is_game_server(self) -> bool {
        matches!(self, Subsystem::GameServer | Subsystem::GameServerApps)
    }
}
