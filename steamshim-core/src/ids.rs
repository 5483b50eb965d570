//! Packed 64-bit identifiers and their validity rules.
//!
//! Pure value helpers, mirroring `CSteamID`, `CGameID` and `SteamAPICall_t`.

/// `k_uAPICallInvalid`.
pub const API_CALL_INVALID: u64 = 0;

/// Handle of a pending asynchronous API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiCall(pub u64);

impl ApiCall {
    pub fn is_valid(self) -> bool {
        self.0 != API_CALL_INVALID
    }
}

/// `EAccountType`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Invalid = 0,
    Individual = 1,
    Multiseat = 2,
    GameServer = 3,
    AnonGameServer = 4,
    Pending = 5,
    ContentServer = 6,
    Clan = 7,
    Chat = 8,
    ConsoleUser = 9,
    AnonUser = 10,
}

impl AccountType {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Invalid,
            1 => Self::Individual,
            2 => Self::Multiseat,
            3 => Self::GameServer,
            4 => Self::AnonGameServer,
            5 => Self::Pending,
            6 => Self::ContentServer,
            7 => Self::Clan,
            8 => Self::Chat,
            9 => Self::ConsoleUser,
            10 => Self::AnonUser,
            _ => return None,
        })
    }
}

/// `EUniverse`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Universe {
    Invalid = 0,
    Public = 1,
    Beta = 2,
    Internal = 3,
    Dev = 4,
}

impl Universe {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Invalid,
            1 => Self::Public,
            2 => Self::Beta,
            3 => Self::Internal,
            4 => Self::Dev,
            _ => return None,
        })
    }
}

/// `k_unSteamUserWebInstance`, the highest instance an individual may use.
const WEB_INSTANCE: u32 = 4;

/// A Steam account id.
///
/// Bit layout, low to high: account id (32), instance (20), account type (4),
/// universe (8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteamId(pub u64);

impl SteamId {
    pub fn from_parts(account_id: u32, instance: u32, account_type: AccountType, universe: Universe) -> Self {
        SteamId(
            u64::from(account_id)
                | (u64::from(instance & 0xF_FFFF) << 32)
                | (u64::from(account_type as u8 & 0xF) << 52)
                | (u64::from(universe as u8) << 56),
        )
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn account_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn instance(self) -> u32 {
        ((self.0 >> 32) & 0xF_FFFF) as u32
    }

    pub fn raw_account_type(self) -> u8 {
        ((self.0 >> 52) & 0xF) as u8
    }

    pub fn raw_universe(self) -> u8 {
        (self.0 >> 56) as u8
    }

    /// `None` for bit patterns outside the known range.
    pub fn account_type(self) -> Option<AccountType> {
        AccountType::from_raw(self.raw_account_type())
    }

    pub fn universe(self) -> Option<Universe> {
        Universe::from_raw(self.raw_universe())
    }

    /// Same rules as `CSteamID::IsValid`.
    pub fn is_valid(self) -> bool {
        let Some(account_type) = self.account_type() else {
            return false;
        };
        match self.universe() {
            None | Some(Universe::Invalid) => return false,
            Some(_) => {}
        }
        match account_type {
            AccountType::Invalid => false,
            AccountType::Individual => self.account_id() != 0 && self.instance() <= WEB_INSTANCE,
            AccountType::Clan => self.account_id() != 0 && self.instance() == 0,
            AccountType::GameServer => self.account_id() != 0,
            AccountType::AnonGameServer => !(self.account_id() == 0 && self.instance() == 0),
            _ => true,
        }
    }
}

/// `CGameID` type field.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameIdType {
    App = 0,
    GameMod = 1,
    Shortcut = 2,
    P2P = 3,
}

/// A game id: app id (24), type (8), mod id (32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameId(pub u64);

impl GameId {
    pub fn from_app_id(app_id: u32) -> Self {
        GameId(u64::from(app_id & 0xFF_FFFF))
    }

    pub fn app_id(self) -> u32 {
        (self.0 & 0xFF_FFFF) as u32
    }

    pub fn id_type(self) -> Option<GameIdType> {
        Some(match (self.0 >> 24) as u8 {
            0 => GameIdType::App,
            1 => GameIdType::GameMod,
            2 => GameIdType::Shortcut,
            3 => GameIdType::P2P,
            _ => return None,
        })
    }

    pub fn mod_id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Same rules as `CGameID::IsValid`.
    pub fn is_valid(self) -> bool {
        let high_bit = self.mod_id() & 0x8000_0000 != 0;
        match self.id_type() {
            Some(GameIdType::App) => self.app_id() != 0,
            Some(GameIdType::GameMod) => self.app_id() != 0 && high_bit,
            Some(GameIdType::Shortcut) | Some(GameIdType::P2P) => high_bit,
            None => false,
        }
    }
}
