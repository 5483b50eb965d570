//! Callback bridging for the Steamworks SDK.
//!
//! The SDK only knows how to dispatch events to C++ objects derived from
//! `CCallbackBase`, which it never owns but holds raw pointers to while they
//! are registered. This crate builds layout-compatible objects around a
//! [`CallbackRecord`] (function pointers + opaque context supplied by a
//! foreign runtime) and manages their registration and teardown:
//!
//! - [`PersistentCallback`] receives every event of one kind until its owner
//!   drops it.
//! - [`call_result`] waiters fire once for one API call handle and then free
//!   themselves.
//!
//! The SDK itself sits behind the [`SdkBackend`] trait. [`backend::SteamApi`]
//! talks to the real library (feature `steam-sdk`); [`backend::Loopback`]
//! emulates its registration table and pump in-process.
//!
//! ## Threading
//!
//! Nothing here spawns threads or blocks. All dispatch happens synchronously
//! inside the SDK's `run_callbacks` step, on whichever single thread drives it.

pub mod backend;
pub mod bridge;
pub mod call_result;
pub mod closure;
pub mod config;
pub mod error;
pub mod ids;
pub mod persistent;
pub mod record;
pub mod subsystem;
pub mod vtable;

pub use backend::{SdkBackend, ServerInit, ServerMode};
pub use bridge::Bridge;
pub use call_result::{CallResultHandle, RetireHook};
pub use closure::CallbackPayload;
pub use config::{BackendKind, InterfaceVersions, ShimConfig};
pub use error::{Result, ShimError};
pub use ids::{ApiCall, GameId, SteamId};
pub use persistent::PersistentCallback;
pub use record::CallbackRecord;
pub use subsystem::Subsystem;
pub use vtable::{CallbackBase, CallbackFlags};
