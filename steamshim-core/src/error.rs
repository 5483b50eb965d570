//! Error type shared by the core crate.

/// Errors surfaced by the bridge.
///
/// Dispatch-time outcomes never produce errors; they are pushed into the
/// foreign runtime through the record's functions instead.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("SDK initialization failed")]
    InitFailed,

    #[error("game server initialization failed")]
    ServerInitFailed,

    #[error("callback record is missing its {0} function")]
    MissingFunction(&'static str),

    #[error("invalid payload size {0}")]
    InvalidPayloadSize(i32),

    #[error("string contains an interior NUL byte")]
    InteriorNul(#[from] std::ffi::NulError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("backend `{0}` is not available in this build")]
    BackendUnavailable(&'static str),
}

pub type Result<T, E = ShimError> = std::result::Result<T, E>;
