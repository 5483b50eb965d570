//! FFI status codes returned by `steamshim_*` functions.

/// Status codes for the C ABI surface.
///
/// Every `steamshim_*` function that returns `i32` uses these values.
/// Callers should check for `Ok` (0) and handle errors accordingly.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    /// Success.
    Ok = 0,
    /// The handle does not exist (never issued, already destroyed, or fired).
    InvalidHandle = 1,
    /// A required argument was null, out of range, or not valid UTF-8/JSON.
    InvalidArgument = 2,
    /// No session: `steamshim_configure` / `steamshim_init` was not called.
    NotInitialized = 3,
    /// An internal error occurred (logged via tracing).
    Internal = 4,
    /// The operation needs a different backend than the active one.
    Unsupported = 5,
}
