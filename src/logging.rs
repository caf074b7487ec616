//! Tracing shims for the marshaling layer.
//!
//! Every event goes through `ck_event!`, which forwards to
//! `tracing::event!` when the `logging` feature is on and expands to nothing
//! otherwise. The level wrappers pin what this crate reports where:
//!
//! | level   | emitted by                                                     |
//! |---------|----------------------------------------------------------------|
//! | `TRACE` | `memory` (each malloc/free), disposal of owned objects        |
//! | `DEBUG` | `Attribute::encode`, `Mechanism::new`, each two-phase pass     |
//! | `INFO`  | `abi::select` fixing the process-wide profile                  |
//! | `WARN`  | non-`CKR_OK` return values, lengths that grew between calls    |
//!
//! ```rust,ignore
//! use crate::logging::{debug, warn};
//!
//! debug!(mechanism = %format_args!("{:#x}", ty), "encoding mechanism");
//! warn!(what, allocated, reported, "native length grew between calls");
//! ```

#[cfg(feature = "logging")]
macro_rules! ck_event {
    ($level:ident, $($arg:tt)*) => {
        tracing::event!(tracing::Level::$level, $($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! ck_event {
    ($level:ident, $($arg:tt)*) => {};
}

macro_rules! ck_trace {
    ($($arg:tt)*) => { $crate::logging::ck_event!(TRACE, $($arg)*) };
}

macro_rules! ck_debug {
    ($($arg:tt)*) => { $crate::logging::ck_event!(DEBUG, $($arg)*) };
}

macro_rules! ck_info {
    ($($arg:tt)*) => { $crate::logging::ck_event!(INFO, $($arg)*) };
}

macro_rules! ck_warn {
    ($($arg:tt)*) => { $crate::logging::ck_event!(WARN, $($arg)*) };
}

pub(crate) use ck_event;
pub(crate) use ck_debug as debug;
pub(crate) use ck_info as info;
pub(crate) use ck_trace as trace;
pub(crate) use ck_warn as warn;
