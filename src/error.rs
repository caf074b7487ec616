//! Error types for marshaling operations.

use thiserror::Error;

use crate::abi::AbiProfile;

/// Result alias used throughout the crate.
pub type MarshalResult<T> = Result<T, MarshalError>;

/// Errors that can occur while encoding, decoding, allocating or releasing
/// Cryptoki structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("Foreign allocation of {size} bytes failed")]
    AllocationFailure { size: usize },

    #[error("Invalid length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: String,
        actual: usize,
    },

    #[error("Paired fields share `{field}` but have different lengths: {lengths:?}")]
    ArgumentMismatch { field: String, lengths: Vec<usize> },

    #[error("Required value is absent: {0}")]
    ArgumentNull(String),

    #[error("Object has already been disposed: {0}")]
    DisposedObjectAccess(&'static str),

    #[error("Unsupported ABI: selected {selected}, native library uses {native}")]
    UnsupportedAbi { selected: String, native: String },

    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Value {value} does not fit in a {width}-byte CK_ULONG")]
    ValueOutOfRange { value: u64, width: usize },

    #[error("Invalid UTF-8 in attribute value")]
    InvalidUtf8,

    #[error("Invalid CK_DATE: {0}")]
    InvalidDate(String),

    #[error("{structure} has no field named `{field}`")]
    UnknownField { structure: &'static str, field: String },

    #[error("{structure}.{field} expects {expected}")]
    FieldKindMismatch {
        structure: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("{0} is write-only and cannot be decoded")]
    WriteOnly(&'static str),

    #[error("Mechanism {mechanism:#x} expects parameter {expected}")]
    ParameterShapeMismatch { mechanism: u64, expected: String },

    #[error("Native call returned CK_RV {rv:#x}")]
    Native { rv: u64 },
}

impl MarshalError {
    pub(crate) fn length<E: std::fmt::Display>(what: &'static str, expected: E, actual: usize) -> Self {
        Self::InvalidLength {
            what,
            expected: expected.to_string(),
            actual,
        }
    }

    pub(crate) fn unsupported_abi<N: std::fmt::Display>(selected: AbiProfile, native: N) -> Self {
        Self::UnsupportedAbi {
            selected: selected.to_string(),
            native: native.to_string(),
        }
    }
}
