//! Convenient re-exports for common usage patterns.
//!
//! # Example
//!
//! ```ignore
//! use ck_marshal::prelude::*;
//!
//! let profile = abi::current();
//! let label = Attribute::encode(profile, CKA_LABEL.into(), &"key".into())?;
//! ```

// Error handling
pub use crate::error::{MarshalError, MarshalResult};

// ABI profile
pub use crate::abi::{self, AbiProfile, Packing, UlongWidth};

// Owned foreign memory
pub use crate::owned::ForeignBuffer;
pub use crate::record::{NativeAttribute, NativeMechanism};

// Attributes
pub use crate::attribute::{
    kind_of, Attribute, AttributeKind, AttributeTemplate, AttributeType, AttributeValue,
};

// Mechanisms
pub use crate::mechanism::{
    params, FieldValue, Mechanism, MechanismParameter, MechanismType, ParamValues,
};

// Two-phase queries
pub use crate::query::{fetch_attributes, fetch_bytes, fetch_known_attributes, fetch_ulongs};
