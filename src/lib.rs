//! ABI-aware marshaling of Cryptoki (PKCS#11) structures.
//!
//! This library converts semantic values into the flat pointer-plus-length
//! C structures a Cryptoki library expects, and back. Every codec is
//! parameterized by an [`AbiProfile`]: a `CK_ULONG` of 4 or 8 bytes crossed
//! with natural or 1-byte structure packing.
//!
//! # Quick Start
//!
//! ```ignore
//! use ck_marshal::prelude::*;
//!
//! let profile = abi::select(AbiProfile::host())?;
//!
//! // A template for C_CreateObject
//! let template = AttributeTemplate::new(profile, &[
//!     (CKA_CLASS.into(), AttributeValue::Ulong(CKO_SECRET_KEY.into())),
//!     (CKA_LABEL.into(), "session key".into()),
//!     (CKA_TOKEN.into(), false.into()),
//! ])?;
//!
//! // An AES-GCM mechanism
//! let mechanism = Mechanism::new(profile, CKM_AES_GCM.into(), params::gcm(&iv, b"", 128))?;
//! ```
//!
//! Every foreign allocation is owned by exactly one value and released once,
//! on [`ForeignBuffer::dispose`] or drop.
//!
//! # Modules
//!
//! - [`abi`] - Profiles, structure layout and scalar helpers
//! - [`memory`] - The C heap allocator and allocation counters
//! - [`owned`] - Single-owner foreign buffers
//! - [`record`] - `CK_ATTRIBUTE` and `CK_MECHANISM` records
//! - [`attribute`] - Attribute values, their encoding and templates
//! - [`mechanism`] - Mechanism parameter structures and their encoding
//! - [`query`] - The two-phase length-then-fetch convention
//! - [`config`] - TOML configuration (requires `config` feature)
//!
//! # Feature Flags
//!
//! - `config` - Enable TOML configuration of the ABI profile (enabled by default)
//! - `logging` - Enable library-level tracing (consumers provide their own subscriber)
//! - `cli` - Enable the command-line interface binary
//! - `full` - Enable all features

pub mod abi;
pub mod attribute;
#[cfg(feature = "config")]
pub mod config;
mod error;
mod logging;
pub mod mechanism;
pub mod memory;
pub mod owned;
pub mod prelude;
pub mod query;
pub mod record;

pub use error::{MarshalError, MarshalResult};

pub use abi::{AbiProfile, Packing, UlongWidth};
pub use attribute::{Attribute, AttributeKind, AttributeTemplate, AttributeType, AttributeValue};
pub use mechanism::{FieldValue, Mechanism, MechanismParameter, MechanismType, ParamValues};
pub use owned::ForeignBuffer;
pub use record::{NativeAttribute, NativeMechanism};
