//! Mechanism parameter codec.
//!
//! Parameter structures are described once in [`spec`] and bound to values
//! with [`ParamValues`]. [`Mechanism::new`] validates the values, lays the
//! structure out for the selected [`crate::AbiProfile`], and allocates one
//! block per nested pointer. Every allocation belongs to the `Mechanism`
//! and is released with it.
//!
//! ```ignore
//! use ck_marshal::mechanism::{params, Mechanism};
//!
//! let parameter = params::gcm(&iv, b"header", 128);
//! let mechanism = Mechanism::new(profile, CKM_AES_GCM.into(), parameter)?;
//! let record = mechanism.as_ptr()?; // CK_MECHANISM_PTR
//! ```

pub mod codec;
pub mod params;
pub mod spec;
pub mod table;
pub mod value;

pub use codec::{Mechanism, MechanismParameter, MechanismType};
pub use spec::{FieldKind, FieldSpec, ParamSpec};
pub use table::{expected_shape, MechanismInfo, ParamShape};
pub use value::{FieldValue, ParamValues};
