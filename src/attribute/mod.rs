//! Cryptoki attribute values and their native encoding.
//!
//! # Module Organization
//!
//! - [`codec`]: [`Attribute`], the owned native form, and decoding
//! - [`date`]: `CK_DATE` text encoding
//! - [`template`]: Contiguous `CK_ATTRIBUTE` arrays

pub mod codec;
pub mod date;
pub mod template;

use cryptoki_sys::{
    CK_ATTRIBUTE_TYPE, CKA_ALLOWED_MECHANISMS, CKA_ALWAYS_AUTHENTICATE, CKA_ALWAYS_SENSITIVE,
    CKA_APPLICATION, CKA_CERTIFICATE_CATEGORY, CKA_CERTIFICATE_TYPE, CKA_CLASS, CKA_COPYABLE,
    CKA_DECRYPT, CKA_DERIVE, CKA_DESTROYABLE, CKA_ENCRYPT, CKA_END_DATE, CKA_EXTRACTABLE,
    CKA_KEY_GEN_MECHANISM, CKA_KEY_TYPE, CKA_LABEL, CKA_LOCAL, CKA_MODIFIABLE, CKA_MODULUS_BITS,
    CKA_NEVER_EXTRACTABLE, CKA_PRIME_BITS, CKA_PRIVATE, CKA_SENSITIVE, CKA_SIGN,
    CKA_SIGN_RECOVER, CKA_START_DATE, CKA_SUBPRIME_BITS, CKA_TOKEN, CKA_TRUSTED, CKA_UNWRAP,
    CKA_UNWRAP_TEMPLATE, CKA_URL, CKA_VALUE_LEN, CKA_VERIFY, CKA_VERIFY_RECOVER, CKA_WRAP,
    CKA_WRAP_TEMPLATE, CKA_WRAP_WITH_TRUSTED,
};

pub use codec::{decode_native, list_entries, Attribute};
pub use template::AttributeTemplate;

/// `CK_ATTRIBUTE_TYPE` widened to 64 bits.
pub type AttributeType = u64;

/// A semantic attribute value.
///
/// Empty text and empty byte sequences are indistinguishable from absent
/// ones once encoded; [`AttributeValue::normalized`] gives the form a
/// decode produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// No value (`{NULL, 0}`).
    Empty,
    /// `CK_ULONG` and its aliases.
    Ulong(u64),
    /// `CK_BBOOL`.
    Bool(bool),
    /// RFC 2279 string without terminator.
    Text(Option<String>),
    /// Raw bytes.
    Bytes(Option<Vec<u8>>),
    /// `CK_DATE`; `None` is the unset date.
    Date(Option<time::Date>),
    /// Nested `CK_ATTRIBUTE` array (wrap/unwrap templates).
    List(Vec<(AttributeType, AttributeValue)>),
    /// `CK_ULONG` array.
    UlongList(Vec<u64>),
    /// `CK_MECHANISM_TYPE` array.
    MechanismList(Vec<u64>),
}

/// Value kinds, used to choose a decoder for native bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Empty,
    Ulong,
    Bool,
    Text,
    Bytes,
    Date,
    List,
    UlongList,
    MechanismList,
}

impl AttributeKind {
    /// What a zero-length record decodes to.
    pub fn absent(self) -> AttributeValue {
        match self {
            AttributeKind::Empty | AttributeKind::Ulong | AttributeKind::Bool => {
                AttributeValue::Empty
            }
            AttributeKind::Text => AttributeValue::Text(None),
            AttributeKind::Bytes => AttributeValue::Bytes(None),
            AttributeKind::Date => AttributeValue::Date(None),
            AttributeKind::List => AttributeValue::List(Vec::new()),
            AttributeKind::UlongList => AttributeValue::UlongList(Vec::new()),
            AttributeKind::MechanismList => AttributeValue::MechanismList(Vec::new()),
        }
    }
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Empty => AttributeKind::Empty,
            AttributeValue::Ulong(_) => AttributeKind::Ulong,
            AttributeValue::Bool(_) => AttributeKind::Bool,
            AttributeValue::Text(_) => AttributeKind::Text,
            AttributeValue::Bytes(_) => AttributeKind::Bytes,
            AttributeValue::Date(_) => AttributeKind::Date,
            AttributeValue::List(_) => AttributeKind::List,
            AttributeValue::UlongList(_) => AttributeKind::UlongList,
            AttributeValue::MechanismList(_) => AttributeKind::MechanismList,
        }
    }

    /// Whether this value encodes to `{NULL, 0}`.
    pub fn is_absent(&self) -> bool {
        match self {
            AttributeValue::Empty | AttributeValue::Date(None) => true,
            AttributeValue::Text(t) => t.as_deref().is_none_or(str::is_empty),
            AttributeValue::Bytes(b) => b.as_deref().is_none_or(<[u8]>::is_empty),
            AttributeValue::List(entries) => entries.is_empty(),
            AttributeValue::UlongList(v) | AttributeValue::MechanismList(v) => v.is_empty(),
            AttributeValue::Ulong(_) | AttributeValue::Bool(_) | AttributeValue::Date(Some(_)) => {
                false
            }
        }
    }

    /// The value a round trip through native memory yields.
    pub fn normalized(&self) -> AttributeValue {
        if self.is_absent() {
            return self.kind().absent();
        }
        match self {
            AttributeValue::List(entries) => AttributeValue::List(
                entries
                    .iter()
                    .map(|(ty, value)| (*ty, value.normalized()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::Ulong(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(Some(value.to_string()))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(Some(value))
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        AttributeValue::Bytes(Some(value))
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        AttributeValue::Bytes(Some(value.to_vec()))
    }
}

impl From<time::Date> for AttributeValue {
    fn from(value: time::Date) -> Self {
        AttributeValue::Date(Some(value))
    }
}

const BOOL_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[
    CKA_TOKEN,
    CKA_PRIVATE,
    CKA_TRUSTED,
    CKA_SENSITIVE,
    CKA_ENCRYPT,
    CKA_DECRYPT,
    CKA_WRAP,
    CKA_UNWRAP,
    CKA_SIGN,
    CKA_SIGN_RECOVER,
    CKA_VERIFY,
    CKA_VERIFY_RECOVER,
    CKA_DERIVE,
    CKA_EXTRACTABLE,
    CKA_LOCAL,
    CKA_NEVER_EXTRACTABLE,
    CKA_ALWAYS_SENSITIVE,
    CKA_MODIFIABLE,
    CKA_COPYABLE,
    CKA_DESTROYABLE,
    CKA_ALWAYS_AUTHENTICATE,
    CKA_WRAP_WITH_TRUSTED,
];

const ULONG_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[
    CKA_CLASS,
    CKA_CERTIFICATE_TYPE,
    CKA_CERTIFICATE_CATEGORY,
    CKA_KEY_TYPE,
    CKA_MODULUS_BITS,
    CKA_PRIME_BITS,
    CKA_SUBPRIME_BITS,
    CKA_VALUE_LEN,
    CKA_KEY_GEN_MECHANISM,
];

const TEXT_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_LABEL, CKA_APPLICATION, CKA_URL];

const DATE_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_START_DATE, CKA_END_DATE];

const LIST_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_WRAP_TEMPLATE, CKA_UNWRAP_TEMPLATE];

const MECHANISM_LIST_ATTRIBUTES: &[CK_ATTRIBUTE_TYPE] = &[CKA_ALLOWED_MECHANISMS];

fn listed(table: &[CK_ATTRIBUTE_TYPE], attr_type: AttributeType) -> bool {
    table.iter().any(|&known| u64::from(known) == attr_type)
}

/// Value kind of a well-known attribute type; anything else is raw bytes.
pub fn kind_of(attr_type: AttributeType) -> AttributeKind {
    if listed(BOOL_ATTRIBUTES, attr_type) {
        AttributeKind::Bool
    } else if listed(ULONG_ATTRIBUTES, attr_type) {
        AttributeKind::Ulong
    } else if listed(TEXT_ATTRIBUTES, attr_type) {
        AttributeKind::Text
    } else if listed(DATE_ATTRIBUTES, attr_type) {
        AttributeKind::Date
    } else if listed(LIST_ATTRIBUTES, attr_type) {
        AttributeKind::List
    } else if listed(MECHANISM_LIST_ATTRIBUTES, attr_type) {
        AttributeKind::MechanismList
    } else {
        AttributeKind::Bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_well_known_types() {
        assert_eq!(kind_of(u64::from(CKA_TOKEN)), AttributeKind::Bool);
        assert_eq!(kind_of(u64::from(CKA_CLASS)), AttributeKind::Ulong);
        assert_eq!(kind_of(u64::from(CKA_LABEL)), AttributeKind::Text);
        assert_eq!(kind_of(u64::from(CKA_START_DATE)), AttributeKind::Date);
        assert_eq!(kind_of(u64::from(CKA_WRAP_TEMPLATE)), AttributeKind::List);
        assert_eq!(
            kind_of(u64::from(CKA_ALLOWED_MECHANISMS)),
            AttributeKind::MechanismList
        );
        assert_eq!(kind_of(0x8000_0001), AttributeKind::Bytes);
    }

    #[test]
    fn test_normalized_absent_values() {
        assert_eq!(
            AttributeValue::Text(Some(String::new())).normalized(),
            AttributeValue::Text(None)
        );
        assert_eq!(
            AttributeValue::Bytes(Some(Vec::new())).normalized(),
            AttributeValue::Bytes(None)
        );
        assert_eq!(AttributeValue::Bool(false).normalized(), AttributeValue::Bool(false));
        assert!(AttributeValue::UlongList(Vec::new()).is_absent());
    }
}
