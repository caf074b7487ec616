//! Values bound to the fields of a [`ParamSpec`].

use std::ptr;

use super::spec::{FieldKind, FieldSpec, ParamSpec};
use crate::abi::buffer::ulong_bytes;
use crate::abi::AbiProfile;
use crate::error::{MarshalError, MarshalResult};

/// The value of one parameter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Ulong(u64),
    Byte(u8),
    /// Input bytes; `None` and empty both encode as a null pointer.
    Bytes(Option<Vec<u8>>),
    /// A zeroed area of this many bytes for native code to fill.
    Output(usize),
    Text(Option<String>),
    Struct(ParamValues),
    StructList(Vec<ParamValues>),
    /// A null pointer.
    Null,
}

impl FieldValue {
    /// Byte length (or element count for lists) this value contributes to a
    /// length field.
    pub fn data_len(&self) -> usize {
        match self {
            FieldValue::Bytes(Some(bytes)) => bytes.len(),
            FieldValue::Output(n) => *n,
            FieldValue::Text(Some(text)) => text.len(),
            FieldValue::StructList(items) => items.len(),
            FieldValue::Ulong(_)
            | FieldValue::Byte(_)
            | FieldValue::Bytes(None)
            | FieldValue::Text(None)
            | FieldValue::Struct(_)
            | FieldValue::Null => 0,
        }
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Ulong(value)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        FieldValue::Byte(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Byte(u8::from(value))
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(Some(value))
    }
}

impl From<&[u8]> for FieldValue {
    fn from(value: &[u8]) -> Self {
        FieldValue::Bytes(Some(value.to_vec()))
    }
}

impl<const N: usize> From<[u8; N]> for FieldValue {
    fn from(value: [u8; N]) -> Self {
        FieldValue::Bytes(Some(value.to_vec()))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(Some(value.to_string()))
    }
}

impl From<ParamValues> for FieldValue {
    fn from(value: ParamValues) -> Self {
        FieldValue::Struct(value)
    }
}

impl From<Vec<ParamValues>> for FieldValue {
    fn from(value: Vec<ParamValues>) -> Self {
        FieldValue::StructList(value)
    }
}

/// Field values for one parameter structure.
///
/// ```ignore
/// let gcm = ParamValues::new(&spec::GCM_PARAMS)
///     .with("pIv", vec![0u8; 12])
///     .with("ulIvBits", 96u64)
///     .with("pAAD", FieldValue::Bytes(None))
///     .with("ulTagBits", 128u64);
/// gcm.validate(profile)?;
/// ```
#[derive(Debug, Clone)]
pub struct ParamValues {
    spec: &'static ParamSpec,
    values: Vec<Option<FieldValue>>,
    unknown: Vec<String>,
}

impl PartialEq for ParamValues {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.spec, other.spec) && self.values == other.values && self.unknown == other.unknown
    }
}

impl Eq for ParamValues {}

impl ParamValues {
    pub fn new(spec: &'static ParamSpec) -> Self {
        Self {
            spec,
            values: vec![None; spec.fields.len()],
            unknown: Vec::new(),
        }
    }

    pub fn spec(&self) -> &'static ParamSpec {
        self.spec
    }

    /// Bind `value` to `field`. Unknown names are reported by
    /// [`ParamValues::validate`].
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> &mut Self {
        match self
            .spec
            .index_of(field)
            .and_then(|index| self.values.get_mut(index))
        {
            Some(slot) => *slot = Some(value.into()),
            None => self.unknown.push(field.to_string()),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.spec.index_of(field).and_then(|index| self.at(index))
    }

    pub(crate) fn at(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    fn field(&self, name: &str) -> MarshalResult<&'static FieldSpec> {
        let fields: &'static [FieldSpec] = self.spec.fields;
        fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| MarshalError::UnknownField {
                structure: self.spec.name,
                field: name.to_string(),
            })
    }

    fn required(&self, name: &str) -> MarshalResult<(&'static FieldSpec, &FieldValue)> {
        let field = self.field(name)?;
        let value = self
            .get(name)
            .ok_or_else(|| MarshalError::ArgumentNull(format!("{}.{}", self.spec.name, name)))?;
        Ok((field, value))
    }

    fn mismatch(&self, field: &FieldSpec) -> MarshalError {
        MarshalError::FieldKindMismatch {
            structure: self.spec.name,
            field: field.name,
            expected: field.kind.describe(),
        }
    }

    /// A `CK_ULONG` or `CK_BYTE` field (including computed lengths once
    /// decoded).
    pub fn ulong(&self, name: &str) -> MarshalResult<u64> {
        match self.required(name)? {
            (_, FieldValue::Ulong(v)) => Ok(*v),
            (_, FieldValue::Byte(b)) => Ok(u64::from(*b)),
            (field, _) => Err(self.mismatch(field)),
        }
    }

    /// A byte field; null decodes to an empty vector.
    pub fn bytes(&self, name: &str) -> MarshalResult<Vec<u8>> {
        match self.required(name)? {
            (_, FieldValue::Bytes(bytes)) => Ok(bytes.clone().unwrap_or_default()),
            (_, FieldValue::Null) => Ok(Vec::new()),
            (field, _) => Err(self.mismatch(field)),
        }
    }

    /// A nested structure.
    pub fn structure(&self, name: &str) -> MarshalResult<&ParamValues> {
        match self.required(name)? {
            (_, FieldValue::Struct(inner)) => Ok(inner),
            (field, _) => Err(self.mismatch(field)),
        }
    }

    /// Check every field against the structure before anything is
    /// allocated.
    pub fn validate(&self, profile: AbiProfile) -> MarshalResult<()> {
        if let Some(name) = self.unknown.first() {
            return Err(MarshalError::UnknownField {
                structure: self.spec.name,
                field: name.clone(),
            });
        }
        for (field, value) in self.spec.fields.iter().zip(&self.values) {
            self.check_field(profile, field, value.as_ref())?;
        }
        for field in self.spec.fields.iter().filter(|f| f.kind.is_computed()) {
            let len = self.computed_length(field.name)?;
            ulong_bytes(profile, len)?;
        }
        Ok(())
    }

    fn check_field(
        &self,
        profile: AbiProfile,
        field: &FieldSpec,
        value: Option<&FieldValue>,
    ) -> MarshalResult<()> {
        let Some(value) = value else {
            if field.kind.is_computed() {
                return Ok(());
            }
            return Err(MarshalError::ArgumentNull(format!(
                "{}.{}",
                self.spec.name, field.name
            )));
        };
        let exact = |expected: usize, actual: usize| {
            if expected == actual {
                Ok(())
            } else {
                Err(MarshalError::length(field.name, expected, actual))
            }
        };
        match (field.kind, value) {
            (FieldKind::Ulong, FieldValue::Ulong(v)) => ulong_bytes(profile, *v).map(drop),
            (FieldKind::Byte, FieldValue::Byte(_))
            | (FieldKind::Buffer { .. }, FieldValue::Bytes(_))
            | (FieldKind::BufferLenPtr { .. }, FieldValue::Bytes(_) | FieldValue::Output(_))
            | (FieldKind::Output, FieldValue::Output(_) | FieldValue::Null)
            | (FieldKind::Text, FieldValue::Text(_))
            | (FieldKind::Pointer(_) | FieldKind::StructArray { .. }, FieldValue::Null) => Ok(()),
            (FieldKind::FixedBuffer(n), FieldValue::Output(m)) => exact(n, *m),
            (FieldKind::FixedBuffer(n) | FieldKind::Array(n), FieldValue::Bytes(Some(bytes))) => {
                exact(n, bytes.len())
            }
            (FieldKind::Inline(spec) | FieldKind::Pointer(spec), FieldValue::Struct(inner))
                if ptr::eq(spec, inner.spec) =>
            {
                inner.validate(profile)
            }
            (FieldKind::StructArray { spec, .. }, FieldValue::StructList(items))
                if items.iter().all(|item| ptr::eq(spec, item.spec)) =>
            {
                items.iter().try_for_each(|item| item.validate(profile))
            }
            _ => Err(self.mismatch(field)),
        }
    }

    /// Value of a computed length field: the common length of every buffer
    /// that references it.
    pub(crate) fn computed_length(&self, len_field: &str) -> MarshalResult<u64> {
        let lengths: Vec<usize> = self
            .spec
            .users_of(len_field)
            .map(|index| self.at(index).map_or(0, FieldValue::data_len))
            .collect();
        match lengths.split_first() {
            None => Ok(0),
            Some((first, rest)) if rest.iter().all(|len| len == first) => Ok(*first as u64),
            Some(_) => Err(MarshalError::ArgumentMismatch {
                field: format!("{}.{}", self.spec.name, len_field),
                lengths,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};
    use crate::mechanism::spec::{
        AES_CBC_ENCRYPT_DATA_PARAMS, GCM_PARAMS, KEA_DERIVE_PARAMS, SSL3_MASTER_KEY_DERIVE_PARAMS,
        SSL3_RANDOM_DATA, VERSION,
    };

    fn kea(random_b: Vec<u8>) -> ParamValues {
        ParamValues::new(&KEA_DERIVE_PARAMS)
            .with("isSender", true)
            .with("pRandomA", vec![1u8; 16])
            .with("pRandomB", random_b)
            .with("pPublicData", vec![9u8; 64])
    }

    #[test]
    fn test_paired_lengths_must_agree() {
        let profile = AbiProfile::host();
        assert!(kea(vec![2u8; 16]).validate(profile).is_ok());
        assert_eq!(
            kea(vec![2u8; 20]).validate(profile),
            Err(MarshalError::ArgumentMismatch {
                field: "CK_KEA_DERIVE_PARAMS.ulRandomLen".to_string(),
                lengths: vec![16, 20],
            })
        );
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let profile = AbiProfile::host();
        let missing = ParamValues::new(&GCM_PARAMS).with("pIv", vec![0u8; 12]);
        assert!(matches!(
            missing.validate(profile),
            Err(MarshalError::ArgumentNull(name)) if name == "CK_GCM_PARAMS.ulIvBits"
        ));

        let unknown = ParamValues::new(&GCM_PARAMS).with("pNonce", vec![0u8; 12]);
        assert!(matches!(
            unknown.validate(profile),
            Err(MarshalError::UnknownField { field, .. }) if field == "pNonce"
        ));
    }

    #[test]
    fn test_inline_array_size_is_enforced() {
        let params = ParamValues::new(&AES_CBC_ENCRYPT_DATA_PARAMS)
            .with("iv", vec![0u8; 8])
            .with("pData", vec![1u8; 32]);
        assert!(matches!(
            params.validate(AbiProfile::host()),
            Err(MarshalError::InvalidLength { what: "iv", .. })
        ));
    }

    #[test]
    fn test_nested_struct_must_match_spec() {
        let wrong = ParamValues::new(&SSL3_MASTER_KEY_DERIVE_PARAMS)
            .with("RandomInfo", ParamValues::new(&VERSION).with("major", 3u8).with("minor", 0u8))
            .with("pVersion", FieldValue::Null);
        assert!(matches!(
            wrong.validate(AbiProfile::host()),
            Err(MarshalError::FieldKindMismatch { field: "RandomInfo", .. })
        ));

        let random = ParamValues::new(&SSL3_RANDOM_DATA)
            .with("pClientRandom", vec![1u8; 32])
            .with("pServerRandom", vec![2u8; 32]);
        let right = ParamValues::new(&SSL3_MASTER_KEY_DERIVE_PARAMS)
            .with("RandomInfo", random)
            .with("pVersion", FieldValue::Null);
        assert!(right.validate(AbiProfile::host()).is_ok());
    }

    #[test]
    fn test_ulong_range_checked_for_four_byte_profile() {
        let params = ParamValues::new(&GCM_PARAMS)
            .with("pIv", vec![0u8; 12])
            .with("ulIvBits", u64::MAX)
            .with("pAAD", FieldValue::Bytes(None))
            .with("ulTagBits", 128u64);
        let four = AbiProfile::new(UlongWidth::Four, Packing::Natural);
        let eight = AbiProfile::new(UlongWidth::Eight, Packing::Natural);
        assert!(matches!(
            params.validate(four),
            Err(MarshalError::ValueOutOfRange { .. })
        ));
        assert!(params.validate(eight).is_ok());
    }
}
