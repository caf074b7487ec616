//! Owned native attributes.
//!
//! An [`Attribute`] owns the value buffer its `CK_ATTRIBUTE` record points
//! at. List attributes also own their children, and the value buffer holds
//! the children's packed records.

use super::{date, kind_of, AttributeKind, AttributeType, AttributeValue};
use crate::abi::buffer::{ulong_bytes, ulong_from_bytes};
use crate::abi::AbiProfile;
use crate::error::{MarshalError, MarshalResult};
use crate::logging::{debug, trace};
use crate::memory;
use crate::owned::ForeignBuffer;
use crate::record::NativeAttribute;

/// A `CK_ATTRIBUTE` together with the foreign memory it references.
#[derive(Debug)]
pub struct Attribute {
    attr_type: AttributeType,
    profile: AbiProfile,
    value: ForeignBuffer,
    nested: Vec<Attribute>,
}

impl Attribute {
    /// Encode `value` into foreign memory.
    ///
    /// The whole value (including nested entries) is checked before the
    /// first allocation, so a rejected value leaves nothing behind.
    pub fn encode(
        profile: AbiProfile,
        attr_type: AttributeType,
        value: &AttributeValue,
    ) -> MarshalResult<Self> {
        validate(profile, value)?;
        debug!(
            attr_type = %format_args!("{attr_type:#x}"),
            kind = ?value.kind(),
            "encoding attribute"
        );
        Self::encode_checked(profile, attr_type, value)
    }

    fn encode_checked(
        profile: AbiProfile,
        attr_type: AttributeType,
        value: &AttributeValue,
    ) -> MarshalResult<Self> {
        if let AttributeValue::List(entries) = value {
            let nested = entries
                .iter()
                .map(|(ty, entry)| Self::encode_checked(profile, *ty, entry))
                .collect::<MarshalResult<Vec<_>>>()?;
            return Self::list(profile, attr_type, nested);
        }
        let bytes = scalar_image(profile, value)?;
        Ok(Self {
            attr_type,
            profile,
            value: ForeignBuffer::from_bytes(&bytes)?,
            nested: Vec::new(),
        })
    }

    /// `{type, NULL, 0}`.
    pub fn empty(profile: AbiProfile, attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            profile,
            value: ForeignBuffer::empty(),
            nested: Vec::new(),
        }
    }

    /// A zeroed buffer of `len` bytes for native code to fill.
    pub fn output(profile: AbiProfile, attr_type: AttributeType, len: usize) -> MarshalResult<Self> {
        Ok(Self {
            attr_type,
            profile,
            value: ForeignBuffer::zeroed(len)?,
            nested: Vec::new(),
        })
    }

    /// Pack already-encoded attributes into a nested `CK_ATTRIBUTE` array,
    /// taking ownership of them.
    pub fn list(
        profile: AbiProfile,
        attr_type: AttributeType,
        nested: Vec<Attribute>,
    ) -> MarshalResult<Self> {
        if nested.is_empty() {
            return Ok(Self::empty(profile, attr_type));
        }
        let array = pack(profile, &nested)?;
        Ok(Self {
            attr_type,
            profile,
            value: array,
            nested,
        })
    }

    pub fn attr_type(&self) -> AttributeType {
        self.attr_type
    }

    pub fn profile(&self) -> AbiProfile {
        self.profile
    }

    /// Children of a list attribute.
    pub fn nested(&self) -> &[Attribute] {
        &self.nested
    }

    /// Length of the value buffer in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The record native code sees.
    pub fn as_native(&self) -> MarshalResult<NativeAttribute> {
        Ok(NativeAttribute {
            attr_type: self.attr_type,
            value: self.value.as_ptr()?,
            value_len: self.value.len() as u64,
        })
    }

    /// Raw value bytes.
    pub fn bytes(&self) -> MarshalResult<Vec<u8>> {
        self.value.to_vec()
    }

    /// Decode the value as `kind`.
    pub fn decode(&self, kind: AttributeKind) -> MarshalResult<AttributeValue> {
        let native = self.as_native()?;
        // SAFETY: the record points at memory owned by `self` and its
        // children, which are live (checked by `as_native`).
        unsafe { decode_native(self.profile, &native, kind) }
    }

    /// Decode using the kind registered for this attribute type.
    pub fn decode_known(&self) -> MarshalResult<AttributeValue> {
        self.decode(kind_of(self.attr_type))
    }

    /// Release the value buffer and every nested allocation. Idempotent.
    pub fn dispose(&mut self) {
        if self.value.is_disposed() {
            return;
        }
        trace!(
            attr_type = %format_args!("{:#x}", self.attr_type),
            nested = self.nested.len(),
            "disposing attribute"
        );
        for child in &mut self.nested {
            child.dispose();
        }
        self.value.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.value.is_disposed()
    }
}

impl Drop for Attribute {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Encode a sequence of entries, validating all of them first.
pub(crate) fn encode_all(
    profile: AbiProfile,
    entries: &[(AttributeType, AttributeValue)],
) -> MarshalResult<Vec<Attribute>> {
    entries
        .iter()
        .try_for_each(|(_, value)| validate(profile, value))?;
    entries
        .iter()
        .map(|(ty, value)| Attribute::encode_checked(profile, *ty, value))
        .collect()
}

/// Serialize the records of `attributes` into one foreign array.
pub(crate) fn pack(profile: AbiProfile, attributes: &[Attribute]) -> MarshalResult<ForeignBuffer> {
    let size = NativeAttribute::size(profile);
    let mut records = vec![0u8; size * attributes.len()];
    for (index, attribute) in attributes.iter().enumerate() {
        if attribute.profile != profile {
            return Err(MarshalError::unsupported_abi(attribute.profile, profile));
        }
        attribute
            .as_native()?
            .write_to(profile, &mut records, index * size)?;
    }
    ForeignBuffer::from_bytes(&records)
}

fn validate(profile: AbiProfile, value: &AttributeValue) -> MarshalResult<()> {
    match value {
        AttributeValue::Ulong(v) => ulong_bytes(profile, *v).map(drop),
        AttributeValue::UlongList(values) | AttributeValue::MechanismList(values) => values
            .iter()
            .try_for_each(|v| ulong_bytes(profile, *v).map(drop)),
        AttributeValue::Date(Some(d)) => date::validate(*d),
        AttributeValue::List(entries) => entries
            .iter()
            .try_for_each(|(_, entry)| validate(profile, entry)),
        AttributeValue::Empty
        | AttributeValue::Bool(_)
        | AttributeValue::Text(_)
        | AttributeValue::Bytes(_)
        | AttributeValue::Date(None) => Ok(()),
    }
}

/// Value bytes of a non-list attribute.
fn scalar_image(profile: AbiProfile, value: &AttributeValue) -> MarshalResult<Vec<u8>> {
    Ok(match value {
        AttributeValue::Empty | AttributeValue::Date(None) => Vec::new(),
        AttributeValue::Bool(b) => vec![u8::from(*b)],
        AttributeValue::Ulong(v) => ulong_bytes(profile, *v)?,
        AttributeValue::Text(text) => text.as_deref().unwrap_or_default().as_bytes().to_vec(),
        AttributeValue::Bytes(bytes) => bytes.clone().unwrap_or_default(),
        AttributeValue::Date(Some(d)) => date::encode(*d)?.to_vec(),
        AttributeValue::UlongList(values) | AttributeValue::MechanismList(values) => {
            let mut out = Vec::with_capacity(values.len() * profile.ulong_size());
            for v in values {
                out.extend(ulong_bytes(profile, *v)?);
            }
            out
        }
        // Packed by `Attribute::list`.
        AttributeValue::List(_) => Vec::new(),
    })
}

fn ulongs(profile: AbiProfile, bytes: &[u8]) -> MarshalResult<Vec<u64>> {
    let size = profile.ulong_size();
    if bytes.len() % size != 0 {
        return Err(MarshalError::length(
            "CK_ULONG array",
            format!("a multiple of {size}"),
            bytes.len(),
        ));
    }
    bytes
        .chunks_exact(size)
        .map(|chunk| ulong_from_bytes(profile, chunk))
        .collect()
}

fn records(profile: AbiProfile, bytes: &[u8]) -> MarshalResult<Vec<NativeAttribute>> {
    let size = NativeAttribute::size(profile);
    if bytes.len() % size != 0 {
        return Err(MarshalError::length(
            "CK_ATTRIBUTE array",
            format!("a multiple of {size}"),
            bytes.len(),
        ));
    }
    (0..bytes.len() / size)
        .map(|index| NativeAttribute::read_from(profile, bytes, index * size))
        .collect()
}

/// The records of a nested `CK_ATTRIBUTE` array.
///
/// # Safety
///
/// `native.value` must be valid for `native.value_len` reads.
pub unsafe fn list_entries(
    profile: AbiProfile,
    native: &NativeAttribute,
) -> MarshalResult<Vec<NativeAttribute>> {
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { memory::read(native.value, native.len()?)? };
    records(profile, &bytes)
}

/// Decode a native record as `kind`.
///
/// A zero length decodes to the kind's absent value. A null pointer with a
/// non-zero length is the output of a length query and is rejected.
///
/// # Safety
///
/// `native.value` must be valid for `native.value_len` reads, and for lists
/// every nested record must satisfy the same condition.
pub unsafe fn decode_native(
    profile: AbiProfile,
    native: &NativeAttribute,
    kind: AttributeKind,
) -> MarshalResult<AttributeValue> {
    let len = native.len()?;
    if len == 0 {
        return Ok(kind.absent());
    }
    // SAFETY: guaranteed by the caller.
    let bytes = unsafe { memory::read(native.value, len)? };
    Ok(match kind {
        AttributeKind::Empty => return Err(MarshalError::length("empty attribute", 0, len)),
        AttributeKind::Bool => match bytes.as_slice() {
            [b] => AttributeValue::Bool(*b != 0),
            _ => return Err(MarshalError::length("CK_BBOOL", 1, len)),
        },
        AttributeKind::Ulong => AttributeValue::Ulong(ulong_from_bytes(profile, &bytes)?),
        AttributeKind::Text => AttributeValue::Text(Some(
            String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8)?,
        )),
        AttributeKind::Bytes => AttributeValue::Bytes(Some(bytes)),
        AttributeKind::Date => AttributeValue::Date(date::decode(&bytes)?),
        AttributeKind::UlongList => AttributeValue::UlongList(ulongs(profile, &bytes)?),
        AttributeKind::MechanismList => AttributeValue::MechanismList(ulongs(profile, &bytes)?),
        AttributeKind::List => {
            let mut entries = Vec::new();
            for record in records(profile, &bytes)? {
                // SAFETY: nested records are covered by the caller's guarantee.
                let value = unsafe { decode_native(profile, &record, kind_of(record.attr_type))? };
                entries.push((record.attr_type, value));
            }
            AttributeValue::List(entries)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};
    use crate::memory::{stats, AllocStats};
    use cryptoki_sys::{CKA_CLASS, CKA_ENCRYPT, CKA_LABEL, CKA_TOKEN, CKA_WRAP_TEMPLATE};

    fn four_tight() -> AbiProfile {
        AbiProfile::new(UlongWidth::Four, Packing::Tight)
    }

    #[test]
    fn test_bool_and_ulong_images() {
        for profile in AbiProfile::ALL {
            let flag = Attribute::encode(profile, u64::from(CKA_TOKEN), &true.into()).unwrap();
            assert_eq!(flag.bytes().unwrap(), vec![1]);
            assert_eq!(flag.decode_known().unwrap(), AttributeValue::Bool(true));

            let class = Attribute::encode(profile, u64::from(CKA_CLASS), &3u64.into()).unwrap();
            assert_eq!(class.len(), profile.ulong_size());
            assert_eq!(class.decode_known().unwrap(), AttributeValue::Ulong(3));
        }
    }

    #[test]
    fn test_empty_text_is_null() {
        let profile = AbiProfile::host();
        let label = Attribute::encode(profile, u64::from(CKA_LABEL), &"".into()).unwrap();
        let native = label.as_native().unwrap();
        assert!(native.is_null());
        assert_eq!(native.value_len, 0);
        assert_eq!(label.decode_known().unwrap(), AttributeValue::Text(None));
    }

    #[test]
    fn test_bool_with_wrong_length_is_rejected() {
        let profile = AbiProfile::host();
        let raw = Attribute::encode(profile, u64::from(CKA_TOKEN), &vec![1u8, 0].into()).unwrap();
        assert!(matches!(
            raw.decode(AttributeKind::Bool),
            Err(MarshalError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let profile = AbiProfile::host();
        let raw = Attribute::encode(profile, u64::from(CKA_LABEL), &vec![0xffu8, 0xfe].into()).unwrap();
        assert_eq!(raw.decode(AttributeKind::Text), Err(MarshalError::InvalidUtf8));
    }

    #[test]
    fn test_nested_list_roundtrip_and_release() {
        let value = AttributeValue::List(vec![
            (u64::from(CKA_ENCRYPT), true.into()),
            (u64::from(CKA_LABEL), "wrapped".into()),
        ]);
        for profile in AbiProfile::ALL {
            let before = stats();
            let mut template =
                Attribute::encode(profile, u64::from(CKA_WRAP_TEMPLATE), &value).unwrap();
            assert_eq!(template.len(), 2 * NativeAttribute::size(profile));
            assert_eq!(template.nested().len(), 2);
            assert_eq!(template.decode_known().unwrap(), value);

            template.dispose();
            assert!(template.is_disposed());
            assert_eq!(
                template.decode_known(),
                Err(MarshalError::DisposedObjectAccess("foreign buffer"))
            );
            assert_eq!(stats().since(before).outstanding(), 0);
        }
    }

    #[test]
    fn test_out_of_range_value_allocates_nothing() {
        let value = AttributeValue::List(vec![
            (u64::from(CKA_LABEL), "ok".into()),
            (u64::from(CKA_CLASS), AttributeValue::Ulong(u64::MAX)),
        ]);
        let before = stats();
        let result = Attribute::encode(four_tight(), u64::from(CKA_WRAP_TEMPLATE), &value);
        assert!(matches!(result, Err(MarshalError::ValueOutOfRange { .. })));
        assert_eq!(stats().since(before), AllocStats::default());
    }

    #[test]
    fn test_ulong_list_length_must_be_multiple() {
        let profile = four_tight();
        let raw = Attribute::encode(profile, 0x8000_0000, &vec![0u8; 6].into()).unwrap();
        assert!(matches!(
            raw.decode(AttributeKind::UlongList),
            Err(MarshalError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_length_query_record_is_not_decodable() {
        let native = NativeAttribute {
            attr_type: u64::from(CKA_LABEL),
            value: std::ptr::null_mut(),
            value_len: 5,
        };
        let result = unsafe { decode_native(AbiProfile::host(), &native, AttributeKind::Text) };
        assert!(matches!(result, Err(MarshalError::ArgumentNull(_))));
    }
}
