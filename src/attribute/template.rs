//! Contiguous `CK_ATTRIBUTE` arrays, as passed to `C_CreateObject`,
//! `C_GetAttributeValue` and friends.

use super::codec::{encode_all, pack, Attribute};
use super::{kind_of, AttributeType, AttributeValue};
use crate::abi::AbiProfile;
use crate::error::MarshalResult;
use crate::owned::ForeignBuffer;
use crate::record::NativeAttribute;

/// An owned attribute template.
#[derive(Debug)]
pub struct AttributeTemplate {
    profile: AbiProfile,
    attributes: Vec<Attribute>,
    array: ForeignBuffer,
}

impl AttributeTemplate {
    /// Encode every entry. Nothing is allocated unless all entries are valid.
    pub fn new(profile: AbiProfile, entries: &[(AttributeType, AttributeValue)]) -> MarshalResult<Self> {
        Self::from_attributes(profile, encode_all(profile, entries)?)
    }

    /// A length-query template: every record is `{type, NULL, 0}`.
    pub fn query(profile: AbiProfile, types: &[AttributeType]) -> MarshalResult<Self> {
        let attributes = types
            .iter()
            .map(|&ty| Attribute::empty(profile, ty))
            .collect();
        Self::from_attributes(profile, attributes)
    }

    /// Pack already-encoded attributes.
    pub fn from_attributes(profile: AbiProfile, attributes: Vec<Attribute>) -> MarshalResult<Self> {
        let array = pack(profile, &attributes)?;
        Ok(Self {
            profile,
            attributes,
            array,
        })
    }

    pub fn profile(&self) -> AbiProfile {
        self.profile
    }

    /// Pointer to the first record.
    pub fn as_ptr(&self) -> MarshalResult<*mut u8> {
        self.array.as_ptr()
    }

    /// Number of records (`ulCount`).
    pub fn count(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Give back the owned attributes, releasing only the record array.
    pub fn into_attributes(mut self) -> Vec<Attribute> {
        self.array.dispose();
        std::mem::take(&mut self.attributes)
    }

    pub fn get(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.attr_type() == attr_type)
    }

    /// Read back the records as native code left them.
    pub fn records(&self) -> MarshalResult<Vec<NativeAttribute>> {
        let bytes = self.array.to_vec()?;
        let size = NativeAttribute::size(self.profile);
        (0..self.count())
            .map(|index| NativeAttribute::read_from(self.profile, &bytes, index * size))
            .collect()
    }

    /// Decode every entry with its registered kind.
    pub fn decode(&self) -> MarshalResult<Vec<(AttributeType, AttributeValue)>> {
        self.attributes
            .iter()
            .map(|a| Ok((a.attr_type(), a.decode(kind_of(a.attr_type()))?)))
            .collect()
    }

    /// Release the array and every attribute. Idempotent.
    pub fn dispose(&mut self) {
        for attribute in &mut self.attributes {
            attribute.dispose();
        }
        self.array.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.array.is_disposed()
    }
}

impl Drop for AttributeTemplate {
    fn drop(&mut self) {
        self.dispose();
    }
}
