//! `CK_ATTRIBUTE` and `CK_MECHANISM` records.
//!
//! Both are `{CK_ULONG, pointer, CK_ULONG}`. The types here are plain views:
//! they never own the memory they point at.

use std::ptr;

use crate::abi::buffer::{read_pointer, read_ulong, write_pointer, write_ulong};
use crate::abi::{AbiProfile, Scalar, StructLayout};
use crate::error::{MarshalError, MarshalResult};
use crate::memory;

/// Layout shared by `CK_ATTRIBUTE` and `CK_MECHANISM`.
pub fn pointer_record_layout(profile: AbiProfile) -> StructLayout {
    StructLayout::builder(profile)
        .scalar(Scalar::Ulong)
        .scalar(Scalar::Pointer)
        .scalar(Scalar::Ulong)
        .finish()
}

fn write_record(
    profile: AbiProfile,
    buffer: &mut [u8],
    offset: usize,
    (ty, ptr, len): (u64, *const u8, u64),
) -> MarshalResult<()> {
    let layout = pointer_record_layout(profile);
    let [ty_at, ptr_at, len_at] = field_offsets(&layout)?;
    write_ulong(buffer, offset + ty_at, profile, ty)?;
    write_pointer(buffer, offset + ptr_at, ptr)?;
    write_ulong(buffer, offset + len_at, profile, len)
}

fn read_record(
    profile: AbiProfile,
    buffer: &[u8],
    offset: usize,
) -> MarshalResult<(u64, *mut u8, u64)> {
    let layout = pointer_record_layout(profile);
    let [ty_at, ptr_at, len_at] = field_offsets(&layout)?;
    Ok((
        read_ulong(buffer, offset + ty_at, profile)?,
        read_pointer(buffer, offset + ptr_at)?,
        read_ulong(buffer, offset + len_at, profile)?,
    ))
}

fn field_offsets(layout: &StructLayout) -> MarshalResult<[usize; 3]> {
    match layout.fields.as_slice() {
        [a, b, c] => Ok([a.offset, b.offset, c.offset]),
        other => Err(MarshalError::length("pointer record fields", 3, other.len())),
    }
}

/// A `CK_ATTRIBUTE` as seen by native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeAttribute {
    pub attr_type: u64,
    pub value: *mut u8,
    pub value_len: u64,
}

impl NativeAttribute {
    /// `{type, NULL, 0}`: the phase-one query form.
    pub fn null(attr_type: u64) -> Self {
        Self {
            attr_type,
            value: ptr::null_mut(),
            value_len: 0,
        }
    }

    pub fn size(profile: AbiProfile) -> usize {
        pointer_record_layout(profile).size
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Value length as a host size.
    pub fn len(&self) -> MarshalResult<usize> {
        usize::try_from(self.value_len)
            .map_err(|_| MarshalError::length("CK_ATTRIBUTE.ulValueLen", "a host size", usize::MAX))
    }

    pub fn is_empty(&self) -> bool {
        self.value_len == 0
    }

    /// Serialize into `buffer` at `offset`.
    pub fn write_to(&self, profile: AbiProfile, buffer: &mut [u8], offset: usize) -> MarshalResult<()> {
        write_record(profile, buffer, offset, (self.attr_type, self.value, self.value_len))
    }

    /// Deserialize from `buffer` at `offset`.
    pub fn read_from(profile: AbiProfile, buffer: &[u8], offset: usize) -> MarshalResult<Self> {
        let (attr_type, value, value_len) = read_record(profile, buffer, offset)?;
        Ok(Self {
            attr_type,
            value,
            value_len,
        })
    }

    /// Native image of this record.
    pub fn to_bytes(&self, profile: AbiProfile) -> MarshalResult<Vec<u8>> {
        let mut buffer = vec![0u8; Self::size(profile)];
        self.write_to(profile, &mut buffer, 0)?;
        Ok(buffer)
    }

    /// Read the `index`-th record of a native `CK_ATTRIBUTE` array.
    ///
    /// # Safety
    ///
    /// `array` must point to at least `index + 1` records laid out for
    /// `profile`.
    pub unsafe fn read_at(profile: AbiProfile, array: *const u8, index: usize) -> MarshalResult<Self> {
        let size = Self::size(profile);
        // SAFETY: guaranteed by the caller.
        let bytes = unsafe { memory::read(array.wrapping_add(index * size), size)? };
        Self::read_from(profile, &bytes, 0)
    }

    /// Overwrite the `index`-th record of a native `CK_ATTRIBUTE` array.
    ///
    /// # Safety
    ///
    /// `array` must point to at least `index + 1` writable records laid out
    /// for `profile`.
    pub unsafe fn write_at(&self, profile: AbiProfile, array: *mut u8, index: usize) -> MarshalResult<()> {
        let bytes = self.to_bytes(profile)?;
        // SAFETY: guaranteed by the caller.
        unsafe { memory::write(array.wrapping_add(index * bytes.len()), &bytes) };
        Ok(())
    }
}

/// A `CK_MECHANISM` as seen by native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeMechanism {
    pub mechanism: u64,
    pub parameter: *mut u8,
    pub parameter_len: u64,
}

impl NativeMechanism {
    pub fn size(profile: AbiProfile) -> usize {
        pointer_record_layout(profile).size
    }

    pub fn is_null(&self) -> bool {
        self.parameter.is_null()
    }

    pub fn write_to(&self, profile: AbiProfile, buffer: &mut [u8], offset: usize) -> MarshalResult<()> {
        write_record(
            profile,
            buffer,
            offset,
            (self.mechanism, self.parameter, self.parameter_len),
        )
    }

    pub fn read_from(profile: AbiProfile, buffer: &[u8], offset: usize) -> MarshalResult<Self> {
        let (mechanism, parameter, parameter_len) = read_record(profile, buffer, offset)?;
        Ok(Self {
            mechanism,
            parameter,
            parameter_len,
        })
    }

    pub fn to_bytes(&self, profile: AbiProfile) -> MarshalResult<Vec<u8>> {
        let mut buffer = vec![0u8; Self::size(profile)];
        self.write_to(profile, &mut buffer, 0)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_record_roundtrip_all_profiles() {
        let value = [1u8, 2, 3];
        let record = NativeAttribute {
            attr_type: 0x11,
            value: value.as_ptr().cast_mut(),
            value_len: 3,
        };
        for profile in AbiProfile::ALL {
            let bytes = record.to_bytes(profile).unwrap();
            assert_eq!(bytes.len(), NativeAttribute::size(profile));
            assert_eq!(NativeAttribute::read_from(profile, &bytes, 0).unwrap(), record);
        }
    }

    #[test]
    fn test_tight_four_byte_layout() {
        let profile = AbiProfile::new(crate::abi::UlongWidth::Four, crate::abi::Packing::Tight);
        let record = NativeMechanism {
            mechanism: 0x1087,
            parameter: ptr::null_mut(),
            parameter_len: 0,
        };
        let bytes = record.to_bytes(profile).unwrap();
        assert_eq!(bytes.get(0..4), Some(&0x1087u32.to_ne_bytes()[..]));
        assert_eq!(bytes.len(), 4 + std::mem::size_of::<usize>() + 4);
    }

    #[test]
    fn test_null_record() {
        let record = NativeAttribute::null(3);
        assert!(record.is_null());
        assert!(record.is_empty());
    }
}
