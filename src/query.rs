//! The two-phase "ask for the length, then fetch" convention.
//!
//! Each helper takes a closure standing in for the native call. The closure
//! receives raw pointers in the layout of the selected profile and returns
//! the `CK_RV`. Every buffer handed to it is owned here and released before
//! the helper returns.
//!
//! ```ignore
//! let label = query::fetch_bytes(profile, |buf, len| unsafe {
//!     (funcs.C_GetOperationState)(session, buf, len.cast())
//! })?;
//! ```

use std::ptr;

use cryptoki_sys::{
    CKR_ATTRIBUTE_SENSITIVE, CKR_ATTRIBUTE_TYPE_INVALID, CKR_BUFFER_TOO_SMALL, CKR_OK,
};

use crate::abi::buffer::{ulong_bytes, ulong_from_bytes};
use crate::abi::AbiProfile;
use crate::attribute::{
    decode_native, kind_of, list_entries, Attribute, AttributeKind, AttributeTemplate,
    AttributeType, AttributeValue,
};
use crate::error::{MarshalError, MarshalResult};
use crate::logging::{debug, warn};
use crate::owned::ForeignBuffer;
use crate::record::NativeAttribute;

/// `CK_RV`, widened to 64 bits.
pub type ReturnValue = u64;

fn check(rv: ReturnValue) -> MarshalResult<()> {
    if rv == u64::from(CKR_OK) {
        return Ok(());
    }
    warn!(rv = %format_args!("{rv:#x}"), "native call failed");
    Err(MarshalError::Native { rv })
}

/// Per-entry failures of `C_GetAttributeValue` still fill in the rest of
/// the template.
fn check_attributes(rv: ReturnValue) -> MarshalResult<()> {
    if rv == u64::from(CKR_ATTRIBUTE_SENSITIVE) || rv == u64::from(CKR_ATTRIBUTE_TYPE_INVALID) {
        return Ok(());
    }
    check(rv)
}

fn grew(what: &'static str, allocated: u64, reported: u64) -> MarshalError {
    warn!(what, allocated, reported, "native length grew between calls");
    MarshalError::length(what, format!("at most {allocated}"), reported as usize)
}

/// A foreign `CK_ULONG` the native side reads and writes (`CK_ULONG_PTR`).
struct LengthSlot {
    profile: AbiProfile,
    buffer: ForeignBuffer,
}

impl LengthSlot {
    fn new(profile: AbiProfile) -> MarshalResult<Self> {
        Ok(Self {
            profile,
            buffer: ForeignBuffer::zeroed(profile.ulong_size())?,
        })
    }

    fn as_ptr(&self) -> MarshalResult<*mut u8> {
        self.buffer.as_ptr()
    }

    fn get(&self) -> MarshalResult<u64> {
        ulong_from_bytes(self.profile, &self.buffer.to_vec()?)
    }

    fn set(&mut self, value: u64) -> MarshalResult<()> {
        self.buffer.write_at(0, &ulong_bytes(self.profile, value)?)
    }
}

/// Run a two-phase call whose length is counted in `unit`-byte elements.
fn fetch_units<F>(profile: AbiProfile, unit: usize, what: &'static str, mut call: F) -> MarshalResult<Vec<u8>>
where
    F: FnMut(*mut u8, *mut u8) -> ReturnValue,
{
    let mut slot = LengthSlot::new(profile)?;
    check(call(ptr::null_mut(), slot.as_ptr()?))?;
    let needed = slot.get()?;
    debug!(what, needed, "length query answered");
    if needed == 0 {
        return Ok(Vec::new());
    }
    let size = usize::try_from(needed)
        .ok()
        .and_then(|count| count.checked_mul(unit))
        .ok_or(MarshalError::AllocationFailure { size: usize::MAX })?;

    let buffer = ForeignBuffer::zeroed(size)?;
    slot.set(needed)?;
    let rv = call(buffer.as_ptr()?, slot.as_ptr()?);
    if rv == u64::from(CKR_BUFFER_TOO_SMALL) {
        return Err(grew(what, needed, slot.get()?));
    }
    check(rv)?;
    let actual = slot.get()?;
    if actual > needed {
        return Err(grew(what, needed, actual));
    }
    let mut bytes = buffer.to_vec()?;
    bytes.truncate(actual as usize * unit);
    Ok(bytes)
}

/// Fetch a byte string (`CK_BYTE_PTR`, `CK_ULONG_PTR`).
///
/// A zero length from the first call returns an empty vector without a
/// second call. The second call may shrink the length but not grow it.
pub fn fetch_bytes<F>(profile: AbiProfile, call: F) -> MarshalResult<Vec<u8>>
where
    F: FnMut(*mut u8, *mut u8) -> ReturnValue,
{
    fetch_units(profile, 1, "byte buffer", call)
}

/// Fetch an array of `CK_ULONG` (slot lists, mechanism lists). The length is
/// an element count.
pub fn fetch_ulongs<F>(profile: AbiProfile, call: F) -> MarshalResult<Vec<u64>>
where
    F: FnMut(*mut u8, *mut u8) -> ReturnValue,
{
    let size = profile.ulong_size();
    let bytes = fetch_units(profile, size, "CK_ULONG array", call)?;
    bytes
        .chunks_exact(size)
        .map(|chunk| ulong_from_bytes(profile, chunk))
        .collect()
}

/// Fetch attribute values the way `C_GetAttributeValue` expects.
///
/// `call` receives the template pointer and the record count. Entries the
/// token reports as unavailable (`CK_UNAVAILABLE_INFORMATION`) come back as
/// `None`. List attributes take a third call to fill their nested entries.
pub fn fetch_attributes<F>(
    profile: AbiProfile,
    requests: &[(AttributeType, AttributeKind)],
    mut call: F,
) -> MarshalResult<Vec<Option<AttributeValue>>>
where
    F: FnMut(*mut u8, usize) -> ReturnValue,
{
    let unavailable = profile.ulong_max();
    let types: Vec<AttributeType> = requests.iter().map(|(ty, _)| *ty).collect();

    let query = AttributeTemplate::query(profile, &types)?;
    check_attributes(call(query.as_ptr()?, query.count()))?;
    let lengths: Vec<u64> = query.records()?.iter().map(|r| r.value_len).collect();
    drop(query);
    debug!(count = requests.len(), "attribute lengths queried");

    let sized = requests
        .iter()
        .zip(&lengths)
        .map(|(&(ty, _), &len)| {
            if len == unavailable {
                return Ok(Attribute::empty(profile, ty));
            }
            let len = usize::try_from(len).map_err(|_| MarshalError::AllocationFailure { size: usize::MAX })?;
            Attribute::output(profile, ty, len)
        })
        .collect::<MarshalResult<Vec<_>>>()?;
    let mut template = AttributeTemplate::from_attributes(profile, sized)?;
    check_attributes(call(template.as_ptr()?, template.count()))?;
    let mut records = template.records()?;
    verify_lengths(&lengths, &records, unavailable)?;

    if requests
        .iter()
        .zip(&records)
        .any(|(&(_, kind), record)| kind == AttributeKind::List && is_filled(record, unavailable))
    {
        template = fill_nested(profile, requests, template, &records, unavailable)?;
        let allocated = template.records()?;
        let nested_allocated = nested_records(profile, requests, &allocated, unavailable)?;
        check_attributes(call(template.as_ptr()?, template.count()))?;
        records = template.records()?;
        verify_lengths(&capacities(&allocated), &records, unavailable)?;
        let nested = nested_records(profile, requests, &records, unavailable)?;
        for (allocated, returned) in nested_allocated.iter().zip(&nested) {
            verify_lengths(&capacities(allocated), returned, unavailable)?;
        }
    }

    requests
        .iter()
        .zip(&records)
        .map(|(&(_, kind), record)| {
            if record.value_len == unavailable {
                return Ok(None);
            }
            // SAFETY: every non-null value pointer in `records` belongs to
            // `template`, which outlives this decode, and lengths were
            // checked against what was allocated.
            unsafe { decode_native(profile, record, kind) }.map(Some)
        })
        .collect()
}

/// [`fetch_attributes`] with the built-in kind for each type.
pub fn fetch_known_attributes<F>(
    profile: AbiProfile,
    types: &[AttributeType],
    call: F,
) -> MarshalResult<Vec<Option<AttributeValue>>>
where
    F: FnMut(*mut u8, usize) -> ReturnValue,
{
    let requests: Vec<_> = types.iter().map(|&ty| (ty, kind_of(ty))).collect();
    fetch_attributes(profile, &requests, call)
}

fn is_filled(record: &NativeAttribute, unavailable: u64) -> bool {
    record.value_len != unavailable && record.value_len != 0
}

fn verify_lengths(allocated: &[u64], records: &[NativeAttribute], unavailable: u64) -> MarshalResult<()> {
    for (&allocated, record) in allocated.iter().zip(records) {
        if record.value_len != unavailable && record.value_len > allocated {
            return Err(grew("CK_ATTRIBUTE.ulValueLen", allocated, record.value_len));
        }
    }
    Ok(())
}

fn capacities(records: &[NativeAttribute]) -> Vec<u64> {
    records.iter().map(|r| r.value_len).collect()
}

/// The nested records of every filled list attribute, empty for the rest.
///
/// `records` must already be checked against what was allocated.
fn nested_records(
    profile: AbiProfile,
    requests: &[(AttributeType, AttributeKind)],
    records: &[NativeAttribute],
    unavailable: u64,
) -> MarshalResult<Vec<Vec<NativeAttribute>>> {
    requests
        .iter()
        .zip(records)
        .map(|(&(_, kind), record)| {
            if kind != AttributeKind::List || !is_filled(record, unavailable) || record.is_null() {
                return Ok(Vec::new());
            }
            // SAFETY: the array belongs to the template and its length is
            // within what was allocated.
            unsafe { list_entries(profile, record) }
        })
        .collect()
}

/// Replace each filled list attribute with an array whose nested entries
/// are sized from what the second call reported.
fn fill_nested(
    profile: AbiProfile,
    requests: &[(AttributeType, AttributeKind)],
    template: AttributeTemplate,
    records: &[NativeAttribute],
    unavailable: u64,
) -> MarshalResult<AttributeTemplate> {
    let mut attributes = Vec::with_capacity(records.len());
    for ((attribute, &(ty, kind)), record) in template.into_attributes().into_iter().zip(requests).zip(records) {
        if kind != AttributeKind::List || !is_filled(record, unavailable) {
            attributes.push(attribute);
            continue;
        }
        // SAFETY: the value buffer belongs to `attribute` and holds at least
        // `record.value_len` bytes.
        let entries = unsafe { list_entries(profile, record)? };
        let nested = entries
            .iter()
            .map(|entry| {
                if entry.value_len == unavailable {
                    return Ok(Attribute::empty(profile, entry.attr_type));
                }
                Attribute::output(profile, entry.attr_type, entry.len()?)
            })
            .collect::<MarshalResult<Vec<_>>>()?;
        debug!(attr_type = ty, entries = nested.len(), "sizing nested template");
        drop(attribute);
        attributes.push(Attribute::list(profile, ty, nested)?);
    }
    AttributeTemplate::from_attributes(profile, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};
    use crate::memory::{self, stats};
    use cryptoki_sys::{CKA_LABEL, CKA_TOKEN, CKA_VALUE, CKR_DEVICE_ERROR};

    fn write_len(profile: AbiProfile, slot: *mut u8, value: u64) {
        let bytes = ulong_bytes(profile, value).unwrap();
        unsafe { memory::write(slot, &bytes) };
    }

    fn read_len(profile: AbiProfile, slot: *mut u8) -> u64 {
        let bytes = unsafe { memory::read(slot, profile.ulong_size()) }.unwrap();
        ulong_from_bytes(profile, &bytes).unwrap()
    }

    #[test]
    fn test_fetch_bytes_two_phase() {
        for profile in AbiProfile::ALL {
            let before = stats();
            let mut calls = 0;
            let data = fetch_bytes(profile, |buf, len| {
                calls += 1;
                if buf.is_null() {
                    write_len(profile, len, 5);
                } else {
                    assert_eq!(read_len(profile, len), 5);
                    unsafe { memory::write(buf, b"token") };
                }
                u64::from(CKR_OK)
            })
            .unwrap();
            assert_eq!(data, b"token");
            assert_eq!(calls, 2);
            assert_eq!(stats().since(before).outstanding(), 0);
        }
    }

    #[test]
    fn test_zero_length_skips_second_call() {
        let mut calls = 0;
        let data = fetch_bytes(AbiProfile::host(), |_, _| {
            calls += 1;
            u64::from(CKR_OK)
        })
        .unwrap();
        assert!(data.is_empty());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_length_may_shrink_but_not_grow() {
        let profile = AbiProfile::host();
        let shrunk = fetch_bytes(profile, |buf, len| {
            if buf.is_null() {
                write_len(profile, len, 8);
            } else {
                unsafe { memory::write(buf, b"abc") };
                write_len(profile, len, 3);
            }
            u64::from(CKR_OK)
        })
        .unwrap();
        assert_eq!(shrunk, b"abc");

        let grown = fetch_bytes(profile, |buf, len| {
            write_len(profile, len, if buf.is_null() { 4 } else { 9 });
            u64::from(CKR_OK)
        });
        assert!(matches!(grown, Err(MarshalError::InvalidLength { .. })));
    }

    #[test]
    fn test_native_error_is_passed_through() {
        let before = stats();
        let result = fetch_bytes(AbiProfile::host(), |_, _| u64::from(CKR_DEVICE_ERROR));
        assert_eq!(result, Err(MarshalError::Native { rv: u64::from(CKR_DEVICE_ERROR) }));
        assert_eq!(stats().since(before).outstanding(), 0);
    }

    #[test]
    fn test_fetch_ulongs_counts_elements() {
        let profile = AbiProfile::new(UlongWidth::Four, Packing::Tight);
        let mechanisms = [0x1u64, 0x40, 0x1082];
        let list = fetch_ulongs(profile, |buf, len| {
            write_len(profile, len, mechanisms.len() as u64);
            if !buf.is_null() {
                let bytes: Vec<u8> = mechanisms
                    .iter()
                    .flat_map(|m| ulong_bytes(profile, *m).unwrap())
                    .collect();
                unsafe { memory::write(buf, &bytes) };
            }
            u64::from(CKR_OK)
        })
        .unwrap();
        assert_eq!(list, mechanisms);
    }

    #[test]
    fn test_fetch_attributes_marks_unavailable() {
        for profile in AbiProfile::ALL {
            let before = stats();
            let values = fetch_known_attributes(
                profile,
                &[u64::from(CKA_LABEL), u64::from(CKA_VALUE), u64::from(CKA_TOKEN)],
                |template, count| {
                    assert_eq!(count, 3);
                    let mut rv = u64::from(CKR_OK);
                    for index in 0..count {
                        let mut record = unsafe { NativeAttribute::read_at(profile, template, index) }.unwrap();
                        match index {
                            0 if record.is_null() => record.value_len = 4,
                            0 => unsafe { memory::write(record.value, b"key1") },
                            1 => {
                                record.value_len = profile.ulong_max();
                                rv = u64::from(CKR_ATTRIBUTE_SENSITIVE);
                            }
                            _ if record.is_null() => record.value_len = 1,
                            _ => unsafe { memory::write(record.value, &[1]) },
                        }
                        unsafe { record.write_at(profile, template, index) }.unwrap();
                    }
                    rv
                },
            )
            .unwrap();
            assert_eq!(
                values,
                vec![
                    Some(AttributeValue::Text(Some("key1".to_string()))),
                    None,
                    Some(AttributeValue::Bool(true)),
                ]
            );
            assert_eq!(stats().since(before).outstanding(), 0);
        }
    }
}
