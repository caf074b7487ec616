//! Buffer read/write helpers for native structure images.
//!
//! Scalars are stored in native byte order, with `CK_ULONG` width taken from
//! the [`AbiProfile`].

use super::AbiProfile;
use crate::error::MarshalError;

/// `start..start + len`, or `BufferTooSmall` if it runs past `available`.
fn span(available: usize, start: usize, len: usize) -> Result<std::ops::Range<usize>, MarshalError> {
    match start.checked_add(len) {
        Some(end) if end <= available => Ok(start..end),
        end => Err(MarshalError::BufferTooSmall {
            needed: end.unwrap_or(usize::MAX),
            available,
        }),
    }
}

pub fn read_byte(buffer: &[u8], offset: usize) -> Result<u8, MarshalError> {
    read_slice(buffer, offset, 1)?
        .first()
        .copied()
        .ok_or(MarshalError::BufferTooSmall {
            needed: offset.saturating_add(1),
            available: buffer.len(),
        })
}

pub fn write_byte(buffer: &mut [u8], offset: usize, value: u8) -> Result<(), MarshalError> {
    write_slice(buffer, offset, &[value])
}

/// Borrow `len` bytes at `start`.
pub fn read_slice(buffer: &[u8], start: usize, len: usize) -> Result<&[u8], MarshalError> {
    let range = span(buffer.len(), start, len)?;
    buffer.get(range).ok_or(MarshalError::BufferTooSmall {
        needed: start.saturating_add(len),
        available: buffer.len(),
    })
}

/// Copy `data` into the image at `start`.
pub fn write_slice(buffer: &mut [u8], start: usize, data: &[u8]) -> Result<(), MarshalError> {
    let available = buffer.len();
    let range = span(available, start, data.len())?;
    buffer
        .get_mut(range)
        .ok_or(MarshalError::BufferTooSmall {
            needed: start.saturating_add(data.len()),
            available,
        })?
        .copy_from_slice(data);
    Ok(())
}

/// Serialize a `CK_ULONG` for the profile.
pub fn ulong_bytes(profile: AbiProfile, value: u64) -> Result<Vec<u8>, MarshalError> {
    match profile.ulong_size() {
        4 => u32::try_from(value)
            .map(|v| v.to_ne_bytes().to_vec())
            .map_err(|_| MarshalError::ValueOutOfRange { value, width: 4 }),
        _ => Ok(value.to_ne_bytes().to_vec()),
    }
}

/// Deserialize a `CK_ULONG` from exactly `profile.ulong_size()` bytes.
pub fn ulong_from_bytes(profile: AbiProfile, bytes: &[u8]) -> Result<u64, MarshalError> {
    let size = profile.ulong_size();
    if bytes.len() != size {
        return Err(MarshalError::length("CK_ULONG", size, bytes.len()));
    }
    if size == 4 {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| MarshalError::length("CK_ULONG", 4, bytes.len()))?;
        Ok(u64::from(u32::from_ne_bytes(raw)))
    } else {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| MarshalError::length("CK_ULONG", 8, bytes.len()))?;
        Ok(u64::from_ne_bytes(raw))
    }
}

/// Write a `CK_ULONG` at `offset`.
pub fn write_ulong(
    buffer: &mut [u8],
    offset: usize,
    profile: AbiProfile,
    value: u64,
) -> Result<(), MarshalError> {
    write_slice(buffer, offset, &ulong_bytes(profile, value)?)
}

/// Read a `CK_ULONG` at `offset`.
pub fn read_ulong(buffer: &[u8], offset: usize, profile: AbiProfile) -> Result<u64, MarshalError> {
    ulong_from_bytes(profile, read_slice(buffer, offset, profile.ulong_size())?)
}

/// Write a data pointer at `offset`.
pub fn write_pointer(buffer: &mut [u8], offset: usize, ptr: *const u8) -> Result<(), MarshalError> {
    write_slice(buffer, offset, &(ptr as usize).to_ne_bytes())
}

/// Read a data pointer at `offset`.
pub fn read_pointer(buffer: &[u8], offset: usize) -> Result<*mut u8, MarshalError> {
    const SIZE: usize = std::mem::size_of::<usize>();
    let bytes: [u8; SIZE] = read_slice(buffer, offset, SIZE)?
        .try_into()
        .map_err(|_| MarshalError::length("pointer", SIZE, buffer.len()))?;
    Ok(usize::from_ne_bytes(bytes) as *mut u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};

    #[test]
    fn test_ulong_width_four_rejects_large_values() {
        let profile = AbiProfile::new(UlongWidth::Four, Packing::Tight);
        assert_eq!(ulong_bytes(profile, 7).unwrap().len(), 4);
        assert_eq!(
            ulong_bytes(profile, u64::from(u32::MAX) + 1),
            Err(MarshalError::ValueOutOfRange {
                value: u64::from(u32::MAX) + 1,
                width: 4
            })
        );
    }

    #[test]
    fn test_ulong_roundtrip_at_offset() {
        let profile = AbiProfile::new(UlongWidth::Eight, Packing::Natural);
        let mut buffer = vec![0u8; 16];
        write_ulong(&mut buffer, 8, profile, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(read_ulong(&buffer, 8, profile).unwrap(), 0x1122_3344_5566_7788);
        assert!(read_ulong(&buffer, 9, profile).is_err());
    }

    #[test]
    fn test_out_of_bounds() {
        let mut image = [0u8; 4];
        assert_eq!(
            write_slice(&mut image, 3, &[1, 2]),
            Err(MarshalError::BufferTooSmall { needed: 5, available: 4 })
        );
        assert!(read_byte(&image, 4).is_err());
        assert!(read_slice(&image, usize::MAX, 2).is_err());
        write_byte(&mut image, 3, 9).unwrap();
        assert_eq!(read_byte(&image, 3), Ok(9));
    }

    #[test]
    fn test_pointer_roundtrip() {
        let value = 42u8;
        let ptr = &value as *const u8;
        let mut buffer = vec![0u8; std::mem::size_of::<usize>() + 1];
        write_pointer(&mut buffer, 1, ptr).unwrap();
        assert_eq!(read_pointer(&buffer, 1).unwrap() as *const u8, ptr);
    }
}
