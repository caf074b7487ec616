//! ABI profiles for Cryptoki libraries.
//!
//! A Cryptoki library is compiled with a `CK_ULONG` of either 4 or 8 bytes
//! and with either natural structure alignment or `#pragma pack(1)`. Every
//! codec in this crate takes an [`AbiProfile`] instead of being duplicated
//! per combination.
//!
//! # Module Organization
//!
//! - [`layout`]: Field offsets and structure sizes for a profile
//! - [`buffer`]: Bounds-checked scalar read/write helpers

pub mod buffer;
pub mod layout;

use std::fmt;

use once_cell::sync::OnceCell;

use crate::error::{MarshalError, MarshalResult};
use crate::logging::info;

pub use layout::{FieldLayout, LayoutBuilder, Scalar, StructLayout};

/// Width of the native `CK_ULONG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UlongWidth {
    Four,
    Eight,
}

impl UlongWidth {
    /// Size in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            UlongWidth::Four => 4,
            UlongWidth::Eight => 8,
        }
    }

    /// Parse a byte count (4 or 8).
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            4 => Some(UlongWidth::Four),
            8 => Some(UlongWidth::Eight),
            _ => None,
        }
    }
}

/// Structure packing convention of the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "config",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "lowercase")
)]
pub enum Packing {
    /// `#pragma pack(1)`: no padding between fields.
    Tight,
    /// Natural C alignment.
    Natural,
}

/// Native integer width and structure packing of a Cryptoki library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbiProfile {
    pub ulong: UlongWidth,
    pub packing: Packing,
}

impl AbiProfile {
    /// All four supported combinations.
    pub const ALL: [AbiProfile; 4] = [
        AbiProfile::new(UlongWidth::Four, Packing::Tight),
        AbiProfile::new(UlongWidth::Four, Packing::Natural),
        AbiProfile::new(UlongWidth::Eight, Packing::Tight),
        AbiProfile::new(UlongWidth::Eight, Packing::Natural),
    ];

    pub const fn new(ulong: UlongWidth, packing: Packing) -> Self {
        Self { ulong, packing }
    }

    /// The convention Cryptoki headers use on the current platform.
    ///
    /// Windows builds use a 4-byte `unsigned long` and `pack(1)`; everything
    /// else uses the platform `unsigned long` with natural alignment.
    pub const fn host() -> Self {
        if cfg!(windows) {
            Self::new(UlongWidth::Four, Packing::Tight)
        } else if cfg!(target_pointer_width = "64") {
            Self::new(UlongWidth::Eight, Packing::Natural)
        } else {
            Self::new(UlongWidth::Four, Packing::Natural)
        }
    }

    /// Size of `CK_ULONG` in bytes.
    pub const fn ulong_size(&self) -> usize {
        self.ulong.bytes()
    }

    /// Size of a data pointer in bytes. Always the running process's width.
    pub const fn pointer_size(&self) -> usize {
        std::mem::size_of::<*const u8>()
    }

    /// The largest `CK_ULONG` value, which doubles as
    /// `CK_UNAVAILABLE_INFORMATION`.
    pub const fn ulong_max(&self) -> u64 {
        match self.ulong {
            UlongWidth::Four => u32::MAX as u64,
            UlongWidth::Eight => u64::MAX,
        }
    }

    /// Effective alignment of a field whose natural alignment is `natural`.
    pub const fn align(&self, natural: usize) -> usize {
        match self.packing {
            Packing::Tight => 1,
            Packing::Natural => natural,
        }
    }

    /// Size of `CK_ATTRIBUTE` (and `CK_MECHANISM`) under this profile.
    pub fn pointer_record_size(&self) -> usize {
        StructLayout::builder(*self)
            .scalar(Scalar::Ulong)
            .scalar(Scalar::Pointer)
            .scalar(Scalar::Ulong)
            .finish()
            .size
    }

    /// Check sizes reported by (or probed from) a loaded native library.
    ///
    /// Any mismatch means every offset computed by this profile is wrong, so
    /// it is reported rather than corrected.
    pub fn verify_native(&self, ulong_size: usize, attribute_size: usize) -> MarshalResult<()> {
        let expected = self.pointer_record_size();
        if ulong_size != self.ulong_size() || attribute_size != expected {
            return Err(MarshalError::unsupported_abi(
                *self,
                format!("{ulong_size}-byte CK_ULONG, {attribute_size}-byte CK_ATTRIBUTE"),
            ));
        }
        Ok(())
    }
}

impl Default for AbiProfile {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for AbiProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let packing = match self.packing {
            Packing::Tight => "tight",
            Packing::Natural => "natural",
        };
        write!(f, "{}-byte CK_ULONG, {} packing", self.ulong_size(), packing)
    }
}

static SELECTED: OnceCell<AbiProfile> = OnceCell::new();

/// Fix the process-wide profile.
///
/// The first call wins. Selecting the same profile again is accepted;
/// selecting a different one fails with [`MarshalError::UnsupportedAbi`].
pub fn select(profile: AbiProfile) -> MarshalResult<AbiProfile> {
    let selected = *SELECTED.get_or_init(|| {
        info!(profile = %profile, "selected Cryptoki ABI profile");
        profile
    });
    if selected != profile {
        return Err(MarshalError::unsupported_abi(selected, profile));
    }
    Ok(selected)
}

/// The process-wide profile, defaulting to [`AbiProfile::host`].
pub fn current() -> AbiProfile {
    *SELECTED.get_or_init(AbiProfile::host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_record_sizes() {
        if cfg!(target_pointer_width = "64") {
            let sizes: Vec<usize> = AbiProfile::ALL
                .iter()
                .map(|p| p.pointer_record_size())
                .collect();
            // 4/tight, 4/natural, 8/tight, 8/natural
            assert_eq!(sizes, vec![16, 24, 24, 24]);
        }
    }

    #[test]
    fn test_ulong_max() {
        let four = AbiProfile::new(UlongWidth::Four, Packing::Natural);
        let eight = AbiProfile::new(UlongWidth::Eight, Packing::Natural);
        assert_eq!(four.ulong_max(), 0xFFFF_FFFF);
        assert_eq!(eight.ulong_max(), u64::MAX);
    }

    #[test]
    fn test_verify_native_mismatch() {
        let profile = AbiProfile::new(UlongWidth::Eight, Packing::Natural);
        let record = profile.pointer_record_size();
        assert!(profile.verify_native(8, record).is_ok());
        assert!(matches!(
            profile.verify_native(4, record),
            Err(MarshalError::UnsupportedAbi { .. })
        ));
    }

    #[test]
    fn test_select_is_sticky() {
        let first = current();
        assert_eq!(select(first), Ok(first));
        let other = AbiProfile::ALL
            .into_iter()
            .find(|p| *p != first)
            .unwrap_or(first);
        if other != first {
            assert!(select(other).is_err());
        }
        assert_eq!(current(), first);
    }
}
