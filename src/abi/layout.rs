//! Structure layout computation for an ABI profile.

use super::AbiProfile;

/// Align a value up to the nearest multiple of alignment.
#[inline]
pub fn align_to(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// A leaf field of a native structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// `CK_BYTE` / `CK_BBOOL`.
    Byte,
    /// `CK_ULONG` and its aliases (`CK_MECHANISM_TYPE`, handles, lengths).
    Ulong,
    /// Any data pointer.
    Pointer,
    /// Inline `CK_BYTE[n]` array.
    Bytes(usize),
}

impl Scalar {
    fn size_align(self, profile: AbiProfile) -> (usize, usize) {
        match self {
            Scalar::Byte => (1, 1),
            Scalar::Ulong => (profile.ulong_size(), profile.ulong_size()),
            Scalar::Pointer => (profile.pointer_size(), profile.pointer_size()),
            Scalar::Bytes(n) => (n, 1),
        }
    }
}

/// Offset and size of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub offset: usize,
    pub size: usize,
}

/// Computed layout of a native structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    /// One entry per field, in declaration order.
    pub fields: Vec<FieldLayout>,
    /// Total size including trailing padding.
    pub size: usize,
    /// Alignment of the structure when embedded in another one.
    pub align: usize,
}

impl StructLayout {
    pub fn builder(profile: AbiProfile) -> LayoutBuilder {
        LayoutBuilder {
            profile,
            offset: 0,
            align: 1,
            fields: Vec::new(),
        }
    }

    /// Offset of the field at `index`.
    pub fn offset(&self, index: usize) -> Option<usize> {
        self.fields.get(index).map(|f| f.offset)
    }
}

/// Incrementally lays out fields following C rules for the profile.
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    profile: AbiProfile,
    offset: usize,
    align: usize,
    fields: Vec<FieldLayout>,
}

impl LayoutBuilder {
    /// Append a scalar field.
    pub fn scalar(self, scalar: Scalar) -> Self {
        let (size, natural) = scalar.size_align(self.profile);
        self.push(size, natural)
    }

    /// Append a structure embedded by value.
    pub fn nested(self, layout: &StructLayout) -> Self {
        self.push(layout.size, layout.align)
    }

    fn push(mut self, size: usize, natural: usize) -> Self {
        let align = self.profile.align(natural);
        let offset = align_to(self.offset, align);
        self.fields.push(FieldLayout { offset, size });
        self.offset = offset + size;
        self.align = self.align.max(align);
        self
    }

    pub fn finish(self) -> StructLayout {
        StructLayout {
            size: align_to(self.offset, self.align),
            align: self.align,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};

    fn ulong_byte_ulong(profile: AbiProfile) -> StructLayout {
        StructLayout::builder(profile)
            .scalar(Scalar::Ulong)
            .scalar(Scalar::Byte)
            .scalar(Scalar::Ulong)
            .finish()
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(1, 8), 8);
        assert_eq!(align_to(9, 4), 12);
        assert_eq!(align_to(5, 1), 5);
    }

    #[test]
    fn test_natural_padding() {
        let layout = ulong_byte_ulong(AbiProfile::new(UlongWidth::Eight, Packing::Natural));
        let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(layout.size, 24);
        assert_eq!(layout.align, 8);
    }

    #[test]
    fn test_tight_packing() {
        let layout = ulong_byte_ulong(AbiProfile::new(UlongWidth::Four, Packing::Tight));
        let offsets: Vec<usize> = layout.fields.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 5]);
        assert_eq!(layout.size, 9);
        assert_eq!(layout.align, 1);
    }

    #[test]
    fn test_trailing_padding_and_nesting() {
        let profile = AbiProfile::new(UlongWidth::Four, Packing::Natural);
        // struct { CK_ULONG; CK_BYTE; } -> size 8, align 4
        let inner = StructLayout::builder(profile)
            .scalar(Scalar::Ulong)
            .scalar(Scalar::Byte)
            .finish();
        assert_eq!(inner.size, 8);

        let outer = StructLayout::builder(profile)
            .scalar(Scalar::Byte)
            .nested(&inner)
            .scalar(Scalar::Bytes(3))
            .finish();
        assert_eq!(outer.offset(1), Some(4));
        assert_eq!(outer.offset(2), Some(12));
        assert_eq!(outer.size, 16);
    }
}
