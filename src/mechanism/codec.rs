//! Encoding mechanism parameters into foreign memory and reading results
//! back.
//!
//! A [`Mechanism`] owns the `CK_MECHANISM` record, the top-level parameter
//! block and one child allocation per nested pointer. All of them are
//! released together.

use std::ptr;

use super::spec::{FieldKind, FieldSpec, ParamSpec};
use super::table;
use super::value::{FieldValue, ParamValues};
use crate::abi::buffer::{
    read_byte, read_pointer, read_slice, read_ulong, ulong_bytes, ulong_from_bytes, write_byte,
    write_pointer, write_slice, write_ulong,
};
use crate::abi::{AbiProfile, StructLayout};
use crate::error::{MarshalError, MarshalResult};
use crate::logging::{debug, trace};
use crate::memory;
use crate::owned::ForeignBuffer;
use crate::record::NativeMechanism;

/// `CK_MECHANISM_TYPE` widened to 64 bits.
pub type MechanismType = u64;

/// The semantic parameter of a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanismParameter {
    /// No parameter (`{NULL, 0}`).
    None,
    /// A bare `CK_ULONG` (`CK_MAC_GENERAL_PARAMS`, `CK_EXTRACT_PARAMS`, ...).
    Ulong(u64),
    /// Raw bytes, typically an IV.
    Bytes(Vec<u8>),
    /// A structured parameter.
    Struct(ParamValues),
}

impl MechanismParameter {
    /// Short name of the parameter form, or the structure's C name.
    pub fn type_name(&self) -> &'static str {
        match self {
            MechanismParameter::None => "none",
            MechanismParameter::Ulong(_) => "CK_ULONG",
            MechanismParameter::Bytes(_) => "bytes",
            MechanismParameter::Struct(values) => values.spec().name,
        }
    }
}

/// An encoded mechanism.
#[derive(Debug)]
pub struct Mechanism {
    mechanism: MechanismType,
    profile: AbiProfile,
    parameter: MechanismParameter,
    record: ForeignBuffer,
    block: ForeignBuffer,
    children: Vec<ForeignBuffer>,
}

impl Mechanism {
    /// Validate and encode `parameter` for `mechanism`.
    ///
    /// Nothing is allocated if the parameter does not have the shape the
    /// mechanism expects or fails validation.
    pub fn new(
        profile: AbiProfile,
        mechanism: MechanismType,
        parameter: MechanismParameter,
    ) -> MarshalResult<Self> {
        table::check(mechanism, &parameter)?;
        if let MechanismParameter::Struct(values) = &parameter {
            values.validate(profile)?;
        }
        debug!(
            mechanism = %format_args!("{mechanism:#x}"),
            parameter = parameter.type_name(),
            "encoding mechanism"
        );

        let mut encoder = Encoder {
            profile,
            children: Vec::new(),
        };
        let image = match &parameter {
            MechanismParameter::None => Vec::new(),
            MechanismParameter::Ulong(v) => ulong_bytes(profile, *v)?,
            MechanismParameter::Bytes(bytes) => bytes.clone(),
            MechanismParameter::Struct(values) => encoder.image(values)?,
        };
        let block = ForeignBuffer::from_bytes(&image)?;
        let native = NativeMechanism {
            mechanism,
            parameter: block.as_ptr()?,
            parameter_len: block.len() as u64,
        };
        let record = ForeignBuffer::from_bytes(&native.to_bytes(profile)?)?;
        trace!(
            children = encoder.children.len(),
            block = block.len(),
            "mechanism encoded"
        );
        Ok(Self {
            mechanism,
            profile,
            parameter,
            record,
            block,
            children: encoder.children,
        })
    }

    /// A mechanism without a parameter.
    pub fn without_parameter(profile: AbiProfile, mechanism: MechanismType) -> MarshalResult<Self> {
        Self::new(profile, mechanism, MechanismParameter::None)
    }

    pub fn mechanism_type(&self) -> MechanismType {
        self.mechanism
    }

    pub fn profile(&self) -> AbiProfile {
        self.profile
    }

    /// The parameter as it was supplied.
    pub fn parameter(&self) -> &MechanismParameter {
        &self.parameter
    }

    /// The record native code sees.
    pub fn as_native(&self) -> MarshalResult<NativeMechanism> {
        self.record.as_ptr()?;
        Ok(NativeMechanism {
            mechanism: self.mechanism,
            parameter: self.block.as_ptr()?,
            parameter_len: self.block.len() as u64,
        })
    }

    /// Pointer to the `CK_MECHANISM` record (`CK_MECHANISM_PTR`).
    pub fn as_ptr(&self) -> MarshalResult<*mut u8> {
        self.record.as_ptr()
    }

    /// Number of foreign allocations owned, including the record.
    pub fn allocation_count(&self) -> usize {
        [&self.record, &self.block]
            .into_iter()
            .chain(&self.children)
            .filter(|buffer| !buffer.is_null())
            .count()
    }

    /// Current bytes of the top-level parameter block.
    pub fn parameter_bytes(&self) -> MarshalResult<Vec<u8>> {
        self.block.to_vec()
    }

    /// Read the parameter back after native code has written into it.
    ///
    /// Only structures that carry results are readable; bare ulong and byte
    /// parameters are returned as they are now in memory.
    pub fn decode_parameter(&self) -> MarshalResult<MechanismParameter> {
        let image = self.block.to_vec()?;
        match &self.parameter {
            MechanismParameter::None => Ok(MechanismParameter::None),
            MechanismParameter::Ulong(_) => {
                Ok(MechanismParameter::Ulong(ulong_from_bytes(self.profile, &image)?))
            }
            MechanismParameter::Bytes(_) => Ok(MechanismParameter::Bytes(image)),
            MechanismParameter::Struct(values) => {
                if !values.spec().readable {
                    return Err(MarshalError::WriteOnly(values.spec().name));
                }
                let reader = Reader {
                    profile: self.profile,
                };
                reader
                    .read(values, &image, 0)
                    .map(MechanismParameter::Struct)
            }
        }
    }

    /// Release every allocation. Idempotent.
    pub fn dispose(&mut self) {
        if self.record.is_disposed() {
            return;
        }
        trace!(
            mechanism = %format_args!("{:#x}", self.mechanism),
            children = self.children.len(),
            "disposing mechanism"
        );
        for child in &mut self.children {
            child.dispose();
        }
        self.block.dispose();
        self.record.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.record.is_disposed()
    }
}

impl Drop for Mechanism {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn field_offset(layout: &StructLayout, spec: &ParamSpec, index: usize) -> MarshalResult<usize> {
    layout
        .offset(index)
        .ok_or_else(|| MarshalError::length(spec.name, spec.fields.len(), index))
}

/// Builds native images, collecting every child allocation it makes.
struct Encoder {
    profile: AbiProfile,
    children: Vec<ForeignBuffer>,
}

impl Encoder {
    fn image(&mut self, values: &ParamValues) -> MarshalResult<Vec<u8>> {
        let layout = values.spec().layout(self.profile);
        let mut image = vec![0u8; layout.size];
        self.fill(values, &layout, &mut image, 0)?;
        Ok(image)
    }

    fn own(&mut self, buffer: ForeignBuffer) -> MarshalResult<*mut u8> {
        let ptr = buffer.as_ptr()?;
        self.children.push(buffer);
        Ok(ptr)
    }

    fn own_bytes(&mut self, bytes: &[u8]) -> MarshalResult<*mut u8> {
        self.own(ForeignBuffer::from_bytes(bytes)?)
    }

    fn fill(
        &mut self,
        values: &ParamValues,
        layout: &StructLayout,
        image: &mut [u8],
        base: usize,
    ) -> MarshalResult<()> {
        let spec = values.spec();
        let profile = self.profile;
        for (index, field) in spec.fields.iter().enumerate() {
            let offset = base + field_offset(layout, spec, index)?;
            let value = values.at(index);
            match (field.kind, value) {
                (FieldKind::Ulong, Some(FieldValue::Ulong(v))) => {
                    write_ulong(image, offset, profile, *v)?;
                }
                (FieldKind::Byte, Some(FieldValue::Byte(b))) => write_byte(image, offset, *b)?,
                (FieldKind::Length, _) => {
                    let len = values.computed_length(field.name)?;
                    write_ulong(image, offset, profile, len)?;
                }
                (FieldKind::LengthPtr, _) => {
                    let len = values.computed_length(field.name)?;
                    let slot = self.own_bytes(&ulong_bytes(profile, len)?)?;
                    write_pointer(image, offset, slot)?;
                }
                (
                    FieldKind::Buffer { .. }
                    | FieldKind::BufferLenPtr { .. }
                    | FieldKind::FixedBuffer(_)
                    | FieldKind::Output,
                    Some(value),
                ) => {
                    let ptr = match value {
                        FieldValue::Bytes(bytes) => {
                            self.own_bytes(bytes.as_deref().unwrap_or_default())?
                        }
                        FieldValue::Output(size) => self.own(ForeignBuffer::zeroed(*size)?)?,
                        _ => ptr::null_mut(),
                    };
                    write_pointer(image, offset, ptr)?;
                }
                (FieldKind::Array(_), Some(FieldValue::Bytes(Some(bytes)))) => {
                    write_slice(image, offset, bytes)?;
                }
                (FieldKind::Text, Some(FieldValue::Text(text))) => {
                    let ptr = match text {
                        Some(text) => {
                            let mut bytes = text.as_bytes().to_vec();
                            bytes.push(0);
                            self.own_bytes(&bytes)?
                        }
                        None => ptr::null_mut(),
                    };
                    write_pointer(image, offset, ptr)?;
                }
                (FieldKind::Inline(nested), Some(FieldValue::Struct(inner))) => {
                    let nested_layout = nested.layout(profile);
                    self.fill(inner, &nested_layout, image, offset)?;
                }
                (FieldKind::Pointer(_), Some(FieldValue::Struct(inner))) => {
                    let bytes = self.image(inner)?;
                    let ptr = self.own_bytes(&bytes)?;
                    write_pointer(image, offset, ptr)?;
                }
                (FieldKind::StructArray { spec: element, .. }, Some(FieldValue::StructList(items))) => {
                    let element_layout = element.layout(profile);
                    let mut array = vec![0u8; element_layout.size * items.len()];
                    for (i, item) in items.iter().enumerate() {
                        self.fill(item, &element_layout, &mut array, i * element_layout.size)?;
                    }
                    let ptr = self.own_bytes(&array)?;
                    write_pointer(image, offset, ptr)?;
                }
                (FieldKind::Pointer(_) | FieldKind::StructArray { .. }, Some(FieldValue::Null)) => {
                    write_pointer(image, offset, ptr::null())?;
                }
                (_, _) => return Err(mismatch(spec, field)),
            }
        }
        Ok(())
    }
}

fn mismatch(spec: &ParamSpec, field: &FieldSpec) -> MarshalError {
    MarshalError::FieldKindMismatch {
        structure: spec.name,
        field: field.name,
        expected: field.kind.describe(),
    }
}

/// Reads images back, bounded by the sizes that were encoded.
struct Reader {
    profile: AbiProfile,
}

impl Reader {
    fn read(&self, encoded: &ParamValues, image: &[u8], base: usize) -> MarshalResult<ParamValues> {
        let spec = encoded.spec();
        let layout = spec.layout(self.profile);
        let profile = self.profile;
        let mut out = ParamValues::new(spec);
        for (index, field) in spec.fields.iter().enumerate() {
            let offset = base + field_offset(&layout, spec, index)?;
            let encoded_value = encoded.at(index);
            let decoded = match field.kind {
                FieldKind::Ulong | FieldKind::Length => {
                    FieldValue::Ulong(read_ulong(image, offset, profile)?)
                }
                FieldKind::Byte => FieldValue::Byte(read_byte(image, offset)?),
                FieldKind::LengthPtr => {
                    let slot = read_pointer(image, offset)?;
                    FieldValue::Ulong(self.ulong_at(slot)?)
                }
                FieldKind::Buffer { len } => {
                    let capacity = encoded_value.map_or(0, FieldValue::data_len);
                    let len_at = base + self.offset_of(spec, &layout, len)?;
                    let actual = read_ulong(image, len_at, profile)?;
                    self.bytes_at(field, read_pointer(image, offset)?, actual, capacity)?
                }
                FieldKind::BufferLenPtr { len } => {
                    let capacity = encoded_value.map_or(0, FieldValue::data_len);
                    let len_at = base + self.offset_of(spec, &layout, len)?;
                    let actual = self.ulong_at(read_pointer(image, len_at)?)?;
                    self.bytes_at(field, read_pointer(image, offset)?, actual, capacity)?
                }
                FieldKind::FixedBuffer(_) | FieldKind::Output => {
                    let capacity = encoded_value.map_or(0, FieldValue::data_len);
                    let ptr = read_pointer(image, offset)?;
                    self.bytes_at(field, ptr, capacity as u64, capacity)?
                }
                FieldKind::Array(n) => FieldValue::Bytes(Some(read_slice(image, offset, n)?.to_vec())),
                FieldKind::Text => {
                    let ptr = read_pointer(image, offset)?;
                    let capacity = encoded_value.map_or(0, FieldValue::data_len);
                    match self.bytes_at(field, ptr, capacity as u64, capacity)? {
                        FieldValue::Bytes(Some(bytes)) => FieldValue::Text(Some(
                            String::from_utf8(bytes).map_err(|_| MarshalError::InvalidUtf8)?,
                        )),
                        _ => FieldValue::Text(None),
                    }
                }
                FieldKind::Inline(_) => match encoded_value {
                    Some(FieldValue::Struct(inner)) => {
                        FieldValue::Struct(self.read(inner, image, offset)?)
                    }
                    _ => return Err(mismatch(spec, field)),
                },
                FieldKind::Pointer(nested) => {
                    let ptr = read_pointer(image, offset)?;
                    match encoded_value {
                        Some(FieldValue::Struct(inner)) if !ptr.is_null() => {
                            // SAFETY: the pointer was produced by the encoder
                            // and refers to a live child of this mechanism.
                            let bytes = unsafe { memory::read(ptr, nested.size(profile))? };
                            FieldValue::Struct(self.read(inner, &bytes, 0)?)
                        }
                        _ => FieldValue::Null,
                    }
                }
                FieldKind::StructArray { spec: element, count } => {
                    let ptr = read_pointer(image, offset)?;
                    let count_at = base + self.offset_of(spec, &layout, count)?;
                    let count = read_ulong(image, count_at, profile)?;
                    match encoded_value {
                        Some(FieldValue::StructList(items)) if !ptr.is_null() => {
                            if count != items.len() as u64 {
                                return Err(MarshalError::length(field.name, items.len(), count as usize));
                            }
                            let size = element.size(profile);
                            // SAFETY: the array was allocated by the encoder
                            // with exactly `items.len()` elements.
                            let bytes = unsafe { memory::read(ptr, size * items.len())? };
                            let decoded = items
                                .iter()
                                .enumerate()
                                .map(|(i, item)| self.read(item, &bytes, i * size))
                                .collect::<MarshalResult<Vec<_>>>()?;
                            FieldValue::StructList(decoded)
                        }
                        _ => FieldValue::Null,
                    }
                }
            };
            out.set(field.name, decoded);
        }
        Ok(out)
    }

    fn offset_of(&self, spec: &ParamSpec, layout: &StructLayout, name: &str) -> MarshalResult<usize> {
        let index = spec.index_of(name).ok_or_else(|| MarshalError::UnknownField {
            structure: spec.name,
            field: name.to_string(),
        })?;
        field_offset(layout, spec, index)
    }

    fn ulong_at(&self, slot: *mut u8) -> MarshalResult<u64> {
        // SAFETY: length slots are allocated by the encoder with exactly one
        // ulong for this profile.
        let bytes = unsafe { memory::read(slot, self.profile.ulong_size())? };
        ulong_from_bytes(self.profile, &bytes)
    }

    /// Bytes at `ptr`, refusing lengths past what was allocated.
    fn bytes_at(
        &self,
        field: &FieldSpec,
        ptr: *mut u8,
        actual: u64,
        capacity: usize,
    ) -> MarshalResult<FieldValue> {
        let len = usize::try_from(actual)
            .ok()
            .filter(|len| *len <= capacity)
            .ok_or_else(|| MarshalError::length(field.name, format!("at most {capacity}"), actual as usize))?;
        if ptr.is_null() || len == 0 {
            return Ok(FieldValue::Bytes(None));
        }
        // SAFETY: `ptr` came from the encoder with `capacity >= len` bytes.
        let bytes = unsafe { memory::read(ptr, len)? };
        Ok(FieldValue::Bytes(Some(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{Packing, UlongWidth};
    use crate::mechanism::spec::{
        CMS_SIG_PARAMS, GCM_PARAMS, KEA_DERIVE_PARAMS, MECHANISM, RSA_PKCS_PSS_PARAMS,
    };
    use crate::memory::{stats, AllocStats};
    use cryptoki_sys::{CKM_AES_GCM, CKM_CMS_SIG, CKM_KEA_KEY_DERIVE, CKM_SHA256, CKM_SHA256_RSA_PKCS_PSS};

    fn gcm(aad: Option<Vec<u8>>) -> ParamValues {
        ParamValues::new(&GCM_PARAMS)
            .with("pIv", vec![7u8; 12])
            .with("ulIvBits", 96u64)
            .with("pAAD", FieldValue::Bytes(aad))
            .with("ulTagBits", 128u64)
    }

    #[test]
    fn test_gcm_image_per_profile() {
        for profile in AbiProfile::ALL {
            let mechanism = Mechanism::new(
                profile,
                u64::from(CKM_AES_GCM),
                MechanismParameter::Struct(gcm(Some(vec![1, 2, 3]))),
            )
            .unwrap();
            let layout = GCM_PARAMS.layout(profile);
            let image = mechanism.parameter_bytes().unwrap();
            assert_eq!(image.len(), layout.size);

            let iv_len = read_ulong(&image, layout.offset(1).unwrap(), profile).unwrap();
            let aad_len = read_ulong(&image, layout.offset(4).unwrap(), profile).unwrap();
            assert_eq!((iv_len, aad_len), (12, 3));

            let iv_ptr = read_pointer(&image, layout.offset(0).unwrap()).unwrap();
            assert_eq!(unsafe { memory::read(iv_ptr, 12) }.unwrap(), vec![7u8; 12]);
            // record + block + iv + aad
            assert_eq!(mechanism.allocation_count(), 4);
        }
    }

    #[test]
    fn test_parameter_type_names() {
        assert_eq!(MechanismParameter::None.type_name(), "none");
        assert_eq!(MechanismParameter::Ulong(16).type_name(), "CK_ULONG");
        assert_eq!(MechanismParameter::Struct(gcm(None)).type_name(), "CK_GCM_PARAMS");
    }

    #[test]
    fn test_null_aad_is_not_allocated() {
        let mechanism = Mechanism::new(
            AbiProfile::host(),
            u64::from(CKM_AES_GCM),
            MechanismParameter::Struct(gcm(None)),
        )
        .unwrap();
        assert_eq!(mechanism.allocation_count(), 3);
    }

    #[test]
    fn test_dispose_releases_everything_once() {
        let before = stats();
        let mut mechanism = Mechanism::new(
            AbiProfile::host(),
            u64::from(CKM_AES_GCM),
            MechanismParameter::Struct(gcm(Some(vec![0u8; 4]))),
        )
        .unwrap();
        mechanism.dispose();
        mechanism.dispose();
        assert!(mechanism.is_disposed());
        assert_eq!(
            mechanism.as_native(),
            Err(MarshalError::DisposedObjectAccess("foreign buffer"))
        );
        drop(mechanism);
        assert_eq!(stats().since(before), AllocStats { allocated: 4, freed: 4 });
    }

    #[test]
    fn test_mismatched_random_lengths_allocate_nothing() {
        let params = ParamValues::new(&KEA_DERIVE_PARAMS)
            .with("isSender", false)
            .with("pRandomA", vec![1u8; 20])
            .with("pRandomB", vec![2u8; 21])
            .with("pPublicData", vec![3u8; 128]);
        let before = stats();
        let result = Mechanism::new(
            AbiProfile::host(),
            u64::from(CKM_KEA_KEY_DERIVE),
            MechanismParameter::Struct(params),
        );
        assert!(matches!(result, Err(MarshalError::ArgumentMismatch { .. })));
        assert_eq!(stats().since(before), AllocStats::default());
    }

    #[test]
    fn test_write_only_structure() {
        let pss = ParamValues::new(&RSA_PKCS_PSS_PARAMS)
            .with("hashAlg", u64::from(CKM_SHA256))
            .with("mgf", 2u64)
            .with("sLen", 32u64);
        let mechanism = Mechanism::new(
            AbiProfile::host(),
            u64::from(CKM_SHA256_RSA_PKCS_PSS),
            MechanismParameter::Struct(pss),
        )
        .unwrap();
        assert_eq!(
            mechanism.decode_parameter(),
            Err(MarshalError::WriteOnly("CK_RSA_PKCS_PSS_PARAMS"))
        );
    }

    #[test]
    fn test_nested_mechanism_pointers_and_text() {
        let profile = AbiProfile::new(UlongWidth::Four, Packing::Tight);
        let signing = ParamValues::new(&MECHANISM)
            .with("mechanism", u64::from(CKM_SHA256_RSA_PKCS_PSS))
            .with("pParameter", FieldValue::Bytes(None));
        let params = ParamValues::new(&CMS_SIG_PARAMS)
            .with("certificateHandle", 42u64)
            .with("pSigningMechanism", signing)
            .with("pDigestMechanism", FieldValue::Null)
            .with("pContentType", "data")
            .with("pRequestedAttributes", FieldValue::Bytes(None))
            .with("pRequiredAttributes", vec![0x30u8, 0x00]);
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_CMS_SIG),
            MechanismParameter::Struct(params),
        )
        .unwrap();

        let layout = CMS_SIG_PARAMS.layout(profile);
        let image = mechanism.parameter_bytes().unwrap();
        let text = read_pointer(&image, layout.offset(3).unwrap()).unwrap();
        assert_eq!(unsafe { memory::read(text, 5) }.unwrap(), b"data\0".to_vec());
        assert!(read_pointer(&image, layout.offset(2).unwrap()).unwrap().is_null());

        let signing_ptr = read_pointer(&image, layout.offset(1).unwrap()).unwrap();
        let nested = unsafe { memory::read(signing_ptr, MECHANISM.size(profile)) }.unwrap();
        assert_eq!(
            read_ulong(&nested, 0, profile).unwrap(),
            u64::from(CKM_SHA256_RSA_PKCS_PSS)
        );
    }
}
