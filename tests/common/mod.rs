//! Common test utilities.
//!
//! Helpers here play the part of a Cryptoki token: they find fields inside
//! encoded parameter blocks and write results into them the way native code
//! would.

#![allow(dead_code)]

use ck_marshal::abi::buffer::{read_pointer, ulong_bytes, write_ulong};
use ck_marshal::memory;
use ck_marshal::mechanism::ParamSpec;
use ck_marshal::{AbiProfile, Mechanism};

/// Offset of `field` in `spec` for `profile`.
pub fn offset_of(profile: AbiProfile, spec: &ParamSpec, field: &str) -> usize {
    let index = spec.index_of(field).unwrap();
    spec.layout(profile).offset(index).unwrap()
}

/// The pointer stored in `field` of a structure image.
pub fn pointer_field(profile: AbiProfile, spec: &ParamSpec, image: &[u8], field: &str) -> *mut u8 {
    read_pointer(image, offset_of(profile, spec, field)).unwrap()
}

/// Read a whole structure out of foreign memory.
pub fn read_struct(profile: AbiProfile, spec: &ParamSpec, ptr: *mut u8) -> Vec<u8> {
    unsafe { memory::read(ptr, spec.size(profile)) }.unwrap()
}

/// Overwrite a `CK_ULONG` field of the structure at `ptr`.
pub fn store_ulong(profile: AbiProfile, spec: &ParamSpec, ptr: *mut u8, field: &str, value: u64) {
    let mut image = read_struct(profile, spec, ptr);
    write_ulong(&mut image, offset_of(profile, spec, field), profile, value).unwrap();
    unsafe { memory::write(ptr, &image) };
}

/// Write a `CK_ULONG` through a `CK_ULONG_PTR`.
pub fn store_through(profile: AbiProfile, slot: *mut u8, value: u64) {
    let bytes = ulong_bytes(profile, value).unwrap();
    unsafe { memory::write(slot, &bytes) };
}

/// Pointer to the top-level parameter block of a mechanism.
pub fn parameter_ptr(mechanism: &Mechanism) -> *mut u8 {
    mechanism.as_native().unwrap().parameter
}
