//! Mechanism parameters read back after a simulated token call.

mod common;

use common::{parameter_ptr, pointer_field, read_struct, store_through, store_ulong};
use ck_marshal::memory::{self, stats, AllocStats};
use ck_marshal::mechanism::params::{self, KeyMaterialOut, KeyMaterialSizes, Version};
use ck_marshal::mechanism::spec;
use ck_marshal::{AbiProfile, MarshalError, Mechanism, MechanismParameter};
use cryptoki_sys::{
    CKG_MGF1_SHA256, CKM_AES_GCM, CKM_EDDSA, CKM_PBE_SHA1_DES3_EDE_CBC, CKM_SHA256,
    CKM_SSL3_KEY_AND_MAC_DERIVE, CKM_SSL3_MASTER_KEY_DERIVE, CKM_TLS_PRE_MASTER_KEY_GEN,
    CKM_TLS_PRF,
};

const CLIENT_RANDOM: [u8; 32] = [0xc1; 32];
const SERVER_RANDOM: [u8; 32] = [0x5e; 32];

#[test]
fn shape_mismatch_allocates_nothing() {
    for profile in AbiProfile::ALL {
        let before = stats();
        let pss = params::pss(u64::from(CKM_SHA256), u64::from(CKG_MGF1_SHA256), 32);
        let result = Mechanism::new(profile, u64::from(CKM_AES_GCM), pss);
        assert!(matches!(
            result,
            Err(MarshalError::ParameterShapeMismatch { .. })
        ));
        assert_eq!(stats().since(before), AllocStats::default());
    }
}

#[test]
fn pre_master_key_gen_carries_a_version() {
    for profile in AbiProfile::ALL {
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_TLS_PRE_MASTER_KEY_GEN),
            params::pre_master_version(3, 3),
        )
        .unwrap();
        assert_eq!(mechanism.parameter_bytes().unwrap(), vec![3, 3]);
    }
}

#[test]
fn eddsa_accepts_no_parameter_and_a_structure() {
    for profile in AbiProfile::ALL {
        let plain = Mechanism::new(profile, u64::from(CKM_EDDSA), MechanismParameter::None).unwrap();
        let native = plain.as_native().unwrap();
        assert!(native.parameter.is_null());
        assert_eq!(native.parameter_len, 0);

        let context = Mechanism::new(profile, u64::from(CKM_EDDSA), params::eddsa(false, b"ctx")).unwrap();
        assert_eq!(
            context.as_native().unwrap().parameter_len as usize,
            spec::EDDSA_PARAMS.layout(profile).size
        );
    }
}

#[test]
fn ssl3_key_material_is_read_back() {
    let sizes = KeyMaterialSizes {
        mac_bits: 160,
        key_bits: 128,
        iv_bits: 128,
        export: false,
    };
    for profile in AbiProfile::ALL {
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_SSL3_KEY_AND_MAC_DERIVE),
            params::ssl3_key_mat(sizes, &CLIENT_RANDOM, &SERVER_RANDOM).unwrap(),
        )
        .unwrap();

        // What the token does during C_DeriveKey.
        let block = read_struct(profile, &spec::SSL3_KEY_MAT_PARAMS, parameter_ptr(&mechanism));
        let out = pointer_field(profile, &spec::SSL3_KEY_MAT_PARAMS, &block, "pReturnedKeyMaterial");
        assert!(!out.is_null());
        for (field, handle) in [
            ("hClientMacSecret", 11),
            ("hServerMacSecret", 12),
            ("hClientKey", 13),
            ("hServerKey", 14),
        ] {
            store_ulong(profile, &spec::SSL3_KEY_MAT_OUT, out, field, handle);
        }
        let out_image = read_struct(profile, &spec::SSL3_KEY_MAT_OUT, out);
        let client_iv = pointer_field(profile, &spec::SSL3_KEY_MAT_OUT, &out_image, "pIVClient");
        let server_iv = pointer_field(profile, &spec::SSL3_KEY_MAT_OUT, &out_image, "pIVServer");
        unsafe {
            memory::write(client_iv, &[0xaa; 16]);
            memory::write(server_iv, &[0xbb; 16]);
        }

        let decoded = mechanism.decode_parameter().unwrap();
        let material = KeyMaterialOut::from_key_mat_params(&decoded).unwrap();
        assert_eq!(
            material,
            KeyMaterialOut {
                client_mac_secret: 11,
                server_mac_secret: 12,
                client_key: 13,
                server_key: 14,
                client_iv: vec![0xaa; 16],
                server_iv: vec![0xbb; 16],
            }
        );
    }
}

#[test]
fn master_key_version_is_read_back() {
    for profile in AbiProfile::ALL {
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_SSL3_MASTER_KEY_DERIVE),
            params::ssl3_master_key_derive(&CLIENT_RANDOM, &SERVER_RANDOM),
        )
        .unwrap();
        let block = read_struct(
            profile,
            &spec::SSL3_MASTER_KEY_DERIVE_PARAMS,
            parameter_ptr(&mechanism),
        );
        let version = pointer_field(profile, &spec::SSL3_MASTER_KEY_DERIVE_PARAMS, &block, "pVersion");
        unsafe { memory::write(version, &[3, 1]) };

        let decoded = mechanism.decode_parameter().unwrap();
        assert_eq!(
            Version::from_master_key_params(&decoded).unwrap(),
            Version { major: 3, minor: 1 }
        );
    }
}

#[test]
fn tls_prf_output_is_trimmed_to_returned_length() {
    for profile in AbiProfile::ALL {
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_TLS_PRF),
            params::tls_prf(b"seed", b"key expansion", 48),
        )
        .unwrap();
        let block = read_struct(profile, &spec::TLS_PRF_PARAMS, parameter_ptr(&mechanism));
        let output = pointer_field(profile, &spec::TLS_PRF_PARAMS, &block, "pOutput");
        let output_len = pointer_field(profile, &spec::TLS_PRF_PARAMS, &block, "pulOutputLen");

        // Before the call the length slot holds the capacity.
        let untouched = mechanism.decode_parameter().unwrap();
        assert_eq!(params::prf_output(&untouched).unwrap(), vec![0; 48]);

        unsafe { memory::write(output, &[0x42; 32]) };
        store_through(profile, output_len, 32);
        let decoded = mechanism.decode_parameter().unwrap();
        assert_eq!(params::prf_output(&decoded).unwrap(), vec![0x42; 32]);

        // A token claiming more than was allocated is not trusted.
        store_through(profile, output_len, 64);
        assert!(matches!(
            mechanism.decode_parameter(),
            Err(MarshalError::InvalidLength { .. })
        ));
    }
}

#[test]
fn pbe_init_vector_is_read_back() {
    for profile in AbiProfile::ALL {
        let mechanism = Mechanism::new(
            profile,
            u64::from(CKM_PBE_SHA1_DES3_EDE_CBC),
            params::pbe(b"password", b"saltsalt", 2048),
        )
        .unwrap();
        let block = read_struct(profile, &spec::PBE_PARAMS, parameter_ptr(&mechanism));
        let iv = pointer_field(profile, &spec::PBE_PARAMS, &block, "pInitVector");
        unsafe { memory::write(iv, &[1, 2, 3, 4, 5, 6, 7, 8]) };

        let decoded = mechanism.decode_parameter().unwrap();
        assert_eq!(
            params::pbe_init_vector(&decoded).unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
    }
}

#[test]
fn dropping_a_mechanism_frees_everything() {
    for profile in AbiProfile::ALL {
        let before = stats();
        {
            let mut mechanism = Mechanism::new(
                profile,
                u64::from(CKM_SSL3_KEY_AND_MAC_DERIVE),
                params::ssl3_key_mat(
                    KeyMaterialSizes {
                        mac_bits: 160,
                        key_bits: 128,
                        iv_bits: 64,
                        export: true,
                    },
                    &CLIENT_RANDOM,
                    &SERVER_RANDOM,
                )
                .unwrap(),
            )
            .unwrap();
            assert!(stats().since(before).outstanding() > 0);
            mechanism.dispose();
            assert!(matches!(
                mechanism.as_native(),
                Err(MarshalError::DisposedObjectAccess(_))
            ));
        }
        assert_eq!(stats().since(before).outstanding(), 0);
    }
}
