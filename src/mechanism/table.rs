//! Expected parameter shape per mechanism type.

use cryptoki_sys::*;

use super::codec::{MechanismParameter, MechanismType};
use super::spec::{self, ParamSpec};
use crate::error::{MarshalError, MarshalResult};

/// What a mechanism takes as `pParameter`.
#[derive(Debug, Clone, Copy)]
pub enum ParamShape {
    None,
    Ulong,
    /// Raw bytes, required (IVs).
    Bytes,
    /// Raw bytes or nothing (key wrap IVs).
    OptionalBytes,
    Struct(&'static ParamSpec),
    /// The structure or nothing (EdDSA without prehash or context).
    OptionalStruct(&'static ParamSpec),
    /// Either of two structure revisions.
    Either(&'static ParamSpec, &'static ParamSpec),
}

impl ParamShape {
    pub fn accepts(&self, parameter: &MechanismParameter) -> bool {
        match (self, parameter) {
            (ParamShape::None, MechanismParameter::None)
            | (ParamShape::Ulong, MechanismParameter::Ulong(_))
            | (ParamShape::Bytes, MechanismParameter::Bytes(_))
            | (ParamShape::OptionalBytes, MechanismParameter::None | MechanismParameter::Bytes(_)) => {
                true
            }
            (ParamShape::OptionalStruct(_), MechanismParameter::None) => true,
            (
                ParamShape::Struct(expected) | ParamShape::OptionalStruct(expected),
                MechanismParameter::Struct(values),
            ) => std::ptr::eq(*expected, values.spec()),
            (ParamShape::Either(first, second), MechanismParameter::Struct(values)) => {
                std::ptr::eq(*first, values.spec()) || std::ptr::eq(*second, values.spec())
            }
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ParamShape::None => "no parameter".to_string(),
            ParamShape::Ulong => "CK_ULONG".to_string(),
            ParamShape::Bytes => "bytes".to_string(),
            ParamShape::OptionalBytes => "optional bytes".to_string(),
            ParamShape::Struct(spec) => spec.name.to_string(),
            ParamShape::OptionalStruct(spec) => format!("optional {}", spec.name),
            ParamShape::Either(first, second) => format!("{} or {}", first.name, second.name),
        }
    }
}

/// Mechanism types grouped by parameter shape, with a display name.
type Entry = (CK_MECHANISM_TYPE, &'static str);

macro_rules! entries {
    ($($ckm:ident),* $(,)?) => {
        &[$(($ckm, stringify!($ckm))),*]
    };
}

static NO_PARAMETER: &[Entry] = entries![
    CKM_RSA_PKCS_KEY_PAIR_GEN,
    CKM_RSA_PKCS,
    CKM_RSA_X_509,
    CKM_SHA1_RSA_PKCS,
    CKM_SHA256_RSA_PKCS,
    CKM_SHA384_RSA_PKCS,
    CKM_SHA512_RSA_PKCS,
    CKM_EC_KEY_PAIR_GEN,
    CKM_ECDSA,
    CKM_ECDSA_SHA256,
    CKM_ECDSA_SHA384,
    CKM_ECDSA_SHA512,
    CKM_DSA,
    CKM_DSA_KEY_PAIR_GEN,
    CKM_DH_PKCS_KEY_PAIR_GEN,
    CKM_SHA_1,
    CKM_SHA224,
    CKM_SHA256,
    CKM_SHA384,
    CKM_SHA512,
    CKM_SHA_1_HMAC,
    CKM_SHA256_HMAC,
    CKM_SHA384_HMAC,
    CKM_SHA512_HMAC,
    CKM_AES_KEY_GEN,
    CKM_AES_ECB,
    CKM_AES_MAC,
    CKM_AES_CMAC,
    CKM_DES3_KEY_GEN,
    CKM_DES3_ECB,
    CKM_GENERIC_SECRET_KEY_GEN,
];

static ULONG_PARAMETER: &[Entry] = entries![
    CKM_SHA_1_HMAC_GENERAL,
    CKM_SHA256_HMAC_GENERAL,
    CKM_SHA384_HMAC_GENERAL,
    CKM_SHA512_HMAC_GENERAL,
    CKM_AES_MAC_GENERAL,
    CKM_AES_CMAC_GENERAL,
    CKM_DES3_MAC_GENERAL,
    CKM_EXTRACT_KEY_FROM_KEY,
    CKM_CONCATENATE_BASE_AND_KEY,
];

static IV_PARAMETER: &[Entry] = entries![
    CKM_AES_CBC,
    CKM_AES_CBC_PAD,
    CKM_AES_OFB,
    CKM_AES_CFB8,
    CKM_AES_CFB64,
    CKM_AES_CFB128,
    CKM_AES_CTS,
    CKM_DES_CBC,
    CKM_DES_CBC_PAD,
    CKM_DES3_CBC,
    CKM_DES3_CBC_PAD,
    CKM_CAMELLIA_CBC,
    CKM_CAMELLIA_CBC_PAD,
    CKM_ARIA_CBC,
    CKM_ARIA_CBC_PAD,
    CKM_SEED_CBC,
    CKM_SEED_CBC_PAD,
];

static OPTIONAL_IV_PARAMETER: &[Entry] = entries![CKM_AES_KEY_WRAP, CKM_AES_KEY_WRAP_PAD];

static STRUCT_PARAMETER: &[(CK_MECHANISM_TYPE, &str, &ParamSpec)] = &[
    (CKM_RSA_PKCS_OAEP, "CKM_RSA_PKCS_OAEP", &spec::RSA_PKCS_OAEP_PARAMS),
    (CKM_RSA_PKCS_PSS, "CKM_RSA_PKCS_PSS", &spec::RSA_PKCS_PSS_PARAMS),
    (CKM_SHA1_RSA_PKCS_PSS, "CKM_SHA1_RSA_PKCS_PSS", &spec::RSA_PKCS_PSS_PARAMS),
    (CKM_SHA256_RSA_PKCS_PSS, "CKM_SHA256_RSA_PKCS_PSS", &spec::RSA_PKCS_PSS_PARAMS),
    (CKM_SHA384_RSA_PKCS_PSS, "CKM_SHA384_RSA_PKCS_PSS", &spec::RSA_PKCS_PSS_PARAMS),
    (CKM_SHA512_RSA_PKCS_PSS, "CKM_SHA512_RSA_PKCS_PSS", &spec::RSA_PKCS_PSS_PARAMS),
    (CKM_RSA_AES_KEY_WRAP, "CKM_RSA_AES_KEY_WRAP", &spec::RSA_AES_KEY_WRAP_PARAMS),
    (CKM_ECDH1_DERIVE, "CKM_ECDH1_DERIVE", &spec::ECDH1_DERIVE_PARAMS),
    (CKM_ECDH1_COFACTOR_DERIVE, "CKM_ECDH1_COFACTOR_DERIVE", &spec::ECDH1_DERIVE_PARAMS),
    (CKM_ECMQV_DERIVE, "CKM_ECMQV_DERIVE", &spec::ECMQV_DERIVE_PARAMS),
    (CKM_ECDH_AES_KEY_WRAP, "CKM_ECDH_AES_KEY_WRAP", &spec::ECDH_AES_KEY_WRAP_PARAMS),
    (CKM_X9_42_DH_DERIVE, "CKM_X9_42_DH_DERIVE", &spec::X9_42_DH1_DERIVE_PARAMS),
    (CKM_X9_42_DH_HYBRID_DERIVE, "CKM_X9_42_DH_HYBRID_DERIVE", &spec::X9_42_DH2_DERIVE_PARAMS),
    (CKM_X9_42_MQV_DERIVE, "CKM_X9_42_MQV_DERIVE", &spec::X9_42_MQV_DERIVE_PARAMS),
    (CKM_KEA_KEY_DERIVE, "CKM_KEA_KEY_DERIVE", &spec::KEA_DERIVE_PARAMS),
    (CKM_GOSTR3410_DERIVE, "CKM_GOSTR3410_DERIVE", &spec::GOSTR3410_DERIVE_PARAMS),
    (CKM_GOSTR3410_KEY_WRAP, "CKM_GOSTR3410_KEY_WRAP", &spec::GOSTR3410_KEY_WRAP_PARAMS),
    (CKM_RC2_CBC, "CKM_RC2_CBC", &spec::RC2_CBC_PARAMS),
    (CKM_RC2_CBC_PAD, "CKM_RC2_CBC_PAD", &spec::RC2_CBC_PARAMS),
    (CKM_RC2_MAC_GENERAL, "CKM_RC2_MAC_GENERAL", &spec::RC2_MAC_GENERAL_PARAMS),
    (CKM_RC5_ECB, "CKM_RC5_ECB", &spec::RC5_PARAMS),
    (CKM_RC5_MAC, "CKM_RC5_MAC", &spec::RC5_PARAMS),
    (CKM_RC5_CBC, "CKM_RC5_CBC", &spec::RC5_CBC_PARAMS),
    (CKM_RC5_CBC_PAD, "CKM_RC5_CBC_PAD", &spec::RC5_CBC_PARAMS),
    (CKM_RC5_MAC_GENERAL, "CKM_RC5_MAC_GENERAL", &spec::RC5_MAC_GENERAL_PARAMS),
    (CKM_DES_CBC_ENCRYPT_DATA, "CKM_DES_CBC_ENCRYPT_DATA", &spec::DES_CBC_ENCRYPT_DATA_PARAMS),
    (CKM_DES3_CBC_ENCRYPT_DATA, "CKM_DES3_CBC_ENCRYPT_DATA", &spec::DES_CBC_ENCRYPT_DATA_PARAMS),
    (CKM_AES_CBC_ENCRYPT_DATA, "CKM_AES_CBC_ENCRYPT_DATA", &spec::AES_CBC_ENCRYPT_DATA_PARAMS),
    (
        CKM_CAMELLIA_CBC_ENCRYPT_DATA,
        "CKM_CAMELLIA_CBC_ENCRYPT_DATA",
        &spec::CAMELLIA_CBC_ENCRYPT_DATA_PARAMS,
    ),
    (CKM_ARIA_CBC_ENCRYPT_DATA, "CKM_ARIA_CBC_ENCRYPT_DATA", &spec::ARIA_CBC_ENCRYPT_DATA_PARAMS),
    (CKM_SEED_CBC_ENCRYPT_DATA, "CKM_SEED_CBC_ENCRYPT_DATA", &spec::SEED_CBC_ENCRYPT_DATA_PARAMS),
    (CKM_DES_ECB_ENCRYPT_DATA, "CKM_DES_ECB_ENCRYPT_DATA", &spec::KEY_DERIVATION_STRING_DATA),
    (CKM_AES_ECB_ENCRYPT_DATA, "CKM_AES_ECB_ENCRYPT_DATA", &spec::KEY_DERIVATION_STRING_DATA),
    (CKM_CONCATENATE_BASE_AND_DATA, "CKM_CONCATENATE_BASE_AND_DATA", &spec::KEY_DERIVATION_STRING_DATA),
    (CKM_CONCATENATE_DATA_AND_BASE, "CKM_CONCATENATE_DATA_AND_BASE", &spec::KEY_DERIVATION_STRING_DATA),
    (CKM_XOR_BASE_AND_DATA, "CKM_XOR_BASE_AND_DATA", &spec::KEY_DERIVATION_STRING_DATA),
    (CKM_AES_CTR, "CKM_AES_CTR", &spec::AES_CTR_PARAMS),
    (CKM_CAMELLIA_CTR, "CKM_CAMELLIA_CTR", &spec::CAMELLIA_CTR_PARAMS),
    (CKM_AES_GCM, "CKM_AES_GCM", &spec::GCM_PARAMS),
    (CKM_AES_CCM, "CKM_AES_CCM", &spec::CCM_PARAMS),
    (CKM_CHACHA20_POLY1305, "CKM_CHACHA20_POLY1305", &spec::SALSA20_CHACHA20_POLY1305_PARAMS),
    (CKM_SALSA20_POLY1305, "CKM_SALSA20_POLY1305", &spec::SALSA20_CHACHA20_POLY1305_PARAMS),
    (CKM_KEY_WRAP_SET_OAEP, "CKM_KEY_WRAP_SET_OAEP", &spec::KEY_WRAP_SET_OAEP_PARAMS),
    (CKM_SKIPJACK_PRIVATE_WRAP, "CKM_SKIPJACK_PRIVATE_WRAP", &spec::SKIPJACK_PRIVATE_WRAP_PARAMS),
    (CKM_SKIPJACK_RELAYX, "CKM_SKIPJACK_RELAYX", &spec::SKIPJACK_RELAYX_PARAMS),
    (CKM_PBE_MD5_DES_CBC, "CKM_PBE_MD5_DES_CBC", &spec::PBE_PARAMS),
    (CKM_PBE_SHA1_DES3_EDE_CBC, "CKM_PBE_SHA1_DES3_EDE_CBC", &spec::PBE_PARAMS),
    (CKM_PBE_SHA1_DES2_EDE_CBC, "CKM_PBE_SHA1_DES2_EDE_CBC", &spec::PBE_PARAMS),
    (CKM_PBE_SHA1_RC2_128_CBC, "CKM_PBE_SHA1_RC2_128_CBC", &spec::PBE_PARAMS),
    (CKM_PBA_SHA1_WITH_SHA1_HMAC, "CKM_PBA_SHA1_WITH_SHA1_HMAC", &spec::PBE_PARAMS),
    (CKM_SSL3_PRE_MASTER_KEY_GEN, "CKM_SSL3_PRE_MASTER_KEY_GEN", &spec::VERSION),
    (CKM_TLS_PRE_MASTER_KEY_GEN, "CKM_TLS_PRE_MASTER_KEY_GEN", &spec::VERSION),
    (CKM_SSL3_MASTER_KEY_DERIVE, "CKM_SSL3_MASTER_KEY_DERIVE", &spec::SSL3_MASTER_KEY_DERIVE_PARAMS),
    (
        CKM_SSL3_MASTER_KEY_DERIVE_DH,
        "CKM_SSL3_MASTER_KEY_DERIVE_DH",
        &spec::SSL3_MASTER_KEY_DERIVE_PARAMS,
    ),
    (CKM_TLS_MASTER_KEY_DERIVE, "CKM_TLS_MASTER_KEY_DERIVE", &spec::SSL3_MASTER_KEY_DERIVE_PARAMS),
    (
        CKM_TLS_MASTER_KEY_DERIVE_DH,
        "CKM_TLS_MASTER_KEY_DERIVE_DH",
        &spec::SSL3_MASTER_KEY_DERIVE_PARAMS,
    ),
    (CKM_SSL3_KEY_AND_MAC_DERIVE, "CKM_SSL3_KEY_AND_MAC_DERIVE", &spec::SSL3_KEY_MAT_PARAMS),
    (CKM_TLS_KEY_AND_MAC_DERIVE, "CKM_TLS_KEY_AND_MAC_DERIVE", &spec::SSL3_KEY_MAT_PARAMS),
    (CKM_TLS_PRF, "CKM_TLS_PRF", &spec::TLS_PRF_PARAMS),
    (
        CKM_TLS12_MASTER_KEY_DERIVE,
        "CKM_TLS12_MASTER_KEY_DERIVE",
        &spec::TLS12_MASTER_KEY_DERIVE_PARAMS,
    ),
    (
        CKM_TLS12_MASTER_KEY_DERIVE_DH,
        "CKM_TLS12_MASTER_KEY_DERIVE_DH",
        &spec::TLS12_MASTER_KEY_DERIVE_PARAMS,
    ),
    (CKM_TLS12_KEY_AND_MAC_DERIVE, "CKM_TLS12_KEY_AND_MAC_DERIVE", &spec::TLS12_KEY_MAT_PARAMS),
    (CKM_TLS12_KDF, "CKM_TLS12_KDF", &spec::TLS_KDF_PARAMS),
    (CKM_TLS_KDF, "CKM_TLS_KDF", &spec::TLS_KDF_PARAMS),
    (CKM_TLS12_MAC, "CKM_TLS12_MAC", &spec::TLS_MAC_PARAMS),
    (CKM_TLS_MAC, "CKM_TLS_MAC", &spec::TLS_MAC_PARAMS),
    (CKM_WTLS_MASTER_KEY_DERIVE, "CKM_WTLS_MASTER_KEY_DERIVE", &spec::WTLS_MASTER_KEY_DERIVE_PARAMS),
    (
        CKM_WTLS_MASTER_KEY_DERIVE_DH_ECC,
        "CKM_WTLS_MASTER_KEY_DERIVE_DH_ECC",
        &spec::WTLS_MASTER_KEY_DERIVE_PARAMS,
    ),
    (CKM_WTLS_PRF, "CKM_WTLS_PRF", &spec::WTLS_PRF_PARAMS),
    (
        CKM_WTLS_SERVER_KEY_AND_MAC_DERIVE,
        "CKM_WTLS_SERVER_KEY_AND_MAC_DERIVE",
        &spec::WTLS_KEY_MAT_PARAMS,
    ),
    (
        CKM_WTLS_CLIENT_KEY_AND_MAC_DERIVE,
        "CKM_WTLS_CLIENT_KEY_AND_MAC_DERIVE",
        &spec::WTLS_KEY_MAT_PARAMS,
    ),
    (CKM_CMS_SIG, "CKM_CMS_SIG", &spec::CMS_SIG_PARAMS),
    (CKM_SECURID, "CKM_SECURID", &spec::OTP_PARAMS),
    (CKM_HOTP, "CKM_HOTP", &spec::OTP_PARAMS),
    (CKM_ACTI, "CKM_ACTI", &spec::OTP_PARAMS),
    (CKM_KIP_DERIVE, "CKM_KIP_DERIVE", &spec::KIP_PARAMS),
    (CKM_KIP_WRAP, "CKM_KIP_WRAP", &spec::KIP_PARAMS),
    (CKM_KIP_MAC, "CKM_KIP_MAC", &spec::KIP_PARAMS),
    (
        CKM_DSA_PROBABLISTIC_PARAMETER_GEN,
        "CKM_DSA_PROBABLISTIC_PARAMETER_GEN",
        &spec::DSA_PARAMETER_GEN_PARAM,
    ),
    (CKM_HKDF_DERIVE, "CKM_HKDF_DERIVE", &spec::HKDF_PARAMS),
    (CKM_HKDF_DATA, "CKM_HKDF_DATA", &spec::HKDF_PARAMS),
];

/// One row of the mechanism table.
#[derive(Debug, Clone, Copy)]
pub struct MechanismInfo {
    pub mechanism: MechanismType,
    pub name: &'static str,
    pub shape: ParamShape,
}

/// Every mechanism with a known parameter shape.
pub fn entries() -> impl Iterator<Item = MechanismInfo> {
    let simple = |list: &'static [Entry], shape: ParamShape| {
        list.iter().map(move |&(mechanism, name)| MechanismInfo {
            mechanism: u64::from(mechanism),
            name,
            shape,
        })
    };
    simple(NO_PARAMETER, ParamShape::None)
        .chain(simple(ULONG_PARAMETER, ParamShape::Ulong))
        .chain(simple(IV_PARAMETER, ParamShape::Bytes))
        .chain(simple(OPTIONAL_IV_PARAMETER, ParamShape::OptionalBytes))
        .chain(STRUCT_PARAMETER.iter().map(|&(mechanism, name, spec)| MechanismInfo {
            mechanism: u64::from(mechanism),
            name,
            shape: ParamShape::Struct(spec),
        }))
        .chain([
            MechanismInfo {
                mechanism: u64::from(CKM_EDDSA),
                name: "CKM_EDDSA",
                shape: ParamShape::OptionalStruct(&spec::EDDSA_PARAMS),
            },
            MechanismInfo {
                mechanism: u64::from(CKM_PKCS5_PBKD2),
                name: "CKM_PKCS5_PBKD2",
                shape: ParamShape::Either(&spec::PKCS5_PBKD2_PARAMS2, &spec::PKCS5_PBKD2_PARAMS),
            },
        ])
}

/// The table entry for `mechanism`, if it is known.
pub fn lookup(mechanism: MechanismType) -> Option<MechanismInfo> {
    entries().find(|info| info.mechanism == mechanism)
}

/// The parameter shape `mechanism` expects. Vendor and unlisted mechanisms
/// return `None` and accept any parameter.
pub fn expected_shape(mechanism: MechanismType) -> Option<ParamShape> {
    lookup(mechanism).map(|info| info.shape)
}

pub(crate) fn check(mechanism: MechanismType, parameter: &MechanismParameter) -> MarshalResult<()> {
    match expected_shape(mechanism) {
        Some(shape) if !shape.accepts(parameter) => Err(MarshalError::ParameterShapeMismatch {
            mechanism,
            expected: shape.describe(),
        }),
        _ => Ok(()),
    }
}
