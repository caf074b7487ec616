//! Typed constructors for common parameter structures and readers for the
//! ones native code writes into.
//!
//! ```ignore
//! let gcm = params::gcm(&iv, &aad, 128);
//! let mechanism = Mechanism::new(profile, CKM_AES_GCM.into(), gcm)?;
//! ```

use cryptoki_sys::{CKZ_DATA_SPECIFIED, CKZ_SALT_SPECIFIED};

use super::codec::MechanismParameter;
use super::spec;
use super::value::{FieldValue, ParamValues};
use crate::error::{MarshalError, MarshalResult};

fn optional(bytes: &[u8]) -> FieldValue {
    if bytes.is_empty() {
        FieldValue::Bytes(None)
    } else {
        FieldValue::from(bytes)
    }
}

fn parameter(values: ParamValues) -> MechanismParameter {
    MechanismParameter::Struct(values)
}

/// `CK_RSA_PKCS_OAEP_PARAMS` with an explicit (possibly empty) label.
pub fn oaep(hash: u64, mgf: u64, label: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::RSA_PKCS_OAEP_PARAMS)
            .with("hashAlg", hash)
            .with("mgf", mgf)
            .with("source", u64::from(CKZ_DATA_SPECIFIED))
            .with("pSourceData", optional(label)),
    )
}

pub fn pss(hash: u64, mgf: u64, salt_len: u64) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::RSA_PKCS_PSS_PARAMS)
            .with("hashAlg", hash)
            .with("mgf", mgf)
            .with("sLen", salt_len),
    )
}

pub fn ecdh1(kdf: u64, shared: &[u8], public: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::ECDH1_DERIVE_PARAMS)
            .with("kdf", kdf)
            .with("pSharedData", optional(shared))
            .with("pPublicData", public),
    )
}

/// `CK_KEA_DERIVE_PARAMS`; both random values must have the same length.
pub fn kea(is_sender: bool, random_a: &[u8], random_b: &[u8], public: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::KEA_DERIVE_PARAMS)
            .with("isSender", is_sender)
            .with("pRandomA", random_a)
            .with("pRandomB", random_b)
            .with("pPublicData", public),
    )
}

pub fn rc2_cbc(effective_bits: u64, iv: [u8; 8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::RC2_CBC_PARAMS)
            .with("ulEffectiveBits", effective_bits)
            .with("iv", iv),
    )
}

pub fn rc5_cbc(word_size: u64, rounds: u64, iv: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::RC5_CBC_PARAMS)
            .with("ulWordsize", word_size)
            .with("ulRounds", rounds)
            .with("pIv", iv),
    )
}

pub fn des_cbc_encrypt_data(iv: [u8; 8], data: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::DES_CBC_ENCRYPT_DATA_PARAMS)
            .with("iv", iv)
            .with("pData", data),
    )
}

pub fn aes_cbc_encrypt_data(iv: [u8; 16], data: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::AES_CBC_ENCRYPT_DATA_PARAMS)
            .with("iv", iv)
            .with("pData", data),
    )
}

pub fn aes_ctr(counter_bits: u64, counter_block: [u8; 16]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::AES_CTR_PARAMS)
            .with("ulCounterBits", counter_bits)
            .with("cb", counter_block),
    )
}

/// `CK_GCM_PARAMS`; `ulIvBits` follows the IV length.
pub fn gcm(iv: &[u8], aad: &[u8], tag_bits: u64) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::GCM_PARAMS)
            .with("pIv", iv)
            .with("ulIvBits", (iv.len() as u64) * 8)
            .with("pAAD", optional(aad))
            .with("ulTagBits", tag_bits),
    )
}

pub fn ccm(data_len: u64, nonce: &[u8], aad: &[u8], mac_len: u64) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::CCM_PARAMS)
            .with("ulDataLen", data_len)
            .with("pNonce", nonce)
            .with("pAAD", optional(aad))
            .with("ulMACLen", mac_len),
    )
}

pub fn chacha20_poly1305(nonce: &[u8], aad: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::SALSA20_CHACHA20_POLY1305_PARAMS)
            .with("pNonce", nonce)
            .with("pAAD", optional(aad)),
    )
}

/// `CK_EDDSA_PARAMS`. Plain Ed25519 takes no parameter at all.
pub fn eddsa(prehash: bool, context: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::EDDSA_PARAMS)
            .with("phFlag", prehash)
            .with("pContextData", optional(context)),
    )
}

pub fn key_derivation_string(data: &[u8]) -> MechanismParameter {
    parameter(ParamValues::new(&spec::KEY_DERIVATION_STRING_DATA).with("pData", data))
}

/// `CK_HKDF_PARAMS` with salt data (`CKF_HKDF_SALT_DATA`) or no salt.
pub fn hkdf(extract: bool, expand: bool, prf: u64, salt: &[u8], info: &[u8]) -> MechanismParameter {
    const SALT_NULL: u64 = 0x1;
    const SALT_DATA: u64 = 0x2;
    let salt_type = if salt.is_empty() { SALT_NULL } else { SALT_DATA };
    parameter(
        ParamValues::new(&spec::HKDF_PARAMS)
            .with("bExtract", extract)
            .with("bExpand", expand)
            .with("prfHashMechanism", prf)
            .with("ulSaltType", salt_type)
            .with("pSalt", optional(salt))
            .with("hSaltKey", 0u64)
            .with("pInfo", optional(info)),
    )
}

/// `CK_OTP_PARAMS` from `(type, value)` pairs.
pub fn otp(entries: &[(u64, &[u8])]) -> MechanismParameter {
    let items = entries
        .iter()
        .map(|&(ty, value)| {
            ParamValues::new(&spec::OTP_PARAM)
                .with("type", ty)
                .with("pValue", optional(value))
        })
        .collect::<Vec<_>>();
    parameter(ParamValues::new(&spec::OTP_PARAMS).with("pParams", items))
}

/// `CK_PBE_PARAMS`; the token writes an 8-byte IV back, see
/// [`pbe_init_vector`].
pub fn pbe(password: &[u8], salt: &[u8], iterations: u64) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::PBE_PARAMS)
            .with("pInitVector", FieldValue::Output(8))
            .with("pPassword", password)
            .with("pSalt", optional(salt))
            .with("ulIteration", iterations),
    )
}

/// `CK_PKCS5_PBKD2_PARAMS2` (v2.40 layout, password length by value).
pub fn pbkd2(prf: u64, salt: &[u8], iterations: u64, password: &[u8]) -> MechanismParameter {
    parameter(pbkd2_values(&spec::PKCS5_PBKD2_PARAMS2, prf, salt, iterations, password))
}

/// `CK_PKCS5_PBKD2_PARAMS` (v2.20 layout, password length by pointer).
pub fn pbkd2_v2(prf: u64, salt: &[u8], iterations: u64, password: &[u8]) -> MechanismParameter {
    parameter(pbkd2_values(&spec::PKCS5_PBKD2_PARAMS, prf, salt, iterations, password))
}

fn pbkd2_values(
    spec: &'static spec::ParamSpec,
    prf: u64,
    salt: &[u8],
    iterations: u64,
    password: &[u8],
) -> ParamValues {
    ParamValues::new(spec)
        .with("saltSource", u64::from(CKZ_SALT_SPECIFIED))
        .with("pSaltSourceData", salt)
        .with("iterations", iterations)
        .with("prf", prf)
        .with("pPrfData", FieldValue::Bytes(None))
        .with("pPassword", password)
}

pub fn ssl3_random(client: &[u8], server: &[u8]) -> ParamValues {
    ParamValues::new(&spec::SSL3_RANDOM_DATA)
        .with("pClientRandom", client)
        .with("pServerRandom", server)
}

/// `CK_SSL3_MASTER_KEY_DERIVE_PARAMS`; the token writes the client version
/// back (read it with [`Version::from_master_key_params`]).
pub fn ssl3_master_key_derive(client: &[u8], server: &[u8]) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::SSL3_MASTER_KEY_DERIVE_PARAMS)
            .with("RandomInfo", ssl3_random(client, server))
            .with("pVersion", version_slot()),
    )
}

pub fn tls12_master_key_derive(client: &[u8], server: &[u8], prf: u64) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::TLS12_MASTER_KEY_DERIVE_PARAMS)
            .with("RandomInfo", ssl3_random(client, server))
            .with("pVersion", version_slot())
            .with("prfHashMechanism", prf),
    )
}

fn version_slot() -> ParamValues {
    ParamValues::new(&spec::VERSION)
        .with("major", 0u8)
        .with("minor", 0u8)
}

/// `CK_VERSION` requested from SSL3/TLS pre-master key generation.
pub fn pre_master_version(major: u8, minor: u8) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::VERSION)
            .with("major", major)
            .with("minor", minor),
    )
}

/// Sizes for SSL3/TLS key material derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterialSizes {
    pub mac_bits: u64,
    pub key_bits: u64,
    pub iv_bits: u64,
    pub export: bool,
}

fn key_mat_out(iv_bits: u64) -> MarshalResult<ParamValues> {
    let iv_len = usize::try_from(iv_bits / 8).map_err(|_| MarshalError::ValueOutOfRange {
        value: iv_bits,
        width: std::mem::size_of::<usize>(),
    })?;
    let iv = FieldValue::Output(iv_len);
    Ok(ParamValues::new(&spec::SSL3_KEY_MAT_OUT)
        .with("hClientMacSecret", 0u64)
        .with("hServerMacSecret", 0u64)
        .with("hClientKey", 0u64)
        .with("hServerKey", 0u64)
        .with("pIVClient", iv.clone())
        .with("pIVServer", iv))
}

fn key_mat_values(
    spec: &'static spec::ParamSpec,
    sizes: KeyMaterialSizes,
    client: &[u8],
    server: &[u8],
) -> MarshalResult<ParamValues> {
    Ok(ParamValues::new(spec)
        .with("ulMacSizeInBits", sizes.mac_bits)
        .with("ulKeySizeInBits", sizes.key_bits)
        .with("ulIVSizeInBits", sizes.iv_bits)
        .with("bIsExport", sizes.export)
        .with("RandomInfo", ssl3_random(client, server))
        .with("pReturnedKeyMaterial", key_mat_out(sizes.iv_bits)?))
}

/// `CK_SSL3_KEY_MAT_PARAMS` with IV output areas of `iv_bits / 8` bytes.
///
/// Fails with `ValueOutOfRange` when that size does not fit the host.
pub fn ssl3_key_mat(
    sizes: KeyMaterialSizes,
    client: &[u8],
    server: &[u8],
) -> MarshalResult<MechanismParameter> {
    key_mat_values(&spec::SSL3_KEY_MAT_PARAMS, sizes, client, server).map(parameter)
}

pub fn tls12_key_mat(
    sizes: KeyMaterialSizes,
    client: &[u8],
    server: &[u8],
    prf: u64,
) -> MarshalResult<MechanismParameter> {
    let values = key_mat_values(&spec::TLS12_KEY_MAT_PARAMS, sizes, client, server)?;
    Ok(parameter(values.with("prfHashMechanism", prf)))
}

/// `CK_TLS_PRF_PARAMS` with an output area of `output_len` bytes.
pub fn tls_prf(seed: &[u8], label: &[u8], output_len: usize) -> MechanismParameter {
    parameter(
        ParamValues::new(&spec::TLS_PRF_PARAMS)
            .with("pSeed", seed)
            .with("pLabel", label)
            .with("pOutput", FieldValue::Output(output_len)),
    )
}

fn decoded_struct(parameter: &MechanismParameter) -> MarshalResult<&ParamValues> {
    match parameter {
        MechanismParameter::Struct(values) => Ok(values),
        _ => Err(MarshalError::FieldKindMismatch {
            structure: "mechanism parameter",
            field: "pParameter",
            expected: "structure",
        }),
    }
}

/// `CK_VERSION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn from_values(values: &ParamValues) -> MarshalResult<Self> {
        let byte = |name| {
            values
                .ulong(name)
                .and_then(|v| u8::try_from(v).map_err(|_| MarshalError::ValueOutOfRange { value: v, width: 1 }))
        };
        Ok(Self {
            major: byte("major")?,
            minor: byte("minor")?,
        })
    }

    /// The version written into decoded SSL3/TLS 1.2 master key parameters.
    pub fn from_master_key_params(parameter: &MechanismParameter) -> MarshalResult<Self> {
        Self::from_values(decoded_struct(parameter)?.structure("pVersion")?)
    }
}

/// Handles and IVs returned by SSL3/TLS key material derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterialOut {
    pub client_mac_secret: u64,
    pub server_mac_secret: u64,
    pub client_key: u64,
    pub server_key: u64,
    pub client_iv: Vec<u8>,
    pub server_iv: Vec<u8>,
}

impl KeyMaterialOut {
    pub fn from_key_mat_params(parameter: &MechanismParameter) -> MarshalResult<Self> {
        let out = decoded_struct(parameter)?.structure("pReturnedKeyMaterial")?;
        Ok(Self {
            client_mac_secret: out.ulong("hClientMacSecret")?,
            server_mac_secret: out.ulong("hServerMacSecret")?,
            client_key: out.ulong("hClientKey")?,
            server_key: out.ulong("hServerKey")?,
            client_iv: out.bytes("pIVClient")?,
            server_iv: out.bytes("pIVServer")?,
        })
    }
}

/// Handles and IV returned by WTLS key material derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WtlsKeyMaterialOut {
    pub mac_secret: u64,
    pub key: u64,
    pub iv: Vec<u8>,
}

impl WtlsKeyMaterialOut {
    pub fn from_key_mat_params(parameter: &MechanismParameter) -> MarshalResult<Self> {
        let out = decoded_struct(parameter)?.structure("pReturnedKeyMaterial")?;
        Ok(Self {
            mac_secret: out.ulong("hMacSecret")?,
            key: out.ulong("hKey")?,
            iv: out.bytes("pIV")?,
        })
    }
}

/// Bytes a TLS or WTLS PRF wrote, trimmed to the returned length.
pub fn prf_output(parameter: &MechanismParameter) -> MarshalResult<Vec<u8>> {
    decoded_struct(parameter)?.bytes("pOutput")
}

/// IV a PBE mechanism wrote.
pub fn pbe_init_vector(parameter: &MechanismParameter) -> MarshalResult<Vec<u8>> {
    decoded_struct(parameter)?.bytes("pInitVector")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::AbiProfile;

    #[test]
    fn test_constructors_validate() {
        let profile = AbiProfile::host();
        let sizes = KeyMaterialSizes {
            mac_bits: 160,
            key_bits: 128,
            iv_bits: 128,
            export: false,
        };
        let all = [
            oaep(1, 2, b""),
            pss(1, 2, 20),
            ecdh1(1, b"", &[4u8; 65]),
            kea(true, &[1; 16], &[2; 16], &[3; 64]),
            rc2_cbc(64, [0; 8]),
            rc5_cbc(4, 12, &[0; 8]),
            des_cbc_encrypt_data([0; 8], &[1; 8]),
            aes_cbc_encrypt_data([0; 16], &[1; 16]),
            aes_ctr(128, [0; 16]),
            gcm(&[0; 12], b"aad", 128),
            ccm(64, &[0; 7], b"", 16),
            chacha20_poly1305(&[0; 12], b""),
            eddsa(false, b"ctx"),
            key_derivation_string(b"data"),
            hkdf(true, true, 0x250, b"salt", b"info"),
            otp(&[(0, b"123456".as_slice())]),
            pbe(b"secret", b"salt", 1000),
            pbkd2(1, b"salt", 1000, b"secret"),
            pbkd2_v2(1, b"salt", 1000, b"secret"),
            ssl3_master_key_derive(&[1; 32], &[2; 32]),
            tls12_master_key_derive(&[1; 32], &[2; 32], 0x250),
            ssl3_key_mat(sizes, &[1; 32], &[2; 32]).unwrap(),
            tls12_key_mat(sizes, &[1; 32], &[2; 32], 0x250).unwrap(),
            tls_prf(b"seed", b"label", 48),
            pre_master_version(3, 1),
        ];
        for parameter in &all {
            let values = decoded_struct(parameter).unwrap();
            assert!(values.validate(profile).is_ok(), "{}", values.spec().name);
        }
    }

    #[test]
    fn test_gcm_iv_bits_follow_iv() {
        let parameter = gcm(&[0; 16], b"", 96);
        let values = decoded_struct(&parameter).unwrap();
        assert_eq!(values.ulong("ulIvBits").unwrap(), 128);
        assert_eq!(values.get("pAAD"), Some(&FieldValue::Bytes(None)));
    }

    #[test]
    fn test_key_mat_iv_size_must_fit_the_host() {
        let sizes = KeyMaterialSizes {
            mac_bits: 0,
            key_bits: 0,
            iv_bits: u64::MAX,
            export: false,
        };
        let result = ssl3_key_mat(sizes, &[1; 32], &[2; 32]);
        if usize::BITS < u64::BITS {
            assert!(matches!(result, Err(MarshalError::ValueOutOfRange { value: u64::MAX, .. })));
        } else {
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_readers_reject_other_shapes() {
        assert!(KeyMaterialOut::from_key_mat_params(&MechanismParameter::None).is_err());
        assert!(prf_output(&MechanismParameter::Bytes(vec![1])).is_err());
    }
}
