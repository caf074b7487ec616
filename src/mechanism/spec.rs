//! Declarative descriptions of Cryptoki mechanism parameter structures.
//!
//! Each [`ParamSpec`] lists the fields of one `CK_*_PARAMS` structure in
//! declaration order. Encoding, decoding and release are derived from these
//! tables by [`super::codec`].
//!
//! Length fields are never supplied by the caller: a [`FieldKind::Length`]
//! or [`FieldKind::LengthPtr`] field takes its value from the buffers that
//! name it, and all of those buffers must agree.

use crate::abi::{AbiProfile, Scalar, StructLayout};

/// One parameter structure.
#[derive(Debug)]
pub struct ParamSpec {
    /// Cryptoki structure name.
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    /// Whether native code writes results into the structure that callers
    /// may read back.
    pub readable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// How a field is represented natively.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// `CK_ULONG` and aliases (mechanism types, handles, bit counts).
    Ulong,
    /// `CK_BYTE` / `CK_BBOOL`.
    Byte,
    /// `CK_ULONG` holding the length of the buffers that reference it.
    Length,
    /// `CK_BYTE_PTR` whose length lives in the named field.
    Buffer { len: &'static str },
    /// `CK_BYTE_PTR` whose length lives behind the named `CK_ULONG_PTR`.
    BufferLenPtr { len: &'static str },
    /// `CK_ULONG_PTR` to the length of the buffers that reference it.
    LengthPtr,
    /// `CK_BYTE_PTR` to exactly this many bytes.
    FixedBuffer(usize),
    /// `CK_BYTE_PTR` to a caller-sized output area with no length field.
    Output,
    /// Inline `CK_BYTE[n]`.
    Array(usize),
    /// NUL-terminated `CK_UTF8CHAR_PTR`.
    Text,
    /// Structure embedded by value.
    Inline(&'static ParamSpec),
    /// Pointer to a structure.
    Pointer(&'static ParamSpec),
    /// Pointer to an array of structures counted by the named field.
    StructArray {
        spec: &'static ParamSpec,
        count: &'static str,
    },
}

impl FieldKind {
    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::Ulong => "a CK_ULONG",
            FieldKind::Byte => "a CK_BYTE",
            FieldKind::Length | FieldKind::LengthPtr => "no value (computed length)",
            FieldKind::Buffer { .. } => "bytes",
            FieldKind::BufferLenPtr { .. } => "bytes or an output size",
            FieldKind::FixedBuffer(_) => "fixed-size bytes or an output size",
            FieldKind::Output => "an output size",
            FieldKind::Array(_) => "an inline byte array",
            FieldKind::Text => "text",
            FieldKind::Inline(_) => "an embedded structure",
            FieldKind::Pointer(_) => "a structure or null",
            FieldKind::StructArray { .. } => "a structure list",
        }
    }

    /// Whether the codec fills the field itself.
    pub fn is_computed(&self) -> bool {
        matches!(self, FieldKind::Length | FieldKind::LengthPtr)
    }
}

impl ParamSpec {
    /// Native layout for `profile`.
    pub fn layout(&self, profile: AbiProfile) -> StructLayout {
        self.fields
            .iter()
            .fold(StructLayout::builder(profile), |builder, field| match field.kind {
                FieldKind::Ulong | FieldKind::Length => builder.scalar(Scalar::Ulong),
                FieldKind::Byte => builder.scalar(Scalar::Byte),
                FieldKind::Array(n) => builder.scalar(Scalar::Bytes(n)),
                FieldKind::Inline(spec) => builder.nested(&spec.layout(profile)),
                FieldKind::Buffer { .. }
                | FieldKind::BufferLenPtr { .. }
                | FieldKind::LengthPtr
                | FieldKind::FixedBuffer(_)
                | FieldKind::Output
                | FieldKind::Text
                | FieldKind::Pointer(_)
                | FieldKind::StructArray { .. } => builder.scalar(Scalar::Pointer),
            })
            .finish()
    }

    pub fn size(&self, profile: AbiProfile) -> usize {
        self.layout(profile).size
    }

    /// Index of the field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Indices of the fields whose length is stored in `len_field`.
    pub fn users_of(&self, len_field: &str) -> impl Iterator<Item = usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(move |(_, f)| match f.kind {
                FieldKind::Buffer { len } | FieldKind::BufferLenPtr { len } => len == len_field,
                FieldKind::StructArray { count, .. } => count == len_field,
                _ => false,
            })
            .map(|(i, _)| i)
    }
}

const fn ulong(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Ulong,
    }
}

const fn byte(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Byte,
    }
}

const fn length(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Length,
    }
}

const fn buffer(name: &'static str, len: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Buffer { len },
    }
}

const fn buffer_len_ptr(name: &'static str, len: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::BufferLenPtr { len },
    }
}

const fn length_ptr(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::LengthPtr,
    }
}

const fn fixed(name: &'static str, size: usize) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::FixedBuffer(size),
    }
}

const fn output(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Output,
    }
}

const fn array(name: &'static str, size: usize) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Array(size),
    }
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn inline(name: &'static str, spec: &'static ParamSpec) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Inline(spec),
    }
}

const fn pointer(name: &'static str, spec: &'static ParamSpec) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Pointer(spec),
    }
}

const fn struct_array(name: &'static str, spec: &'static ParamSpec, count: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::StructArray { spec, count },
    }
}

macro_rules! param_spec {
    ($(#[$meta:meta])* $ident:ident, $name:literal, readable = $readable:literal, [$($field:expr),* $(,)?]) => {
        $(#[$meta])*
        pub static $ident: ParamSpec = ParamSpec {
            name: $name,
            fields: &[$($field),*],
            readable: $readable,
        };
    };
    ($(#[$meta:meta])* $ident:ident, $name:literal, [$($field:expr),* $(,)?]) => {
        param_spec!($(#[$meta])* $ident, $name, readable = false, [$($field),*]);
    };
}

// Shared building blocks

param_spec!(
    /// `CK_VERSION`, written by SSL3/TLS master key derivation.
    VERSION, "CK_VERSION", readable = true, [byte("major"), byte("minor")]
);

param_spec!(
    /// `CK_MECHANISM` referenced from other parameters, with a raw parameter.
    MECHANISM, "CK_MECHANISM", [
        ulong("mechanism"),
        buffer("pParameter", "ulParameterLen"),
        length("ulParameterLen"),
    ]
);

// RSA

param_spec!(RSA_PKCS_OAEP_PARAMS, "CK_RSA_PKCS_OAEP_PARAMS", [
    ulong("hashAlg"),
    ulong("mgf"),
    ulong("source"),
    buffer("pSourceData", "ulSourceDataLen"),
    length("ulSourceDataLen"),
]);

param_spec!(RSA_PKCS_PSS_PARAMS, "CK_RSA_PKCS_PSS_PARAMS", [
    ulong("hashAlg"),
    ulong("mgf"),
    ulong("sLen"),
]);

param_spec!(RSA_AES_KEY_WRAP_PARAMS, "CK_RSA_AES_KEY_WRAP_PARAMS", [
    ulong("ulAESKeyBits"),
    pointer("pOAEPParams", &RSA_PKCS_OAEP_PARAMS),
]);

// Elliptic curve and Diffie-Hellman derivation

param_spec!(ECDH1_DERIVE_PARAMS, "CK_ECDH1_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulSharedDataLen"),
    buffer("pSharedData", "ulSharedDataLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
]);

param_spec!(ECDH2_DERIVE_PARAMS, "CK_ECDH2_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulSharedDataLen"),
    buffer("pSharedData", "ulSharedDataLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
    ulong("ulPrivateDataLen"),
    ulong("hPrivateData"),
    length("ulPublicDataLen2"),
    buffer("pPublicData2", "ulPublicDataLen2"),
]);

param_spec!(ECMQV_DERIVE_PARAMS, "CK_ECMQV_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulSharedDataLen"),
    buffer("pSharedData", "ulSharedDataLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
    ulong("ulPrivateDataLen"),
    ulong("hPrivateData"),
    length("ulPublicDataLen2"),
    buffer("pPublicData2", "ulPublicDataLen2"),
    ulong("publicKey"),
]);

param_spec!(ECDH_AES_KEY_WRAP_PARAMS, "CK_ECDH_AES_KEY_WRAP_PARAMS", [
    ulong("ulAESKeyBits"),
    ulong("kdf"),
    length("ulSharedDataLen"),
    buffer("pSharedData", "ulSharedDataLen"),
]);

param_spec!(X9_42_DH1_DERIVE_PARAMS, "CK_X9_42_DH1_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulOtherInfoLen"),
    buffer("pOtherInfo", "ulOtherInfoLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
]);

param_spec!(X9_42_DH2_DERIVE_PARAMS, "CK_X9_42_DH2_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulOtherInfoLen"),
    buffer("pOtherInfo", "ulOtherInfoLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
    ulong("ulPrivateDataLen"),
    ulong("hPrivateData"),
    length("ulPublicDataLen2"),
    buffer("pPublicData2", "ulPublicDataLen2"),
]);

param_spec!(X9_42_MQV_DERIVE_PARAMS, "CK_X9_42_MQV_DERIVE_PARAMS", [
    ulong("kdf"),
    length("ulOtherInfoLen"),
    buffer("pOtherInfo", "ulOtherInfoLen"),
    length("ulPublicDataLen"),
    buffer("pPublicData", "ulPublicDataLen"),
    ulong("ulPrivateDataLen"),
    ulong("hPrivateData"),
    length("ulPublicDataLen2"),
    buffer("pPublicData2", "ulPublicDataLen2"),
    ulong("publicKey"),
]);

param_spec!(
    /// Both random values share `ulRandomLen`.
    KEA_DERIVE_PARAMS, "CK_KEA_DERIVE_PARAMS", [
        byte("isSender"),
        length("ulRandomLen"),
        buffer("pRandomA", "ulRandomLen"),
        buffer("pRandomB", "ulRandomLen"),
        length("ulPublicDataLen"),
        buffer("pPublicData", "ulPublicDataLen"),
    ]
);

param_spec!(GOSTR3410_DERIVE_PARAMS, "CK_GOSTR3410_DERIVE_PARAMS", [
    ulong("kdf"),
    buffer("pPublicData", "ulPublicDataLen"),
    length("ulPublicDataLen"),
    buffer("pUKM", "ulUKMLen"),
    length("ulUKMLen"),
]);

param_spec!(GOSTR3410_KEY_WRAP_PARAMS, "CK_GOSTR3410_KEY_WRAP_PARAMS", [
    buffer("pWrapOID", "ulWrapOIDLen"),
    length("ulWrapOIDLen"),
    buffer("pUKM", "ulUKMLen"),
    length("ulUKMLen"),
    ulong("hKey"),
]);

param_spec!(EDDSA_PARAMS, "CK_EDDSA_PARAMS", [
    byte("phFlag"),
    length("ulContextDataLen"),
    buffer("pContextData", "ulContextDataLen"),
]);

// Block ciphers

param_spec!(RC2_CBC_PARAMS, "CK_RC2_CBC_PARAMS", [
    ulong("ulEffectiveBits"),
    array("iv", 8),
]);

param_spec!(RC2_MAC_GENERAL_PARAMS, "CK_RC2_MAC_GENERAL_PARAMS", [
    ulong("ulEffectiveBits"),
    ulong("ulMacLength"),
]);

param_spec!(RC5_PARAMS, "CK_RC5_PARAMS", [ulong("ulWordsize"), ulong("ulRounds")]);

param_spec!(RC5_CBC_PARAMS, "CK_RC5_CBC_PARAMS", [
    ulong("ulWordsize"),
    ulong("ulRounds"),
    buffer("pIv", "ulIvLen"),
    length("ulIvLen"),
]);

param_spec!(RC5_MAC_GENERAL_PARAMS, "CK_RC5_MAC_GENERAL_PARAMS", [
    ulong("ulWordsize"),
    ulong("ulRounds"),
    ulong("ulMacLength"),
]);

param_spec!(DES_CBC_ENCRYPT_DATA_PARAMS, "CK_DES_CBC_ENCRYPT_DATA_PARAMS", [
    array("iv", 8),
    buffer("pData", "length"),
    length("length"),
]);

param_spec!(AES_CBC_ENCRYPT_DATA_PARAMS, "CK_AES_CBC_ENCRYPT_DATA_PARAMS", [
    array("iv", 16),
    buffer("pData", "length"),
    length("length"),
]);

param_spec!(CAMELLIA_CBC_ENCRYPT_DATA_PARAMS, "CK_CAMELLIA_CBC_ENCRYPT_DATA_PARAMS", [
    array("iv", 16),
    buffer("pData", "length"),
    length("length"),
]);

param_spec!(ARIA_CBC_ENCRYPT_DATA_PARAMS, "CK_ARIA_CBC_ENCRYPT_DATA_PARAMS", [
    array("iv", 16),
    buffer("pData", "length"),
    length("length"),
]);

param_spec!(SEED_CBC_ENCRYPT_DATA_PARAMS, "CK_SEED_CBC_ENCRYPT_DATA_PARAMS", [
    array("iv", 16),
    buffer("pData", "length"),
    length("length"),
]);

param_spec!(AES_CTR_PARAMS, "CK_AES_CTR_PARAMS", [ulong("ulCounterBits"), array("cb", 16)]);

param_spec!(CAMELLIA_CTR_PARAMS, "CK_CAMELLIA_CTR_PARAMS", [
    ulong("ulCounterBits"),
    array("cb", 16),
]);

param_spec!(GCM_PARAMS, "CK_GCM_PARAMS", [
    buffer("pIv", "ulIvLen"),
    length("ulIvLen"),
    ulong("ulIvBits"),
    buffer("pAAD", "ulAADLen"),
    length("ulAADLen"),
    ulong("ulTagBits"),
]);

param_spec!(CCM_PARAMS, "CK_CCM_PARAMS", [
    ulong("ulDataLen"),
    buffer("pNonce", "ulNonceLen"),
    length("ulNonceLen"),
    buffer("pAAD", "ulAADLen"),
    length("ulAADLen"),
    ulong("ulMACLen"),
]);

param_spec!(SALSA20_CHACHA20_POLY1305_PARAMS, "CK_SALSA20_CHACHA20_POLY1305_PARAMS", [
    buffer("pNonce", "ulNonceLen"),
    length("ulNonceLen"),
    buffer("pAAD", "ulAADLen"),
    length("ulAADLen"),
]);

param_spec!(KEY_WRAP_SET_OAEP_PARAMS, "CK_KEY_WRAP_SET_OAEP_PARAMS", [
    byte("bBC"),
    buffer("pX", "ulXLen"),
    length("ulXLen"),
]);

// Skipjack

param_spec!(
    /// Prime and base share `ulPAndGLen`.
    SKIPJACK_PRIVATE_WRAP_PARAMS, "CK_SKIPJACK_PRIVATE_WRAP_PARAMS", [
        length("ulPasswordLen"),
        buffer("pPassword", "ulPasswordLen"),
        length("ulPublicDataLen"),
        buffer("pPublicData", "ulPublicDataLen"),
        length("ulPAndGLen"),
        length("ulQLen"),
        length("ulRandomLen"),
        buffer("pRandomA", "ulRandomLen"),
        buffer("pPrimeP", "ulPAndGLen"),
        buffer("pBaseG", "ulPAndGLen"),
        buffer("pSubprimeQ", "ulQLen"),
    ]
);

param_spec!(SKIPJACK_RELAYX_PARAMS, "CK_SKIPJACK_RELAYX_PARAMS", [
    length("ulOldWrappedXLen"),
    buffer("pOldWrappedX", "ulOldWrappedXLen"),
    length("ulOldPasswordLen"),
    buffer("pOldPassword", "ulOldPasswordLen"),
    length("ulOldPublicDataLen"),
    buffer("pOldPublicData", "ulOldPublicDataLen"),
    length("ulOldRandomLen"),
    buffer("pOldRandomA", "ulOldRandomLen"),
    length("ulNewPasswordLen"),
    buffer("pNewPassword", "ulNewPasswordLen"),
    length("ulNewPublicDataLen"),
    buffer("pNewPublicData", "ulNewPublicDataLen"),
    length("ulNewRandomLen"),
    buffer("pNewRandomA", "ulNewRandomLen"),
]);

// Password-based

param_spec!(
    /// The token writes the 8-byte IV into `pInitVector`.
    PBE_PARAMS, "CK_PBE_PARAMS", readable = true, [
        fixed("pInitVector", 8),
        buffer("pPassword", "ulPasswordLen"),
        length("ulPasswordLen"),
        buffer("pSalt", "ulSaltLen"),
        length("ulSaltLen"),
        ulong("ulIteration"),
    ]
);

param_spec!(
    /// v2.20 layout: the password length is passed by pointer.
    PKCS5_PBKD2_PARAMS, "CK_PKCS5_PBKD2_PARAMS", [
        ulong("saltSource"),
        buffer("pSaltSourceData", "ulSaltSourceDataLen"),
        length("ulSaltSourceDataLen"),
        ulong("iterations"),
        ulong("prf"),
        buffer("pPrfData", "ulPrfDataLen"),
        length("ulPrfDataLen"),
        buffer_len_ptr("pPassword", "ulPasswordLen"),
        length_ptr("ulPasswordLen"),
    ]
);

param_spec!(PKCS5_PBKD2_PARAMS2, "CK_PKCS5_PBKD2_PARAMS2", [
    ulong("saltSource"),
    buffer("pSaltSourceData", "ulSaltSourceDataLen"),
    length("ulSaltSourceDataLen"),
    ulong("iterations"),
    ulong("prf"),
    buffer("pPrfData", "ulPrfDataLen"),
    length("ulPrfDataLen"),
    buffer("pPassword", "ulPasswordLen"),
    length("ulPasswordLen"),
]);

// SSL 3.0 and TLS

param_spec!(SSL3_RANDOM_DATA, "CK_SSL3_RANDOM_DATA", [
    buffer("pClientRandom", "ulClientRandomLen"),
    length("ulClientRandomLen"),
    buffer("pServerRandom", "ulServerRandomLen"),
    length("ulServerRandomLen"),
]);

param_spec!(SSL3_MASTER_KEY_DERIVE_PARAMS, "CK_SSL3_MASTER_KEY_DERIVE_PARAMS", readable = true, [
    inline("RandomInfo", &SSL3_RANDOM_DATA),
    pointer("pVersion", &VERSION),
]);

param_spec!(SSL3_KEY_MAT_OUT, "CK_SSL3_KEY_MAT_OUT", readable = true, [
    ulong("hClientMacSecret"),
    ulong("hServerMacSecret"),
    ulong("hClientKey"),
    ulong("hServerKey"),
    output("pIVClient"),
    output("pIVServer"),
]);

param_spec!(SSL3_KEY_MAT_PARAMS, "CK_SSL3_KEY_MAT_PARAMS", readable = true, [
    ulong("ulMacSizeInBits"),
    ulong("ulKeySizeInBits"),
    ulong("ulIVSizeInBits"),
    byte("bIsExport"),
    inline("RandomInfo", &SSL3_RANDOM_DATA),
    pointer("pReturnedKeyMaterial", &SSL3_KEY_MAT_OUT),
]);

param_spec!(TLS_PRF_PARAMS, "CK_TLS_PRF_PARAMS", readable = true, [
    buffer("pSeed", "ulSeedLen"),
    length("ulSeedLen"),
    buffer("pLabel", "ulLabelLen"),
    length("ulLabelLen"),
    buffer_len_ptr("pOutput", "pulOutputLen"),
    length_ptr("pulOutputLen"),
]);

param_spec!(TLS12_MASTER_KEY_DERIVE_PARAMS, "CK_TLS12_MASTER_KEY_DERIVE_PARAMS", readable = true, [
    inline("RandomInfo", &SSL3_RANDOM_DATA),
    pointer("pVersion", &VERSION),
    ulong("prfHashMechanism"),
]);

param_spec!(TLS12_KEY_MAT_PARAMS, "CK_TLS12_KEY_MAT_PARAMS", readable = true, [
    ulong("ulMacSizeInBits"),
    ulong("ulKeySizeInBits"),
    ulong("ulIVSizeInBits"),
    byte("bIsExport"),
    inline("RandomInfo", &SSL3_RANDOM_DATA),
    pointer("pReturnedKeyMaterial", &SSL3_KEY_MAT_OUT),
    ulong("prfHashMechanism"),
]);

param_spec!(TLS_KDF_PARAMS, "CK_TLS_KDF_PARAMS", [
    ulong("prfMechanism"),
    buffer("pLabel", "ulLabelLength"),
    length("ulLabelLength"),
    inline("RandomInfo", &SSL3_RANDOM_DATA),
    buffer("pContextData", "ulContextDataLength"),
    length("ulContextDataLength"),
]);

param_spec!(TLS_MAC_PARAMS, "CK_TLS_MAC_PARAMS", [
    ulong("prfHashMechanism"),
    ulong("ulMacLength"),
    ulong("ulServerOrClient"),
]);

// WTLS

param_spec!(WTLS_RANDOM_DATA, "CK_WTLS_RANDOM_DATA", [
    buffer("pClientRandom", "ulClientRandomLen"),
    length("ulClientRandomLen"),
    buffer("pServerRandom", "ulServerRandomLen"),
    length("ulServerRandomLen"),
]);

param_spec!(WTLS_MASTER_KEY_DERIVE_PARAMS, "CK_WTLS_MASTER_KEY_DERIVE_PARAMS", readable = true, [
    ulong("DigestMechanism"),
    inline("RandomInfo", &WTLS_RANDOM_DATA),
    fixed("pVersion", 1),
]);

param_spec!(WTLS_PRF_PARAMS, "CK_WTLS_PRF_PARAMS", readable = true, [
    ulong("DigestMechanism"),
    buffer("pSeed", "ulSeedLen"),
    length("ulSeedLen"),
    buffer("pLabel", "ulLabelLen"),
    length("ulLabelLen"),
    buffer_len_ptr("pOutput", "pulOutputLen"),
    length_ptr("pulOutputLen"),
]);

param_spec!(WTLS_KEY_MAT_OUT, "CK_WTLS_KEY_MAT_OUT", readable = true, [
    ulong("hMacSecret"),
    ulong("hKey"),
    output("pIV"),
]);

param_spec!(WTLS_KEY_MAT_PARAMS, "CK_WTLS_KEY_MAT_PARAMS", readable = true, [
    ulong("DigestMechanism"),
    ulong("ulMacSizeInBits"),
    ulong("ulKeySizeInBits"),
    ulong("ulIVSizeInBits"),
    ulong("ulSequenceNumber"),
    byte("bIsExport"),
    inline("RandomInfo", &WTLS_RANDOM_DATA),
    pointer("pReturnedKeyMaterial", &WTLS_KEY_MAT_OUT),
]);

// Miscellaneous

param_spec!(CMS_SIG_PARAMS, "CK_CMS_SIG_PARAMS", [
    ulong("certificateHandle"),
    pointer("pSigningMechanism", &MECHANISM),
    pointer("pDigestMechanism", &MECHANISM),
    text("pContentType"),
    buffer("pRequestedAttributes", "ulRequestedAttributesLen"),
    length("ulRequestedAttributesLen"),
    buffer("pRequiredAttributes", "ulRequiredAttributesLen"),
    length("ulRequiredAttributesLen"),
]);

param_spec!(KEY_DERIVATION_STRING_DATA, "CK_KEY_DERIVATION_STRING_DATA", [
    buffer("pData", "ulLen"),
    length("ulLen"),
]);

param_spec!(OTP_PARAM, "CK_OTP_PARAM", readable = true, [
    ulong("type"),
    buffer("pValue", "ulValueLen"),
    length("ulValueLen"),
]);

param_spec!(OTP_PARAMS, "CK_OTP_PARAMS", [
    struct_array("pParams", &OTP_PARAM, "ulCount"),
    length("ulCount"),
]);

param_spec!(OTP_SIGNATURE_INFO, "CK_OTP_SIGNATURE_INFO", readable = true, [
    struct_array("pParams", &OTP_PARAM, "ulCount"),
    length("ulCount"),
]);

param_spec!(KIP_PARAMS, "CK_KIP_PARAMS", [
    pointer("pMechanism", &MECHANISM),
    ulong("hKey"),
    buffer("pSeed", "ulSeedLen"),
    length("ulSeedLen"),
]);

param_spec!(DSA_PARAMETER_GEN_PARAM, "CK_DSA_PARAMETER_GEN_PARAM", [
    ulong("hash"),
    buffer("pSeed", "ulSeedLen"),
    length("ulSeedLen"),
    ulong("ulIndex"),
]);

param_spec!(HKDF_PARAMS, "CK_HKDF_PARAMS", [
    byte("bExtract"),
    byte("bExpand"),
    ulong("prfHashMechanism"),
    ulong("ulSaltType"),
    buffer("pSalt", "ulSaltLen"),
    length("ulSaltLen"),
    ulong("hSaltKey"),
    buffer("pInfo", "ulInfoLen"),
    length("ulInfoLen"),
]);

/// Every known parameter structure.
pub static ALL: &[&ParamSpec] = &[
    &VERSION,
    &MECHANISM,
    &RSA_PKCS_OAEP_PARAMS,
    &RSA_PKCS_PSS_PARAMS,
    &RSA_AES_KEY_WRAP_PARAMS,
    &ECDH1_DERIVE_PARAMS,
    &ECDH2_DERIVE_PARAMS,
    &ECMQV_DERIVE_PARAMS,
    &ECDH_AES_KEY_WRAP_PARAMS,
    &X9_42_DH1_DERIVE_PARAMS,
    &X9_42_DH2_DERIVE_PARAMS,
    &X9_42_MQV_DERIVE_PARAMS,
    &KEA_DERIVE_PARAMS,
    &GOSTR3410_DERIVE_PARAMS,
    &GOSTR3410_KEY_WRAP_PARAMS,
    &EDDSA_PARAMS,
    &RC2_CBC_PARAMS,
    &RC2_MAC_GENERAL_PARAMS,
    &RC5_PARAMS,
    &RC5_CBC_PARAMS,
    &RC5_MAC_GENERAL_PARAMS,
    &DES_CBC_ENCRYPT_DATA_PARAMS,
    &AES_CBC_ENCRYPT_DATA_PARAMS,
    &CAMELLIA_CBC_ENCRYPT_DATA_PARAMS,
    &ARIA_CBC_ENCRYPT_DATA_PARAMS,
    &SEED_CBC_ENCRYPT_DATA_PARAMS,
    &AES_CTR_PARAMS,
    &CAMELLIA_CTR_PARAMS,
    &GCM_PARAMS,
    &CCM_PARAMS,
    &SALSA20_CHACHA20_POLY1305_PARAMS,
    &KEY_WRAP_SET_OAEP_PARAMS,
    &SKIPJACK_PRIVATE_WRAP_PARAMS,
    &SKIPJACK_RELAYX_PARAMS,
    &PBE_PARAMS,
    &PKCS5_PBKD2_PARAMS,
    &PKCS5_PBKD2_PARAMS2,
    &SSL3_RANDOM_DATA,
    &SSL3_MASTER_KEY_DERIVE_PARAMS,
    &SSL3_KEY_MAT_OUT,
    &SSL3_KEY_MAT_PARAMS,
    &TLS_PRF_PARAMS,
    &TLS12_MASTER_KEY_DERIVE_PARAMS,
    &TLS12_KEY_MAT_PARAMS,
    &TLS_KDF_PARAMS,
    &TLS_MAC_PARAMS,
    &WTLS_RANDOM_DATA,
    &WTLS_MASTER_KEY_DERIVE_PARAMS,
    &WTLS_PRF_PARAMS,
    &WTLS_KEY_MAT_OUT,
    &WTLS_KEY_MAT_PARAMS,
    &CMS_SIG_PARAMS,
    &KEY_DERIVATION_STRING_DATA,
    &OTP_PARAM,
    &OTP_PARAMS,
    &OTP_SIGNATURE_INFO,
    &KIP_PARAMS,
    &DSA_PARAMETER_GEN_PARAM,
    &HKDF_PARAMS,
];

/// Look a structure up by its Cryptoki name, with or without the `CK_`
/// prefix.
pub fn find(name: &str) -> Option<&'static ParamSpec> {
    let wanted = name.strip_prefix("CK_").unwrap_or(name);
    ALL.iter()
        .copied()
        .find(|spec| spec.name.strip_prefix("CK_").unwrap_or(spec.name).eq_ignore_ascii_case(wanted))
}
