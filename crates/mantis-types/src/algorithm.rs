/// Hash algorithm identifiers.
///
/// This is the closed set the primitive layer dispatches over; adding an
/// algorithm means adding a variant here and one match arm in
/// `mantis_crypto::hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashAlgId {
    /// Digest length in bytes.
    pub const fn output_size(self) -> usize {
        match self {
            HashAlgId::Md5 => 16,
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha224 | HashAlgId::Sha3_224 => 28,
            HashAlgId::Sha256 | HashAlgId::Sha3_256 => 32,
            HashAlgId::Sha384 | HashAlgId::Sha3_384 => 48,
            HashAlgId::Sha512 | HashAlgId::Sha3_512 => 64,
        }
    }

    /// Internal block length in bytes (the HMAC padding width).
    pub const fn block_size(self) -> usize {
        match self {
            HashAlgId::Md5 | HashAlgId::Sha1 | HashAlgId::Sha224 | HashAlgId::Sha256 => 64,
            HashAlgId::Sha384 | HashAlgId::Sha512 => 128,
            HashAlgId::Sha3_224 => 144,
            HashAlgId::Sha3_256 => 136,
            HashAlgId::Sha3_384 => 104,
            HashAlgId::Sha3_512 => 72,
        }
    }

    /// Every identifier, in declaration order.
    pub const ALL: [HashAlgId; 10] = [
        HashAlgId::Md5,
        HashAlgId::Sha1,
        HashAlgId::Sha224,
        HashAlgId::Sha256,
        HashAlgId::Sha384,
        HashAlgId::Sha512,
        HashAlgId::Sha3_224,
        HashAlgId::Sha3_256,
        HashAlgId::Sha3_384,
        HashAlgId::Sha3_512,
    ];
}

/// Block cipher identifiers (algorithm plus key size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCipherId {
    Aes128,
    Aes192,
    Aes256,
    /// Triple-DES EDE with a 24-byte key (a 16-byte key is accepted as two-key 3DES).
    TripleDes,
    Camellia128,
    Camellia192,
    Camellia256,
    Idea,
}

impl BlockCipherId {
    /// Key length in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            BlockCipherId::Aes128 | BlockCipherId::Camellia128 | BlockCipherId::Idea => 16,
            BlockCipherId::Aes192 | BlockCipherId::Camellia192 | BlockCipherId::TripleDes => 24,
            BlockCipherId::Aes256 | BlockCipherId::Camellia256 => 32,
        }
    }

    /// Block length in bytes.
    pub const fn block_size(self) -> usize {
        match self {
            BlockCipherId::TripleDes | BlockCipherId::Idea => 8,
            _ => 16,
        }
    }
}

/// AEAD algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgId {
    Aes128Gcm,
    Aes256Gcm,
    Aes128Ccm,
    Aes256Ccm,
    /// AES-128-CCM with an 8-byte tag.
    Aes128Ccm8,
    ChaCha20Poly1305,
}

impl AeadAlgId {
    pub const fn key_size(self) -> usize {
        match self {
            AeadAlgId::Aes128Gcm | AeadAlgId::Aes128Ccm | AeadAlgId::Aes128Ccm8 => 16,
            AeadAlgId::Aes256Gcm | AeadAlgId::Aes256Ccm | AeadAlgId::ChaCha20Poly1305 => 32,
        }
    }

    pub const fn tag_size(self) -> usize {
        match self {
            AeadAlgId::Aes128Ccm8 => 8,
            _ => 16,
        }
    }

    pub const fn nonce_size(self) -> usize {
        12
    }
}

/// Elliptic curve identifiers for ECDH/ECDSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccCurveId {
    NistP256,
    NistP384,
}

impl EccCurveId {
    /// Field element / scalar length in bytes.
    pub const fn field_size(self) -> usize {
        match self {
            EccCurveId::NistP256 => 32,
            EccCurveId::NistP384 => 48,
        }
    }
}

/// Finite-field Diffie-Hellman groups (RFC 7919).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhParamId {
    Ffdhe2048,
    Ffdhe3072,
}

impl DhParamId {
    /// Prime length in bytes.
    pub const fn prime_size(self) -> usize {
        match self {
            DhParamId::Ffdhe2048 => 256,
            DhParamId::Ffdhe3072 => 384,
        }
    }
}
