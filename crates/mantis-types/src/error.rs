/// Cryptographic primitive errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("null or empty input")]
    NullInput,
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid key")]
    InvalidKey,

    // Buffer errors
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("input data too long")]
    InputOverflow,

    // Hash errors
    #[error("hash: context already finalized")]
    HashFinalized,

    // BigNum errors
    #[error("big number: division by zero")]
    BnDivisionByZero,
    #[error("big number: no modular inverse")]
    BnNoInverse,
    #[error("big number: prime generation failed")]
    BnPrimeGenFail,
    #[error("big number: random generation failed")]
    BnRandGenFail,

    // RSA errors
    #[error("rsa: invalid key bits")]
    RsaInvalidKeyBits,
    #[error("rsa: invalid public exponent")]
    RsaInvalidExponent,
    #[error("rsa: verification failed")]
    RsaVerifyFail,
    #[error("rsa: invalid padding")]
    RsaInvalidPadding,
    #[error("rsa: message too long for modulus")]
    RsaDataTooLarge,

    // ECC errors
    #[error("ecc: point at infinity")]
    EccPointAtInfinity,
    #[error("ecc: point not on curve")]
    EccPointNotOnCurve,
    #[error("ecc: invalid private key")]
    EccInvalidPrivateKey,
    #[error("ecc: invalid public key")]
    EccInvalidPublicKey,
    #[error("ecdsa: verification failed")]
    EcdsaVerifyFail,

    // DSA / DH errors
    #[error("dsa: verification failed")]
    DsaVerifyFail,
    #[error("dsa: invalid domain parameters")]
    DsaInvalidParams,
    #[error("dh: invalid peer public value")]
    DhInvalidPublicKey,

    // Curve25519 errors
    #[error("ed25519: verification failed")]
    Ed25519VerifyFail,

    /// A key agreement produced an all-zero or identity shared secret.
    #[error("key agreement produced a degenerate shared secret")]
    DegenerateSharedSecret,

    // Symmetric cipher errors
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("invalid tag length")]
    InvalidTagLength,
    #[error("aead: tag verification failed")]
    AeadTagVerifyFail,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("input is not a multiple of the block size")]
    NotBlockAligned,

    // DRBG errors
    #[error("drbg: not ready")]
    DrbgNotReady,
    #[error("drbg: failed to obtain entropy")]
    DrbgEntropyFail,
    #[error("drbg: reseed failed, generator disabled")]
    DrbgReseedFailed,

    // KDF errors
    #[error("kdf: derived key length overflow")]
    KdfDkLenOverflow,

    // Encoding/Decoding errors
    #[error("decode: asn1 buffer failed")]
    DecodeAsn1Fail,
    #[error("decode: unknown oid")]
    DecodeUnknownOid,
}

/// TLS engine errors.
///
/// The variants fall into four groups: argument errors, protocol errors
/// (always fatal to the connection), resource errors (`WouldBlock` is the only
/// retryable one) and internal errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlsError {
    // Argument errors
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid key length: {0}")]
    InvalidKeyLength(usize),

    // Protocol errors
    #[error("handshake failure: {0}")]
    HandshakeFailure(String),
    #[error("bad record mac")]
    BadRecordMac,
    /// Single error for every record or Finished authentication failure.
    #[error("decrypt error")]
    DecryptError,
    #[error("bad certificate: {0}")]
    BadCertificate(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("illegal parameter: {0}")]
    IllegalParameter(String),
    #[error("protocol version not supported")]
    ProtocolVersion,
    #[error("record overflow")]
    RecordOverflow,
    #[error("fatal alert received: {0}")]
    AlertReceived(u8),

    // Resource errors
    #[error("connection not ready")]
    NotReady,
    #[error("record sequence number exhausted")]
    SeqExhausted,
    #[error("operation would block")]
    WouldBlock,

    // Internal errors
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("io error: {0}")]
    Io(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl TlsError {
    /// True only for `WouldBlock`, the one condition a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TlsError::WouldBlock)
    }
}

impl From<std::io::Error> for TlsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock => TlsError::WouldBlock,
            _ => TlsError::Io(e.to_string()),
        }
    }
}

impl From<PkiError> for TlsError {
    fn from(e: PkiError) -> Self {
        TlsError::BadCertificate(e.to_string())
    }
}

/// Certificate decoding and path validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PkiError {
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("certificate expired")]
    CertExpired,
    #[error("certificate not yet valid")]
    CertNotYetValid,
    #[error("certificate chain verification failed: {0}")]
    ChainVerifyFailed(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("certificate signature invalid")]
    SignatureInvalid,
    #[error("asn1 parse error: {0}")]
    Asn1Error(String),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_would_block_maps_to_retryable() {
        let e: TlsError = std::io::Error::from(std::io::ErrorKind::WouldBlock).into();
        assert_eq!(e, TlsError::WouldBlock);
        assert!(e.is_retryable());

        let e: TlsError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(matches!(e, TlsError::Io(_)));
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_crypto_error_converts() {
        let e: TlsError = CryptoError::AeadTagVerifyFail.into();
        assert_eq!(e, TlsError::Crypto(CryptoError::AeadTagVerifyFail));
        assert!(e.to_string().contains("tag verification"));
    }

    #[test]
    fn test_pki_error_is_bad_certificate() {
        let e: TlsError = PkiError::CertExpired.into();
        assert!(matches!(e, TlsError::BadCertificate(_)));
    }
}
