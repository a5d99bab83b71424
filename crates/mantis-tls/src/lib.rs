#![forbid(unsafe_code)]
#![doc = "TLS 1.2 and TLS 1.3 engine: record layer, handshake state machine, session cache and connection object."]

pub mod alert;
pub mod config;
pub mod connection;
pub mod crypt;
pub mod handshake;
pub mod record;
pub mod session;
pub mod trust;

pub use config::{Context, ContextBuilder, CryptoConfig, PrivateKey, VerifyClient};
pub use connection::{Connection, Transport};
pub use handshake::HandshakeState;
pub use mantis_types::TlsError;
pub use session::{Session, SessionCache};

use std::fmt;

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// The two-byte value carried on the wire.
    pub const fn wire(self) -> u16 {
        match self {
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }

    pub fn from_wire(v: u16) -> Option<Self> {
        match v {
            0x0303 => Some(TlsVersion::Tls12),
            0x0304 => Some(TlsVersion::Tls13),
            _ => None,
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersion::Tls12 => f.write_str("TLSv1.2"),
            TlsVersion::Tls13 => f.write_str("TLSv1.3"),
        }
    }
}

/// TLS cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    // TLS 1.3
    pub const TLS_AES_128_GCM_SHA256: Self = Self(0x1301);
    pub const TLS_AES_256_GCM_SHA384: Self = Self(0x1302);
    pub const TLS_CHACHA20_POLY1305_SHA256: Self = Self(0x1303);
    pub const TLS_AES_128_CCM_SHA256: Self = Self(0x1304);

    // TLS 1.2 AEAD
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02B);
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC02C);
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256: Self = Self(0xCCA8);
    pub const TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256: Self = Self(0xCCA9);
    pub const TLS_DHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009E);
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009C);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CCM: Self = Self(0xC0AC);

    // TLS 1.2 CBC
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x003C);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0xC013);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: Self = Self(0xC009);
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256: Self = Self(0xC023);
    pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x0033);
    pub const TLS_DHE_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x0067);
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0x000A);
    pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: Self = Self(0xC012);
    pub const TLS_RSA_WITH_CAMELLIA_128_CBC_SHA: Self = Self(0x0041);
    pub const TLS_DHE_RSA_WITH_CAMELLIA_128_CBC_SHA: Self = Self(0x0045);

    /// Signalling value announcing secure renegotiation support (RFC 5746).
    pub const TLS_EMPTY_RENEGOTIATION_INFO_SCSV: Self = Self(0x00FF);
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crypt::CipherSuiteParams::from_suite(*self) {
            Ok(p) => f.write_str(p.name),
            Err(_) => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRole {
    Client,
    Server,
}

#[cfg(test)]
pub(crate) mod test_util {
    pub fn hex(s: &str) -> Vec<u8> {
        let s: String = s.split_whitespace().collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    use crate::config::PrivateKey;
    use mantis_crypto::ecdsa::EcdsaKeyPair;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rand::OsRandom;
    use mantis_crypto::rsa::RsaPrivateKey;
    use mantis_pki::x509::{CertificateBuilder, DistinguishedName, SigningKey};
    use mantis_types::EccCurveId;
    use std::sync::OnceLock;

    /// Self-signed certificate valid 2020..2096.
    fn self_signed(key: &SigningKey, cn: &str) -> Vec<u8> {
        CertificateBuilder::self_signed(DistinguishedName::new().with("CN", cn), key, 1_600_000_000, 4_000_000_000)
            .unwrap()
            .build(key, &mut OsRandom)
            .unwrap()
            .raw
    }

    pub fn ed25519_identity(seed: u8, cn: &str) -> (Vec<u8>, PrivateKey) {
        let cert = self_signed(&SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap()), cn);
        (cert, PrivateKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap()))
    }

    pub fn ecdsa_identity(curve: EccCurveId, cn: &str) -> (Vec<u8>, PrivateKey) {
        let kp = EcdsaKeyPair::generate(curve, &mut OsRandom).unwrap();
        let private = kp.private_key_bytes().unwrap();
        let cert = self_signed(&SigningKey::Ecdsa(kp), cn);
        (cert, PrivateKey::Ecdsa(EcdsaKeyPair::from_private_key(curve, &private).unwrap()))
    }

    /// One RSA key per test binary; generation is slow.
    pub fn rsa_identity(cn: &str) -> (Vec<u8>, PrivateKey) {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        let key = KEY.get_or_init(|| RsaPrivateKey::generate(1024, &mut OsRandom).unwrap());
        let cert = self_signed(&SigningKey::Rsa(key.clone()), cn);
        (cert, PrivateKey::Rsa(key.clone()))
    }
}
