//! TLS cryptographic operations wrapper.
//!
//! Bridges the TLS protocol with the `mantis-crypto` primitives: the cipher
//! suite table, named groups, signature schemes and the key schedules.

pub mod key_schedule;
pub mod key_schedule12;
pub mod keylog;
pub mod prf;
pub mod traffic_keys;
pub mod transcript;

use crate::{CipherSuite, TlsVersion};
use mantis_types::{AeadAlgId, BlockCipherId, DhParamId, EccCurveId, HashAlgId, TlsError};

/// Key exchange algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    Ecdhe,
    /// Ephemeral finite-field Diffie-Hellman, parameters sent in ServerKeyExchange.
    Dhe,
    /// Static RSA: the client encrypts the pre-master secret to the server key.
    Rsa,
    /// TLS 1.3: negotiated through key_share, not the suite.
    Tls13,
}

/// Server authentication algorithm of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlg {
    Rsa,
    /// ECDSA or EdDSA certificates (RFC 8422 §5.1.1).
    Ecdsa,
    /// TLS 1.3 suites do not constrain the certificate type.
    Any,
}

/// Record protection of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkCipher {
    Aead(AeadAlgId),
    /// MAC-then-encrypt CBC; the MAC hash lives in [`CipherSuiteParams::mac`].
    Cbc(BlockCipherId),
}

/// The kind of key behind a local or peer certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    Rsa,
    Ecdsa(EccCurveId),
    Ed25519,
}

/// Immutable description of one cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    /// IANA name.
    pub name: &'static str,
    pub version: TlsVersion,
    pub kx: KeyExchangeAlg,
    pub auth: AuthAlg,
    pub bulk: BulkCipher,
    /// HMAC hash for CBC suites.
    pub mac: Option<HashAlgId>,
    /// PRF hash (TLS 1.2) or HKDF hash (TLS 1.3).
    pub hash: HashAlgId,
}

const fn tls13(suite: u16, name: &'static str, aead: AeadAlgId, hash: HashAlgId) -> CipherSuiteParams {
    CipherSuiteParams {
        suite: CipherSuite(suite),
        name,
        version: TlsVersion::Tls13,
        kx: KeyExchangeAlg::Tls13,
        auth: AuthAlg::Any,
        bulk: BulkCipher::Aead(aead),
        mac: None,
        hash,
    }
}

const fn aead12(
    suite: u16,
    name: &'static str,
    kx: KeyExchangeAlg,
    auth: AuthAlg,
    aead: AeadAlgId,
    hash: HashAlgId,
) -> CipherSuiteParams {
    CipherSuiteParams {
        suite: CipherSuite(suite),
        name,
        version: TlsVersion::Tls12,
        kx,
        auth,
        bulk: BulkCipher::Aead(aead),
        mac: None,
        hash,
    }
}

const fn cbc12(
    suite: u16,
    name: &'static str,
    kx: KeyExchangeAlg,
    auth: AuthAlg,
    cipher: BlockCipherId,
    mac: HashAlgId,
) -> CipherSuiteParams {
    CipherSuiteParams {
        suite: CipherSuite(suite),
        name,
        version: TlsVersion::Tls12,
        kx,
        auth,
        bulk: BulkCipher::Cbc(cipher),
        mac: Some(mac),
        hash: HashAlgId::Sha256,
    }
}

use AeadAlgId::{Aes128Ccm, Aes128Gcm, Aes256Gcm, ChaCha20Poly1305};
use AuthAlg::{Ecdsa, Rsa as RsaAuth};
use BlockCipherId::{Aes128, Camellia128, TripleDes};
use HashAlgId::{Sha1, Sha256, Sha384};
use KeyExchangeAlg::{Dhe, Ecdhe, Rsa as RsaKx};

static CIPHER_SUITES: &[CipherSuiteParams] = &[
    tls13(0x1301, "TLS_AES_128_GCM_SHA256", Aes128Gcm, Sha256),
    tls13(0x1302, "TLS_AES_256_GCM_SHA384", Aes256Gcm, Sha384),
    tls13(0x1303, "TLS_CHACHA20_POLY1305_SHA256", ChaCha20Poly1305, Sha256),
    tls13(0x1304, "TLS_AES_128_CCM_SHA256", Aes128Ccm, Sha256),
    aead12(0xC02B, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", Ecdhe, Ecdsa, Aes128Gcm, Sha256),
    aead12(0xC02C, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", Ecdhe, Ecdsa, Aes256Gcm, Sha384),
    aead12(0xC02F, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", Ecdhe, RsaAuth, Aes128Gcm, Sha256),
    aead12(0xC030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", Ecdhe, RsaAuth, Aes256Gcm, Sha384),
    aead12(0xCCA8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", Ecdhe, RsaAuth, ChaCha20Poly1305, Sha256),
    aead12(0xCCA9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", Ecdhe, Ecdsa, ChaCha20Poly1305, Sha256),
    aead12(0x009E, "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256", Dhe, RsaAuth, Aes128Gcm, Sha256),
    aead12(0x009C, "TLS_RSA_WITH_AES_128_GCM_SHA256", RsaKx, RsaAuth, Aes128Gcm, Sha256),
    aead12(0xC0AC, "TLS_ECDHE_ECDSA_WITH_AES_128_CCM", Ecdhe, Ecdsa, Aes128Ccm, Sha256),
    cbc12(0x002F, "TLS_RSA_WITH_AES_128_CBC_SHA", RsaKx, RsaAuth, Aes128, Sha1),
    cbc12(0x003C, "TLS_RSA_WITH_AES_128_CBC_SHA256", RsaKx, RsaAuth, Aes128, Sha256),
    cbc12(0xC013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", Ecdhe, RsaAuth, Aes128, Sha1),
    cbc12(0xC009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", Ecdhe, Ecdsa, Aes128, Sha1),
    cbc12(0xC023, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256", Ecdhe, Ecdsa, Aes128, Sha256),
    cbc12(0x0033, "TLS_DHE_RSA_WITH_AES_128_CBC_SHA", Dhe, RsaAuth, Aes128, Sha1),
    cbc12(0x0067, "TLS_DHE_RSA_WITH_AES_128_CBC_SHA256", Dhe, RsaAuth, Aes128, Sha256),
    cbc12(0x000A, "TLS_RSA_WITH_3DES_EDE_CBC_SHA", RsaKx, RsaAuth, TripleDes, Sha1),
    cbc12(0xC012, "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA", Ecdhe, RsaAuth, TripleDes, Sha1),
    cbc12(0x0041, "TLS_RSA_WITH_CAMELLIA_128_CBC_SHA", RsaKx, RsaAuth, Camellia128, Sha1),
    cbc12(0x0045, "TLS_DHE_RSA_WITH_CAMELLIA_128_CBC_SHA", Dhe, RsaAuth, Camellia128, Sha1),
];

impl CipherSuiteParams {
    /// Look up a suite in the fixed table.
    pub fn from_suite(suite: CipherSuite) -> Result<&'static Self, TlsError> {
        CIPHER_SUITES
            .iter()
            .find(|p| p.suite == suite)
            .ok_or_else(|| TlsError::HandshakeFailure(format!("unknown cipher suite 0x{:04X}", suite.0)))
    }

    /// Every supported suite, TLS 1.3 first.
    pub fn all() -> &'static [CipherSuiteParams] {
        CIPHER_SUITES
    }

    pub fn is_tls13(&self) -> bool {
        self.version == TlsVersion::Tls13
    }

    pub fn key_len(&self) -> usize {
        match self.bulk {
            BulkCipher::Aead(a) => a.key_size(),
            BulkCipher::Cbc(c) => c.key_size(),
        }
    }

    /// Implicit IV taken from the key block (TLS 1.2) or the traffic
    /// secret (TLS 1.3). CBC records carry their whole IV.
    pub fn fixed_iv_len(&self) -> usize {
        match self.bulk {
            BulkCipher::Aead(_) if self.is_tls13() => 12,
            BulkCipher::Aead(ChaCha20Poly1305) => 12,
            BulkCipher::Aead(_) => 4,
            BulkCipher::Cbc(_) => 0,
        }
    }

    /// Explicit per-record IV or nonce carried on the wire.
    pub fn record_iv_len(&self) -> usize {
        match self.bulk {
            BulkCipher::Aead(_) if self.is_tls13() => 0,
            BulkCipher::Aead(ChaCha20Poly1305) => 0,
            BulkCipher::Aead(_) => 8,
            BulkCipher::Cbc(c) => c.block_size(),
        }
    }

    pub fn tag_len(&self) -> usize {
        match self.bulk {
            BulkCipher::Aead(a) => a.tag_size(),
            BulkCipher::Cbc(_) => 0,
        }
    }

    pub fn mac_key_len(&self) -> usize {
        self.mac.map_or(0, |h| h.output_size())
    }

    /// Length of the TLS 1.2 key block (RFC 5246 §6.3).
    pub fn key_block_len(&self) -> usize {
        2 * (self.mac_key_len() + self.key_len() + self.fixed_iv_len())
    }

    /// Whether a server holding a `kind` certificate can use this suite.
    pub fn accepts_credential(&self, kind: CredentialKind) -> bool {
        match self.auth {
            AuthAlg::Any => true,
            AuthAlg::Rsa => kind == CredentialKind::Rsa,
            AuthAlg::Ecdsa => matches!(kind, CredentialKind::Ecdsa(_) | CredentialKind::Ed25519),
        }
    }
}

/// Pick the first suite of `server_prefs` that the client offered, that
/// belongs to `version` and that the server credential can authenticate.
pub fn select_cipher_suite(
    server_prefs: &[CipherSuite],
    client_offer: &[CipherSuite],
    version: TlsVersion,
    credential: CredentialKind,
) -> Result<&'static CipherSuiteParams, TlsError> {
    server_prefs
        .iter()
        .filter(|s| client_offer.contains(s))
        .filter_map(|s| CipherSuiteParams::from_suite(*s).ok())
        .find(|p| p.version == version && p.accepts_credential(credential))
        .ok_or_else(|| TlsError::HandshakeFailure("no shared cipher suite".into()))
}

/// TLS named group identifiers (for key exchange).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    pub const SECP256R1: Self = Self(0x0017);
    pub const SECP384R1: Self = Self(0x0018);
    pub const X25519: Self = Self(0x001D);
    pub const FFDHE2048: Self = Self(0x0100);
    pub const FFDHE3072: Self = Self(0x0101);

    pub const SUPPORTED: [NamedGroup; 5] = [
        NamedGroup::X25519,
        NamedGroup::SECP256R1,
        NamedGroup::SECP384R1,
        NamedGroup::FFDHE2048,
        NamedGroup::FFDHE3072,
    ];

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }

    /// X25519 and the NIST curves, usable with ECDHE suites.
    pub fn is_ecdhe(self) -> bool {
        matches!(self, NamedGroup::X25519 | NamedGroup::SECP256R1 | NamedGroup::SECP384R1)
    }

    pub fn curve(self) -> Option<EccCurveId> {
        match self {
            NamedGroup::SECP256R1 => Some(EccCurveId::NistP256),
            NamedGroup::SECP384R1 => Some(EccCurveId::NistP384),
            _ => None,
        }
    }

    pub fn ffdhe(self) -> Option<DhParamId> {
        match self {
            NamedGroup::FFDHE2048 => Some(DhParamId::Ffdhe2048),
            NamedGroup::FFDHE3072 => Some(DhParamId::Ffdhe3072),
            _ => None,
        }
    }
}

/// TLS signature scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureScheme(pub u16);

impl SignatureScheme {
    pub const RSA_PKCS1_SHA256: Self = Self(0x0401);
    pub const ECDSA_SECP256R1_SHA256: Self = Self(0x0403);
    pub const ECDSA_SECP384R1_SHA384: Self = Self(0x0503);
    pub const RSA_PSS_RSAE_SHA256: Self = Self(0x0804);
    pub const ED25519: Self = Self(0x0807);

    pub const SUPPORTED: [SignatureScheme; 5] = [
        SignatureScheme::ED25519,
        SignatureScheme::ECDSA_SECP256R1_SHA256,
        SignatureScheme::ECDSA_SECP384R1_SHA384,
        SignatureScheme::RSA_PSS_RSAE_SHA256,
        SignatureScheme::RSA_PKCS1_SHA256,
    ];

    /// Digest applied before signing; `None` for Ed25519.
    pub fn hash(self) -> Option<HashAlgId> {
        match self {
            SignatureScheme::ECDSA_SECP384R1_SHA384 => Some(HashAlgId::Sha384),
            SignatureScheme::ED25519 => None,
            _ => Some(HashAlgId::Sha256),
        }
    }

    /// PKCS#1 v1.5 signatures are not allowed in TLS 1.3 handshakes.
    pub fn allowed_in(self, version: TlsVersion) -> bool {
        Self::SUPPORTED.contains(&self)
            && !(version == TlsVersion::Tls13 && self == SignatureScheme::RSA_PKCS1_SHA256)
    }

    /// Whether a key of `kind` produces signatures under this scheme.
    pub fn matches(self, kind: CredentialKind) -> bool {
        match kind {
            CredentialKind::Ed25519 => self == SignatureScheme::ED25519,
            CredentialKind::Ecdsa(EccCurveId::NistP256) => self == SignatureScheme::ECDSA_SECP256R1_SHA256,
            CredentialKind::Ecdsa(EccCurveId::NistP384) => self == SignatureScheme::ECDSA_SECP384R1_SHA384,
            CredentialKind::Rsa => {
                self == SignatureScheme::RSA_PSS_RSAE_SHA256 || self == SignatureScheme::RSA_PKCS1_SHA256
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_ids_unique_and_named() {
        let all = CipherSuiteParams::all();
        for (i, a) in all.iter().enumerate() {
            assert!(a.name.starts_with("TLS_"));
            assert!(all[i + 1..].iter().all(|b| b.suite != a.suite));
        }
        assert_eq!(all.len(), 24);
    }

    #[test]
    fn test_suite_lengths() {
        let gcm = CipherSuiteParams::from_suite(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256).unwrap();
        assert_eq!((gcm.key_len(), gcm.fixed_iv_len(), gcm.record_iv_len(), gcm.tag_len()), (16, 4, 8, 16));
        assert_eq!(gcm.key_block_len(), 40);

        let chacha =
            CipherSuiteParams::from_suite(CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256).unwrap();
        assert_eq!((chacha.fixed_iv_len(), chacha.record_iv_len()), (12, 0));

        let cbc = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        assert_eq!((cbc.mac_key_len(), cbc.key_len(), cbc.record_iv_len()), (20, 16, 16));
        assert_eq!(cbc.key_block_len(), 72);

        let des = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA).unwrap();
        assert_eq!((des.key_len(), des.record_iv_len()), (24, 8));

        let t13 = CipherSuiteParams::from_suite(CipherSuite::TLS_AES_256_GCM_SHA384).unwrap();
        assert_eq!((t13.key_len(), t13.fixed_iv_len(), t13.hash), (32, 12, HashAlgId::Sha384));
        assert!(CipherSuiteParams::from_suite(CipherSuite(0x0005)).is_err());
    }

    #[test]
    fn test_selection_respects_credential_and_version() {
        let server = [
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            CipherSuite::TLS_AES_128_GCM_SHA256,
        ];
        let client = [
            CipherSuite::TLS_AES_128_GCM_SHA256,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        ];
        let p = select_cipher_suite(&server, &client, TlsVersion::Tls12, CredentialKind::Rsa).unwrap();
        assert_eq!(p.suite, CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        let p = select_cipher_suite(&server, &client, TlsVersion::Tls12, CredentialKind::Ed25519).unwrap();
        assert_eq!(p.suite, CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256);
        let p = select_cipher_suite(&server, &client, TlsVersion::Tls13, CredentialKind::Rsa).unwrap();
        assert_eq!(p.suite, CipherSuite::TLS_AES_128_GCM_SHA256);
        assert!(matches!(
            select_cipher_suite(&server, &client[..1], TlsVersion::Tls12, CredentialKind::Rsa),
            Err(TlsError::HandshakeFailure(_))
        ));
    }

    #[test]
    fn test_signature_scheme_rules() {
        assert!(!SignatureScheme::RSA_PKCS1_SHA256.allowed_in(TlsVersion::Tls13));
        assert!(SignatureScheme::RSA_PKCS1_SHA256.allowed_in(TlsVersion::Tls12));
        assert!(!SignatureScheme(0x0601).allowed_in(TlsVersion::Tls12));
        assert!(SignatureScheme::ECDSA_SECP384R1_SHA384.matches(CredentialKind::Ecdsa(EccCurveId::NistP384)));
        assert!(!SignatureScheme::ECDSA_SECP256R1_SHA256.matches(CredentialKind::Ecdsa(EccCurveId::NistP384)));
        assert_eq!(SignatureScheme::ED25519.hash(), None);
    }

    fn suites13() -> Vec<CipherSuite> {
        CipherSuiteParams::all()
            .iter()
            .filter(|p| p.is_tls13())
            .map(|p| p.suite)
            .collect()
    }

    proptest! {
        #[test]
        fn prop_server_preference_wins(
            server in Just(suites13()).prop_shuffle(),
            client in Just(suites13()).prop_shuffle(),
            take in 1usize..=4,
        ) {
            let client = &client[..take];
            let chosen = select_cipher_suite(&server, client, TlsVersion::Tls13, CredentialKind::Rsa)
                .unwrap()
                .suite;
            let expected = *server.iter().find(|s| client.contains(s)).unwrap();
            prop_assert_eq!(chosen, expected);
        }
    }
}
