//! Shared, read-mostly connection settings built with [`ContextBuilder`].

use std::fmt;
use std::sync::Arc;

use crate::crypt::keylog::KeyLogCallback;
use crate::crypt::{CipherSuiteParams, CredentialKind, NamedGroup, SignatureScheme};
use crate::handshake::extensions::max_fragment_code;
use crate::handshake::verify::VerifyCallback;
use crate::session::{SessionCache, DEFAULT_SESSION_TIMEOUT};
use crate::trust::{default_decoder, CertificateDecoder};
use crate::{CipherSuite, TlsVersion};
use mantis_crypto::drbg::{Drbg, DrbgConfig, EntropySource, OsEntropy, DEFAULT_RESEED_INTERVAL};
use mantis_crypto::ecdsa::EcdsaKeyPair;
use mantis_crypto::ed25519::Ed25519KeyPair;
use mantis_crypto::rsa::RsaPrivateKey;
use mantis_types::TlsError;

/// Private key of the local certificate.
#[derive(Debug)]
pub enum PrivateKey {
    Ed25519(Ed25519KeyPair),
    Ecdsa(EcdsaKeyPair),
    Rsa(RsaPrivateKey),
}

impl PrivateKey {
    pub fn kind(&self) -> CredentialKind {
        match self {
            PrivateKey::Ed25519(_) => CredentialKind::Ed25519,
            PrivateKey::Ecdsa(kp) => CredentialKind::Ecdsa(kp.public_key().curve()),
            PrivateKey::Rsa(_) => CredentialKind::Rsa,
        }
    }
}

/// Server policy for client certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyClient {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// Ask for a certificate; a missing or unverified one is tolerated.
    Request,
    /// A client certificate that validates is mandatory.
    Require,
}

/// Builds a fresh entropy source for each connection's generator.
pub type EntropyFactory = Arc<dyn Fn() -> Box<dyn EntropySource> + Send + Sync>;

/// How connections obtain randomness.
#[derive(Clone)]
pub struct CryptoConfig {
    /// Generate calls between automatic DRBG reseeds.
    pub reseed_interval: u64,
    /// `None` seeds from the operating system.
    pub entropy: Option<EntropyFactory>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            reseed_interval: DEFAULT_RESEED_INTERVAL,
            entropy: None,
        }
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("reseed_interval", &self.reseed_interval)
            .field("entropy", &self.entropy.as_ref().map_or("os", |_| "custom"))
            .finish()
    }
}

impl CryptoConfig {
    /// A seeded generator for one connection.
    pub fn new_rng(&self) -> Result<Drbg, TlsError> {
        let config = DrbgConfig {
            reseed_interval: self.reseed_interval,
            ..DrbgConfig::default()
        };
        let source: Box<dyn EntropySource> = match &self.entropy {
            Some(factory) => factory(),
            None => Box::new(OsEntropy),
        };
        let mut drbg = Drbg::with_entropy_source(config, source);
        drbg.init()?;
        Ok(drbg)
    }
}

/// Settings shared by every connection created from it.
///
/// Shared as `Arc<Context>`. The `set_*`/`add_*` mutators need `&mut self`,
/// so they apply only while the context is exclusively owned.
pub struct Context {
    min_version: TlsVersion,
    max_version: TlsVersion,
    cipher_suites: Vec<CipherSuite>,
    groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    trusted_roots: Vec<Vec<u8>>,
    certificate_chain: Vec<Vec<u8>>,
    private_key: Option<PrivateKey>,
    verify_peer: bool,
    verify_client: VerifyClient,
    session_cache: Option<Arc<SessionCache>>,
    session_timeout: u64,
    alpn_protocols: Vec<Vec<u8>>,
    server_name: Option<String>,
    extended_master_secret: bool,
    max_fragment_length: Option<usize>,
    verify_callback: Option<VerifyCallback>,
    key_log: Option<KeyLogCallback>,
    crypto: CryptoConfig,
    decoder: Option<Arc<dyn CertificateDecoder>>,
    verification_time: Option<i64>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("verify_peer", &self.verify_peer)
            .field("verify_client", &self.verify_client)
            .field("has_identity", &self.private_key.is_some())
            .field("session_cache", &self.session_cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn min_version(&self) -> TlsVersion {
        self.min_version
    }

    pub fn max_version(&self) -> TlsVersion {
        self.max_version
    }

    pub fn supports_version(&self, v: TlsVersion) -> bool {
        self.min_version <= v && v <= self.max_version
    }

    /// Preference order.
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        &self.signature_schemes
    }

    pub fn trusted_roots(&self) -> &[Vec<u8>] {
        &self.trusted_roots
    }

    pub fn certificate_chain(&self) -> &[Vec<u8>] {
        &self.certificate_chain
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn verify_client(&self) -> VerifyClient {
        self.verify_client
    }

    pub fn session_cache(&self) -> Option<&Arc<SessionCache>> {
        self.session_cache.as_ref()
    }

    /// Seconds a session or ticket stays resumable.
    pub fn session_timeout(&self) -> u64 {
        self.session_timeout
    }

    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn_protocols
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub fn max_fragment_length(&self) -> Option<usize> {
        self.max_fragment_length
    }

    pub fn verify_callback(&self) -> Option<&VerifyCallback> {
        self.verify_callback.as_ref()
    }

    pub fn key_log(&self) -> Option<&KeyLogCallback> {
        self.key_log.as_ref()
    }

    pub fn crypto(&self) -> &CryptoConfig {
        &self.crypto
    }

    pub fn decoder(&self) -> Option<&Arc<dyn CertificateDecoder>> {
        self.decoder.as_ref()
    }

    /// Fixed time for certificate validity checks; `None` uses the clock.
    pub fn verification_time(&self) -> Option<i64> {
        self.verification_time
    }

    pub fn add_trusted_root(&mut self, der: Vec<u8>) {
        self.trusted_roots.push(der);
    }

    pub fn set_verify_callback(&mut self, cb: VerifyCallback) {
        self.verify_callback = Some(cb);
    }

    pub fn set_session_cache(&mut self, cache: Option<Arc<SessionCache>>) {
        self.session_cache = cache;
    }
}

/// Builder for [`Context`]; [`ContextBuilder::build`] validates the result.
pub struct ContextBuilder {
    ctx: Context,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextBuilder").field(&self.ctx).finish()
    }
}

impl ContextBuilder {
    /// TLS 1.2 and 1.3, every known suite, peer verification on.
    pub fn new() -> Self {
        Self {
            ctx: Context {
                min_version: TlsVersion::Tls12,
                max_version: TlsVersion::Tls13,
                cipher_suites: CipherSuiteParams::all().iter().map(|p| p.suite).collect(),
                groups: vec![NamedGroup::X25519, NamedGroup::SECP256R1, NamedGroup::SECP384R1],
                signature_schemes: SignatureScheme::SUPPORTED.to_vec(),
                trusted_roots: Vec::new(),
                certificate_chain: Vec::new(),
                private_key: None,
                verify_peer: true,
                verify_client: VerifyClient::None,
                session_cache: None,
                session_timeout: DEFAULT_SESSION_TIMEOUT,
                alpn_protocols: Vec::new(),
                server_name: None,
                extended_master_secret: true,
                max_fragment_length: None,
                verify_callback: None,
                key_log: None,
                crypto: CryptoConfig::default(),
                decoder: default_decoder(),
                verification_time: None,
            },
        }
    }

    pub fn min_version(mut self, v: TlsVersion) -> Self {
        self.ctx.min_version = v;
        self
    }

    pub fn max_version(mut self, v: TlsVersion) -> Self {
        self.ctx.max_version = v;
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.ctx.cipher_suites = suites.to_vec();
        self
    }

    pub fn groups(mut self, groups: &[NamedGroup]) -> Self {
        self.ctx.groups = groups.to_vec();
        self
    }

    pub fn signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.ctx.signature_schemes = schemes.to_vec();
        self
    }

    pub fn trusted_root(mut self, der: Vec<u8>) -> Self {
        self.ctx.trusted_roots.push(der);
        self
    }

    /// Local certificate chain (leaf first) and its key.
    pub fn identity(mut self, chain: Vec<Vec<u8>>, key: PrivateKey) -> Self {
        self.ctx.certificate_chain = chain;
        self.ctx.private_key = Some(key);
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.ctx.verify_peer = verify;
        self
    }

    pub fn verify_client(mut self, policy: VerifyClient) -> Self {
        self.ctx.verify_client = policy;
        self
    }

    pub fn session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.ctx.session_cache = Some(cache);
        self
    }

    pub fn session_timeout(mut self, secs: u64) -> Self {
        self.ctx.session_timeout = secs;
        self
    }

    pub fn alpn_protocols(mut self, protocols: &[&[u8]]) -> Self {
        self.ctx.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.ctx.server_name = Some(name.to_string());
        self
    }

    pub fn extended_master_secret(mut self, enabled: bool) -> Self {
        self.ctx.extended_master_secret = enabled;
        self
    }

    /// 512, 1024, 2048 or 4096.
    pub fn max_fragment_length(mut self, len: usize) -> Self {
        self.ctx.max_fragment_length = Some(len);
        self
    }

    pub fn verify_callback(mut self, cb: VerifyCallback) -> Self {
        self.ctx.verify_callback = Some(cb);
        self
    }

    pub fn key_log(mut self, cb: KeyLogCallback) -> Self {
        self.ctx.key_log = Some(cb);
        self
    }

    pub fn crypto(mut self, crypto: CryptoConfig) -> Self {
        self.ctx.crypto = crypto;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn CertificateDecoder>) -> Self {
        self.ctx.decoder = Some(decoder);
        self
    }

    pub fn verification_time(mut self, unix: i64) -> Self {
        self.ctx.verification_time = Some(unix);
        self
    }

    pub fn build(self) -> Result<Context, TlsError> {
        let ctx = self.ctx;
        let invalid = |msg: &str| Err(TlsError::InvalidArgument(msg.to_string()));
        if ctx.min_version > ctx.max_version {
            return invalid("min_version above max_version");
        }
        if let Some(s) = ctx.cipher_suites.iter().find(|s| CipherSuiteParams::from_suite(**s).is_err()) {
            return Err(TlsError::InvalidArgument(format!("unknown cipher suite 0x{:04X}", s.0)));
        }
        let usable = ctx
            .cipher_suites
            .iter()
            .filter_map(|s| CipherSuiteParams::from_suite(*s).ok())
            .any(|p| ctx.min_version <= p.version && p.version <= ctx.max_version);
        if !usable {
            return invalid("no cipher suite for the enabled versions");
        }
        if ctx.groups.is_empty() || !ctx.groups.iter().all(|g| g.is_supported()) {
            return invalid("groups must be a non-empty list of supported groups");
        }
        if ctx.signature_schemes.is_empty() || !ctx.signature_schemes.iter().all(|s| SignatureScheme::SUPPORTED.contains(s)) {
            return invalid("signature schemes must be a non-empty list of supported schemes");
        }
        if ctx.private_key.is_some() && ctx.certificate_chain.is_empty() {
            return invalid("private key without certificate chain");
        }
        if let Some(len) = ctx.max_fragment_length {
            if max_fragment_code(len).is_none() {
                return Err(TlsError::InvalidArgument(format!("max fragment length {len}")));
            }
        }
        if ctx.alpn_protocols.iter().any(|p| p.is_empty() || p.len() > 255) {
            return invalid("ALPN protocol names must be 1..=255 bytes");
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_crypto::rand::OsRandom;
    use mantis_types::{CryptoError, EccCurveId, SecureRandom};

    #[test]
    fn test_builder_defaults() {
        let ctx = ContextBuilder::new().build().unwrap();
        assert_eq!(ctx.min_version(), TlsVersion::Tls12);
        assert_eq!(ctx.max_version(), TlsVersion::Tls13);
        assert!(ctx.verify_peer());
        assert!(ctx.extended_master_secret());
        assert_eq!(ctx.verify_client(), VerifyClient::None);
        assert_eq!(ctx.cipher_suites().len(), CipherSuiteParams::all().len());
        assert_eq!(ctx.groups()[0], NamedGroup::X25519);
        assert!(ctx.decoder().is_some());
        assert!(ctx.session_cache().is_none());
    }

    #[test]
    fn test_builder_validation() {
        assert!(ContextBuilder::new()
            .min_version(TlsVersion::Tls13)
            .max_version(TlsVersion::Tls12)
            .build()
            .is_err());
        assert!(ContextBuilder::new().cipher_suites(&[CipherSuite(0x1234)]).build().is_err());
        // TLS 1.2 suites only, TLS 1.3 only context
        assert!(ContextBuilder::new()
            .min_version(TlsVersion::Tls13)
            .cipher_suites(&[CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA])
            .build()
            .is_err());
        assert!(ContextBuilder::new().groups(&[]).build().is_err());
        assert!(ContextBuilder::new().max_fragment_length(1000).build().is_err());
        assert!(ContextBuilder::new().max_fragment_length(1024).build().is_ok());
        assert!(ContextBuilder::new().alpn_protocols(&[b""]).build().is_err());
        assert!(ContextBuilder::new()
            .identity(vec![], PrivateKey::Ed25519(Ed25519KeyPair::generate(&mut OsRandom).unwrap()))
            .build()
            .is_err());
    }

    #[test]
    fn test_private_key_kind() {
        let ec = EcdsaKeyPair::generate(EccCurveId::NistP384, &mut OsRandom).unwrap();
        assert_eq!(PrivateKey::Ecdsa(ec).kind(), CredentialKind::Ecdsa(EccCurveId::NistP384));
    }

    #[test]
    fn test_admin_mutators_need_exclusive_access() {
        let mut ctx = Arc::new(ContextBuilder::new().build().unwrap());
        let other = ctx.clone();
        assert!(Arc::get_mut(&mut ctx).is_none());
        drop(other);
        let exclusive = Arc::get_mut(&mut ctx).unwrap();
        exclusive.add_trusted_root(vec![0x30, 0x00]);
        exclusive.set_session_cache(Some(Arc::new(SessionCache::default())));
        assert_eq!(ctx.trusted_roots().len(), 1);
        assert!(ctx.session_cache().is_some());
    }

    struct CountingEntropy(Arc<std::sync::atomic::AtomicUsize>);

    impl EntropySource for CountingEntropy {
        fn get_entropy(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            buf.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
            Ok(())
        }
    }

    #[test]
    fn test_crypto_config_entropy_factory() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = calls.clone();
        let crypto = CryptoConfig {
            reseed_interval: 2,
            entropy: Some(Arc::new(move || Box::new(CountingEntropy(c.clone())) as Box<dyn EntropySource>)),
        };
        let mut rng = crypto.new_rng().unwrap();
        let seeded = calls.load(std::sync::atomic::Ordering::SeqCst);
        assert!(seeded >= 1);
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            rng.fill_bytes(&mut buf).unwrap();
        }
        // the reseed interval forced another entropy draw
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) > seeded);
    }
}
