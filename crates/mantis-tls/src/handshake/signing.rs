//! Handshake signatures: scheme selection, signing with the local
//! credential and verification against a peer certificate key.

use crate::config::PrivateKey;
use crate::crypt::{CredentialKind, SignatureScheme};
use crate::trust::PeerPublicKey;
use crate::TlsVersion;
use mantis_crypto::ecdsa::EcdsaPublicKey;
use mantis_crypto::ed25519::Ed25519PublicKey;
use mantis_crypto::hash::Hash;
use mantis_crypto::rsa::RsaPublicKey;
use mantis_types::{EccCurveId, SecureRandom, TlsError};

const SERVER_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
const CLIENT_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

/// TLS 1.3 CertificateVerify input: 64 spaces, context string, 0x00,
/// transcript hash.
pub fn certificate_verify_content(server: bool, transcript_hash: &[u8]) -> Vec<u8> {
    let context = if server { SERVER_CONTEXT } else { CLIENT_CONTEXT };
    let mut out = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    out.extend_from_slice(&[0x20; 64]);
    out.extend_from_slice(context);
    out.push(0);
    out.extend_from_slice(transcript_hash);
    out
}

/// Scheme used when a TLS 1.2 peer sent no `signature_algorithms`.
fn default_scheme(kind: CredentialKind) -> SignatureScheme {
    match kind {
        CredentialKind::Rsa => SignatureScheme::RSA_PKCS1_SHA256,
        CredentialKind::Ecdsa(EccCurveId::NistP384) => SignatureScheme::ECDSA_SECP384R1_SHA384,
        CredentialKind::Ecdsa(EccCurveId::NistP256) => SignatureScheme::ECDSA_SECP256R1_SHA256,
        CredentialKind::Ed25519 => SignatureScheme::ED25519,
    }
}

/// First scheme in the peer's preference order that this endpoint enables,
/// the version permits and `key` can produce.
pub fn select_scheme(
    key: &PrivateKey,
    peer_schemes: Option<&[SignatureScheme]>,
    local_schemes: &[SignatureScheme],
    version: TlsVersion,
) -> Result<SignatureScheme, TlsError> {
    let kind = key.kind();
    match peer_schemes {
        None if version == TlsVersion::Tls12 => Ok(default_scheme(kind)),
        None => Err(TlsError::HandshakeFailure("peer sent no signature_algorithms".into())),
        Some(peer) => peer
            .iter()
            .copied()
            .find(|s| local_schemes.contains(s) && s.allowed_in(version) && s.matches(kind))
            .ok_or_else(|| TlsError::HandshakeFailure("no common signature scheme".into())),
    }
}

fn digest(scheme: SignatureScheme, message: &[u8]) -> Result<Vec<u8>, TlsError> {
    let alg = scheme
        .hash()
        .ok_or_else(|| TlsError::Internal(format!("scheme 0x{:04X} has no digest", scheme.0)))?;
    Ok(Hash::digest(alg, message)?)
}

pub fn sign(
    key: &PrivateKey,
    scheme: SignatureScheme,
    message: &[u8],
    rng: &mut dyn SecureRandom,
) -> Result<Vec<u8>, TlsError> {
    if !scheme.matches(key.kind()) {
        return Err(TlsError::Internal(format!("scheme 0x{:04X} does not fit the key", scheme.0)));
    }
    let sig = match key {
        PrivateKey::Ed25519(kp) => kp.sign(message)?.to_vec(),
        PrivateKey::Ecdsa(kp) => kp.sign(&digest(scheme, message)?, rng)?,
        PrivateKey::Rsa(k) => {
            let hash = scheme.hash().unwrap_or(mantis_types::HashAlgId::Sha256);
            let d = digest(scheme, message)?;
            if scheme == SignatureScheme::RSA_PSS_RSAE_SHA256 {
                k.sign_pss(hash, &d, rng)?
            } else {
                k.sign_pkcs1(hash, &d)?
            }
        }
    };
    Ok(sig)
}

/// Check `signature` over `message` with the peer's certificate key.
///
/// A scheme that does not fit the key is an illegal parameter; a bad
/// signature is `DecryptError`.
pub fn verify(
    public: &PeerPublicKey,
    scheme: SignatureScheme,
    message: &[u8],
    signature: &[u8],
) -> Result<(), TlsError> {
    if !scheme.matches(public.kind()) {
        return Err(TlsError::IllegalParameter(format!(
            "signature scheme 0x{:04X} does not match the certificate key",
            scheme.0
        )));
    }
    let bad_key = |e: mantis_types::CryptoError| TlsError::BadCertificate(format!("peer key: {e}"));
    let ok = match public {
        PeerPublicKey::Ed25519(k) => Ed25519PublicKey::from_bytes(k)
            .map_err(bad_key)?
            .verify(message, signature)
            .unwrap_or(false),
        PeerPublicKey::Ec { curve, point } => EcdsaPublicKey::from_uncompressed(*curve, point)
            .map_err(bad_key)?
            .verify(&digest(scheme, message)?, signature)
            .unwrap_or(false),
        PeerPublicKey::Rsa { n, e } => {
            let key = RsaPublicKey::new(n, e).map_err(bad_key)?;
            let hash = scheme.hash().unwrap_or(mantis_types::HashAlgId::Sha256);
            let d = digest(scheme, message)?;
            if scheme == SignatureScheme::RSA_PSS_RSAE_SHA256 {
                key.verify_pss(hash, &d, signature).unwrap_or(false)
            } else {
                key.verify_pkcs1(hash, &d, signature).unwrap_or(false)
            }
        }
    };
    if ok {
        Ok(())
    } else {
        Err(TlsError::DecryptError)
    }
}
