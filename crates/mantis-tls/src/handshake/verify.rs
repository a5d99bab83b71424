//! Peer certificate chain policy.
//!
//! Parsing failures are always fatal. A chain that does not validate is
//! fatal only when the endpoint enforces verification; otherwise the
//! outcome is recorded and the handshake continues. A verify callback sees
//! the decoder's verdict and has the final word.

use crate::config::Context;
use crate::trust::ParsedCertificate;
use mantis_types::TlsError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// What a verify callback is shown.
pub struct VerifyInfo<'a> {
    /// The decoder accepted the chain.
    pub preverified: bool,
    pub error: Option<&'a TlsError>,
    /// Peer chain, leaf first.
    pub chain: &'a [ParsedCertificate],
}

/// Returns `true` to accept the peer chain.
pub type VerifyCallback = Arc<dyn Fn(&VerifyInfo<'_>) -> bool + Send + Sync>;

/// Outcome of peer certificate validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PeerVerification {
    /// No peer certificate was requested or received.
    #[default]
    NotChecked,
    Verified,
    /// Validation failed but the verify callback accepted the chain.
    Overridden(String),
    /// Validation failed and verification was not enforced.
    Failed(String),
}

impl PeerVerification {
    pub fn is_trusted(&self) -> bool {
        matches!(self, PeerVerification::Verified | PeerVerification::Overridden(_))
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Parse the peer chain and apply the context's verification policy.
pub fn check_peer_chain(
    ctx: &Context,
    chain: &[Vec<u8>],
    enforce: bool,
) -> Result<(Vec<ParsedCertificate>, PeerVerification), TlsError> {
    let (leaf, intermediates) = chain
        .split_first()
        .ok_or_else(|| TlsError::BadCertificate("empty certificate chain".into()))?;
    let decoder = ctx
        .decoder()
        .ok_or_else(|| TlsError::HandshakeFailure("no certificate decoder configured".into()))?;
    let parsed = chain.iter().map(|der| decoder.parse(der)).collect::<Result<Vec<_>, _>>()?;

    let check_time = ctx.verification_time().unwrap_or_else(now);
    let outcome = decoder.verify_chain(leaf, intermediates, ctx.trusted_roots(), Some(check_time));
    let accepted = match ctx.verify_callback() {
        Some(cb) => cb(&VerifyInfo {
            preverified: outcome.is_ok(),
            error: outcome.as_ref().err(),
            chain: &parsed,
        }),
        None => outcome.is_ok(),
    };

    let verification = match (&outcome, accepted) {
        (Ok(()), true) => PeerVerification::Verified,
        (Ok(()), false) => PeerVerification::Failed("rejected by verify callback".into()),
        (Err(e), true) => PeerVerification::Overridden(e.to_string()),
        (Err(e), false) => PeerVerification::Failed(e.to_string()),
    };
    if let PeerVerification::Failed(reason) = &verification {
        if enforce {
            log::warn!("peer certificate {} rejected: {reason}", parsed[0].subject);
            return Err(match outcome {
                Err(e @ TlsError::BadCertificate(_)) => e,
                _ => TlsError::BadCertificate(reason.clone()),
            });
        }
        log::debug!("peer certificate {} not verified: {reason}", parsed[0].subject);
    }
    Ok((parsed, verification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextBuilder;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rand::OsRandom;
    use mantis_pki::x509::{CertificateBuilder, DistinguishedName, SigningKey};

    fn cert(seed: u8, cn: &str) -> Vec<u8> {
        let key = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap());
        CertificateBuilder::self_signed(DistinguishedName::new().with("CN", cn), &key, 0, 4_102_444_800)
            .unwrap()
            .build(&key, &mut OsRandom)
            .unwrap()
            .raw
    }

    fn ctx(verify_peer: bool, roots: Vec<Vec<u8>>) -> Context {
        let mut b = ContextBuilder::new().verify_peer(verify_peer);
        for r in roots {
            b = b.trusted_root(r);
        }
        b.build().unwrap()
    }

    #[test]
    fn test_trusted_chain_verifies() {
        let leaf = cert(1, "server");
        let (parsed, v) = check_peer_chain(&ctx(true, vec![leaf.clone()]), &[leaf], true).unwrap();
        assert_eq!(v, PeerVerification::Verified);
        assert_eq!(parsed[0].subject, "CN=server");
    }

    #[test]
    fn test_untrusted_chain_policy() {
        let leaf = cert(1, "server");
        let other = cert(2, "other");
        let strict = ctx(true, vec![other.clone()]);
        assert!(matches!(
            check_peer_chain(&strict, &[leaf.clone()], true),
            Err(TlsError::BadCertificate(_))
        ));
        let (_, v) = check_peer_chain(&ctx(false, vec![other]), &[leaf.clone()], false).unwrap();
        assert!(matches!(v, PeerVerification::Failed(_)));
        assert!(!v.is_trusted());

        // garbage is fatal whatever the policy
        assert!(check_peer_chain(&ctx(false, vec![]), &[vec![0x30, 0x00]], false).is_err());
        assert!(check_peer_chain(&ctx(false, vec![]), &[], false).is_err());
    }

    #[test]
    fn test_callback_overrides() {
        let leaf = cert(1, "server");
        let mut c = ctx(true, vec![]);
        c.set_verify_callback(Arc::new(|info: &VerifyInfo<'_>| {
            !info.preverified && info.error.is_some() && info.chain[0].subject == "CN=server"
        }));
        let (_, v) = check_peer_chain(&c, &[leaf.clone()], true).unwrap();
        assert!(matches!(v, PeerVerification::Overridden(_)));
        assert!(v.is_trusted());

        let mut c = ctx(true, vec![leaf.clone()]);
        c.set_verify_callback(Arc::new(|_: &VerifyInfo<'_>| false));
        assert!(check_peer_chain(&c, &[leaf], true).is_err());
    }
}
