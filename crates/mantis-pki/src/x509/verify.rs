//! Certificate chain building and verification.

use mantis_types::PkiError;

use super::Certificate;

/// Default limit on the number of certificates above the leaf.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Builds a path from a leaf through intermediates to a trusted root.
///
/// Issuers are found by exact name match. Every link's signature is
/// checked, every certificate above the leaf must carry the CA flag, and
/// when a verification time is set every certificate in the path must be
/// valid at that time.
#[derive(Debug, Clone)]
pub struct CertificateVerifier {
    roots: Vec<Certificate>,
    max_depth: usize,
    time: Option<i64>,
}

impl Default for CertificateVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateVerifier {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            time: None,
        }
    }

    pub fn add_trusted_cert(&mut self, cert: Certificate) -> &mut Self {
        self.roots.push(cert);
        self
    }

    pub fn set_max_depth(&mut self, depth: usize) -> &mut Self {
        self.max_depth = depth;
        self
    }

    /// Unix seconds at which validity periods are checked. Unset means no
    /// time check.
    pub fn set_verification_time(&mut self, time: i64) -> &mut Self {
        self.time = Some(time);
        self
    }

    fn is_trusted(&self, cert: &Certificate) -> bool {
        self.roots.iter().any(|r| r.raw == cert.raw)
    }

    /// Candidate issuers of `cert`: intermediates first, then roots.
    fn issuers<'a>(
        &'a self,
        cert: &'a Certificate,
        intermediates: &'a [Certificate],
    ) -> impl Iterator<Item = &'a Certificate> + 'a {
        intermediates
            .iter()
            .chain(self.roots.iter())
            .filter(move |c| c.subject == cert.issuer && c.raw != cert.raw)
    }

    /// Verify `leaf` and return the path `[leaf, intermediates..., root]`.
    pub fn verify_chain(
        &self,
        leaf: &Certificate,
        intermediates: &[Certificate],
    ) -> Result<Vec<Certificate>, PkiError> {
        if self.roots.is_empty() {
            return Err(PkiError::ChainVerifyFailed("no trusted roots".into()));
        }
        let mut chain = vec![leaf.clone()];
        loop {
            let current = &chain[chain.len() - 1];
            if let Some(t) = self.time {
                current.check_validity(t)?;
            }
            if chain.len() > 1 && !current.is_ca() {
                return Err(PkiError::ChainVerifyFailed(format!(
                    "{} is not a CA",
                    current.subject
                )));
            }
            if self.is_trusted(current) {
                log::debug!("x509: chain of length {} ends at trusted root", chain.len());
                return Ok(chain);
            }
            if chain.len() > self.max_depth {
                return Err(PkiError::ChainVerifyFailed(format!(
                    "depth limit {} exceeded",
                    self.max_depth
                )));
            }
            let mut next = None;
            for candidate in self.issuers(current, intermediates) {
                if chain.iter().any(|c| c.raw == candidate.raw) {
                    continue;
                }
                if current.verify_signature(candidate).unwrap_or(false) {
                    next = Some(candidate.clone());
                    break;
                }
            }
            match next {
                Some(issuer) => chain.push(issuer),
                None => {
                    return Err(PkiError::ChainVerifyFailed(format!(
                        "no trusted issuer for {}",
                        current.issuer
                    )))
                }
            }
        }
    }
}
