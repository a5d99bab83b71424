//! TLS 1.3 key schedule (RFC 8446 §7.1).
//!
//! ```text
//! PSK or 0 -> Early Secret -> Handshake Secret -> Master Secret
//!                 |                  |                  |
//!            binder key       c/s hs traffic      c/s ap traffic
//!                                                  res master
//! ```

use mantis_crypto::hash::Hash;
use mantis_crypto::hkdf;
use mantis_crypto::hmac::Hmac;
use mantis_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

/// `HKDF-Expand-Label(secret, label, context, length)`; `label` excludes the
/// `"tls13 "` prefix.
pub fn hkdf_expand_label(
    alg: HashAlgId,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, TlsError> {
    let full_len = 6 + label.len();
    if full_len > 255 || context.len() > 255 || length > u16::MAX as usize {
        return Err(TlsError::Internal("hkdf label too long".into()));
    }
    let mut info = Vec::with_capacity(4 + full_len + context.len());
    info.extend_from_slice(&(length as u16).to_be_bytes());
    info.push(full_len as u8);
    info.extend_from_slice(b"tls13 ");
    info.extend_from_slice(label);
    info.push(context.len() as u8);
    info.extend_from_slice(context);
    Ok(hkdf::expand(alg, secret, &info, length)?)
}

/// `Derive-Secret(secret, label, messages)` with the transcript hash
/// already computed.
pub fn derive_secret(
    alg: HashAlgId,
    secret: &[u8],
    label: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(alg, secret, label, transcript_hash, alg.output_size())
}

/// Next-generation traffic secret for KeyUpdate (RFC 8446 §7.2).
pub fn update_traffic_secret(alg: HashAlgId, secret: &[u8]) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(alg, secret, b"traffic upd", b"", alg.output_size())
}

/// `HKDF-Expand-Label(base_key, "finished", "", Hash.length)`.
pub fn derive_finished_key(alg: HashAlgId, base_key: &[u8]) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(alg, base_key, b"finished", b"", alg.output_size())
}

/// `HMAC(finished_key, transcript_hash)`.
pub fn compute_finished_verify_data(
    alg: HashAlgId,
    finished_key: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    Ok(Hmac::mac(alg, finished_key, transcript_hash)?)
}

/// PSK for a ticket: `HKDF-Expand-Label(rms, "resumption", nonce, Hash.length)`.
pub fn derive_resumption_psk(alg: HashAlgId, rms: &[u8], nonce: &[u8]) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(alg, rms, b"resumption", nonce, alg.output_size())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheduleStage {
    Initial,
    EarlySecret,
    HandshakeSecret,
    MasterSecret,
}

/// Secret chain of one TLS 1.3 handshake. Each stage's secret replaces the
/// previous one; calling a derivation in the wrong stage is an internal
/// error.
pub struct KeySchedule {
    alg: HashAlgId,
    stage: KeyScheduleStage,
    current_secret: Vec<u8>,
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.current_secret.zeroize();
    }
}

impl KeySchedule {
    pub fn new(alg: HashAlgId) -> Self {
        Self {
            alg,
            stage: KeyScheduleStage::Initial,
            current_secret: Vec::new(),
        }
    }

    pub fn stage(&self) -> KeyScheduleStage {
        self.stage
    }

    pub fn hash_alg(&self) -> HashAlgId {
        self.alg
    }

    fn expect_stage(&self, stage: KeyScheduleStage, op: &str) -> Result<(), TlsError> {
        if self.stage != stage {
            return Err(TlsError::Internal(format!("{op}: key schedule in stage {:?}", self.stage)));
        }
        Ok(())
    }

    fn empty_hash(&self) -> Result<Vec<u8>, TlsError> {
        Ok(Hash::digest(self.alg, &[])?)
    }

    /// Advance to the next extract stage: `Extract(Derive-Secret(cur, "derived", ""), ikm)`.
    fn extract_next(&mut self, ikm: &[u8]) -> Result<(), TlsError> {
        let mut salt = derive_secret(self.alg, &self.current_secret, b"derived", &self.empty_hash()?)?;
        let next = hkdf::extract(self.alg, &salt, ikm);
        salt.zeroize();
        self.current_secret.zeroize();
        self.current_secret = next?;
        Ok(())
    }

    /// Initial -> EarlySecret. `None` uses a zero PSK.
    pub fn derive_early_secret(&mut self, psk: Option<&[u8]>) -> Result<(), TlsError> {
        self.expect_stage(KeyScheduleStage::Initial, "derive_early_secret")?;
        let zero = vec![0u8; self.alg.output_size()];
        self.current_secret = hkdf::extract(self.alg, &[], psk.unwrap_or(&zero))?;
        self.stage = KeyScheduleStage::EarlySecret;
        Ok(())
    }

    /// `res binder` key for resumption PSKs.
    pub fn derive_binder_key(&self) -> Result<Vec<u8>, TlsError> {
        self.expect_stage(KeyScheduleStage::EarlySecret, "derive_binder_key")?;
        derive_secret(self.alg, &self.current_secret, b"res binder", &self.empty_hash()?)
    }

    /// EarlySecret -> HandshakeSecret.
    pub fn derive_handshake_secret(&mut self, shared_secret: &[u8]) -> Result<(), TlsError> {
        self.expect_stage(KeyScheduleStage::EarlySecret, "derive_handshake_secret")?;
        self.extract_next(shared_secret)?;
        self.stage = KeyScheduleStage::HandshakeSecret;
        Ok(())
    }

    /// `(client, server)` handshake traffic secrets over Hash(CH..SH).
    pub fn derive_handshake_traffic_secrets(
        &self,
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.expect_stage(KeyScheduleStage::HandshakeSecret, "derive_handshake_traffic_secrets")?;
        Ok((
            derive_secret(self.alg, &self.current_secret, b"c hs traffic", transcript_hash)?,
            derive_secret(self.alg, &self.current_secret, b"s hs traffic", transcript_hash)?,
        ))
    }

    /// HandshakeSecret -> MasterSecret.
    pub fn derive_master_secret(&mut self) -> Result<(), TlsError> {
        self.expect_stage(KeyScheduleStage::HandshakeSecret, "derive_master_secret")?;
        let zero = vec![0u8; self.alg.output_size()];
        self.extract_next(&zero)?;
        self.stage = KeyScheduleStage::MasterSecret;
        Ok(())
    }

    /// `(client, server)` application traffic secrets over Hash(CH..server Finished).
    pub fn derive_app_traffic_secrets(&self, transcript_hash: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.expect_stage(KeyScheduleStage::MasterSecret, "derive_app_traffic_secrets")?;
        Ok((
            derive_secret(self.alg, &self.current_secret, b"c ap traffic", transcript_hash)?,
            derive_secret(self.alg, &self.current_secret, b"s ap traffic", transcript_hash)?,
        ))
    }

    /// Resumption master secret over Hash(CH..client Finished).
    pub fn derive_resumption_master_secret(&self, transcript_hash: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.expect_stage(KeyScheduleStage::MasterSecret, "derive_resumption_master_secret")?;
        derive_secret(self.alg, &self.current_secret, b"res master", transcript_hash)
    }
}
