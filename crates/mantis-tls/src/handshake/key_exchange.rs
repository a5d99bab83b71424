//! Ephemeral key exchange (X25519, NIST curves, FFDHE) and the static RSA
//! premaster secret.

use crate::crypt::NamedGroup;
use mantis_crypto::dh::{DhKeyPair, DhParams};
use mantis_crypto::ecdh::EcdhKeyPair;
use mantis_crypto::rsa::{RsaPrivateKey, RsaPublicKey};
use mantis_crypto::x25519::{X25519PrivateKey, X25519PublicKey};
use mantis_types::{SecureRandom, TlsError};
use subtle::{ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroizing;

/// Smallest DHE prime a client accepts from a ServerKeyExchange.
pub const MIN_DH_PRIME_BYTES: usize = 256;

enum ShareKey {
    X25519(X25519PrivateKey),
    Ecdh(Box<EcdhKeyPair>),
    Dh(Box<DhKeyPair>),
}

/// One side's ephemeral key pair.
pub struct KeyShare {
    group: Option<NamedGroup>,
    key: ShareKey,
    public: Vec<u8>,
}

impl KeyShare {
    pub fn generate(group: NamedGroup, rng: &mut dyn SecureRandom) -> Result<Self, TlsError> {
        let key = if group == NamedGroup::X25519 {
            ShareKey::X25519(X25519PrivateKey::generate(rng)?)
        } else if let Some(curve) = group.curve() {
            ShareKey::Ecdh(Box::new(EcdhKeyPair::generate(curve, rng)?))
        } else if let Some(id) = group.ffdhe() {
            ShareKey::Dh(Box::new(DhKeyPair::generate(&DhParams::from_group(id), rng)?))
        } else {
            return Err(TlsError::HandshakeFailure(format!("unsupported group 0x{:04X}", group.0)));
        };
        Self::with_key(Some(group), key)
    }

    /// Client side of TLS 1.2 DHE, over the server's explicit parameters.
    pub fn generate_dh(p: &[u8], g: &[u8], rng: &mut dyn SecureRandom) -> Result<Self, TlsError> {
        let p = strip_leading_zeros(p);
        if p.len() < MIN_DH_PRIME_BYTES {
            return Err(TlsError::HandshakeFailure(format!("DH prime of {} bits", p.len() * 8)));
        }
        let params = DhParams::new(p, g)?;
        Self::with_key(None, ShareKey::Dh(Box::new(DhKeyPair::generate(&params, rng)?)))
    }

    fn with_key(group: Option<NamedGroup>, key: ShareKey) -> Result<Self, TlsError> {
        let public = match &key {
            ShareKey::X25519(k) => k.public_key().as_bytes().to_vec(),
            ShareKey::Ecdh(k) => k.public_key_bytes()?,
            ShareKey::Dh(k) => k.public_key_bytes()?,
        };
        Ok(Self { group, key, public })
    }

    /// `None` for DHE over server-chosen parameters.
    pub fn group(&self) -> Option<NamedGroup> {
        self.group
    }

    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    /// `(p, g)` of a finite-field share.
    pub fn dh_params(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        match &self.key {
            ShareKey::Dh(k) => Some((k.params().p_bytes(), k.params().g_bytes())),
            _ => None,
        }
    }

    /// Shared secret with the peer's public value. Finite-field secrets
    /// are left-padded to the prime length, as TLS 1.3 requires.
    pub fn agree(&self, peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, TlsError> {
        Ok(match &self.key {
            ShareKey::X25519(k) => k.diffie_hellman(&X25519PublicKey::from_bytes(peer)?)?,
            ShareKey::Ecdh(k) => k.compute_shared_secret(peer)?,
            ShareKey::Dh(k) => k.compute_shared_secret(peer)?,
        })
    }

    /// TLS 1.2 premaster secret: finite-field leading zeros are removed
    /// (RFC 5246 §8.1.2).
    pub fn agree_tls12(&self, peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, TlsError> {
        let secret = self.agree(peer)?;
        Ok(match self.key {
            ShareKey::Dh(_) => Zeroizing::new(strip_leading_zeros(&secret).to_vec()),
            _ => secret,
        })
    }
}

fn strip_leading_zeros(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    &data[start..]
}

/// Client: a fresh 48-byte premaster led by the offered version, and its
/// encryption under the server's key.
pub fn rsa_premaster(
    server_key: &RsaPublicKey,
    client_version: u16,
    rng: &mut dyn SecureRandom,
) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>), TlsError> {
    let mut pms = Zeroizing::new(vec![0u8; 48]);
    rng.fill_bytes(&mut pms[2..])?;
    pms[..2].copy_from_slice(&client_version.to_be_bytes());
    let encrypted = server_key.encrypt_pkcs1(&pms, rng)?;
    Ok((pms, encrypted))
}

/// Server: recover the premaster without revealing whether decryption or
/// the version check failed (RFC 5246 §7.4.7.1). On any failure a random
/// premaster is substituted and the handshake fails later at Finished.
pub fn decrypt_rsa_premaster(
    key: &RsaPrivateKey,
    encrypted: &[u8],
    client_version: u16,
    rng: &mut dyn SecureRandom,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut fallback = Zeroizing::new(vec![0u8; 48]);
    rng.fill_bytes(&mut fallback[2..])?;
    fallback[..2].copy_from_slice(&client_version.to_be_bytes());

    let decrypted = key.decrypt_pkcs1(encrypted);
    let (candidate, length_ok): (&[u8], u8) = match &decrypted {
        Ok(pt) if pt.len() == 48 => (pt.as_slice(), 1),
        _ => (fallback.as_slice(), 0),
    };
    let accept = subtle::Choice::from(length_ok) & candidate[..2].ct_eq(&client_version.to_be_bytes());

    let mut out = Zeroizing::new(vec![0u8; 48]);
    for (o, (f, c)) in out.iter_mut().zip(fallback.iter().zip(candidate)) {
        *o = u8::conditional_select(f, c, accept);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_crypto::rand::OsRandom;

    #[test]
    fn test_ecdhe_groups_agree() {
        for group in [NamedGroup::X25519, NamedGroup::SECP256R1, NamedGroup::SECP384R1] {
            let a = KeyShare::generate(group, &mut OsRandom).unwrap();
            let b = KeyShare::generate(group, &mut OsRandom).unwrap();
            assert_eq!(a.group(), Some(group));
            let s1 = a.agree(b.public_bytes()).unwrap();
            let s2 = b.agree(a.public_bytes()).unwrap();
            assert_eq!(*s1, *s2);
        }
        let p256 = KeyShare::generate(NamedGroup::SECP256R1, &mut OsRandom).unwrap();
        assert_eq!(p256.public_bytes().len(), 65);
        assert_eq!(p256.public_bytes()[0], 0x04);
    }

    #[test]
    fn test_ffdhe_padding_rules() {
        let server = KeyShare::generate(NamedGroup::FFDHE2048, &mut OsRandom).unwrap();
        let (p, g) = server.dh_params().unwrap();
        assert_eq!(p.len(), 256);
        let client = KeyShare::generate_dh(&p, &g, &mut OsRandom).unwrap();
        assert_eq!(client.group(), None);

        let padded = server.agree(client.public_bytes()).unwrap();
        assert_eq!(padded.len(), 256);
        let s12 = client.agree_tls12(server.public_bytes()).unwrap();
        assert_eq!(&padded[padded.len() - s12.len()..], &s12[..]);
        assert_ne!(s12[0], 0);
    }

    #[test]
    fn test_small_dh_prime_rejected() {
        let res = KeyShare::generate_dh(&[0xFF; 64], &[2], &mut OsRandom);
        assert!(matches!(res, Err(TlsError::HandshakeFailure(_))));
    }

    #[test]
    fn test_bad_peer_share() {
        let a = KeyShare::generate(NamedGroup::X25519, &mut OsRandom).unwrap();
        assert!(a.agree(&[0u8; 32]).is_err());
        assert!(a.agree(&[1u8; 5]).is_err());
        assert!(KeyShare::generate(NamedGroup(0x9999), &mut OsRandom).is_err());
    }

    #[test]
    fn test_rsa_premaster_fallback() {
        let key = RsaPrivateKey::generate(1024, &mut OsRandom).unwrap();
        let (pms, ct) = rsa_premaster(key.public_key(), 0x0303, &mut OsRandom).unwrap();
        assert_eq!(&pms[..2], &[3, 3]);
        let got = decrypt_rsa_premaster(&key, &ct, 0x0303, &mut OsRandom).unwrap();
        assert_eq!(*got, *pms);

        // wrong version: random substitute carrying the expected version
        let got = decrypt_rsa_premaster(&key, &ct, 0x0302, &mut OsRandom).unwrap();
        assert_ne!(*got, *pms);
        assert_eq!(&got[..2], &[3, 2]);

        let mut garbage = ct.clone();
        garbage[10] ^= 1;
        let got = decrypt_rsa_premaster(&key, &garbage, 0x0303, &mut OsRandom).unwrap();
        assert_eq!(got.len(), 48);
        assert_ne!(*got, *pms);
    }
}
