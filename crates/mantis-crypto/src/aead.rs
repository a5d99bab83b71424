//! AEAD algorithms behind one keyed type.
//!
//! [`AeadKey`] is what the record layer holds for AEAD cipher suites. All
//! variants take a 12-byte nonce and return `ciphertext || tag`; `open`
//! authenticates before any plaintext is produced and reports every failure
//! as [`CryptoError::AeadTagVerifyFail`].

use crate::aes::AesKey;
use crate::chacha20::ChaCha20Poly1305;
use crate::modes::{ccm, gcm};
use crate::provider::Aead;
use mantis_types::{AeadAlgId, CryptoError};

enum Inner {
    Gcm(AesKey),
    Ccm(AesKey),
    ChaCha(ChaCha20Poly1305),
}

pub struct AeadKey {
    alg: AeadAlgId,
    inner: Inner,
}

impl AeadKey {
    pub fn new(alg: AeadAlgId, key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != alg.key_size() {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        let inner = match alg {
            AeadAlgId::Aes128Gcm | AeadAlgId::Aes256Gcm => Inner::Gcm(AesKey::new(key)?),
            AeadAlgId::Aes128Ccm | AeadAlgId::Aes256Ccm | AeadAlgId::Aes128Ccm8 => {
                Inner::Ccm(AesKey::new(key)?)
            }
            AeadAlgId::ChaCha20Poly1305 => Inner::ChaCha(ChaCha20Poly1305::new(key)?),
        };
        Ok(AeadKey { alg, inner })
    }

    pub fn alg(&self) -> AeadAlgId {
        self.alg
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), CryptoError> {
        if nonce.len() != self.alg.nonce_size() {
            return Err(CryptoError::InvalidIvLength);
        }
        Ok(())
    }
}

impl Aead for AeadKey {
    fn tag_size(&self) -> usize {
        self.alg.tag_size()
    }

    fn nonce_size(&self) -> usize {
        self.alg.nonce_size()
    }

    fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        match &self.inner {
            Inner::Gcm(k) => gcm::gcm_encrypt(k, nonce, aad, plaintext),
            Inner::Ccm(k) => ccm::ccm_encrypt(k, nonce, aad, plaintext, self.tag_size()),
            Inner::ChaCha(c) => c.encrypt(nonce, aad, plaintext),
        }
    }

    fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        let res = match &self.inner {
            Inner::Gcm(k) => gcm::gcm_decrypt(k, nonce, aad, ciphertext),
            Inner::Ccm(k) => ccm::ccm_decrypt(k, nonce, aad, ciphertext, self.tag_size()),
            Inner::ChaCha(c) => c.decrypt(nonce, aad, ciphertext),
        };
        res.map_err(|_| CryptoError::AeadTagVerifyFail)
    }
}
