//! Run-time selection of a keyed block cipher.

use crate::aes::AesKey;
use crate::camellia::CamelliaKey;
use crate::des::TripleDesKey;
use crate::idea::IdeaKey;
use crate::provider::BlockCipher;
use mantis_types::{BlockCipherId, CryptoError};

/// A block cipher keyed for one [`BlockCipherId`].
pub enum BlockCipherKey {
    Aes(AesKey),
    TripleDes(TripleDesKey),
    Camellia(CamelliaKey),
    Idea(IdeaKey),
}

impl BlockCipherKey {
    /// The key length must be exactly what `id` names. Triple-DES also
    /// accepts a 16-byte two-key bundle.
    pub fn new(id: BlockCipherId, key: &[u8]) -> Result<Self, CryptoError> {
        let two_key_des = id == BlockCipherId::TripleDes && key.len() == 16;
        if key.len() != id.key_size() && !two_key_des {
            return Err(CryptoError::InvalidKeyLength(key.len()));
        }
        Ok(match id {
            BlockCipherId::Aes128 | BlockCipherId::Aes192 | BlockCipherId::Aes256 => {
                BlockCipherKey::Aes(AesKey::new(key)?)
            }
            BlockCipherId::TripleDes => BlockCipherKey::TripleDes(TripleDesKey::new(key)?),
            BlockCipherId::Camellia128 | BlockCipherId::Camellia192 | BlockCipherId::Camellia256 => {
                BlockCipherKey::Camellia(CamelliaKey::new(key)?)
            }
            BlockCipherId::Idea => BlockCipherKey::Idea(IdeaKey::new(key)?),
        })
    }

    fn inner(&self) -> &dyn BlockCipher {
        match self {
            BlockCipherKey::Aes(k) => k,
            BlockCipherKey::TripleDes(k) => k,
            BlockCipherKey::Camellia(k) => k,
            BlockCipherKey::Idea(k) => k,
        }
    }
}

impl BlockCipher for BlockCipherKey {
    fn block_size(&self) -> usize {
        self.inner().block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner().encrypt_block(block)
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        self.inner().decrypt_block(block)
    }
}
