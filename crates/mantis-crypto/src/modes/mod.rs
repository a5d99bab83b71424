//! Block cipher modes of operation.
//!
//! Every mode works on top of any cipher behind the
//! [`BlockCipher`](crate::provider::BlockCipher) trait. The unauthenticated
//! modes (ECB, CBC, CTR) transform caller buffers in place; the AEAD modes
//! (GCM, CCM) return `ciphertext || tag` and verify before releasing
//! plaintext.

pub mod cbc;
pub mod ccm;
pub mod ctr;
pub mod ecb;
pub mod gcm;

use crate::provider::BlockCipher;
use mantis_types::CryptoError;

fn check_aligned(cipher: &dyn BlockCipher, len: usize) -> Result<usize, CryptoError> {
    let bs = cipher.block_size();
    if len % bs != 0 {
        return Err(CryptoError::NotBlockAligned);
    }
    Ok(bs)
}
