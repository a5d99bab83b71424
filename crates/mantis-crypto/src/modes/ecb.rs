//! ECB (Electronic Codebook) mode. No padding; input must be block aligned.

use super::check_aligned;
use crate::provider::BlockCipher;
use mantis_types::CryptoError;

pub fn ecb_encrypt(cipher: &dyn BlockCipher, data: &mut [u8]) -> Result<(), CryptoError> {
    let bs = check_aligned(cipher, data.len())?;
    for block in data.chunks_exact_mut(bs) {
        cipher.encrypt_block(block)?;
    }
    Ok(())
}

pub fn ecb_decrypt(cipher: &dyn BlockCipher, data: &mut [u8]) -> Result<(), CryptoError> {
    let bs = check_aligned(cipher, data.len())?;
    for block in data.chunks_exact_mut(bs) {
        cipher.decrypt_block(block)?;
    }
    Ok(())
}
