//! CBC (Cipher Block Chaining) mode.
//!
//! The mode itself does no padding. [`pkcs7_pad`] and [`pkcs7_unpad`] are
//! supplied separately; the TLS record layer uses its own padding check.

use super::check_aligned;
use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use subtle::{ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroize;

pub fn cbc_encrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    let bs = check_aligned(cipher, data.len())?;
    if iv.len() != bs {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut prev = iv;
    for block in data.chunks_exact_mut(bs) {
        for (b, p) in block.iter_mut().zip(prev) {
            *b ^= p;
        }
        cipher.encrypt_block(block)?;
        prev = block;
    }
    Ok(())
}

pub fn cbc_decrypt(cipher: &dyn BlockCipher, iv: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    let bs = check_aligned(cipher, data.len())?;
    if iv.len() != bs {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut chain = iv.to_vec();
    let mut saved = vec![0u8; bs];
    for block in data.chunks_exact_mut(bs) {
        saved.copy_from_slice(block);
        cipher.decrypt_block(block)?;
        for (b, c) in block.iter_mut().zip(chain.iter()) {
            *b ^= c;
        }
        std::mem::swap(&mut chain, &mut saved);
    }
    chain.zeroize();
    saved.zeroize();
    Ok(())
}

/// Append PKCS#7 padding (always at least one byte).
pub fn pkcs7_pad(data: &mut Vec<u8>, block_size: usize) {
    let pad = block_size - data.len() % block_size;
    data.resize(data.len() + pad, pad as u8);
}

/// Validate PKCS#7 padding and return the unpadded length.
///
/// The check reads the final block in full whatever the pad value is.
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<usize, CryptoError> {
    if data.is_empty() || data.len() % block_size != 0 || block_size > 255 {
        return Err(CryptoError::InvalidPadding);
    }
    let pad = data[data.len() - 1];
    let mut ok = !pad.ct_eq(&0) & !(block_size as u8).ct_lt(&pad);
    for (i, &b) in data[data.len() - block_size..].iter().rev().enumerate() {
        let in_pad = (i as u8).ct_lt(&pad);
        ok &= !in_pad | b.ct_eq(&pad);
    }
    if bool::from(ok) {
        Ok(data.len() - pad as usize)
    } else {
        Err(CryptoError::InvalidPadding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::AesKey;
    use crate::camellia::CamelliaKey;
    use crate::test_util::hex;

    #[test]
    fn test_aes128_cbc_sp800_38a() {
        let key = AesKey::new(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let iv = hex("000102030405060708090a0b0c0d0e0f");
        let pt = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        let mut data = pt.clone();
        cbc_encrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(
            data,
            hex("7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2")
        );
        cbc_decrypt(&key, &iv, &mut data).unwrap();
        assert_eq!(data, pt);
    }

    #[test]
    fn test_camellia_cbc_roundtrip_with_padding() {
        let key = CamelliaKey::new(&[9u8; 16]).unwrap();
        let iv = [3u8; 16];
        let mut data = b"thirty-one bytes of plaintext!!".to_vec();
        pkcs7_pad(&mut data, 16);
        assert_eq!(data.len(), 32);
        cbc_encrypt(&key, &iv, &mut data).unwrap();
        cbc_decrypt(&key, &iv, &mut data).unwrap();
        let n = pkcs7_unpad(&data, 16).unwrap();
        assert_eq!(&data[..n], b"thirty-one bytes of plaintext!!");
    }

    #[test]
    fn test_iv_length_checked() {
        let key = AesKey::new(&[0u8; 16]).unwrap();
        assert_eq!(
            cbc_encrypt(&key, &[0u8; 8], &mut [0u8; 16]),
            Err(CryptoError::InvalidIvLength)
        );
    }

    #[test]
    fn test_pkcs7_unpad_cases() {
        let mut full = vec![1u8; 16];
        pkcs7_pad(&mut full, 16);
        assert_eq!(full.len(), 32);
        assert_eq!(pkcs7_unpad(&full, 16), Ok(16));

        let mut bad = vec![0u8; 16];
        bad[15] = 0;
        assert_eq!(pkcs7_unpad(&bad, 16), Err(CryptoError::InvalidPadding));
        bad[15] = 17;
        assert_eq!(pkcs7_unpad(&bad, 16), Err(CryptoError::InvalidPadding));
        bad[15] = 3;
        bad[14] = 3;
        bad[13] = 2;
        assert_eq!(pkcs7_unpad(&bad, 16), Err(CryptoError::InvalidPadding));
        bad[13] = 3;
        assert_eq!(pkcs7_unpad(&bad, 16), Ok(13));
        assert!(pkcs7_unpad(&[], 16).is_err());
    }
}
