//! CTR (Counter) mode with a full-width big-endian counter block.

use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use zeroize::Zeroize;

/// Increment a big-endian counter of any width, wrapping at the top.
pub(crate) fn increment_be(counter: &mut [u8]) {
    for b in counter.iter_mut().rev() {
        let (v, carry) = b.overflowing_add(1);
        *b = v;
        if !carry {
            break;
        }
    }
}

/// XOR `data` with the keystream E(ctr), E(ctr+1), ... Encryption and
/// decryption are the same call. `counter` must be one block long.
pub fn ctr_crypt(cipher: &dyn BlockCipher, counter: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    let bs = cipher.block_size();
    if counter.len() != bs {
        return Err(CryptoError::InvalidIvLength);
    }
    let mut ctr = counter.to_vec();
    let mut ks = vec![0u8; bs];
    for chunk in data.chunks_mut(bs) {
        ks.copy_from_slice(&ctr);
        cipher.encrypt_block(&mut ks)?;
        for (d, k) in chunk.iter_mut().zip(ks.iter()) {
            *d ^= k;
        }
        increment_be(&mut ctr);
    }
    ks.zeroize();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::AesKey;
    use crate::test_util::hex;

    #[test]
    fn test_aes128_ctr_sp800_38a() {
        let key = AesKey::new(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let ctr = hex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        let mut data = hex("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51");
        ctr_crypt(&key, &ctr, &mut data).unwrap();
        assert_eq!(
            data,
            hex("874d6191b620e3261bef6864990db6ce9806f66b7970fdff8617187bb9fffdff")
        );
    }

    #[test]
    fn test_counter_wraps_full_width() {
        let key = AesKey::new(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let mut data = [0u8; 32];
        ctr_crypt(&key, &[0xff; 16], &mut data).unwrap();
        assert_eq!(
            data.to_vec(),
            hex("8af2860142f786f409307c1a3f7eaaac7df76b0c1ab899b33e42f047b91b546f")
        );
    }

    #[test]
    fn test_partial_block_and_roundtrip() {
        let key = AesKey::new(&[5u8; 32]).unwrap();
        let mut data = *b"seventeen bytes!!";
        ctr_crypt(&key, &[1u8; 16], &mut data).unwrap();
        assert_ne!(&data, b"seventeen bytes!!");
        ctr_crypt(&key, &[1u8; 16], &mut data).unwrap();
        assert_eq!(&data, b"seventeen bytes!!");
    }

    #[test]
    fn test_increment_be() {
        let mut c = [0x00, 0xff, 0xff];
        increment_be(&mut c);
        assert_eq!(c, [0x01, 0x00, 0x00]);
    }
}
