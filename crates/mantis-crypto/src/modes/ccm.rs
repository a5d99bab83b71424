//! CCM (Counter with CBC-MAC), NIST SP 800-38C / RFC 3610.
//!
//! The MAC covers the plaintext, so decryption has to run CTR first. The
//! recovered plaintext stays in a zeroizing scratch buffer and is returned
//! only after the tag compares equal.

use super::ctr::increment_be;
use crate::provider::BlockCipher;
use mantis_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

const BLOCK: usize = 16;

struct Params {
    tag_len: usize,
    /// Width of the message length field (`q` in SP 800-38C).
    q: usize,
}

fn validate(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    tag_len: usize,
    msg_len: usize,
) -> Result<Params, CryptoError> {
    if cipher.block_size() != BLOCK {
        return Err(CryptoError::NotSupported);
    }
    if !(7..=13).contains(&nonce.len()) {
        return Err(CryptoError::InvalidIvLength);
    }
    if !(4..=16).contains(&tag_len) || tag_len % 2 != 0 {
        return Err(CryptoError::InvalidTagLength);
    }
    let q = 15 - nonce.len();
    if q < 8 && (msg_len as u64) >> (8 * q) != 0 {
        return Err(CryptoError::InputOverflow);
    }
    Ok(Params { tag_len, q })
}

fn counter_block(nonce: &[u8], q: usize) -> [u8; BLOCK] {
    let mut a = [0u8; BLOCK];
    a[0] = (q - 1) as u8;
    a[1..1 + nonce.len()].copy_from_slice(nonce);
    a
}

fn cbc_mac(
    cipher: &dyn BlockCipher,
    p: &Params,
    nonce: &[u8],
    aad: &[u8],
    msg: &[u8],
) -> Result<[u8; BLOCK], CryptoError> {
    let mut x = [0u8; BLOCK];
    x[0] = (if aad.is_empty() { 0 } else { 0x40 }) | (((p.tag_len - 2) / 2) << 3) as u8 | (p.q - 1) as u8;
    x[1..1 + nonce.len()].copy_from_slice(nonce);
    let len_bytes = (msg.len() as u64).to_be_bytes();
    x[16 - p.q..].copy_from_slice(&len_bytes[8 - p.q.min(8)..]);
    cipher.encrypt_block(&mut x)?;

    let absorb = |data: &[u8], x: &mut [u8; BLOCK]| -> Result<(), CryptoError> {
        for chunk in data.chunks(BLOCK) {
            for (xi, d) in x.iter_mut().zip(chunk) {
                *xi ^= d;
            }
            cipher.encrypt_block(x)?;
        }
        Ok(())
    };

    if !aad.is_empty() {
        let mut encoded = Vec::with_capacity(aad.len() + 10);
        let a = aad.len() as u64;
        if a < 0xFF00 {
            encoded.extend_from_slice(&(a as u16).to_be_bytes());
        } else if a <= u32::MAX as u64 {
            encoded.extend_from_slice(&[0xFF, 0xFE]);
            encoded.extend_from_slice(&(a as u32).to_be_bytes());
        } else {
            encoded.extend_from_slice(&[0xFF, 0xFF]);
            encoded.extend_from_slice(&a.to_be_bytes());
        }
        encoded.extend_from_slice(aad);
        absorb(&encoded, &mut x)?;
    }
    absorb(msg, &mut x)?;
    Ok(x)
}

/// CTR over `data` starting at counter 1, and the S0 block that masks the tag.
fn ctr(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    q: usize,
    data: &mut [u8],
) -> Result<[u8; BLOCK], CryptoError> {
    let mut a = counter_block(nonce, q);
    let mut s0 = a;
    cipher.encrypt_block(&mut s0)?;
    let mut ks = Zeroizing::new([0u8; BLOCK]);
    for chunk in data.chunks_mut(BLOCK) {
        increment_be(&mut a[16 - q..]);
        ks.copy_from_slice(&a);
        cipher.encrypt_block(&mut ks[..])?;
        for (d, k) in chunk.iter_mut().zip(ks.iter()) {
            *d ^= k;
        }
    }
    Ok(s0)
}

/// Encrypt and authenticate. Returns `ciphertext || tag` with a tag of
/// `tag_len` bytes (4 to 16, even).
pub fn ccm_encrypt(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let p = validate(cipher, nonce, tag_len, plaintext.len())?;
    let mac = cbc_mac(cipher, &p, nonce, aad, plaintext)?;
    let mut out = Vec::with_capacity(plaintext.len() + tag_len);
    out.extend_from_slice(plaintext);
    let s0 = ctr(cipher, nonce, p.q, &mut out)?;
    out.extend(mac.iter().zip(s0.iter()).take(tag_len).map(|(m, s)| m ^ s));
    Ok(out)
}

/// Decrypt and verify `ciphertext || tag`.
pub fn ccm_decrypt(
    cipher: &dyn BlockCipher,
    nonce: &[u8],
    aad: &[u8],
    input: &[u8],
    tag_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if input.len() < tag_len {
        return Err(CryptoError::AeadTagVerifyFail);
    }
    let (ct, tag) = input.split_at(input.len() - tag_len);
    let p = validate(cipher, nonce, tag_len, ct.len())?;
    let mut scratch = Zeroizing::new(ct.to_vec());
    let s0 = ctr(cipher, nonce, p.q, &mut scratch)?;
    let mac = cbc_mac(cipher, &p, nonce, aad, &scratch)?;
    let expected: Vec<u8> = mac.iter().zip(s0.iter()).take(tag_len).map(|(m, s)| m ^ s).collect();
    if !bool::from(expected[..].ct_eq(tag)) {
        return Err(CryptoError::AeadTagVerifyFail);
    }
    Ok(scratch.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::AesKey;
    use crate::test_util::hex;

    #[test]
    fn test_rfc3610_packet_vector_1() {
        let key = AesKey::new(&hex("c0c1c2c3c4c5c6c7c8c9cacbcccdcecf")).unwrap();
        let nonce = hex("00000003020100a0a1a2a3a4a5");
        let aad = hex("0001020304050607");
        let pt = hex("08090a0b0c0d0e0f101112131415161718191a1b1c1d1e");
        let sealed = ccm_encrypt(&key, &nonce, &aad, &pt, 8).unwrap();
        assert_eq!(
            sealed,
            hex("588c979a61c663d2f066d0c2c0f989806d5f6b61dac38417e8d12cfdf926e0")
        );
        assert_eq!(ccm_decrypt(&key, &nonce, &aad, &sealed, 8).unwrap(), pt);
    }

    #[test]
    fn test_sp800_38c_example_1() {
        let key = AesKey::new(&(0x40u8..0x50).collect::<Vec<_>>()).unwrap();
        let nonce: Vec<u8> = (0x10u8..0x17).collect();
        let aad: Vec<u8> = (0u8..8).collect();
        let pt: Vec<u8> = (0x20u8..0x24).collect();
        assert_eq!(
            ccm_encrypt(&key, &nonce, &aad, &pt, 4).unwrap(),
            hex("7162015b4dac255d")
        );
    }

    #[test]
    fn test_full_tag_twelve_byte_nonce() {
        let key = AesKey::new(&(0x40u8..0x50).collect::<Vec<_>>()).unwrap();
        let nonce: Vec<u8> = (0x10u8..0x1c).collect();
        let aad: Vec<u8> = (0u8..20).collect();
        let pt: Vec<u8> = (0x20u8..0x38).collect();
        let sealed = ccm_encrypt(&key, &nonce, &aad, &pt, 16).unwrap();
        assert_eq!(
            sealed,
            hex("e3b201a9f5b71a7a9b1ceaeccd97e70b6176aad9a4428aa5
                 c87ae488918de93f17dd3e4934347f44")
        );
    }

    #[test]
    fn test_parameter_validation() {
        let key = AesKey::new(&[0u8; 16]).unwrap();
        assert_eq!(
            ccm_encrypt(&key, &[0u8; 6], b"", b"", 16),
            Err(CryptoError::InvalidIvLength)
        );
        assert_eq!(
            ccm_encrypt(&key, &[0u8; 12], b"", b"", 5),
            Err(CryptoError::InvalidTagLength)
        );
        assert_eq!(
            ccm_encrypt(&key, &[0u8; 12], b"", b"", 18),
            Err(CryptoError::InvalidTagLength)
        );
        // a 13-byte nonce leaves two length bytes
        assert_eq!(
            ccm_encrypt(&key, &[0u8; 13], b"", &vec![0u8; 65536], 16),
            Err(CryptoError::InputOverflow)
        );
    }

    #[test]
    fn test_tamper_detected() {
        let key = AesKey::new(&[3u8; 16]).unwrap();
        let nonce = [4u8; 12];
        let mut sealed = ccm_encrypt(&key, &nonce, b"hdr", b"some data", 16).unwrap();
        sealed[2] ^= 1;
        assert_eq!(
            ccm_decrypt(&key, &nonce, b"hdr", &sealed, 16),
            Err(CryptoError::AeadTagVerifyFail)
        );
    }
}
