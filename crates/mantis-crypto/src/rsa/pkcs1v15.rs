//! PKCS#1 v1.5 encoding for signatures (EMSA, RFC 8017 §9.2) and
//! encryption (RSAES, §7.2).

use mantis_types::{CryptoError, HashAlgId, SecureRandom};
use mantis_utils::asn1::Encoder;
use mantis_utils::oid::{self, known};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroizing;

/// `DigestInfo ::= SEQUENCE { AlgorithmIdentifier, OCTET STRING digest }`.
fn digest_info(hash: HashAlgId, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if digest.len() != hash.output_size() {
        return Err(CryptoError::InvalidArg);
    }
    let arcs = match hash {
        HashAlgId::Md5 => known::MD5,
        HashAlgId::Sha1 => known::SHA1,
        HashAlgId::Sha224 => known::SHA224,
        HashAlgId::Sha256 => known::SHA256,
        HashAlgId::Sha384 => known::SHA384,
        HashAlgId::Sha512 => known::SHA512,
        _ => return Err(CryptoError::NotSupported),
    };
    let mut enc = Encoder::new();
    enc.sequence(|seq| {
        seq.sequence(|alg| {
            alg.write_oid(&oid::encode(arcs)).write_null();
        });
        seq.write_octet_string(digest);
    });
    Ok(enc.finish())
}

/// `EM = 0x00 || 0x01 || FF..FF || 0x00 || DigestInfo`, at least 8 bytes of FF.
pub(crate) fn sign_pad(hash: HashAlgId, digest: &[u8], k: usize) -> Result<Vec<u8>, CryptoError> {
    let t = digest_info(hash, digest)?;
    if k < t.len() + 11 {
        return Err(CryptoError::RsaDataTooLarge);
    }
    let mut em = Vec::with_capacity(k);
    em.extend_from_slice(&[0x00, 0x01]);
    em.resize(k - t.len() - 1, 0xFF);
    em.push(0x00);
    em.extend_from_slice(&t);
    Ok(em)
}

/// Re-encode and compare the whole block in constant time.
pub(crate) fn verify_encoded(
    em: &[u8],
    hash: HashAlgId,
    digest: &[u8],
    k: usize,
) -> Result<bool, CryptoError> {
    if digest.len() != hash.output_size() {
        return Ok(false);
    }
    let expected = sign_pad(hash, digest, k)?;
    Ok(em.ct_eq(&expected).into())
}

/// `EM = 0x00 || 0x02 || PS || 0x00 || M` with PS random non-zero bytes.
pub(crate) fn encrypt_pad(
    msg: &[u8],
    k: usize,
    rng: &mut dyn SecureRandom,
) -> Result<Vec<u8>, CryptoError> {
    if msg.len() + 11 > k {
        return Err(CryptoError::RsaDataTooLarge);
    }
    let ps_len = k - msg.len() - 3;
    let mut em = vec![0u8; k];
    em[1] = 0x02;
    let ps = &mut em[2..2 + ps_len];
    rng.fill_bytes(ps)?;
    let mut byte = [0u8; 1];
    for b in ps.iter_mut() {
        while *b == 0 {
            rng.fill_bytes(&mut byte)?;
            *b = byte[0];
        }
    }
    em[k - msg.len()..].copy_from_slice(msg);
    Ok(em)
}

/// Strip RSAES-PKCS1-v1_5 padding.
///
/// The scan for the separator touches every byte regardless of where it is;
/// all malformed inputs return the same error.
pub(crate) fn decrypt_unpad(em: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if em.len() < 11 {
        return Err(CryptoError::RsaInvalidPadding);
    }
    let mut good = em[0].ct_eq(&0x00) & em[1].ct_eq(&0x02);
    let mut found = Choice::from(0);
    let mut sep = 0u32;
    for (i, b) in em.iter().enumerate().skip(2) {
        let is_zero = b.ct_eq(&0);
        let first = is_zero & !found;
        sep.conditional_assign(&(i as u32), first);
        found |= is_zero;
    }
    good &= found;
    // PS must be at least 8 bytes
    good &= !sep.ct_lt(&10);
    if !bool::from(good) {
        return Err(CryptoError::RsaInvalidPadding);
    }
    Ok(Zeroizing::new(em[sep as usize + 1..].to_vec()))
}
