//! EMSA-PSS (RFC 8017 §9.1) with MGF1 and a salt the length of the digest,
//! the only parameter set TLS 1.3 allows for `rsa_pss_rsae_*`.

use mantis_types::{CryptoError, HashAlgId, SecureRandom};
use subtle::ConstantTimeEq;

use super::mgf1;
use crate::hash::Hash;

/// `H = Hash(0x00 * 8 || mHash || salt)`.
fn m_prime_hash(hash: HashAlgId, digest: &[u8], salt: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut h = Hash::new(hash);
    h.update(&[0u8; 8])?;
    h.update(digest)?;
    h.update(salt)?;
    h.finish()
}

pub(crate) fn encode(
    hash: HashAlgId,
    digest: &[u8],
    em_bits: usize,
    rng: &mut dyn SecureRandom,
) -> Result<Vec<u8>, CryptoError> {
    let h_len = hash.output_size();
    if digest.len() != h_len {
        return Err(CryptoError::InvalidArg);
    }
    let em_len = em_bits.div_ceil(8);
    if em_len < 2 * h_len + 2 {
        return Err(CryptoError::RsaDataTooLarge);
    }
    let mut salt = vec![0u8; h_len];
    rng.fill_bytes(&mut salt)?;
    let h = m_prime_hash(hash, digest, &salt)?;

    // DB = PS || 0x01 || salt, masked with MGF1(H)
    let db_len = em_len - h_len - 1;
    let mut db = vec![0u8; db_len];
    db[db_len - h_len - 1] = 0x01;
    db[db_len - h_len..].copy_from_slice(&salt);
    for (d, m) in db.iter_mut().zip(mgf1(hash, &h, db_len)?) {
        *d ^= m;
    }
    db[0] &= 0xFF >> (8 * em_len - em_bits);

    let mut em = db;
    em.extend_from_slice(&h);
    em.push(0xBC);
    Ok(em)
}

pub(crate) fn verify(
    em: &[u8],
    hash: HashAlgId,
    digest: &[u8],
    em_bits: usize,
) -> Result<bool, CryptoError> {
    let h_len = hash.output_size();
    let em_len = em_bits.div_ceil(8);
    if digest.len() != h_len || em.len() != em_len || em_len < 2 * h_len + 2 {
        return Ok(false);
    }
    if em[em_len - 1] != 0xBC {
        return Ok(false);
    }
    let db_len = em_len - h_len - 1;
    let (masked_db, rest) = em.split_at(db_len);
    let h = &rest[..h_len];
    let top_mask = !(0xFFu8 >> (8 * em_len - em_bits));
    if masked_db[0] & top_mask != 0 {
        return Ok(false);
    }

    let mut db: Vec<u8> = masked_db
        .iter()
        .zip(mgf1(hash, h, db_len)?)
        .map(|(a, b)| a ^ b)
        .collect();
    db[0] &= !top_mask;

    let ps_len = db_len - h_len - 1;
    if db[..ps_len].iter().any(|&b| b != 0) || db[ps_len] != 0x01 {
        return Ok(false);
    }
    let expected = m_prime_hash(hash, digest, &db[ps_len + 1..])?;
    Ok(expected.ct_eq(h).into())
}
