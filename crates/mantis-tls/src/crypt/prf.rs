//! TLS 1.2 PRF (RFC 5246 §5).
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                        HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```

use mantis_crypto::hmac::Hmac;
use mantis_types::{HashAlgId, TlsError};
use zeroize::Zeroizing;

/// Derive `output_len` bytes from `secret`, `label` and `seed`.
///
/// Every intermediate block is wiped before it is freed, on success and on
/// error.
pub fn prf(
    alg: HashAlgId,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);
    p_hash(alg, secret, &label_seed, output_len)
}

fn p_hash(
    alg: HashAlgId,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut mac = Hmac::new(alg, secret)?;
    // Sized up front so the buffer never reallocates and leaves a copy behind.
    let mut result = Zeroizing::new(Vec::with_capacity(output_len + alg.output_size()));
    let mut a = Zeroizing::new(seed.to_vec());

    while result.len() < output_len {
        mac.reset();
        mac.update(&a)?;
        a = Zeroizing::new(mac.finish()?);

        mac.reset();
        mac.update(&a)?;
        mac.update(seed)?;
        let block = Zeroizing::new(mac.finish()?);
        result.extend_from_slice(&block);
    }

    result.truncate(output_len);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;

    #[test]
    fn test_prf_sha256_known_vector() {
        let secret = hex("9bbe436ba940f017b17652849a71db35");
        let seed = hex("a0ba9f936cda311827a6f796ffd5198c");
        let out = prf(HashAlgId::Sha256, &secret, "test label", &seed, 100).unwrap();
        assert_eq!(
            out[..],
            hex("e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
                 6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
                 4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
                 87347b66")[..]
        );
    }

    #[test]
    fn test_prf_first_block_is_hmac_of_a1() {
        let secret = b"secret";
        let out = prf(HashAlgId::Sha384, secret, "label", b"seed", 48).unwrap();
        let a1 = Hmac::mac(HashAlgId::Sha384, secret, b"labelseed").unwrap();
        let mut input = a1;
        input.extend_from_slice(b"labelseed");
        assert_eq!(out[..], Hmac::mac(HashAlgId::Sha384, secret, &input).unwrap()[..]);
    }

    #[test]
    fn test_prf_prefix_consistency() {
        let long = prf(HashAlgId::Sha256, b"k", "label", b"seed", 1000).unwrap();
        for len in [0, 1, 31, 32, 33, 100, 500] {
            let short = prf(HashAlgId::Sha256, b"k", "label", b"seed", len).unwrap();
            assert_eq!(short[..], long[..len]);
        }
        assert_ne!(
            prf(HashAlgId::Sha256, b"k", "other", b"seed", 32).unwrap()[..],
            long[..32]
        );
    }
}
