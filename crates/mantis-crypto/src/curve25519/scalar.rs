//! Integers modulo the edwards25519 group order
//! l = 2^252 + 27742317777372353535851937790883648493.
//!
//! Reduction is a plain shift-and-subtract over the input bits with a masked
//! subtraction, so the work depends only on the input length.

use subtle::{Choice, ConditionallySelectable};

const L: [u64; 4] = [
    0x5812_631A_5CF5_D3ED,
    0x14DE_F9DE_A2F7_9CD6,
    0x0000_0000_0000_0000,
    0x1000_0000_0000_0000,
];

fn load(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|c| {
            let mut w = [0u8; 8];
            w[..c.len()].copy_from_slice(c);
            u64::from_le_bytes(w)
        })
        .collect()
}

fn store(r: &[u64; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (chunk, w) in out.chunks_exact_mut(8).zip(r) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    out
}

/// `r - L` and whether it borrowed.
fn sub_l(r: &[u64; 4]) -> ([u64; 4], Choice) {
    let mut d = [0u64; 4];
    let mut borrow = 0u64;
    for i in 0..4 {
        let (t, b1) = r[i].overflowing_sub(L[i]);
        let (t, b2) = t.overflowing_sub(borrow);
        d[i] = t;
        borrow = (b1 | b2) as u64;
    }
    (d, Choice::from(borrow as u8))
}

/// Little-endian limbs of any length, reduced mod l.
fn reduce_limbs(limbs: &[u64]) -> [u64; 4] {
    let mut r = [0u64; 4];
    for i in (0..limbs.len() * 64).rev() {
        // r < l < 2^253, so 2r + 1 still fits
        let bit = (limbs[i / 64] >> (i % 64)) & 1;
        r[3] = (r[3] << 1) | (r[2] >> 63);
        r[2] = (r[2] << 1) | (r[1] >> 63);
        r[1] = (r[1] << 1) | (r[0] >> 63);
        r[0] = (r[0] << 1) | bit;
        let (d, borrow) = sub_l(&r);
        for j in 0..4 {
            r[j] = u64::conditional_select(&d[j], &r[j], borrow);
        }
    }
    r
}

/// Reduce a 64-byte little-endian value (a SHA-512 output) mod l.
pub(crate) fn reduce_wide(bytes: &[u8; 64]) -> [u8; 32] {
    store(&reduce_limbs(&load(bytes)))
}

/// `(a * b + c) mod l` for 32-byte little-endian inputs.
pub(crate) fn mul_add(a: &[u8; 32], b: &[u8; 32], c: &[u8; 32]) -> [u8; 32] {
    let a = load(a);
    let b = load(b);
    let c = load(c);
    let mut w = [0u64; 9];
    for i in 0..4 {
        let mut carry = 0u128;
        for j in 0..4 {
            let t = w[i + j] as u128 + a[i] as u128 * b[j] as u128 + carry;
            w[i + j] = t as u64;
            carry = t >> 64;
        }
        w[i + 4] = carry as u64;
    }
    let mut carry = 0u128;
    for (i, wi) in w.iter_mut().enumerate() {
        let t = *wi as u128 + c.get(i).copied().unwrap_or(0) as u128 + carry;
        *wi = t as u64;
        carry = t >> 64;
    }
    store(&reduce_limbs(&w))
}

/// True when the little-endian value is below l (RFC 8032 §5.1.7 check on S).
pub(crate) fn is_canonical(s: &[u8; 32]) -> bool {
    let (_, borrow) = sub_l(&load(s).try_into().unwrap_or([u64::MAX; 4]));
    bool::from(borrow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(v: u64) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[..8].copy_from_slice(&v.to_le_bytes());
        k
    }

    #[test]
    fn test_reduce_l_is_zero() {
        let mut wide = [0u8; 64];
        wide[..32].copy_from_slice(&store(&L));
        assert_eq!(reduce_wide(&wide), [0u8; 32]);
        wide[0] += 5;
        assert_eq!(reduce_wide(&wide), small(5));
    }

    #[test]
    fn test_mul_add_small() {
        assert_eq!(mul_add(&small(6), &small(7), &small(8)), small(50));
    }

    #[test]
    fn test_mul_add_wraps() {
        // (l - 1) * (l - 1) = 1 mod l
        let mut lm1 = L;
        lm1[0] -= 1;
        let lm1 = store(&lm1);
        assert_eq!(mul_add(&lm1, &lm1, &[0u8; 32]), small(1));
    }

    #[test]
    fn test_canonical() {
        assert!(is_canonical(&small(0)));
        let mut lm1 = L;
        lm1[0] -= 1;
        assert!(is_canonical(&store(&lm1)));
        assert!(!is_canonical(&store(&L)));
        assert!(!is_canonical(&[0xff; 32]));
    }
}
