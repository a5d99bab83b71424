//! Big number type and basic accessors.

use mantis_types::CryptoError;
use zeroize::Zeroize;

/// Limb type for big number representation.
pub type Limb = u64;
/// Double-width type for multiplication intermediates.
pub(crate) type DoubleLimb = u128;

/// Bits per limb.
pub const LIMB_BITS: usize = 64;

/// A heap-allocated signed big number that is zeroized on drop.
///
/// Internally a little-endian vector of `u64` limbs plus a sign flag. The limb
/// vector is never empty and carries no leading zero limbs after
/// normalization; zero is never negative.
#[derive(Clone, Zeroize)]
pub struct BigNum {
    limbs: Vec<Limb>,
    negative: bool,
}

impl Drop for BigNum {
    fn drop(&mut self) {
        self.limbs.zeroize();
    }
}

impl BigNum {
    /// Create a zero-valued BigNum.
    pub fn zero() -> Self {
        Self {
            limbs: vec![0],
            negative: false,
        }
    }

    /// Create the value one.
    pub fn one() -> Self {
        Self::from_u64(1)
    }

    /// Create a BigNum from a `u64` value.
    pub fn from_u64(value: u64) -> Self {
        Self {
            limbs: vec![value],
            negative: false,
        }
    }

    /// Create a BigNum from big-endian bytes (unsigned).
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::zero();
        }
        let mut limbs = vec![0u64; bytes.len().div_ceil(8)];
        for (i, &byte) in bytes.iter().rev().enumerate() {
            limbs[i / 8] |= (byte as u64) << ((i % 8) * 8);
        }
        Self::from_limbs(limbs)
    }

    /// Export the magnitude as minimal big-endian bytes. Zero encodes as `[0]`.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        let bits = self.bit_len();
        if bits == 0 {
            return vec![0];
        }
        let len = bits.div_ceil(8);
        let mut out = vec![0u8; len];
        self.write_be(&mut out);
        out
    }

    /// Export the magnitude as exactly `len` big-endian bytes, left padded.
    pub fn to_bytes_be_padded(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        let need = self.bit_len().div_ceil(8);
        if need > len {
            return Err(CryptoError::BufferTooSmall { need, got: len });
        }
        let mut out = vec![0u8; len];
        self.write_be(&mut out);
        Ok(out)
    }

    fn write_be(&self, out: &mut [u8]) {
        let len = out.len();
        for (i, byte) in out.iter_mut().rev().enumerate() {
            let limb_idx = i / 8;
            if limb_idx < self.limbs.len() {
                *byte = (self.limbs[limb_idx] >> ((i % 8) * 8)) as u8;
            }
        }
        debug_assert!(len >= self.bit_len().div_ceil(8));
    }

    /// Number of significant bits of the magnitude.
    pub fn bit_len(&self) -> usize {
        for i in (0..self.limbs.len()).rev() {
            if self.limbs[i] != 0 {
                return i * LIMB_BITS + (LIMB_BITS - self.limbs[i].leading_zeros() as usize);
            }
        }
        0
    }

    /// Number of limbs currently held.
    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    pub fn is_one(&self) -> bool {
        !self.negative && self.limbs.len() == 1 && self.limbs[0] == 1
    }

    pub fn is_negative(&self) -> bool {
        self.negative && !self.is_zero()
    }

    pub fn is_even(&self) -> bool {
        self.limbs[0] & 1 == 0
    }

    pub fn is_odd(&self) -> bool {
        self.limbs[0] & 1 == 1
    }

    /// Little-endian limbs of the magnitude.
    pub fn limbs(&self) -> &[Limb] {
        &self.limbs
    }

    pub fn set_negative(&mut self, neg: bool) {
        self.negative = neg && !self.is_zero();
    }

    /// Absolute value.
    pub fn abs(&self) -> BigNum {
        let mut r = self.clone();
        r.negative = false;
        r
    }

    /// Create a non-negative BigNum from little-endian limbs.
    pub fn from_limbs(limbs: Vec<Limb>) -> Self {
        let mut bn = Self {
            limbs: if limbs.is_empty() { vec![0] } else { limbs },
            negative: false,
        };
        bn.normalize();
        bn
    }

    /// Copy the magnitude into exactly `len` limbs (zero extended).
    pub(crate) fn limbs_padded(&self, len: usize) -> Vec<Limb> {
        let mut out = vec![0u64; len];
        let n = self.limbs.len().min(len);
        out[..n].copy_from_slice(&self.limbs[..n]);
        out
    }

    /// Bit at position `idx` counted from the least significant bit.
    pub fn get_bit(&self, idx: usize) -> u64 {
        let limb_idx = idx / LIMB_BITS;
        if limb_idx >= self.limbs.len() {
            0
        } else {
            (self.limbs[limb_idx] >> (idx % LIMB_BITS)) & 1
        }
    }

    pub fn set_bit(&mut self, idx: usize) {
        let limb_idx = idx / LIMB_BITS;
        if limb_idx >= self.limbs.len() {
            self.limbs.resize(limb_idx + 1, 0);
        }
        self.limbs[limb_idx] |= 1u64 << (idx % LIMB_BITS);
    }

    /// Low 64 bits of the magnitude.
    pub fn low_u64(&self) -> u64 {
        self.limbs[0]
    }

    /// Strip leading zero limbs and clear the sign of zero.
    pub(crate) fn normalize(&mut self) {
        while self.limbs.len() > 1 && self.limbs[self.limbs.len() - 1] == 0 {
            self.limbs.pop();
        }
        if self.is_zero() {
            self.negative = false;
        }
    }

    pub(crate) fn from_parts(limbs: Vec<Limb>, negative: bool) -> Self {
        let mut bn = Self::from_limbs(limbs);
        bn.set_negative(negative);
        bn
    }
}

impl std::fmt::Debug for BigNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let hex: String = self
            .to_bytes_be()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        write!(f, "BigNum({sign}0x{hex})")
    }
}

impl PartialEq for BigNum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for BigNum {}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.is_negative(), other.is_negative()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self.cmp_abs(other),
            (true, true) => other.cmp_abs(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        let z = BigNum::zero();
        assert!(z.is_zero());
        assert_eq!(z.bit_len(), 0);
        assert_eq!(z.to_bytes_be(), vec![0]);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let bytes = vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let n = BigNum::from_bytes_be(&bytes);
        assert_eq!(n.to_bytes_be(), bytes);
        assert_eq!(n.bit_len(), 65);
    }

    #[test]
    fn test_leading_zero_bytes_dropped() {
        let n = BigNum::from_bytes_be(&[0, 0, 0, 0x80]);
        assert_eq!(n.to_bytes_be(), vec![0x80]);
        assert_eq!(n.to_bytes_be_padded(4).unwrap(), vec![0, 0, 0, 0x80]);
        assert!(n.to_bytes_be_padded(0).is_err());
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let mut z = BigNum::zero();
        z.set_negative(true);
        assert!(!z.is_negative());
        assert_eq!(z, BigNum::zero());
    }

    #[test]
    fn test_ordering_with_sign() {
        let a = BigNum::from_parts(vec![5], true);
        let b = BigNum::from_u64(3);
        assert!(a < b);
        let c = BigNum::from_parts(vec![7], true);
        assert!(c < a);
    }
}
