//! The randomness seam.
//!
//! Every operation that consumes randomness (key generation, signing nonces,
//! protocol randoms) takes a `&mut dyn SecureRandom` instead of reaching for a
//! process-wide generator.

use crate::error::CryptoError;

/// A source of cryptographically secure random bytes.
pub trait SecureRandom {
    /// Fill `buf` entirely with random bytes.
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

impl<R: SecureRandom + ?Sized> SecureRandom for &mut R {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        (**self).fill_bytes(buf)
    }
}

impl<R: SecureRandom + ?Sized> SecureRandom for Box<R> {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        (**self).fill_bytes(buf)
    }
}
