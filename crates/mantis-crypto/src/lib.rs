#![forbid(unsafe_code)]
#![doc = "Primitive layer of the mantis TLS engine: hashes, MACs, block and stream ciphers, AEADs, public-key algorithms and the random source."]

// Core traits
pub mod provider;

// Hash algorithms
pub mod hash;
pub mod md5;
pub mod sha1;
pub mod sha2;
pub mod sha3;

// MAC algorithms and KDFs
pub mod cmac;
pub mod gmac;
pub mod hkdf;
pub mod hmac;

// Block ciphers
pub mod aes;
pub mod camellia;
pub mod des;
pub mod idea;

// Stream ciphers
pub mod chacha20;
pub mod rabbit;
pub mod rc4;

// Modes of operation and unified cipher interfaces
pub mod aead;
pub mod cipher;
pub mod modes;

// Randomness
#[cfg(feature = "drbg")]
pub mod drbg;
pub mod rand;

// Asymmetric algorithms
#[cfg(any(feature = "ed25519", feature = "x25519"))]
pub(crate) mod curve25519;
#[cfg(feature = "dh")]
pub mod dh;
#[cfg(feature = "dsa")]
pub mod dsa;
#[cfg(feature = "ecc")]
pub mod ecc;
#[cfg(feature = "ecdh")]
pub mod ecdh;
#[cfg(feature = "ecdsa")]
pub mod ecdsa;
#[cfg(feature = "ed25519")]
pub mod ed25519;
#[cfg(feature = "rsa")]
pub mod rsa;
#[cfg(feature = "x25519")]
pub mod x25519;

#[cfg(any(feature = "ecc", feature = "dh"))]
mod util;

pub use mantis_types::{CryptoError, SecureRandom};

#[cfg(test)]
pub(crate) mod test_util {
    use mantis_types::{CryptoError, SecureRandom};

    pub fn hex(s: &str) -> Vec<u8> {
        let s: String = s.split_whitespace().collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    pub fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Deterministic SplitMix64 stream for reproducible key generation in tests.
    pub struct TestRng(pub u64);

    impl SecureRandom for TestRng {
        fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
            for chunk in buf.chunks_mut(8) {
                self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
                let mut z = self.0;
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                chunk.copy_from_slice(&z.to_le_bytes()[..chunk.len()]);
            }
            Ok(())
        }
    }
}
