//! Per-direction record keys.

use super::key_schedule::hkdf_expand_label;
use super::CipherSuiteParams;
use mantis_types::TlsError;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Which side writes with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientWrite,
    ServerWrite,
}

/// Key, implicit IV and (CBC only) MAC key for one direction.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
    pub mac_key: Vec<u8>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &format_args!("[{} bytes]", self.key.len()))
            .field("iv", &format_args!("[{} bytes]", self.iv.len()))
            .field("mac_key", &format_args!("[{} bytes]", self.mac_key.len()))
            .finish()
    }
}

impl KeyMaterial {
    /// TLS 1.3 traffic keys:
    ///
    /// ```text
    /// key = HKDF-Expand-Label(secret, "key", "", key_length)
    /// iv  = HKDF-Expand-Label(secret, "iv", "", 12)
    /// ```
    pub fn from_traffic_secret(params: &CipherSuiteParams, secret: &[u8]) -> Result<Self, TlsError> {
        Ok(KeyMaterial {
            key: hkdf_expand_label(params.hash, secret, b"key", b"", params.key_len())?,
            iv: hkdf_expand_label(params.hash, secret, b"iv", b"", params.fixed_iv_len())?,
            mac_key: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::hex;
    use crate::CipherSuite;

    #[test]
    fn test_rfc8448_handshake_keys() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_AES_128_GCM_SHA256).unwrap();
        let server = KeyMaterial::from_traffic_secret(
            params,
            &hex("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38"),
        )
        .unwrap();
        assert_eq!(server.key, hex("3fce516009c21727d0f2e4e86ee403bc"));
        assert_eq!(server.iv, hex("5d313eb2671276ee13000b30"));

        let client = KeyMaterial::from_traffic_secret(
            params,
            &hex("b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"),
        )
        .unwrap();
        assert_eq!(client.key, hex("dbfaa693d1762c5b666af5d950258d01"));
        assert_eq!(client.iv, hex("5bd3c71b836e0b76bb73265f"));
        assert!(client.mac_key.is_empty());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let km = KeyMaterial {
            key: vec![0xAB; 16],
            iv: vec![0xCD; 12],
            mac_key: vec![],
        };
        let s = format!("{km:?}");
        assert!(s.contains("[16 bytes]"));
        assert!(!s.contains("171"));
        assert!(!s.to_lowercase().contains("ab"));
    }
}
