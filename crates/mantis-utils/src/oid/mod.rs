//! Object identifiers.

use mantis_types::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    pub fn new(arcs: &[u32]) -> Self {
        Oid {
            arcs: arcs.to_vec(),
        }
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// True when this OID is exactly `arcs` (typically a [`known`] constant).
    pub fn is(&self, arcs: &[u32]) -> bool {
        self.arcs == arcs
    }

    /// Contents octets of the DER encoding.
    pub fn to_der_value(&self) -> Vec<u8> {
        encode(&self.arcs)
    }

    pub fn from_der_value(data: &[u8]) -> Result<Self, CryptoError> {
        let (&first, rest) = data.split_first().ok_or(CryptoError::DecodeAsn1Fail)?;
        let mut arcs = Vec::with_capacity(data.len() + 1);
        // first subidentifier packs the first two arcs; it may be multi-byte
        let (head, used) = if first & 0x80 == 0 {
            (first as u32, 0)
        } else {
            read_base128(data)?
        };
        let rest = if used == 0 { rest } else { &data[used..] };
        match head {
            0..=39 => arcs.extend([0, head]),
            40..=79 => arcs.extend([1, head - 40]),
            _ => arcs.extend([2, head - 80]),
        }
        let mut i = 0;
        while i < rest.len() {
            let (arc, n) = read_base128(&rest[i..])?;
            arcs.push(arc);
            i += n;
        }
        Ok(Oid { arcs })
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, a) in self.arcs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

/// DER contents for the OID `arcs` (at least two arcs).
pub fn encode(arcs: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(arcs.len() + 4);
    if let [a, b, rest @ ..] = arcs {
        push_base128(&mut out, a * 40 + b);
        for &arc in rest {
            push_base128(&mut out, arc);
        }
    }
    out
}

fn push_base128(out: &mut Vec<u8>, v: u32) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut x = v;
    loop {
        groups[n] = (x & 0x7F) as u8;
        n += 1;
        x >>= 7;
        if x == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        out.push(groups[i] | if i > 0 { 0x80 } else { 0 });
    }
}

fn read_base128(data: &[u8]) -> Result<(u32, usize), CryptoError> {
    // a leading 0x80 is a non-minimal encoding
    if data.first() == Some(&0x80) {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let mut v: u32 = 0;
    for (i, &b) in data.iter().enumerate().take(5) {
        v = v.checked_mul(128).ok_or(CryptoError::DecodeAsn1Fail)? | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok((v, i + 1));
        }
    }
    Err(CryptoError::DecodeAsn1Fail)
}

/// Identifiers used by the certificate decoder and signature encodings.
pub mod known {
    pub const RSA_ENCRYPTION: &[u32] = &[1, 2, 840, 113549, 1, 1, 1];
    pub const SHA256_WITH_RSA: &[u32] = &[1, 2, 840, 113549, 1, 1, 11];
    pub const SHA384_WITH_RSA: &[u32] = &[1, 2, 840, 113549, 1, 1, 12];
    pub const RSASSA_PSS: &[u32] = &[1, 2, 840, 113549, 1, 1, 10];

    pub const EC_PUBLIC_KEY: &[u32] = &[1, 2, 840, 10045, 2, 1];
    pub const ECDSA_WITH_SHA256: &[u32] = &[1, 2, 840, 10045, 4, 3, 2];
    pub const ECDSA_WITH_SHA384: &[u32] = &[1, 2, 840, 10045, 4, 3, 3];
    pub const PRIME256V1: &[u32] = &[1, 2, 840, 10045, 3, 1, 7];
    pub const SECP384R1: &[u32] = &[1, 3, 132, 0, 34];

    pub const X25519: &[u32] = &[1, 3, 101, 110];
    pub const ED25519: &[u32] = &[1, 3, 101, 112];

    pub const MD5: &[u32] = &[1, 2, 840, 113549, 2, 5];
    pub const SHA1: &[u32] = &[1, 3, 14, 3, 2, 26];
    pub const SHA224: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 4];
    pub const SHA256: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
    pub const SHA384: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 2];
    pub const SHA512: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 3];

    pub const COMMON_NAME: &[u32] = &[2, 5, 4, 3];
    pub const COUNTRY_NAME: &[u32] = &[2, 5, 4, 6];
    pub const LOCALITY_NAME: &[u32] = &[2, 5, 4, 7];
    pub const STATE_OR_PROVINCE_NAME: &[u32] = &[2, 5, 4, 8];
    pub const ORGANIZATION_NAME: &[u32] = &[2, 5, 4, 10];
    pub const ORGANIZATIONAL_UNIT_NAME: &[u32] = &[2, 5, 4, 11];

    pub const KEY_USAGE: &[u32] = &[2, 5, 29, 15];
    pub const SUBJECT_ALT_NAME: &[u32] = &[2, 5, 29, 17];
    pub const BASIC_CONSTRAINTS: &[u32] = &[2, 5, 29, 19];

    /// Short attribute names used when printing distinguished names.
    pub const DN_ATTRIBUTES: &[(&[u32], &str)] = &[
        (COMMON_NAME, "CN"),
        (COUNTRY_NAME, "C"),
        (LOCALITY_NAME, "L"),
        (STATE_OR_PROVINCE_NAME, "ST"),
        (ORGANIZATION_NAME, "O"),
        (ORGANIZATIONAL_UNIT_NAME, "OU"),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known() {
        assert_eq!(
            encode(known::RSA_ENCRYPTION),
            [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01]
        );
        assert_eq!(encode(known::ED25519), [0x2B, 0x65, 0x70]);
        assert_eq!(
            encode(known::SHA256),
            [0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01]
        );
    }

    #[test]
    fn test_decode_and_display() {
        let oid = Oid::from_der_value(&[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07]).unwrap();
        assert!(oid.is(known::PRIME256V1));
        assert_eq!(oid.to_string(), "1.2.840.10045.3.1.7");
        assert_eq!(oid.to_der_value(), encode(known::PRIME256V1));
    }

    #[test]
    fn test_large_first_subidentifier() {
        // 2.999 packs to 1079, which needs two bytes
        let enc = encode(&[2, 999, 3]);
        assert_eq!(enc, [0x88, 0x37, 0x03]);
        assert_eq!(Oid::from_der_value(&enc).unwrap().arcs(), &[2, 999, 3]);
    }

    #[test]
    fn test_decode_rejects() {
        assert!(Oid::from_der_value(&[]).is_err());
        assert!(Oid::from_der_value(&[0x2A, 0x86]).is_err());
        assert!(Oid::from_der_value(&[0x2A, 0x80, 0x01]).is_err());
    }
}
