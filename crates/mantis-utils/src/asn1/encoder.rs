use super::tags;
use super::time::{civil_from_unix, format_generalized_time, format_utc_time};

/// DER writer. Constructed values are built with closures:
///
/// ```
/// use mantis_utils::asn1::Encoder;
/// let mut e = Encoder::new();
/// e.sequence(|s| {
///     s.write_u64(1);
///     s.write_null();
/// });
/// assert_eq!(e.finish(), [0x30, 0x05, 0x02, 0x01, 0x01, 0x05, 0x00]);
/// ```
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

fn push_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    buf.push(0x80 | (8 - skip) as u8);
    buf.extend_from_slice(&bytes[skip..]);
}

impl Encoder {
    pub fn new() -> Self {
        Encoder { buf: Vec::new() }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tag);
        push_length(&mut self.buf, value.len());
        self.buf.extend_from_slice(value);
        self
    }

    /// Append bytes that are already DER.
    pub fn write_raw(&mut self, der: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(der);
        self
    }

    /// Constructed element whose contents are written by `f`.
    pub fn constructed(&mut self, tag: u8, f: impl FnOnce(&mut Encoder)) -> &mut Self {
        let mut inner = Encoder::new();
        f(&mut inner);
        self.write_tlv(tag, &inner.buf)
    }

    pub fn sequence(&mut self, f: impl FnOnce(&mut Encoder)) -> &mut Self {
        self.constructed(tags::SEQUENCE, f)
    }

    pub fn set(&mut self, f: impl FnOnce(&mut Encoder)) -> &mut Self {
        self.constructed(tags::SET, f)
    }

    /// `[n] EXPLICIT`.
    pub fn explicit(&mut self, n: u8, f: impl FnOnce(&mut Encoder)) -> &mut Self {
        self.constructed(super::Tag::context(n, true).0, f)
    }

    /// Non-negative INTEGER from big-endian magnitude bytes. Leading zeros
    /// are dropped and a sign byte is added when needed.
    pub fn write_unsigned(&mut self, magnitude: &[u8]) -> &mut Self {
        let skip = magnitude.iter().take_while(|&&b| b == 0).count();
        let m = &magnitude[skip..];
        if m.is_empty() {
            return self.write_tlv(tags::INTEGER, &[0]);
        }
        if m[0] & 0x80 != 0 {
            let mut v = Vec::with_capacity(m.len() + 1);
            v.push(0);
            v.extend_from_slice(m);
            self.write_tlv(tags::INTEGER, &v)
        } else {
            self.write_tlv(tags::INTEGER, m)
        }
    }

    pub fn write_u64(&mut self, v: u64) -> &mut Self {
        self.write_unsigned(&v.to_be_bytes())
    }

    pub fn write_boolean(&mut self, v: bool) -> &mut Self {
        self.write_tlv(tags::BOOLEAN, &[if v { 0xFF } else { 0x00 }])
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.write_tlv(tags::NULL, &[])
    }

    pub fn write_octet_string(&mut self, v: &[u8]) -> &mut Self {
        self.write_tlv(tags::OCTET_STRING, v)
    }

    /// BIT STRING with no unused bits.
    pub fn write_bit_string(&mut self, v: &[u8]) -> &mut Self {
        let mut content = Vec::with_capacity(v.len() + 1);
        content.push(0);
        content.extend_from_slice(v);
        self.write_tlv(tags::BIT_STRING, &content)
    }

    /// OID from its encoded contents (see `mantis_utils::oid::Oid::to_der_value`).
    pub fn write_oid(&mut self, encoded: &[u8]) -> &mut Self {
        self.write_tlv(tags::OID, encoded)
    }

    pub fn write_utf8_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::UTF8_STRING, s.as_bytes())
    }

    pub fn write_printable_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::PRINTABLE_STRING, s.as_bytes())
    }

    /// X.509 Time: UTCTime through 2049, GeneralizedTime from 2050 on.
    pub fn write_time(&mut self, unix: i64) -> &mut Self {
        let civil = civil_from_unix(unix);
        if (1950..2050).contains(&civil.0) {
            self.write_tlv(tags::UTC_TIME, format_utc_time(civil).as_bytes())
        } else {
            self.write_tlv(tags::GENERALIZED_TIME, format_generalized_time(civil).as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::Decoder;

    #[test]
    fn test_unsigned_integers() {
        let mut e = Encoder::new();
        e.write_unsigned(&[0x00, 0x00, 0x7F])
            .write_unsigned(&[0x80])
            .write_unsigned(&[])
            .write_u64(256);
        assert_eq!(
            e.finish(),
            [0x02, 0x01, 0x7F, 0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0x00, 0x02, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_long_lengths() {
        let mut e = Encoder::new();
        e.write_octet_string(&[0u8; 200]);
        let out = e.finish();
        assert_eq!(&out[..3], &[0x04, 0x81, 200]);

        let mut e = Encoder::new();
        e.write_octet_string(&vec![0u8; 70_000]);
        let out = e.finish();
        assert_eq!(&out[..5], &[0x04, 0x83, 0x01, 0x11, 0x70]);
        assert_eq!(Decoder::new(&out).read_octet_string().unwrap().len(), 70_000);
    }

    #[test]
    fn test_explicit_and_nested() {
        let mut e = Encoder::new();
        e.sequence(|s| {
            s.explicit(0, |v| {
                v.write_u64(2);
            });
            s.set(|set| {
                set.write_printable_string("NL");
            });
        });
        let der = e.finish();
        let mut d = Decoder::new(&der);
        let mut seq = d.read_sequence().unwrap();
        let ver = seq.read_optional_context(0, true).unwrap().unwrap();
        assert_eq!(Decoder::new(ver.value).read_small_uint().unwrap(), 2);
        assert_eq!(seq.read_set().unwrap().read_string().unwrap(), "NL");
    }

    #[test]
    fn test_time_choice() {
        let mut e = Encoder::new();
        // 2030-01-01T00:00:00Z and 2060-01-01T00:00:00Z
        e.write_time(1_893_456_000).write_time(2_840_140_800);
        let der = e.finish();
        assert_eq!(der[0], tags::UTC_TIME);
        assert_eq!(&der[2..15], b"300101000000Z");
        assert_eq!(der[15], tags::GENERALIZED_TIME);
        let mut d = Decoder::new(&der);
        assert_eq!(d.read_time().unwrap(), 1_893_456_000);
        assert_eq!(d.read_time().unwrap(), 2_840_140_800);
    }
}
