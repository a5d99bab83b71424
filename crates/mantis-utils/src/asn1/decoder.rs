use super::time::{parse_generalized_time, parse_utc_time};
use super::{tags, Tag, TagClass, Tlv};
use mantis_types::CryptoError;

/// Cursor over a run of DER elements.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder { data, pos: 0 }
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<(), CryptoError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CryptoError::DecodeAsn1Fail)
        }
    }

    pub fn peek_tag(&self) -> Option<Tag> {
        self.data.get(self.pos).map(|&b| Tag(b))
    }

    fn read_length(&mut self) -> Result<usize, CryptoError> {
        let first = *self.data.get(self.pos).ok_or(CryptoError::DecodeAsn1Fail)?;
        self.pos += 1;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let n = (first & 0x7F) as usize;
        // 0x80 is the BER indefinite form
        if n == 0 || n > 4 || self.pos + n > self.data.len() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        if bytes[0] == 0 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        if len < 0x80 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        self.pos += n;
        Ok(len)
    }

    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, CryptoError> {
        let start = self.pos;
        let tag = self.peek_tag().ok_or(CryptoError::DecodeAsn1Fail)?;
        if tag.number() == 0x1F {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        self.pos += 1;
        let len = match self.read_length() {
            Ok(len) => len,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        let end = self.pos.checked_add(len).ok_or(CryptoError::DecodeAsn1Fail)?;
        if end > self.data.len() {
            self.pos = start;
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let value = &self.data[self.pos..end];
        self.pos = end;
        Ok(Tlv {
            tag,
            value,
            raw: &self.data[start..end],
        })
    }

    /// Read one element and require its identifier octet to be `tag`.
    pub fn read_expected(&mut self, tag: u8) -> Result<Tlv<'a>, CryptoError> {
        match self.peek_tag() {
            Some(Tag(t)) if t == tag => self.read_tlv(),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// INTEGER contents exactly as encoded (two's complement, big-endian).
    pub fn read_integer(&mut self) -> Result<&'a [u8], CryptoError> {
        let v = self.read_expected(tags::INTEGER)?.value;
        if v.is_empty() || (v.len() > 1 && v[0] == 0 && v[1] & 0x80 == 0) {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(v)
    }

    /// Non-negative INTEGER as minimal big-endian magnitude bytes.
    pub fn read_unsigned(&mut self) -> Result<&'a [u8], CryptoError> {
        let v = self.read_integer()?;
        if v[0] & 0x80 != 0 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(if v.len() > 1 && v[0] == 0 { &v[1..] } else { v })
    }

    pub fn read_small_uint(&mut self) -> Result<u64, CryptoError> {
        let v = self.read_unsigned()?;
        if v.len() > 8 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(v.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn read_boolean(&mut self) -> Result<bool, CryptoError> {
        match self.read_expected(tags::BOOLEAN)?.value {
            [0x00] => Ok(false),
            [0xFF] => Ok(true),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    pub fn read_null(&mut self) -> Result<(), CryptoError> {
        if self.read_expected(tags::NULL)?.value.is_empty() {
            Ok(())
        } else {
            Err(CryptoError::DecodeAsn1Fail)
        }
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8], CryptoError> {
        Ok(self.read_expected(tags::OCTET_STRING)?.value)
    }

    /// BIT STRING whose length is a whole number of bytes (keys, signatures).
    pub fn read_bit_string(&mut self) -> Result<&'a [u8], CryptoError> {
        match self.read_expected(tags::BIT_STRING)?.value {
            [0, rest @ ..] => Ok(rest),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// OID contents (the encoded arcs, without tag and length).
    pub fn read_oid(&mut self) -> Result<&'a [u8], CryptoError> {
        let v = self.read_expected(tags::OID)?.value;
        if v.is_empty() || v[v.len() - 1] & 0x80 != 0 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(v)
    }

    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, CryptoError> {
        Ok(Decoder::new(self.read_expected(tags::SEQUENCE)?.value))
    }

    pub fn read_set(&mut self) -> Result<Decoder<'a>, CryptoError> {
        Ok(Decoder::new(self.read_expected(tags::SET)?.value))
    }

    /// Consume `[n]` if it is next; otherwise leave the cursor alone.
    pub fn read_optional_context(
        &mut self,
        n: u8,
        constructed: bool,
    ) -> Result<Option<Tlv<'a>>, CryptoError> {
        let want = Tag::context(n, constructed);
        match self.peek_tag() {
            Some(t) if t == want => self.read_tlv().map(Some),
            _ => Ok(None),
        }
    }

    /// Any of the string types that appear in distinguished names.
    pub fn read_string(&mut self) -> Result<String, CryptoError> {
        let tlv = self.read_tlv()?;
        if tlv.tag.class() != TagClass::Universal {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        match tlv.tag.0 {
            tags::UTF8_STRING | tags::PRINTABLE_STRING | tags::IA5_STRING => {
                String::from_utf8(tlv.value.to_vec()).map_err(|_| CryptoError::DecodeAsn1Fail)
            }
            // T61String, read as Latin-1
            0x14 => Ok(tlv.value.iter().map(|&b| b as char).collect()),
            // BMPString
            0x1E => {
                if tlv.value.len() % 2 != 0 {
                    return Err(CryptoError::DecodeAsn1Fail);
                }
                let units: Vec<u16> = tlv
                    .value
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| CryptoError::DecodeAsn1Fail)
            }
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// UTCTime or GeneralizedTime, as seconds since the Unix epoch.
    pub fn read_time(&mut self) -> Result<i64, CryptoError> {
        let tlv = self.read_tlv()?;
        let s = core::str::from_utf8(tlv.value).map_err(|_| CryptoError::DecodeAsn1Fail)?;
        match tlv.tag.0 {
            tags::UTC_TIME => parse_utc_time(s),
            tags::GENERALIZED_TIME => parse_generalized_time(s),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }
}
