//! TLS record layer: framing, fragmentation and per-direction protection.

pub mod encryption;
pub mod encryption12;
pub mod encryption12_cbc;

use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::{BulkCipher, CipherSuiteParams};
use crate::TlsVersion;
use encryption::Tls13Protection;
use encryption12::Aead12Protection;
use encryption12_cbc::Cbc12Protection;
use mantis_types::TlsError;

pub const RECORD_HEADER_LEN: usize = 5;
/// Largest plaintext fragment (2^14).
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;
pub const MAX_CIPHERTEXT_LENGTH_TLS12: usize = MAX_PLAINTEXT_LENGTH + 2048;
pub const MAX_CIPHERTEXT_LENGTH_TLS13: usize = MAX_PLAINTEXT_LENGTH + 256;
/// Record-header version once a version is negotiated (both 1.2 and 1.3).
pub const RECORD_VERSION: u16 = 0x0303;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// One record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub content_type: ContentType,
    pub version: u16,
    pub fragment: Vec<u8>,
}

impl Record {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        buf.push(self.content_type as u8);
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.fragment);
        buf
    }
}

/// Protection applied to one direction.
pub enum RecordProtection {
    Tls13(Tls13Protection),
    Aead12(Aead12Protection),
    Cbc12(Cbc12Protection),
}

impl RecordProtection {
    pub fn new(params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<Self, TlsError> {
        Ok(match params.bulk {
            _ if params.is_tls13() => RecordProtection::Tls13(Tls13Protection::new(params, keys)?),
            BulkCipher::Aead(_) => RecordProtection::Aead12(Aead12Protection::new(params, keys)?),
            BulkCipher::Cbc(_) => RecordProtection::Cbc12(Cbc12Protection::new(params, keys)?),
        })
    }

    fn encrypt(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<Record, TlsError> {
        match self {
            RecordProtection::Tls13(p) => p.encrypt(content_type, plaintext),
            RecordProtection::Aead12(p) => p.encrypt(content_type, plaintext),
            RecordProtection::Cbc12(p) => p.encrypt(content_type, plaintext),
        }
    }

    fn decrypt(&mut self, record: &Record) -> Result<(ContentType, Vec<u8>), TlsError> {
        match self {
            RecordProtection::Tls13(p) => p.decrypt(record),
            RecordProtection::Aead12(p) => p.decrypt(record),
            RecordProtection::Cbc12(p) => p.decrypt(record),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        match self {
            RecordProtection::Tls13(p) => p.sequence_number(),
            RecordProtection::Aead12(p) => p.sequence_number(),
            RecordProtection::Cbc12(p) => p.sequence_number(),
        }
    }

    #[cfg(test)]
    fn set_sequence_number(&mut self, seq: u64) {
        match self {
            RecordProtection::Tls13(p) => p.set_sequence_number(seq),
            RecordProtection::Aead12(p) => p.set_sequence_number(seq),
            RecordProtection::Cbc12(p) => p.set_sequence_number(seq),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochState {
    Plaintext,
    Encrypted,
    Closed,
}

/// Record layer for one connection.
///
/// Write protection and read protection are installed independently; a
/// new installation resets that direction's sequence number. Any error
/// from [`RecordLayer::open_record`] closes the layer; only an alert can
/// still be sealed until [`RecordLayer::close`] drops the write keys.
pub struct RecordLayer {
    max_fragment: usize,
    version: Option<TlsVersion>,
    write: Option<RecordProtection>,
    read: Option<RecordProtection>,
    /// Reading failed or the layer was closed.
    closed: bool,
    /// Closed for writing too.
    shut: bool,
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordLayer {
    pub fn new() -> Self {
        Self {
            max_fragment: MAX_PLAINTEXT_LENGTH,
            version: None,
            write: None,
            read: None,
            closed: false,
            shut: false,
        }
    }

    pub fn state(&self) -> EpochState {
        if self.closed {
            EpochState::Closed
        } else if self.write.is_some() || self.read.is_some() {
            EpochState::Encrypted
        } else {
            EpochState::Plaintext
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.shut = true;
        self.write = None;
        self.read = None;
    }

    /// Fix the protocol version; record headers must then carry 0x0303.
    pub fn set_version(&mut self, version: TlsVersion) {
        self.version = Some(version);
    }

    /// Limit outgoing fragments (max_fragment_length extension).
    pub fn set_max_fragment(&mut self, len: usize) {
        self.max_fragment = len.clamp(1, MAX_PLAINTEXT_LENGTH);
    }

    pub fn max_fragment(&self) -> usize {
        self.max_fragment
    }

    pub fn set_write_protection(&mut self, params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<(), TlsError> {
        self.write = Some(RecordProtection::new(params, keys)?);
        Ok(())
    }

    pub fn set_read_protection(&mut self, params: &CipherSuiteParams, keys: &KeyMaterial) -> Result<(), TlsError> {
        self.read = Some(RecordProtection::new(params, keys)?);
        Ok(())
    }

    pub fn is_write_protected(&self) -> bool {
        self.write.is_some()
    }

    pub fn write_sequence(&self) -> Option<u64> {
        self.write.as_ref().map(RecordProtection::sequence_number)
    }

    pub fn read_sequence(&self) -> Option<u64> {
        self.read.as_ref().map(RecordProtection::sequence_number)
    }

    #[cfg(test)]
    pub(crate) fn set_write_sequence(&mut self, seq: u64) {
        if let Some(w) = self.write.as_mut() {
            w.set_sequence_number(seq);
        }
    }

    fn ciphertext_limit(&self) -> usize {
        match (&self.read, self.version) {
            (None, _) => MAX_PLAINTEXT_LENGTH,
            (Some(_), Some(TlsVersion::Tls13)) => MAX_CIPHERTEXT_LENGTH_TLS13,
            (Some(_), _) => MAX_CIPHERTEXT_LENGTH_TLS12,
        }
    }

    /// Protect `data` and frame it, splitting into as many records as the
    /// fragment limit requires. Empty data yields one empty record.
    pub fn seal_record(&mut self, content_type: ContentType, data: &[u8]) -> Result<Vec<u8>, TlsError> {
        if self.shut || (self.closed && content_type != ContentType::Alert) {
            return Err(TlsError::NotReady);
        }
        let mut out = Vec::with_capacity(data.len() + RECORD_HEADER_LEN);
        let mut chunks = data.chunks(self.max_fragment).peekable();
        if chunks.peek().is_none() {
            out.extend_from_slice(&self.seal_one(content_type, &[])?);
        }
        for chunk in chunks {
            out.extend_from_slice(&self.seal_one(content_type, chunk)?);
        }
        Ok(out)
    }

    fn seal_one(&mut self, content_type: ContentType, chunk: &[u8]) -> Result<Vec<u8>, TlsError> {
        let record = match self.write.as_mut() {
            Some(p) => p.encrypt(content_type, chunk)?,
            None => Record {
                content_type,
                // the first ClientHello says 1.0 for middlebox compatibility
                version: if self.version.is_none() && content_type == ContentType::Handshake {
                    0x0301
                } else {
                    RECORD_VERSION
                },
                fragment: chunk.to_vec(),
            },
        };
        Ok(record.encode())
    }

    /// Parse and unprotect the first record in `buf`.
    ///
    /// `Ok(None)` means `buf` does not hold a complete record yet. On
    /// success returns the content type, plaintext and bytes consumed.
    pub fn open_record(&mut self, buf: &[u8]) -> Result<Option<(ContentType, Vec<u8>, usize)>, TlsError> {
        if self.closed {
            return Err(TlsError::NotReady);
        }
        let result = self.open_inner(buf);
        if result.is_err() {
            self.closed = true;
            self.read = None;
        }
        result
    }

    fn open_inner(&mut self, buf: &[u8]) -> Result<Option<(ContentType, Vec<u8>, usize)>, TlsError> {
        if buf.len() < RECORD_HEADER_LEN {
            return Ok(None);
        }
        let content_type = ContentType::from_u8(buf[0])
            .ok_or_else(|| TlsError::UnexpectedMessage(format!("record content type {}", buf[0])))?;
        let version = u16::from_be_bytes([buf[1], buf[2]]);
        let length = u16::from_be_bytes([buf[3], buf[4]]) as usize;

        let version_ok = match self.version {
            None => version >> 8 == 0x03,
            Some(_) => version == RECORD_VERSION,
        };
        if !version_ok {
            return Err(TlsError::ProtocolVersion);
        }
        if length > self.ciphertext_limit() {
            return Err(TlsError::RecordOverflow);
        }
        if buf.len() < RECORD_HEADER_LEN + length {
            return Ok(None);
        }
        let record = Record {
            content_type,
            version,
            fragment: buf[RECORD_HEADER_LEN..RECORD_HEADER_LEN + length].to_vec(),
        };
        let consumed = RECORD_HEADER_LEN + length;

        let tls13_ccs = content_type == ContentType::ChangeCipherSpec && self.version == Some(TlsVersion::Tls13);
        match self.read.as_mut() {
            // TLS 1.3 change_cipher_spec is never protected
            Some(p) if !tls13_ccs => {
                let (ct, pt) = p.decrypt(&record)?;
                Ok(Some((ct, pt, consumed)))
            }
            _ => Ok(Some((record.content_type, record.fragment, consumed))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CipherSuite;
    use proptest::prelude::*;

    fn keyed_pair(suite: CipherSuite) -> (RecordLayer, RecordLayer) {
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        let keys = KeyMaterial {
            key: vec![0x42; params.key_len()],
            iv: vec![0x24; params.fixed_iv_len()],
            mac_key: vec![0x99; params.mac_key_len()],
        };
        let mut w = RecordLayer::new();
        let mut r = RecordLayer::new();
        w.set_version(params.version);
        r.set_version(params.version);
        w.set_write_protection(params, &keys).unwrap();
        r.set_read_protection(params, &keys).unwrap();
        (w, r)
    }

    fn open_all(r: &mut RecordLayer, mut wire: &[u8]) -> Vec<(ContentType, Vec<u8>)> {
        let mut out = Vec::new();
        while !wire.is_empty() {
            let (ct, pt, used) = r.open_record(wire).unwrap().unwrap();
            out.push((ct, pt));
            wire = &wire[used..];
        }
        out
    }

    #[test]
    fn test_plaintext_framing() {
        let mut w = RecordLayer::new();
        let wire = w.seal_record(ContentType::Handshake, b"hello").unwrap();
        assert_eq!(wire[..5], [22, 0x03, 0x01, 0x00, 0x05]);
        let mut r = RecordLayer::new();
        assert_eq!(r.open_record(&wire[..4]).unwrap(), None);
        assert_eq!(r.open_record(&wire[..9]).unwrap(), None);
        let (ct, pt, used) = r.open_record(&wire).unwrap().unwrap();
        assert_eq!((ct, pt.as_slice(), used), (ContentType::Handshake, &b"hello"[..], 10));
        assert_eq!(r.state(), EpochState::Plaintext);
    }

    #[test]
    fn test_fragmentation_preserves_order() {
        let (mut w, mut r) = keyed_pair(CipherSuite::TLS_AES_128_GCM_SHA256);
        w.set_max_fragment(512);
        let data: Vec<u8> = (0..2000u32).map(|i| i as u8).collect();
        let wire = w.seal_record(ContentType::ApplicationData, &data).unwrap();
        let records = open_all(&mut r, &wire);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|(_, p)| p.len() <= 512));
        let joined: Vec<u8> = records.into_iter().flat_map(|(_, p)| p).collect();
        assert_eq!(joined, data);
        assert_eq!(w.write_sequence(), Some(4));
        assert_eq!(r.read_sequence(), Some(4));
    }

    #[test]
    fn test_framing_errors_close_layer() {
        let mut r = RecordLayer::new();
        let mut bad = vec![22, 3, 3];
        bad.extend_from_slice(&((MAX_PLAINTEXT_LENGTH + 1) as u16).to_be_bytes());
        assert_eq!(r.open_record(&bad), Err(TlsError::RecordOverflow));
        assert_eq!(r.state(), EpochState::Closed);
        assert_eq!(r.open_record(&[22, 3, 3, 0, 0]), Err(TlsError::NotReady));
        // the failing side can still report it
        assert!(r.seal_record(ContentType::Alert, &[2, 22]).is_ok());
        assert_eq!(r.seal_record(ContentType::Handshake, &[1]), Err(TlsError::NotReady));
        r.close();
        assert_eq!(r.seal_record(ContentType::Alert, &[2, 22]), Err(TlsError::NotReady));

        let mut r = RecordLayer::new();
        assert!(matches!(r.open_record(&[99, 3, 3, 0, 0]), Err(TlsError::UnexpectedMessage(_))));

        let mut r = RecordLayer::new();
        r.set_version(TlsVersion::Tls12);
        assert_eq!(r.open_record(&[22, 3, 1, 0, 0]), Err(TlsError::ProtocolVersion));
        assert!(r.seal_record(ContentType::Alert, &[1, 0]).is_err());
    }

    #[test]
    fn test_tls13_limit_is_tighter() {
        let (_, mut r) = keyed_pair(CipherSuite::TLS_AES_128_GCM_SHA256);
        let mut hdr = vec![23, 3, 3];
        hdr.extend_from_slice(&((MAX_CIPHERTEXT_LENGTH_TLS13 + 1) as u16).to_be_bytes());
        assert_eq!(r.open_record(&hdr), Err(TlsError::RecordOverflow));

        let (_, mut r) = keyed_pair(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        assert_eq!(r.open_record(&hdr).unwrap(), None);
    }

    #[test]
    fn test_bit_flips_give_decrypt_error() {
        for suite in [
            CipherSuite::TLS_AES_256_GCM_SHA384,
            CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
        ] {
            let (mut w, _) = keyed_pair(suite);
            let wire = w.seal_record(ContentType::ApplicationData, b"integrity").unwrap();
            for i in RECORD_HEADER_LEN..wire.len() {
                let (_, mut r) = keyed_pair(suite);
                let mut bad = wire.clone();
                bad[i] ^= 0x80;
                assert_eq!(r.open_record(&bad), Err(TlsError::DecryptError), "{suite} byte {i}");
                assert_eq!(r.state(), EpochState::Closed);
            }
        }
    }

    #[test]
    fn test_write_sequence_exhaustion() {
        let (mut w, _) = keyed_pair(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256);
        w.set_write_sequence(u64::MAX - 1);
        assert!(w.seal_record(ContentType::ApplicationData, b"a").is_ok());
        assert_eq!(
            w.seal_record(ContentType::ApplicationData, b"b"),
            Err(TlsError::SeqExhausted)
        );
    }

    #[test]
    fn test_tls13_ccs_passes_unprotected() {
        let (_, mut r) = keyed_pair(CipherSuite::TLS_AES_128_GCM_SHA256);
        let (ct, pt, _) = r.open_record(&[20, 3, 3, 0, 1, 1]).unwrap().unwrap();
        assert_eq!((ct, pt), (ContentType::ChangeCipherSpec, vec![1]));
    }

    fn all_suites() -> impl Strategy<Value = CipherSuite> {
        prop::sample::select(CipherSuiteParams::all().iter().map(|p| p.suite).collect::<Vec<_>>())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_seal_open_roundtrip(
            suite in all_suites(),
            data in prop::collection::vec(any::<u8>(), 0..3 * MAX_PLAINTEXT_LENGTH / 2),
        ) {
            let (mut w, mut r) = keyed_pair(suite);
            let wire = w.seal_record(ContentType::ApplicationData, &data).unwrap();
            let joined: Vec<u8> = open_all(&mut r, &wire).into_iter().flat_map(|(_, p)| p).collect();
            prop_assert_eq!(joined, data);
        }
    }
}
