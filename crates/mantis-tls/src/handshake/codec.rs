//! Handshake message encoding and decoding (RFC 5246 §7.4, RFC 8446 §4).
//!
//! Encoders return complete messages (4-byte header + body); decoders take
//! the body only.

use super::extensions::{decode_extensions, encode_extensions, Extension};
use super::HandshakeType;
use crate::crypt::{KeyExchangeAlg, NamedGroup, SignatureScheme};
use crate::CipherSuite;
use mantis_types::TlsError;

// ---------------------------------------------------------------------------
// Primitive reader / writer helpers
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a message body.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    fn err(&self, msg: &str) -> TlsError {
        TlsError::DecodeError(format!("{}: {msg}", self.what))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        if self.data.len() - self.pos < n {
            return Err(self.err("truncated"));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, TlsError> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, TlsError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u24(&mut self) -> Result<usize, TlsError> {
        let b = self.bytes(3)?;
        Ok((b[0] as usize) << 16 | (b[1] as usize) << 8 | b[2] as usize)
    }

    pub fn u32(&mut self) -> Result<u32, TlsError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn array32(&mut self) -> Result<[u8; 32], TlsError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.bytes(32)?);
        Ok(out)
    }

    pub fn vec8(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u8()? as usize;
        self.bytes(n)
    }

    pub fn vec16(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u16()? as usize;
        self.bytes(n)
    }

    pub fn vec24(&mut self) -> Result<&'a [u8], TlsError> {
        let n = self.u24()?;
        self.bytes(n)
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Trailing bytes after a complete structure are a decode error.
    pub fn finish(&self) -> Result<(), TlsError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.err("trailing bytes"))
        }
    }
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u24(out: &mut Vec<u8>, v: usize) {
    out.push((v >> 16) as u8);
    out.push((v >> 8) as u8);
    out.push(v as u8);
}

pub fn put_vec8(out: &mut Vec<u8>, data: &[u8]) {
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

pub fn put_vec16(out: &mut Vec<u8>, data: &[u8]) {
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

pub fn put_vec24(out: &mut Vec<u8>, data: &[u8]) {
    put_u24(out, data.len());
    out.extend_from_slice(data);
}

/// Prefix `body` with `msg_type(1) || length(3)`.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(msg_type as u8);
    put_vec24(&mut out, body);
    out
}

// ---------------------------------------------------------------------------
// Hello messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(256);
        put_u16(&mut body, self.legacy_version);
        body.extend_from_slice(&self.random);
        put_vec8(&mut body, &self.session_id);
        let suites: Vec<u8> = self.cipher_suites.iter().flat_map(|s| s.0.to_be_bytes()).collect();
        put_vec16(&mut body, &suites);
        // null compression only
        put_vec8(&mut body, &[0]);
        put_vec16(&mut body, &encode_extensions(&self.extensions));
        wrap_handshake(HandshakeType::ClientHello, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "ClientHello");
        let legacy_version = r.u16()?;
        let random = r.array32()?;
        let session_id = r.vec8()?;
        if session_id.len() > 32 {
            return Err(TlsError::DecodeError("ClientHello: session id too long".into()));
        }
        let suites = r.vec16()?;
        if suites.len() % 2 != 0 || suites.is_empty() {
            return Err(TlsError::DecodeError("ClientHello: bad cipher suite list".into()));
        }
        let compression = r.vec8()?;
        if !compression.contains(&0) {
            return Err(TlsError::IllegalParameter("ClientHello: null compression not offered".into()));
        }
        // extensions are optional in a TLS 1.2 ClientHello
        let extensions = if r.is_empty() {
            Vec::new()
        } else {
            decode_extensions(r.vec16()?)?
        };
        r.finish()?;
        Ok(ClientHello {
            legacy_version,
            random,
            session_id: session_id.to_vec(),
            cipher_suites: suites
                .chunks_exact(2)
                .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
                .collect(),
            extensions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub legacy_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(128);
        put_u16(&mut body, self.legacy_version);
        body.extend_from_slice(&self.random);
        put_vec8(&mut body, &self.session_id);
        put_u16(&mut body, self.cipher_suite.0);
        body.push(0);
        if !self.extensions.is_empty() {
            put_vec16(&mut body, &encode_extensions(&self.extensions));
        }
        wrap_handshake(HandshakeType::ServerHello, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "ServerHello");
        let legacy_version = r.u16()?;
        let random = r.array32()?;
        let session_id = r.vec8()?.to_vec();
        if session_id.len() > 32 {
            return Err(TlsError::DecodeError("ServerHello: session id too long".into()));
        }
        let cipher_suite = CipherSuite(r.u16()?);
        if r.u8()? != 0 {
            return Err(TlsError::IllegalParameter("ServerHello: compression method".into()));
        }
        let extensions = if r.is_empty() {
            Vec::new()
        } else {
            decode_extensions(r.vec16()?)?
        };
        r.finish()?;
        Ok(ServerHello {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            extensions,
        })
    }
}

// ---------------------------------------------------------------------------
// TLS 1.3 messages
// ---------------------------------------------------------------------------

pub fn encode_encrypted_extensions(extensions: &[Extension]) -> Vec<u8> {
    let mut body = Vec::new();
    put_vec16(&mut body, &encode_extensions(extensions));
    wrap_handshake(HandshakeType::EncryptedExtensions, &body)
}

pub fn decode_encrypted_extensions(body: &[u8]) -> Result<Vec<Extension>, TlsError> {
    let mut r = Reader::new(body, "EncryptedExtensions");
    let exts = decode_extensions(r.vec16()?)?;
    r.finish()?;
    Ok(exts)
}

/// TLS 1.3 Certificate; per-entry extensions are sent empty and ignored
/// on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate13 {
    pub context: Vec<u8>,
    pub chain: Vec<Vec<u8>>,
}

impl Certificate13 {
    pub fn encode(&self) -> Vec<u8> {
        let mut list = Vec::new();
        for cert in &self.chain {
            put_vec24(&mut list, cert);
            put_u16(&mut list, 0);
        }
        let mut body = Vec::with_capacity(list.len() + 8);
        put_vec8(&mut body, &self.context);
        put_vec24(&mut body, &list);
        wrap_handshake(HandshakeType::Certificate, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "Certificate");
        let context = r.vec8()?.to_vec();
        let mut list = Reader::new(r.vec24()?, "Certificate");
        r.finish()?;
        let mut chain = Vec::new();
        while !list.is_empty() {
            let cert = list.vec24()?;
            if cert.is_empty() {
                return Err(TlsError::DecodeError("Certificate: empty entry".into()));
            }
            chain.push(cert.to_vec());
            list.vec16()?;
        }
        Ok(Certificate13 { context, chain })
    }
}

/// TLS 1.3 CertificateRequest: only `signature_algorithms` is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest13 {
    pub context: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl CertificateRequest13 {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        put_vec8(&mut body, &self.context);
        put_vec16(&mut body, &encode_extensions(&self.extensions));
        wrap_handshake(HandshakeType::CertificateRequest, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "CertificateRequest");
        let context = r.vec8()?.to_vec();
        let extensions = decode_extensions(r.vec16()?)?;
        r.finish()?;
        Ok(CertificateRequest13 { context, extensions })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    pub lifetime: u32,
    pub age_add: u32,
    pub nonce: Vec<u8>,
    pub ticket: Vec<u8>,
}

impl NewSessionTicket {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(16 + self.nonce.len() + self.ticket.len());
        body.extend_from_slice(&self.lifetime.to_be_bytes());
        body.extend_from_slice(&self.age_add.to_be_bytes());
        put_vec8(&mut body, &self.nonce);
        put_vec16(&mut body, &self.ticket);
        put_u16(&mut body, 0);
        wrap_handshake(HandshakeType::NewSessionTicket, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "NewSessionTicket");
        let lifetime = r.u32()?;
        let age_add = r.u32()?;
        let nonce = r.vec8()?.to_vec();
        let ticket = r.vec16()?.to_vec();
        if ticket.is_empty() {
            return Err(TlsError::DecodeError("NewSessionTicket: empty ticket".into()));
        }
        decode_extensions(r.vec16()?)?;
        r.finish()?;
        Ok(NewSessionTicket {
            lifetime,
            age_add,
            nonce,
            ticket,
        })
    }
}

pub fn encode_key_update(request_update: bool) -> Vec<u8> {
    wrap_handshake(HandshakeType::KeyUpdate, &[request_update as u8])
}

/// Returns `update_requested`.
pub fn decode_key_update(body: &[u8]) -> Result<bool, TlsError> {
    match body {
        [0] => Ok(false),
        [1] => Ok(true),
        [_] => Err(TlsError::IllegalParameter("KeyUpdate: request_update".into())),
        _ => Err(TlsError::DecodeError("KeyUpdate: length".into())),
    }
}

// ---------------------------------------------------------------------------
// Messages shared by both versions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub scheme: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(4 + self.signature.len());
        put_u16(&mut body, self.scheme.0);
        put_vec16(&mut body, &self.signature);
        wrap_handshake(HandshakeType::CertificateVerify, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "CertificateVerify");
        let scheme = SignatureScheme(r.u16()?);
        let signature = r.vec16()?.to_vec();
        r.finish()?;
        Ok(CertificateVerify { scheme, signature })
    }
}

pub fn encode_finished(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

// ---------------------------------------------------------------------------
// TLS 1.2 messages
// ---------------------------------------------------------------------------

pub fn encode_certificate12(chain: &[Vec<u8>]) -> Vec<u8> {
    let mut list = Vec::new();
    for cert in chain {
        put_vec24(&mut list, cert);
    }
    let mut body = Vec::with_capacity(list.len() + 3);
    put_vec24(&mut body, &list);
    wrap_handshake(HandshakeType::Certificate, &body)
}

pub fn decode_certificate12(body: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut r = Reader::new(body, "Certificate");
    let mut list = Reader::new(r.vec24()?, "Certificate");
    r.finish()?;
    let mut chain = Vec::new();
    while !list.is_empty() {
        chain.push(list.vec24()?.to_vec());
    }
    Ok(chain)
}

/// Certificate types requested in a TLS 1.2 CertificateRequest.
pub const CERT_TYPE_RSA_SIGN: u8 = 1;
pub const CERT_TYPE_ECDSA_SIGN: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest12 {
    pub cert_types: Vec<u8>,
    pub schemes: Vec<SignatureScheme>,
}

impl CertificateRequest12 {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        put_vec8(&mut body, &self.cert_types);
        let schemes: Vec<u8> = self.schemes.iter().flat_map(|s| s.0.to_be_bytes()).collect();
        put_vec16(&mut body, &schemes);
        // no certificate_authorities
        put_u16(&mut body, 0);
        wrap_handshake(HandshakeType::CertificateRequest, &body)
    }

    pub fn decode(body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "CertificateRequest");
        let cert_types = r.vec8()?.to_vec();
        let raw = r.vec16()?;
        if raw.len() % 2 != 0 {
            return Err(TlsError::DecodeError("CertificateRequest: odd scheme list".into()));
        }
        r.vec16()?;
        r.finish()?;
        Ok(CertificateRequest12 {
            cert_types,
            schemes: raw
                .chunks_exact(2)
                .map(|c| SignatureScheme(u16::from_be_bytes([c[0], c[1]])))
                .collect(),
        })
    }
}

/// Ephemeral parameters carried in a ServerKeyExchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKxParams {
    Ecdhe { group: NamedGroup, public: Vec<u8> },
    Dhe { p: Vec<u8>, g: Vec<u8>, public: Vec<u8> },
}

/// `ECCurveType.named_curve`.
const NAMED_CURVE: u8 = 3;

impl ServerKxParams {
    /// The signed `params` structure.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            ServerKxParams::Ecdhe { group, public } => {
                out.push(NAMED_CURVE);
                put_u16(&mut out, group.0);
                put_vec8(&mut out, public);
            }
            ServerKxParams::Dhe { p, g, public } => {
                put_vec16(&mut out, p);
                put_vec16(&mut out, g);
                put_vec16(&mut out, public);
            }
        }
        out
    }

    fn decode(kx: KeyExchangeAlg, r: &mut Reader<'_>) -> Result<Self, TlsError> {
        match kx {
            KeyExchangeAlg::Ecdhe => {
                if r.u8()? != NAMED_CURVE {
                    return Err(TlsError::IllegalParameter("ServerKeyExchange: curve type".into()));
                }
                let group = NamedGroup(r.u16()?);
                let public = r.vec8()?.to_vec();
                Ok(ServerKxParams::Ecdhe { group, public })
            }
            KeyExchangeAlg::Dhe => {
                let p = r.vec16()?.to_vec();
                let g = r.vec16()?.to_vec();
                let public = r.vec16()?.to_vec();
                if p.is_empty() || g.is_empty() || public.is_empty() {
                    return Err(TlsError::DecodeError("ServerKeyExchange: empty DH value".into()));
                }
                Ok(ServerKxParams::Dhe { p, g, public })
            }
            _ => Err(TlsError::UnexpectedMessage(format!("ServerKeyExchange with {kx:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub params: ServerKxParams,
    pub scheme: SignatureScheme,
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = self.params.encode();
        put_u16(&mut body, self.scheme.0);
        put_vec16(&mut body, &self.signature);
        wrap_handshake(HandshakeType::ServerKeyExchange, &body)
    }

    pub fn decode(kx: KeyExchangeAlg, body: &[u8]) -> Result<Self, TlsError> {
        let mut r = Reader::new(body, "ServerKeyExchange");
        let params = ServerKxParams::decode(kx, &mut r)?;
        let scheme = SignatureScheme(r.u16()?);
        let signature = r.vec16()?.to_vec();
        r.finish()?;
        Ok(ServerKeyExchange {
            params,
            scheme,
            signature,
        })
    }
}

/// ClientKeyExchange: an EC point (8-bit length) or a DH value / RSA
/// ciphertext (16-bit length).
pub fn encode_client_key_exchange(kx: KeyExchangeAlg, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 2);
    match kx {
        KeyExchangeAlg::Ecdhe => put_vec8(&mut body, data),
        _ => put_vec16(&mut body, data),
    }
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

pub fn decode_client_key_exchange(kx: KeyExchangeAlg, body: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(body, "ClientKeyExchange");
    let data = match kx {
        KeyExchangeAlg::Ecdhe => r.vec8()?,
        _ => r.vec16()?,
    };
    r.finish()?;
    if data.is_empty() {
        return Err(TlsError::DecodeError("ClientKeyExchange: empty".into()));
    }
    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::extensions::ExtensionType;

    fn body(msg: &[u8]) -> &[u8] {
        let len = (msg[1] as usize) << 16 | (msg[2] as usize) << 8 | msg[3] as usize;
        assert_eq!(msg.len(), 4 + len);
        &msg[4..]
    }

    #[test]
    fn test_reader_bounds() {
        let mut r = Reader::new(&[0x00, 0x02, 0xAA], "t");
        assert!(r.vec16().is_err());
        let mut r = Reader::new(&[0x01, 0xAA, 0xBB], "t");
        assert_eq!(r.vec8().unwrap(), &[0xAA]);
        assert!(matches!(r.finish(), Err(TlsError::DecodeError(_))));
        assert_eq!(r.rest(), &[0xBB]);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_client_hello_wire_layout() {
        let ch = ClientHello {
            legacy_version: 0x0303,
            random: [7; 32],
            session_id: vec![1, 2],
            cipher_suites: vec![CipherSuite::TLS_AES_128_GCM_SHA256, CipherSuite(0xC02F)],
            extensions: vec![Extension::new(ExtensionType::EXTENDED_MASTER_SECRET, vec![])],
        };
        let msg = ch.encode();
        assert_eq!(msg[0], HandshakeType::ClientHello as u8);
        let b = body(&msg);
        assert_eq!(&b[..2], &[0x03, 0x03]);
        assert_eq!(&b[34..37], &[2, 1, 2]);
        assert_eq!(&b[37..43], &[0, 4, 0x13, 0x01, 0xC0, 0x2F]);
        assert_eq!(&b[43..45], &[1, 0]);
        assert_eq!(ClientHello::decode(b).unwrap(), ch);
    }

    #[test]
    fn test_client_hello_without_extensions() {
        let mut b = vec![0x03, 0x03];
        b.extend_from_slice(&[0; 32]);
        b.extend_from_slice(&[0, 0, 2, 0x00, 0x2F, 1, 0]);
        let ch = ClientHello::decode(&b).unwrap();
        assert!(ch.extensions.is_empty());
        assert_eq!(ch.cipher_suites, vec![CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA]);

        let n = b.len();
        b[n - 1] = 1;
        assert!(matches!(ClientHello::decode(&b), Err(TlsError::IllegalParameter(_))));
    }

    #[test]
    fn test_server_hello_rejects_trailing() {
        let sh = ServerHello {
            legacy_version: 0x0303,
            random: [1; 32],
            session_id: vec![],
            cipher_suite: CipherSuite::TLS_AES_256_GCM_SHA384,
            extensions: vec![],
        };
        let msg = sh.encode();
        assert_eq!(ServerHello::decode(body(&msg)).unwrap(), sh);
        let mut extra = body(&msg).to_vec();
        extra.extend_from_slice(&[0, 0, 9]);
        assert!(ServerHello::decode(&extra).is_err());
    }

    #[test]
    fn test_certificate_messages() {
        let chain = vec![vec![1, 2, 3], vec![4]];
        let c13 = Certificate13 {
            context: vec![],
            chain: chain.clone(),
        };
        assert_eq!(Certificate13::decode(body(&c13.encode())).unwrap(), c13);
        assert_eq!(decode_certificate12(body(&encode_certificate12(&chain))).unwrap(), chain);
        assert!(decode_certificate12(body(&encode_certificate12(&[]))).unwrap().is_empty());
        // zero-length certificate entry
        assert!(Certificate13::decode(&[0, 0, 0, 5, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_server_key_exchange_ecdhe_layout() {
        let ske = ServerKeyExchange {
            params: ServerKxParams::Ecdhe {
                group: NamedGroup::X25519,
                public: vec![9; 32],
            },
            scheme: SignatureScheme::ED25519,
            signature: vec![5; 64],
        };
        let msg = ske.encode();
        let b = body(&msg);
        assert_eq!(&b[..4], &[3, 0x00, 0x1D, 32]);
        assert_eq!(ServerKeyExchange::decode(KeyExchangeAlg::Ecdhe, b).unwrap(), ske);
        assert!(ServerKeyExchange::decode(KeyExchangeAlg::Rsa, b).is_err());
    }

    #[test]
    fn test_client_key_exchange_length_prefix() {
        let ecdhe = encode_client_key_exchange(KeyExchangeAlg::Ecdhe, &[1; 65]);
        assert_eq!(body(&ecdhe)[0], 65);
        let rsa = encode_client_key_exchange(KeyExchangeAlg::Rsa, &[1; 256]);
        assert_eq!(&body(&rsa)[..2], &[1, 0]);
        assert_eq!(decode_client_key_exchange(KeyExchangeAlg::Rsa, body(&rsa)).unwrap().len(), 256);
        assert!(decode_client_key_exchange(KeyExchangeAlg::Dhe, &[0, 0]).is_err());
    }

    #[test]
    fn test_key_update_values() {
        assert_eq!(encode_key_update(true), vec![24, 0, 0, 1, 1]);
        assert!(!decode_key_update(&[0]).unwrap());
        assert!(decode_key_update(&[1]).unwrap());
        assert!(matches!(decode_key_update(&[2]), Err(TlsError::IllegalParameter(_))));
        assert!(matches!(decode_key_update(&[]), Err(TlsError::DecodeError(_))));
    }

    #[test]
    fn test_new_session_ticket() {
        let nst = NewSessionTicket {
            lifetime: 7200,
            age_add: 0xDEADBEEF,
            nonce: vec![0],
            ticket: vec![0xAA; 32],
        };
        assert_eq!(NewSessionTicket::decode(body(&nst.encode())).unwrap(), nst);
    }
}
