//! Hello extensions: framing plus a build/parse pair per extension.

use super::codec::{put_u16, put_vec16, put_vec8, Reader};
use crate::crypt::{NamedGroup, SignatureScheme};
use mantis_types::TlsError;

/// TLS extension type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const MAX_FRAGMENT_LENGTH: Self = Self(1);
    pub const SUPPORTED_GROUPS: Self = Self(10);
    pub const EC_POINT_FORMATS: Self = Self(11);
    pub const SIGNATURE_ALGORITHMS: Self = Self(13);
    pub const ALPN: Self = Self(16);
    pub const EXTENDED_MASTER_SECRET: Self = Self(23);
    pub const PRE_SHARED_KEY: Self = Self(41);
    pub const SUPPORTED_VERSIONS: Self = Self(43);
    pub const PSK_KEY_EXCHANGE_MODES: Self = Self(45);
    pub const KEY_SHARE: Self = Self(51);
    pub const RENEGOTIATION_INFO: Self = Self(0xFF01);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub ext_type: ExtensionType,
    pub data: Vec<u8>,
}

impl Extension {
    pub fn new(ext_type: ExtensionType, data: Vec<u8>) -> Self {
        Self { ext_type, data }
    }
}

pub fn encode_extensions(exts: &[Extension]) -> Vec<u8> {
    let mut out = Vec::new();
    for ext in exts {
        put_u16(&mut out, ext.ext_type.0);
        put_vec16(&mut out, &ext.data);
    }
    out
}

/// Decode an extension block; a repeated type is an illegal parameter.
pub fn decode_extensions(data: &[u8]) -> Result<Vec<Extension>, TlsError> {
    let mut r = Reader::new(data, "extensions");
    let mut out: Vec<Extension> = Vec::new();
    while !r.is_empty() {
        let ext_type = ExtensionType(r.u16()?);
        let data = r.vec16()?.to_vec();
        if out.iter().any(|e| e.ext_type == ext_type) {
            return Err(TlsError::IllegalParameter(format!("duplicate extension {}", ext_type.0)));
        }
        out.push(Extension { ext_type, data });
    }
    Ok(out)
}

pub fn find(exts: &[Extension], ext_type: ExtensionType) -> Option<&[u8]> {
    exts.iter().find(|e| e.ext_type == ext_type).map(|e| e.data.as_slice())
}

// ---------------------------------------------------------------------------
// server_name (RFC 6066 §3)
// ---------------------------------------------------------------------------

pub fn build_server_name(name: &str) -> Extension {
    let mut entry = vec![0u8];
    put_vec16(&mut entry, name.as_bytes());
    let mut data = Vec::new();
    put_vec16(&mut data, &entry);
    Extension::new(ExtensionType::SERVER_NAME, data)
}

/// First host_name entry.
pub fn parse_server_name(data: &[u8]) -> Result<String, TlsError> {
    let mut outer = Reader::new(data, "server_name");
    let mut list = Reader::new(outer.vec16()?, "server_name");
    outer.finish()?;
    while !list.is_empty() {
        let name_type = list.u8()?;
        let name = list.vec16()?;
        if name_type == 0 {
            return String::from_utf8(name.to_vec())
                .map_err(|_| TlsError::DecodeError("server_name: not UTF-8".into()));
        }
    }
    Err(TlsError::DecodeError("server_name: no host_name".into()))
}

// ---------------------------------------------------------------------------
// max_fragment_length (RFC 6066 §4)
// ---------------------------------------------------------------------------

/// Fragment length for a max_fragment_length code (1..=4).
pub fn max_fragment_from_code(code: u8) -> Option<usize> {
    match code {
        1..=4 => Some(1 << (8 + code as usize)),
        _ => None,
    }
}

/// Code for a fragment length; only the four standard sizes have one.
pub fn max_fragment_code(len: usize) -> Option<u8> {
    (1..=4).find(|c| max_fragment_from_code(*c) == Some(len))
}

pub fn build_max_fragment_length(code: u8) -> Extension {
    Extension::new(ExtensionType::MAX_FRAGMENT_LENGTH, vec![code])
}

pub fn parse_max_fragment_length(data: &[u8]) -> Result<u8, TlsError> {
    match data {
        [code] if max_fragment_from_code(*code).is_some() => Ok(*code),
        _ => Err(TlsError::IllegalParameter("max_fragment_length".into())),
    }
}

// ---------------------------------------------------------------------------
// supported_groups, ec_point_formats, signature_algorithms
// ---------------------------------------------------------------------------

fn build_u16_list(ext_type: ExtensionType, values: impl Iterator<Item = u16>) -> Extension {
    let list: Vec<u8> = values.flat_map(u16::to_be_bytes).collect();
    let mut data = Vec::with_capacity(list.len() + 2);
    put_vec16(&mut data, &list);
    Extension::new(ext_type, data)
}

fn parse_u16_list(data: &[u8], what: &'static str) -> Result<Vec<u16>, TlsError> {
    let mut r = Reader::new(data, what);
    let list = r.vec16()?;
    r.finish()?;
    if list.is_empty() || list.len() % 2 != 0 {
        return Err(TlsError::DecodeError(format!("{what}: bad list length")));
    }
    Ok(list.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
}

pub fn build_supported_groups(groups: &[NamedGroup]) -> Extension {
    build_u16_list(ExtensionType::SUPPORTED_GROUPS, groups.iter().map(|g| g.0))
}

pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<NamedGroup>, TlsError> {
    Ok(parse_u16_list(data, "supported_groups")?.into_iter().map(NamedGroup).collect())
}

/// Uncompressed points only.
pub fn build_ec_point_formats() -> Extension {
    Extension::new(ExtensionType::EC_POINT_FORMATS, vec![1, 0])
}

pub fn build_signature_algorithms(schemes: &[SignatureScheme]) -> Extension {
    build_u16_list(ExtensionType::SIGNATURE_ALGORITHMS, schemes.iter().map(|s| s.0))
}

pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>, TlsError> {
    Ok(parse_u16_list(data, "signature_algorithms")?
        .into_iter()
        .map(SignatureScheme)
        .collect())
}

// ---------------------------------------------------------------------------
// ALPN (RFC 7301)
// ---------------------------------------------------------------------------

pub fn build_alpn(protocols: &[Vec<u8>]) -> Extension {
    let mut list = Vec::new();
    for p in protocols {
        put_vec8(&mut list, p);
    }
    let mut data = Vec::with_capacity(list.len() + 2);
    put_vec16(&mut data, &list);
    Extension::new(ExtensionType::ALPN, data)
}

pub fn parse_alpn(data: &[u8]) -> Result<Vec<Vec<u8>>, TlsError> {
    let mut outer = Reader::new(data, "alpn");
    let mut list = Reader::new(outer.vec16()?, "alpn");
    outer.finish()?;
    let mut out = Vec::new();
    while !list.is_empty() {
        let p = list.vec8()?;
        if p.is_empty() {
            return Err(TlsError::DecodeError("alpn: empty protocol name".into()));
        }
        out.push(p.to_vec());
    }
    if out.is_empty() {
        return Err(TlsError::DecodeError("alpn: empty list".into()));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Flags: extended_master_secret, renegotiation_info
// ---------------------------------------------------------------------------

pub fn build_extended_master_secret() -> Extension {
    Extension::new(ExtensionType::EXTENDED_MASTER_SECRET, Vec::new())
}

/// Empty `renegotiated_connection`: this endpoint never renegotiates.
pub fn build_renegotiation_info() -> Extension {
    Extension::new(ExtensionType::RENEGOTIATION_INFO, vec![0])
}

pub fn check_renegotiation_info(data: &[u8]) -> Result<(), TlsError> {
    if data != [0] {
        return Err(TlsError::HandshakeFailure("renegotiation_info not empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// supported_versions (RFC 8446 §4.2.1)
// ---------------------------------------------------------------------------

pub fn build_supported_versions_ch(versions: &[u16]) -> Extension {
    let list: Vec<u8> = versions.iter().flat_map(|v| v.to_be_bytes()).collect();
    let mut data = Vec::with_capacity(list.len() + 1);
    put_vec8(&mut data, &list);
    Extension::new(ExtensionType::SUPPORTED_VERSIONS, data)
}

pub fn parse_supported_versions_ch(data: &[u8]) -> Result<Vec<u16>, TlsError> {
    let mut r = Reader::new(data, "supported_versions");
    let list = r.vec8()?;
    r.finish()?;
    if list.is_empty() || list.len() % 2 != 0 {
        return Err(TlsError::DecodeError("supported_versions: bad list length".into()));
    }
    Ok(list.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect())
}

pub fn build_supported_versions_sh(version: u16) -> Extension {
    Extension::new(ExtensionType::SUPPORTED_VERSIONS, version.to_be_bytes().to_vec())
}

pub fn parse_supported_versions_sh(data: &[u8]) -> Result<u16, TlsError> {
    let mut r = Reader::new(data, "supported_versions");
    let v = r.u16()?;
    r.finish()?;
    Ok(v)
}

// ---------------------------------------------------------------------------
// key_share (RFC 8446 §4.2.8)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

fn put_key_share_entry(out: &mut Vec<u8>, entry: &KeyShareEntry) {
    put_u16(out, entry.group.0);
    put_vec16(out, &entry.key_exchange);
}

pub fn build_key_share_ch(entries: &[KeyShareEntry]) -> Extension {
    let mut list = Vec::new();
    for e in entries {
        put_key_share_entry(&mut list, e);
    }
    let mut data = Vec::with_capacity(list.len() + 2);
    put_vec16(&mut data, &list);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

pub fn parse_key_share_ch(data: &[u8]) -> Result<Vec<KeyShareEntry>, TlsError> {
    let mut outer = Reader::new(data, "key_share");
    let mut list = Reader::new(outer.vec16()?, "key_share");
    outer.finish()?;
    let mut out: Vec<KeyShareEntry> = Vec::new();
    while !list.is_empty() {
        let group = NamedGroup(list.u16()?);
        let key_exchange = list.vec16()?.to_vec();
        if key_exchange.is_empty() {
            return Err(TlsError::DecodeError("key_share: empty key".into()));
        }
        if out.iter().any(|e| e.group == group) {
            return Err(TlsError::IllegalParameter("key_share: duplicate group".into()));
        }
        out.push(KeyShareEntry { group, key_exchange });
    }
    Ok(out)
}

pub fn build_key_share_sh(entry: &KeyShareEntry) -> Extension {
    let mut data = Vec::new();
    put_key_share_entry(&mut data, entry);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

pub fn parse_key_share_sh(data: &[u8]) -> Result<KeyShareEntry, TlsError> {
    let mut r = Reader::new(data, "key_share");
    let group = NamedGroup(r.u16()?);
    let key_exchange = r.vec16()?.to_vec();
    r.finish()?;
    Ok(KeyShareEntry { group, key_exchange })
}

// ---------------------------------------------------------------------------
// psk_key_exchange_modes / pre_shared_key (RFC 8446 §4.2.9, §4.2.11)
// ---------------------------------------------------------------------------

pub const PSK_DHE_KE: u8 = 1;

pub fn build_psk_key_exchange_modes() -> Extension {
    Extension::new(ExtensionType::PSK_KEY_EXCHANGE_MODES, vec![1, PSK_DHE_KE])
}

pub fn parse_psk_key_exchange_modes(data: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new(data, "psk_key_exchange_modes");
    let modes = r.vec8()?.to_vec();
    r.finish()?;
    Ok(modes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedPsks {
    pub identities: Vec<PskIdentity>,
    pub binders: Vec<Vec<u8>>,
}

impl OfferedPsks {
    /// Length of the encoded binders list, i.e. the bytes a binder does
    /// not cover at the end of the ClientHello.
    pub fn binders_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }
}

/// Must be the last extension of the ClientHello.
pub fn build_pre_shared_key_ch(offer: &OfferedPsks) -> Extension {
    let mut ids = Vec::new();
    for id in &offer.identities {
        put_vec16(&mut ids, &id.identity);
        ids.extend_from_slice(&id.obfuscated_ticket_age.to_be_bytes());
    }
    let mut binders = Vec::new();
    for b in &offer.binders {
        put_vec8(&mut binders, b);
    }
    let mut data = Vec::with_capacity(ids.len() + binders.len() + 4);
    put_vec16(&mut data, &ids);
    put_vec16(&mut data, &binders);
    Extension::new(ExtensionType::PRE_SHARED_KEY, data)
}

pub fn parse_pre_shared_key_ch(data: &[u8]) -> Result<OfferedPsks, TlsError> {
    let mut outer = Reader::new(data, "pre_shared_key");
    let mut ids = Reader::new(outer.vec16()?, "pre_shared_key");
    let mut binders = Reader::new(outer.vec16()?, "pre_shared_key");
    outer.finish()?;
    let mut offer = OfferedPsks {
        identities: Vec::new(),
        binders: Vec::new(),
    };
    while !ids.is_empty() {
        let identity = ids.vec16()?.to_vec();
        let obfuscated_ticket_age = ids.u32()?;
        offer.identities.push(PskIdentity {
            identity,
            obfuscated_ticket_age,
        });
    }
    while !binders.is_empty() {
        offer.binders.push(binders.vec8()?.to_vec());
    }
    if offer.identities.is_empty() || offer.identities.len() != offer.binders.len() {
        return Err(TlsError::IllegalParameter("pre_shared_key: identity/binder count".into()));
    }
    Ok(offer)
}

pub fn build_pre_shared_key_sh(selected: u16) -> Extension {
    Extension::new(ExtensionType::PRE_SHARED_KEY, selected.to_be_bytes().to_vec())
}

pub fn parse_pre_shared_key_sh(data: &[u8]) -> Result<u16, TlsError> {
    let mut r = Reader::new(data, "pre_shared_key");
    let v = r.u16()?;
    r.finish()?;
    Ok(v)
}
