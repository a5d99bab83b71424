//! DER encoding and decoding (X.690 distinguished encoding rules).
//!
//! The decoder is strict: indefinite lengths, non-minimal length encodings
//! and trailing bytes inside a constructed value are all rejected.

mod decoder;
mod encoder;
mod time;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use time::{civil_from_unix, unix_from_civil};

/// Universal tag bytes as they appear on the wire.
pub mod tags {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
    pub const CONSTRUCTED: u8 = 0x20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

/// A single-byte identifier octet. Multi-byte (high tag number) forms do not
/// occur in the structures this crate handles and are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(pub u8);

impl Tag {
    pub fn class(self) -> TagClass {
        match self.0 >> 6 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    pub fn constructed(self) -> bool {
        self.0 & tags::CONSTRUCTED != 0
    }

    pub fn number(self) -> u8 {
        self.0 & 0x1F
    }

    /// `[n]` context-specific tag, constructed (EXPLICIT) or primitive.
    pub const fn context(n: u8, constructed: bool) -> Tag {
        Tag(tags::CONTEXT_SPECIFIC | if constructed { tags::CONSTRUCTED } else { 0 } | (n & 0x1F))
    }
}

/// A borrowed TLV: `raw` is the complete encoding, `value` the contents.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub tag: Tag,
    pub value: &'a [u8],
    pub raw: &'a [u8],
}
