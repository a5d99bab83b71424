#![forbid(unsafe_code)]
#![doc = "DER (ASN.1) reader and writer plus object identifiers used by the mantis crates."]

#[cfg(feature = "asn1")]
pub mod asn1;

#[cfg(feature = "oid")]
pub mod oid;
