#![forbid(unsafe_code)]
#![doc = "X.509 certificate support for the mantis TLS engine."]

#[cfg(feature = "x509")]
pub mod x509;
