//! Curve25519 arithmetic shared by X25519 and Ed25519.

#[cfg(feature = "ed25519")]
pub(crate) mod edwards;
pub(crate) mod field;
#[cfg(feature = "ed25519")]
pub(crate) mod scalar;
