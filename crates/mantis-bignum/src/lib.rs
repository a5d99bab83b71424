#![forbid(unsafe_code)]
#![doc = "Arbitrary precision integer arithmetic for the mantis primitive layer."]

mod bignum;
mod ct;
mod gcd;
mod montgomery;
mod ops;
mod prime;
mod rand;

pub use bignum::{BigNum, Limb, LIMB_BITS};
pub use montgomery::MontgomeryCtx;
