#![forbid(unsafe_code)]
#![doc = "Error kinds, algorithm identifiers and the randomness trait shared by the mantis crates."]

pub mod algorithm;
pub mod error;
pub mod rand;

pub use algorithm::*;
pub use error::*;
pub use rand::SecureRandom;
