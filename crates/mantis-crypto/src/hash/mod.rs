//! Unified hash interface.
//!
//! [`Hash`] wraps every supported digest behind one value selected by
//! [`HashAlgId`]; the dispatch is a single `match` per operation.
//!
//! Finalization semantics are the same for every algorithm: `finish` caches
//! the digest, a second `finish` without `reset` returns the identical bytes,
//! and `update` after `finish` fails with [`CryptoError::HashFinalized`].

pub(crate) mod buffer;

pub use crate::provider::Digest;
pub use mantis_types::HashAlgId;

use crate::md5::Md5;
use crate::sha1::Sha1;
use crate::sha2::{Sha224, Sha256, Sha384, Sha512};
use crate::sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512, Shake};
use mantis_types::CryptoError;

#[derive(Clone)]
enum State {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
    Sha3_224(Sha3_224),
    Sha3_256(Sha3_256),
    Sha3_384(Sha3_384),
    Sha3_512(Sha3_512),
}

/// A running hash computation over any [`HashAlgId`].
///
/// `Clone` duplicates the in-progress state exactly, which is how the TLS
/// transcript reads an intermediate hash without disturbing the running one.
#[derive(Clone)]
pub struct Hash {
    alg: HashAlgId,
    state: State,
}

impl Hash {
    pub fn new(alg: HashAlgId) -> Self {
        let state = match alg {
            HashAlgId::Md5 => State::Md5(Md5::new()),
            HashAlgId::Sha1 => State::Sha1(Sha1::new()),
            HashAlgId::Sha224 => State::Sha224(Sha224::new()),
            HashAlgId::Sha256 => State::Sha256(Sha256::new()),
            HashAlgId::Sha384 => State::Sha384(Sha384::new()),
            HashAlgId::Sha512 => State::Sha512(Sha512::new()),
            HashAlgId::Sha3_224 => State::Sha3_224(Sha3_224::new()),
            HashAlgId::Sha3_256 => State::Sha3_256(Sha3_256::new()),
            HashAlgId::Sha3_384 => State::Sha3_384(Sha3_384::new()),
            HashAlgId::Sha3_512 => State::Sha3_512(Sha3_512::new()),
        };
        Self { alg, state }
    }

    pub fn alg(&self) -> HashAlgId {
        self.alg
    }

    pub fn output_size(&self) -> usize {
        self.alg.output_size()
    }

    pub fn block_size(&self) -> usize {
        self.alg.block_size()
    }

    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        match &mut self.state {
            State::Md5(h) => h.update(data),
            State::Sha1(h) => h.update(data),
            State::Sha224(h) => h.update(data),
            State::Sha256(h) => h.update(data),
            State::Sha384(h) => h.update(data),
            State::Sha512(h) => h.update(data),
            State::Sha3_224(h) => h.update(data),
            State::Sha3_256(h) => h.update(data),
            State::Sha3_384(h) => h.update(data),
            State::Sha3_512(h) => h.update(data),
        }
    }

    /// Finalize and return the digest.
    pub fn finish(&mut self) -> Result<Vec<u8>, CryptoError> {
        Ok(match &mut self.state {
            State::Md5(h) => h.finish()?.to_vec(),
            State::Sha1(h) => h.finish()?.to_vec(),
            State::Sha224(h) => h.finish()?.to_vec(),
            State::Sha256(h) => h.finish()?.to_vec(),
            State::Sha384(h) => h.finish()?.to_vec(),
            State::Sha512(h) => h.finish()?.to_vec(),
            State::Sha3_224(h) => h.finish()?.to_vec(),
            State::Sha3_256(h) => h.finish()?.to_vec(),
            State::Sha3_384(h) => h.finish()?.to_vec(),
            State::Sha3_512(h) => h.finish()?.to_vec(),
        })
    }

    /// Finalize into `out`, returning the digest length. `out` shorter than
    /// the digest fails with `BufferTooSmall` and leaves the state untouched.
    pub fn finish_into(&mut self, out: &mut [u8]) -> Result<usize, CryptoError> {
        let need = self.output_size();
        if out.len() < need {
            return Err(CryptoError::BufferTooSmall {
                need,
                got: out.len(),
            });
        }
        let digest = self.finish()?;
        out[..need].copy_from_slice(&digest);
        Ok(need)
    }

    pub fn reset(&mut self) {
        match &mut self.state {
            State::Md5(h) => h.reset(),
            State::Sha1(h) => h.reset(),
            State::Sha224(h) => h.reset(),
            State::Sha256(h) => h.reset(),
            State::Sha384(h) => h.reset(),
            State::Sha512(h) => h.reset(),
            State::Sha3_224(h) => h.reset(),
            State::Sha3_256(h) => h.reset(),
            State::Sha3_384(h) => h.reset(),
            State::Sha3_512(h) => h.reset(),
        }
    }

    /// One-shot digest of `data`.
    pub fn digest(alg: HashAlgId, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut h = Hash::new(alg);
        h.update(data)?;
        h.finish()
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hash").field("alg", &self.alg).finish_non_exhaustive()
    }
}

impl Digest for Hash {
    fn output_size(&self) -> usize {
        Hash::output_size(self)
    }

    fn block_size(&self) -> usize {
        Hash::block_size(self)
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        Hash::update(self, data)
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        self.finish_into(out).map(|_| ())
    }

    fn reset(&mut self) {
        Hash::reset(self)
    }
}

/// SHAKE128 of `data` with `out_len` bytes of output.
pub fn shake128(data: &[u8], out_len: usize) -> Vec<u8> {
    let mut x = Shake::shake128();
    // Absorbing into a fresh sponge cannot fail.
    let _ = x.update(data);
    let mut out = vec![0u8; out_len];
    x.squeeze(&mut out);
    out
}

/// SHAKE256 of `data` with `out_len` bytes of output.
pub fn shake256(data: &[u8], out_len: usize) -> Vec<u8> {
    let mut x = Shake::shake256();
    let _ = x.update(data);
    let mut out = vec![0u8; out_len];
    x.squeeze(&mut out);
    out
}
