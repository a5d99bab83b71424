//! RSA (RFC 8017): key generation, the raw RSAEP/RSADP primitives with CRT,
//! PKCS#1 v1.5 signatures and encryption, and RSASSA-PSS.
//!
//! Signature operations take a precomputed digest plus the [`HashAlgId`] that
//! produced it; the hash selects the DigestInfo prefix or the PSS/MGF1 hash.

mod pkcs1v15;
mod pss;

use mantis_bignum::BigNum;
use mantis_types::{CryptoError, HashAlgId, SecureRandom};
use zeroize::{Zeroize, Zeroizing};

pub const RSA_DEFAULT_EXPONENT: u64 = 65537;
pub const RSA_MIN_BITS: usize = 1024;
pub const RSA_MAX_BITS: usize = 8192;

#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    n: BigNum,
    e: BigNum,
    /// Modulus length in bytes.
    k: usize,
}

impl std::fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("bits", &self.bits())
            .finish()
    }
}

impl RsaPublicKey {
    /// Public key from big-endian modulus and exponent.
    pub fn new(n: &[u8], e: &[u8]) -> Result<Self, CryptoError> {
        let n = BigNum::from_bytes_be(n);
        let e = BigNum::from_bytes_be(e);
        if n.is_even() || n.bit_len() < 512 {
            return Err(CryptoError::InvalidKey);
        }
        if e.is_even() || e < BigNum::from_u64(3) || e >= n {
            return Err(CryptoError::RsaInvalidExponent);
        }
        let k = n.bit_len().div_ceil(8);
        Ok(RsaPublicKey { n, e, k })
    }

    pub fn bits(&self) -> usize {
        self.n.bit_len()
    }

    pub fn modulus_len(&self) -> usize {
        self.k
    }

    pub fn n_bytes(&self) -> Vec<u8> {
        self.n.to_bytes_be()
    }

    pub fn e_bytes(&self) -> Vec<u8> {
        self.e.to_bytes_be()
    }

    /// RSAEP / RSAVP1: `input^e mod n`, output padded to the modulus length.
    pub fn public_op(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if input.len() > self.k {
            return Err(CryptoError::RsaDataTooLarge);
        }
        let m = BigNum::from_bytes_be(input);
        if m >= self.n {
            return Err(CryptoError::RsaDataTooLarge);
        }
        m.mod_exp(&self.e, &self.n)?.to_bytes_be_padded(self.k)
    }

    /// RSAES-PKCS1-v1_5 encryption.
    pub fn encrypt_pkcs1(
        &self,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<u8>, CryptoError> {
        let em = pkcs1v15::encrypt_pad(msg, self.k, rng)?;
        self.public_op(&em)
    }

    /// RSASSA-PKCS1-v1_5 verification of `digest` (made with `hash`).
    pub fn verify_pkcs1(
        &self,
        hash: HashAlgId,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        if signature.len() != self.k {
            return Ok(false);
        }
        let em = match self.public_op(signature) {
            Ok(em) => em,
            Err(CryptoError::RsaDataTooLarge) => return Ok(false),
            Err(e) => return Err(e),
        };
        pkcs1v15::verify_encoded(&em, hash, digest, self.k)
    }

    /// RSASSA-PSS verification with MGF1 over `hash` and a salt as long as
    /// the digest.
    pub fn verify_pss(
        &self,
        hash: HashAlgId,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        if signature.len() != self.k {
            return Ok(false);
        }
        let em = match self.public_op(signature) {
            Ok(em) => em,
            Err(CryptoError::RsaDataTooLarge) => return Ok(false),
            Err(e) => return Err(e),
        };
        let em_bits = self.bits() - 1;
        // with emBits a multiple of 8 the leading byte is outside EM and must be zero
        let (lead, em) = em.split_at(self.k - em_bits.div_ceil(8));
        if lead.iter().any(|&b| b != 0) {
            return Ok(false);
        }
        pss::verify(em, hash, digest, em_bits)
    }
}

/// RSA private key in CRT form.
#[derive(Clone)]
pub struct RsaPrivateKey {
    public: RsaPublicKey,
    d: BigNum,
    p: BigNum,
    q: BigNum,
    dp: BigNum,
    dq: BigNum,
    qinv: BigNum,
}

impl Drop for RsaPrivateKey {
    fn drop(&mut self) {
        self.d.zeroize();
        self.p.zeroize();
        self.q.zeroize();
        self.dp.zeroize();
        self.dq.zeroize();
        self.qinv.zeroize();
    }
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.public.bits())
            .finish_non_exhaustive()
    }
}

impl RsaPrivateKey {
    /// New key with e = 65537.
    pub fn generate(bits: usize, rng: &mut dyn SecureRandom) -> Result<Self, CryptoError> {
        Self::generate_with_exponent(bits, RSA_DEFAULT_EXPONENT, rng)
    }

    /// New key of exactly `bits` bits. `bits` must be even and within
    /// [`RSA_MIN_BITS`]..=[`RSA_MAX_BITS`]; `e` must be odd and at least 3.
    pub fn generate_with_exponent(
        bits: usize,
        e: u64,
        rng: &mut dyn SecureRandom,
    ) -> Result<Self, CryptoError> {
        if !(RSA_MIN_BITS..=RSA_MAX_BITS).contains(&bits) || bits % 2 != 0 {
            return Err(CryptoError::RsaInvalidKeyBits);
        }
        if e < 3 || e % 2 == 0 {
            return Err(CryptoError::RsaInvalidExponent);
        }
        let e = BigNum::from_u64(e);
        let half = bits / 2;
        // |p - q| must exceed 2^(half - 100) (FIPS 186-4 B.3.3)
        let min_gap = BigNum::one().shl(half - 100);
        loop {
            let p = rsa_prime(half, &e, rng)?;
            let q = rsa_prime(half, &e, rng)?;
            let (p, q) = if p > q { (p, q) } else { (q, p) };
            if p.sub(&q) <= min_gap {
                continue;
            }
            let n = p.mul(&q);
            if n.bit_len() != bits {
                continue;
            }
            let one = BigNum::one();
            let lambda = p.sub(&one).lcm(&q.sub(&one))?;
            let d = e.mod_inv(&lambda)?;
            log::debug!("rsa: generated {bits}-bit key");
            return Self::from_parts(n, e, d, p, q);
        }
    }

    /// Private key from big-endian components. The CRT values are derived
    /// and the key is checked with a test encryption.
    pub fn from_components(
        n: &[u8],
        e: &[u8],
        d: &[u8],
        p: &[u8],
        q: &[u8],
    ) -> Result<Self, CryptoError> {
        let n = BigNum::from_bytes_be(n);
        let p = BigNum::from_bytes_be(p);
        let q = BigNum::from_bytes_be(q);
        if p.mul(&q) != n {
            return Err(CryptoError::InvalidKey);
        }
        let key = Self::from_parts(
            n,
            BigNum::from_bytes_be(e),
            BigNum::from_bytes_be(d),
            p,
            q,
        )?;
        let probe = [0x5A; 16];
        let c = key.public.public_op(&probe)?;
        let m = key.private_op(&c)?;
        if m[m.len() - probe.len()..] != probe {
            return Err(CryptoError::InvalidKey);
        }
        Ok(key)
    }

    fn from_parts(
        n: BigNum,
        e: BigNum,
        d: BigNum,
        p: BigNum,
        q: BigNum,
    ) -> Result<Self, CryptoError> {
        let public = RsaPublicKey::new(&n.to_bytes_be(), &e.to_bytes_be())?;
        let one = BigNum::one();
        let dp = d.mod_reduce(&p.sub(&one))?;
        let dq = d.mod_reduce(&q.sub(&one))?;
        let qinv = q.mod_inv(&p)?;
        Ok(RsaPrivateKey {
            public,
            d,
            p,
            q,
            dp,
            dq,
            qinv,
        })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn d_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.d.to_bytes_be())
    }

    pub fn p_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.p.to_bytes_be())
    }

    pub fn q_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.q.to_bytes_be())
    }

    /// RSADP / RSASP1 via the CRT. The result is re-encrypted and compared
    /// with the input so a faulty computation never leaves the key.
    pub fn private_op(&self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let k = self.public.k;
        if input.len() > k {
            return Err(CryptoError::RsaDataTooLarge);
        }
        let c = BigNum::from_bytes_be(input);
        if c >= self.public.n {
            return Err(CryptoError::RsaDataTooLarge);
        }
        let m1 = c.mod_exp(&self.dp, &self.p)?;
        let m2 = c.mod_exp(&self.dq, &self.q)?;
        // h = qinv (m1 - m2) mod p
        let h = m1.mod_sub(&m2.mod_reduce(&self.p)?, &self.p)?.mod_mul(&self.qinv, &self.p)?;
        let m = m2.add(&h.mul(&self.q));
        if m.mod_exp(&self.public.e, &self.public.n)? != c {
            log::warn!("rsa: CRT result failed the consistency check");
            return Err(CryptoError::InvalidKey);
        }
        Ok(Zeroizing::new(m.to_bytes_be_padded(k)?))
    }

    /// RSASSA-PKCS1-v1_5 signature over `digest`.
    pub fn sign_pkcs1(&self, hash: HashAlgId, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let em = pkcs1v15::sign_pad(hash, digest, self.public.k)?;
        Ok(self.private_op(&em)?.to_vec())
    }

    /// RSASSA-PSS signature over `digest` with a digest-length salt.
    pub fn sign_pss(
        &self,
        hash: HashAlgId,
        digest: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<u8>, CryptoError> {
        let em_bits = self.public.bits() - 1;
        let em = pss::encode(hash, digest, em_bits, rng)?;
        Ok(self.private_op(&em)?.to_vec())
    }

    /// RSAES-PKCS1-v1_5 decryption.
    pub fn decrypt_pkcs1(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if ciphertext.len() != self.public.k {
            return Err(CryptoError::RsaInvalidPadding);
        }
        let em = self.private_op(ciphertext)?;
        pkcs1v15::decrypt_unpad(&em)
    }
}

/// Random prime `p` of `bits` bits with `gcd(p - 1, e) = 1`.
fn rsa_prime(bits: usize, e: &BigNum, rng: &mut dyn SecureRandom) -> Result<BigNum, CryptoError> {
    for _ in 0..64 {
        let p = BigNum::generate_prime(bits, rng)?;
        if p.sub(&BigNum::one()).gcd(e)?.is_one() {
            return Ok(p);
        }
    }
    Err(CryptoError::BnPrimeGenFail)
}

/// MGF1 (RFC 8017 B.2.1) over `hash`.
pub(crate) fn mgf1(hash: HashAlgId, seed: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut out = Vec::with_capacity(len + hash.output_size());
    let mut counter: u32 = 0;
    while out.len() < len {
        let mut h = crate::hash::Hash::new(hash);
        h.update(seed)?;
        h.update(&counter.to_be_bytes())?;
        out.extend_from_slice(&h.finish()?);
        counter += 1;
    }
    out.truncate(len);
    Ok(out)
}
