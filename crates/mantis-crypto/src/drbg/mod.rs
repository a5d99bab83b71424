//! Deterministic random bit generator with an explicit lifecycle.
//!
//! [`Drbg`] wraps the HMAC-DRBG mechanism with entropy gathering and a
//! reseed schedule. A generator starts `Uninitialized`, becomes `Ready` after
//! [`Drbg::init`], and ends `Destroyed`. When an automatic reseed cannot
//! obtain entropy the generator moves to `Failed` and refuses all further
//! output; it never produces bytes from an overdue state.

mod hmac_drbg;
pub use hmac_drbg::HmacDrbg;

use mantis_types::{CryptoError, SecureRandom};
use zeroize::Zeroizing;

/// Largest single request to the mechanism (2^19 bits). Bigger requests are
/// split and each piece counts as one generate call.
pub const MAX_REQUEST: usize = 1 << 16;

/// Default number of generate calls between reseeds.
pub const DEFAULT_RESEED_INTERVAL: u64 = 1 << 24;

/// Default number of output bytes between reseeds.
pub const DEFAULT_RESEED_BYTES: u64 = 1 << 32;

const ENTROPY_LEN: usize = 32;
const NONCE_LEN: usize = 16;

/// Where seed material comes from.
pub trait EntropySource: Send {
    fn get_entropy(&mut self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// The operating system generator via `getrandom`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn get_entropy(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::getrandom(buf).map_err(|_| CryptoError::DrbgEntropyFail)
    }
}

#[derive(Debug, Clone)]
pub struct DrbgConfig {
    /// Generate calls allowed between reseeds.
    pub reseed_interval: u64,
    /// Output bytes allowed between reseeds.
    pub reseed_bytes: u64,
    pub personalization: Vec<u8>,
}

impl Default for DrbgConfig {
    fn default() -> Self {
        DrbgConfig {
            reseed_interval: DEFAULT_RESEED_INTERVAL,
            reseed_bytes: DEFAULT_RESEED_BYTES,
            personalization: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrbgState {
    Uninitialized,
    Ready,
    Destroyed,
    Failed,
}

pub struct Drbg {
    config: DrbgConfig,
    source: Box<dyn EntropySource>,
    state: DrbgState,
    mech: Option<HmacDrbg>,
    calls: u64,
    bytes: u64,
}

impl std::fmt::Debug for Drbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drbg")
            .field("state", &self.state)
            .field("calls", &self.calls)
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl Drbg {
    /// An uninitialized generator drawing from [`OsEntropy`].
    pub fn new(config: DrbgConfig) -> Self {
        Self::with_entropy_source(config, Box::new(OsEntropy))
    }

    pub fn with_entropy_source(config: DrbgConfig, source: Box<dyn EntropySource>) -> Self {
        Drbg {
            config,
            source,
            state: DrbgState::Uninitialized,
            mech: None,
            calls: 0,
            bytes: 0,
        }
    }

    /// Create and seed from the OS in one step.
    pub fn from_os() -> Result<Self, CryptoError> {
        let mut d = Self::new(DrbgConfig::default());
        d.init()?;
        Ok(d)
    }

    pub fn state(&self) -> DrbgState {
        self.state
    }

    /// Seed the generator. Only valid from `Uninitialized`.
    pub fn init(&mut self) -> Result<(), CryptoError> {
        if self.state != DrbgState::Uninitialized {
            return Err(CryptoError::DrbgNotReady);
        }
        let mut seed = Zeroizing::new(vec![0u8; ENTROPY_LEN + NONCE_LEN]);
        self.source.get_entropy(&mut seed)?;
        seed.extend_from_slice(&self.config.personalization);
        self.mech = Some(HmacDrbg::new(&seed)?);
        self.calls = 0;
        self.bytes = 0;
        self.state = DrbgState::Ready;
        log::debug!("drbg instantiated");
        Ok(())
    }

    fn ready_mech(&mut self) -> Result<&mut HmacDrbg, CryptoError> {
        match self.state {
            DrbgState::Ready => self.mech.as_mut().ok_or(CryptoError::DrbgNotReady),
            DrbgState::Failed => Err(CryptoError::DrbgReseedFailed),
            _ => Err(CryptoError::DrbgNotReady),
        }
    }

    /// Mix fresh entropy and `additional` into the state.
    pub fn reseed(&mut self, additional: &[u8]) -> Result<(), CryptoError> {
        self.ready_mech()?;
        let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
        self.source.get_entropy(&mut entropy[..])?;
        self.ready_mech()?.reseed(&entropy[..], additional)?;
        self.calls = 0;
        self.bytes = 0;
        Ok(())
    }

    fn overdue(&self) -> bool {
        self.calls >= self.config.reseed_interval || self.bytes >= self.config.reseed_bytes
    }

    /// Fill `buf`, reseeding first whenever a limit has been reached.
    pub fn generate(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.generate_with_input(buf, &[])
    }

    pub fn generate_with_input(&mut self, buf: &mut [u8], additional: &[u8]) -> Result<(), CryptoError> {
        self.ready_mech()?;
        for chunk in buf.chunks_mut(MAX_REQUEST) {
            if self.overdue() {
                let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
                let reseeded = self
                    .source
                    .get_entropy(&mut entropy[..])
                    .and_then(|_| self.ready_mech()?.reseed(&entropy[..], &[]));
                if reseeded.is_err() {
                    log::warn!("drbg automatic reseed failed, generator disabled");
                    self.fail();
                    return Err(CryptoError::DrbgReseedFailed);
                }
                self.calls = 0;
                self.bytes = 0;
            }
            self.ready_mech()?.generate(chunk, additional)?;
            self.calls += 1;
            self.bytes += chunk.len() as u64;
        }
        Ok(())
    }

    fn fail(&mut self) {
        self.mech = None;
        self.state = DrbgState::Failed;
    }

    /// Zero the state. Any later call fails with `DrbgNotReady`.
    pub fn destroy(&mut self) {
        self.mech = None;
        self.state = DrbgState::Destroyed;
    }
}

impl SecureRandom for Drbg {
    fn fill_bytes(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.generate(buf)
    }
}
