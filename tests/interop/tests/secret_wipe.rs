//! Key material must not survive in freed heap memory.
//!
//! This binary installs an allocator that, while armed, scans every block
//! handed back to it for a known secret. Each test learns the secret from one
//! derivation, then repeats the same derivation armed.

use mantis_crypto::hkdf;
use mantis_crypto::hmac::Hmac;
use mantis_tls::crypt::key_schedule12::{derive_extended_master_secret, derive_key_block, derive_master_secret};
use mantis_tls::crypt::prf::prf;
use mantis_tls::crypt::CipherSuiteParams;
use mantis_tls::CipherSuite;
use mantis_types::HashAlgId;
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use zeroize::Zeroizing;

const NEEDLE_LEN: usize = 16;

static ARMED: AtomicBool = AtomicBool::new(false);
static NEEDLE_LO: AtomicU64 = AtomicU64::new(0);
static NEEDLE_HI: AtomicU64 = AtomicU64::new(0);
static HITS: AtomicUsize = AtomicUsize::new(0);
static SERIAL: Mutex<()> = Mutex::new(());

struct ScanningAlloc;

fn needle() -> [u8; NEEDLE_LEN] {
    let mut out = [0u8; NEEDLE_LEN];
    out[..8].copy_from_slice(&NEEDLE_LO.load(Ordering::SeqCst).to_ne_bytes());
    out[8..].copy_from_slice(&NEEDLE_HI.load(Ordering::SeqCst).to_ne_bytes());
    out
}

unsafe impl GlobalAlloc for ScanningAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        System.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ARMED.load(Ordering::SeqCst) && layout.size() >= NEEDLE_LEN {
            let block = std::slice::from_raw_parts(ptr, layout.size());
            let needle = needle();
            if block.windows(NEEDLE_LEN).any(|w| w == needle) {
                HITS.fetch_add(1, Ordering::SeqCst);
            }
        }
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: ScanningAlloc = ScanningAlloc;

/// Number of blocks freed during `work` that still held `secret`.
fn freed_copies(secret: &[u8], work: impl FnOnce()) -> usize {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let mut lo = [0u8; 8];
    let mut hi = [0u8; 8];
    lo.copy_from_slice(&secret[..8]);
    hi.copy_from_slice(&secret[8..NEEDLE_LEN]);
    NEEDLE_LO.store(u64::from_ne_bytes(lo), Ordering::SeqCst);
    NEEDLE_HI.store(u64::from_ne_bytes(hi), Ordering::SeqCst);
    HITS.store(0, Ordering::SeqCst);

    ARMED.store(true, Ordering::SeqCst);
    work();
    ARMED.store(false, Ordering::SeqCst);
    HITS.load(Ordering::SeqCst)
}

fn prefix(bytes: &[u8]) -> [u8; NEEDLE_LEN] {
    let mut out = [0u8; NEEDLE_LEN];
    out.copy_from_slice(&bytes[..NEEDLE_LEN]);
    out
}

#[test]
fn test_prf_blocks_wiped_before_free() {
    let run = || prf(HashAlgId::Sha256, &[0x0b; 48], "key expansion", &[1; 64], 40).unwrap();
    let secret = prefix(&run());
    let hits = freed_copies(&secret, || {
        let out = run();
        assert_eq!(out[..NEEDLE_LEN], secret);
    });
    assert_eq!(hits, 0);
}

#[test]
fn test_master_secrets_wiped_before_free() {
    let pms = [0x33u8; 48];
    let plain = || derive_master_secret(HashAlgId::Sha384, &pms, &[1; 32], &[2; 32]).unwrap();
    let secret = prefix(&plain());
    assert_eq!(freed_copies(&secret, || drop(plain())), 0);

    let extended = || derive_extended_master_secret(HashAlgId::Sha256, &pms, &[9; 32]).unwrap();
    let secret = prefix(&extended());
    assert_eq!(freed_copies(&secret, || drop(extended())), 0);
}

#[test]
fn test_key_block_wiped_before_free() {
    let params = CipherSuiteParams::from_suite(CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256).unwrap();
    let derive = || derive_key_block(params, &[0x42; 48], &[1; 32], &[2; 32]).unwrap();
    let secret = prefix(&derive().client_write.key);
    assert_eq!(freed_copies(&secret, || drop(derive())), 0);
}

#[test]
fn test_hkdf_expand_wiped_before_free() {
    let expand = || Zeroizing::new(hkdf::expand(HashAlgId::Sha256, &[0x07; 32], b"info", 42).unwrap());
    let secret = prefix(&expand());
    assert_eq!(freed_copies(&secret, || drop(expand())), 0);
}

#[test]
fn test_hmac_state_wiped_on_drop() {
    for alg in [HashAlgId::Sha1, HashAlgId::Sha256, HashAlgId::Sha3_256] {
        let mut mac = Box::new(Hmac::new(alg, &[0x5a; 32]).unwrap());
        mac.update(b"record").unwrap();
        let tag = Zeroizing::new(mac.finish().unwrap());

        // SHA-1 and SHA-3 cache the digest bytes; SHA-256 keeps the final
        // chaining words, which are the digest in native word order.
        let secret = if alg == HashAlgId::Sha256 {
            let mut words = [0u8; NEEDLE_LEN];
            for (out, chunk) in words.chunks_exact_mut(4).zip(tag.chunks_exact(4)) {
                let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                out.copy_from_slice(&word.to_ne_bytes());
            }
            words
        } else {
            prefix(&tag)
        };
        assert_eq!(freed_copies(&secret, || drop(mac)), 0, "{alg:?}");
    }
}
