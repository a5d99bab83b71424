//! Throughput benchmark for primitives and in-memory TLS handshakes.

use crate::identity::{self, KeyType};
use mantis_crypto::aead::AeadKey;
use mantis_crypto::ecdsa::EcdsaKeyPair;
use mantis_crypto::ed25519::Ed25519KeyPair;
use mantis_crypto::hash::Hash;
use mantis_crypto::hmac::Hmac;
use mantis_crypto::provider::Aead;
use mantis_crypto::rand::OsRandom;
use mantis_tls::{Connection, Context, TlsError, TlsRole, TlsVersion};
use mantis_types::{AeadAlgId, EccCurveId, HashAlgId};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type BenchResult = Result<(), Box<dyn std::error::Error>>;

const BLOCK: usize = 8192;

const ALGORITHMS: &[&str] = &[
    "sha256",
    "sha384",
    "sha3-256",
    "hmac-sha256",
    "aes-128-gcm",
    "aes-256-gcm",
    "chacha20-poly1305",
    "ed25519",
    "ecdsa-p256",
    "tls12",
    "tls13",
];

pub fn run(algorithm: &str, seconds: u64) -> BenchResult {
    let duration = Duration::from_secs(seconds.max(1));
    if algorithm == "all" {
        for alg in ALGORITHMS {
            bench(alg, duration)?;
        }
        return Ok(());
    }
    bench(algorithm, duration)
}

fn bench(algorithm: &str, duration: Duration) -> BenchResult {
    match algorithm {
        "sha256" => bench_hash(HashAlgId::Sha256, duration),
        "sha384" => bench_hash(HashAlgId::Sha384, duration),
        "sha3-256" => bench_hash(HashAlgId::Sha3_256, duration),
        "hmac-sha256" => {
            let data = vec![0u8; BLOCK];
            throughput("HMAC-SHA256", duration, || {
                Hmac::mac(HashAlgId::Sha256, b"benchmark key", &data)?;
                Ok(BLOCK)
            })
        }
        "aes-128-gcm" => bench_aead(AeadAlgId::Aes128Gcm, duration),
        "aes-256-gcm" => bench_aead(AeadAlgId::Aes256Gcm, duration),
        "chacha20-poly1305" => bench_aead(AeadAlgId::ChaCha20Poly1305, duration),
        "ed25519" => {
            let kp = Ed25519KeyPair::generate(&mut OsRandom)?;
            operations("Ed25519 sign", duration, || {
                kp.sign(b"benchmark message")?;
                Ok(())
            })
        }
        "ecdsa-p256" => {
            let kp = EcdsaKeyPair::generate(EccCurveId::NistP256, &mut OsRandom)?;
            let digest = Hash::digest(HashAlgId::Sha256, b"benchmark message")?;
            operations("ECDSA P-256 sign", duration, || {
                kp.sign(&digest, &mut OsRandom)?;
                Ok(())
            })
        }
        "tls12" => bench_handshake(TlsVersion::Tls12, duration),
        "tls13" => bench_handshake(TlsVersion::Tls13, duration),
        _ => Err(format!("unknown algorithm: {algorithm}\nValid: {}, all", ALGORITHMS.join(", ")).into()),
    }
}

fn bench_hash(alg: HashAlgId, duration: Duration) -> BenchResult {
    let data = vec![0u8; BLOCK];
    throughput(&format!("{alg:?}"), duration, || {
        Hash::digest(alg, &data)?;
        Ok(BLOCK)
    })
}

fn bench_aead(alg: AeadAlgId, duration: Duration) -> BenchResult {
    let key = AeadKey::new(alg, &vec![0x42; alg.key_size()])?;
    let nonce = [0x01u8; 12];
    let block = vec![0u8; BLOCK];
    throughput(&format!("{alg:?}"), duration, || {
        key.seal(&nonce, b"benchmark", &block)?;
        Ok(BLOCK)
    })
}

fn throughput<F>(name: &str, duration: Duration, mut op: F) -> BenchResult
where
    F: FnMut() -> Result<usize, Box<dyn std::error::Error>>,
{
    let start = Instant::now();
    let mut total_bytes: u64 = 0;
    let mut ops: u64 = 0;
    while start.elapsed() < duration {
        total_bytes += op()? as u64;
        ops += 1;
    }
    let elapsed = start.elapsed().as_secs_f64();
    let mb_per_sec = total_bytes as f64 / (1024.0 * 1024.0) / elapsed;
    println!("{name:24} {mb_per_sec:10.2} MB/s  ({ops} ops in {elapsed:.2}s)");
    Ok(())
}

fn operations<F>(name: &str, duration: Duration, mut op: F) -> BenchResult
where
    F: FnMut() -> Result<(), Box<dyn std::error::Error>>,
{
    let start = Instant::now();
    let mut ops: u64 = 0;
    while start.elapsed() < duration {
        op()?;
        ops += 1;
    }
    let elapsed = start.elapsed().as_secs_f64();
    println!("{name:24} {:10.1} ops/s  ({ops} ops in {elapsed:.2}s)", ops as f64 / elapsed);
    Ok(())
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// Attach a non-blocking in-memory transport.
fn attach(conn: &mut Connection, rx: Pipe, tx: Pipe) {
    conn.set_transport(
        move |buf: &mut [u8]| {
            let mut q = rx.lock().map_err(|_| io::Error::other("pipe poisoned"))?;
            if q.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(q.len());
            for (b, v) in buf.iter_mut().zip(q.drain(..n)) {
                *b = v;
            }
            Ok(n)
        },
        move |data: &[u8]| {
            let mut q = tx.lock().map_err(|_| io::Error::other("pipe poisoned"))?;
            q.extend(data);
            Ok(data.len())
        },
    );
}

/// Run one client/server handshake over memory pipes.
pub(crate) fn handshake_pair(client_ctx: &Arc<Context>, server_ctx: &Arc<Context>) -> Result<(), TlsError> {
    let (c2s, s2c) = (Pipe::default(), Pipe::default());
    let mut client = Connection::new(client_ctx.clone(), TlsRole::Client)?;
    let mut server = Connection::new(server_ctx.clone(), TlsRole::Server)?;
    attach(&mut client, s2c.clone(), c2s.clone());
    attach(&mut server, c2s, s2c);
    for _ in 0..16 {
        let c = client.handshake();
        let s = server.handshake();
        match (c, s) {
            (Ok(()), Ok(())) => return Ok(()),
            (Err(e), _) | (_, Err(e)) if !e.is_retryable() => return Err(e),
            _ => {}
        }
    }
    Err(TlsError::Internal("handshake did not converge".into()))
}

fn bench_handshake(version: TlsVersion, duration: Duration) -> BenchResult {
    let (cert, key) = identity::generate(KeyType::EcdsaP256, "localhost")?;
    let server_ctx = Arc::new(
        Context::builder()
            .min_version(version)
            .max_version(version)
            .identity(vec![cert.clone()], key)
            .build()?,
    );
    let client_ctx = Arc::new(
        Context::builder()
            .min_version(version)
            .max_version(version)
            .trusted_root(cert)
            .server_name("localhost")
            .build()?,
    );
    operations(&format!("{version} handshake"), duration, || {
        handshake_pair(&client_ctx, &server_ctx)?;
        Ok(())
    })
}
