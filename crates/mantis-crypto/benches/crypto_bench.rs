//! Primitive throughput and public-key operation benchmarks.
//!
//! Run with: cargo bench -p mantis-crypto

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mantis_crypto::aead::AeadKey;
use mantis_crypto::hash::Hash;
use mantis_crypto::provider::Aead;
use mantis_crypto::rand::OsRandom;
use mantis_types::{AeadAlgId, DhParamId, EccCurveId, HashAlgId};

const SIZES: [usize; 3] = [1024, 16384, 1 << 20];

fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");
    for size in SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        let data = vec![0u8; size];
        for alg in [HashAlgId::Sha1, HashAlgId::Sha256, HashAlgId::Sha384, HashAlgId::Sha3_256] {
            group.bench_with_input(BenchmarkId::new(format!("{alg:?}"), size), &data, |b, d| {
                b.iter(|| Hash::digest(alg, d).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_aead(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead");
    let nonce = [0u8; 12];
    for alg in [AeadAlgId::Aes128Gcm, AeadAlgId::Aes256Gcm, AeadAlgId::Aes128Ccm, AeadAlgId::ChaCha20Poly1305] {
        let key = AeadKey::new(alg, &vec![0x42; alg.key_size()]).unwrap();
        for size in SIZES {
            group.throughput(Throughput::Bytes(size as u64));
            let pt = vec![0u8; size];
            group.bench_with_input(BenchmarkId::new(format!("{alg:?}/seal"), size), &pt, |b, pt| {
                b.iter(|| key.seal(&nonce, b"aad", pt).unwrap());
            });
            let ct = key.seal(&nonce, b"aad", &pt).unwrap();
            group.bench_with_input(BenchmarkId::new(format!("{alg:?}/open"), size), &ct, |b, ct| {
                b.iter(|| key.open(&nonce, b"aad", ct).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_key_exchange(c: &mut Criterion) {
    use mantis_crypto::dh::{DhKeyPair, DhParams};
    use mantis_crypto::ecdh::EcdhKeyPair;
    use mantis_crypto::x25519::X25519PrivateKey;

    let mut rng = OsRandom;
    let mut group = c.benchmark_group("key-exchange");
    group.sample_size(20);

    let a = X25519PrivateKey::generate(&mut rng).unwrap();
    let peer = X25519PrivateKey::generate(&mut rng).unwrap().public_key();
    group.bench_function("x25519", |b| b.iter(|| a.diffie_hellman(&peer).unwrap()));

    for curve in [EccCurveId::NistP256, EccCurveId::NistP384] {
        let a = EcdhKeyPair::generate(curve, &mut rng).unwrap();
        let peer = EcdhKeyPair::generate(curve, &mut rng).unwrap().public_key_bytes().unwrap();
        group.bench_function(format!("ecdh-{curve:?}"), |b| {
            b.iter(|| a.compute_shared_secret(&peer).unwrap())
        });
    }

    let params = DhParams::from_group(DhParamId::Ffdhe2048);
    let a = DhKeyPair::generate(&params, &mut rng).unwrap();
    let peer = DhKeyPair::generate(&params, &mut rng).unwrap().public_key_bytes().unwrap();
    group.bench_function("ffdhe2048", |b| b.iter(|| a.compute_shared_secret(&peer).unwrap()));
    group.finish();
}

fn bench_signatures(c: &mut Criterion) {
    use mantis_crypto::ecdsa::EcdsaKeyPair;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rsa::RsaPrivateKey;

    let mut rng = OsRandom;
    let mut group = c.benchmark_group("signature");
    group.sample_size(20);
    let digest = [0x5Au8; 32];

    let ed = Ed25519KeyPair::generate(&mut rng).unwrap();
    let sig = ed.sign(b"benchmark message").unwrap();
    group.bench_function("ed25519/sign", |b| b.iter(|| ed.sign(b"benchmark message").unwrap()));
    group.bench_function("ed25519/verify", |b| {
        b.iter(|| ed.verify(b"benchmark message", &sig).unwrap())
    });

    let ec = EcdsaKeyPair::generate(EccCurveId::NistP256, &mut rng).unwrap();
    let sig = ec.sign(&digest, &mut rng).unwrap();
    group.bench_function("ecdsa-p256/sign", |b| {
        b.iter(|| ec.sign(&digest, &mut OsRandom).unwrap())
    });
    group.bench_function("ecdsa-p256/verify", |b| b.iter(|| ec.verify(&digest, &sig).unwrap()));

    let rsa = RsaPrivateKey::generate(2048, &mut rng).unwrap();
    let sig = rsa.sign_pkcs1(HashAlgId::Sha256, &digest).unwrap();
    group.bench_function("rsa-2048/sign", |b| {
        b.iter(|| rsa.sign_pkcs1(HashAlgId::Sha256, &digest).unwrap())
    });
    group.bench_function("rsa-2048/verify", |b| {
        b.iter(|| rsa.public_key().verify_pkcs1(HashAlgId::Sha256, &digest, &sig).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_hash, bench_aead, bench_key_exchange, bench_signatures);
criterion_main!(benches);
