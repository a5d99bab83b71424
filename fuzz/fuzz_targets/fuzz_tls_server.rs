#![no_main]
//! Feed arbitrary client bytes to a server connection.

use libfuzzer_sys::fuzz_target;
use mantis_crypto::ed25519::Ed25519KeyPair;
use mantis_crypto::rand::OsRandom;
use mantis_pki::x509::{CertificateBuilder, DistinguishedName, SigningKey};
use mantis_tls::{Connection, Context, PrivateKey, TlsRole};
use std::io;
use std::sync::{Arc, OnceLock};

fn context() -> Arc<Context> {
    static CTX: OnceLock<Arc<Context>> = OnceLock::new();
    CTX.get_or_init(|| {
        let signer = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[7; 32]).unwrap());
        let cert = CertificateBuilder::self_signed(DistinguishedName::new().with("CN", "fuzz"), &signer, 0, 4_000_000_000)
            .unwrap()
            .build(&signer, &mut OsRandom)
            .unwrap()
            .raw;
        let key = PrivateKey::Ed25519(Ed25519KeyPair::from_seed(&[7; 32]).unwrap());
        Arc::new(Context::builder().identity(vec![cert], key).build().unwrap())
    })
    .clone()
}

fuzz_target!(|data: &[u8]| {
    let mut input = data.to_vec();
    let mut conn = Connection::new(context(), TlsRole::Server).unwrap();
    conn.set_transport(
        move |buf: &mut [u8]| {
            if input.is_empty() {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            let n = buf.len().min(input.len());
            buf[..n].copy_from_slice(&input[..n]);
            input.drain(..n);
            Ok(n)
        },
        |out: &[u8]| Ok(out.len()),
    );
    let _ = conn.handshake();
});
