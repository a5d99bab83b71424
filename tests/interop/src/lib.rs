//! Integration tests for the mantis workspace.
//! Cross-crate handshakes over TCP loopback, certificate chains and known-answer vectors.

#[cfg(test)]
mod tests {
    use mantis_crypto::ecdsa::EcdsaKeyPair;
    use mantis_crypto::ed25519::Ed25519KeyPair;
    use mantis_crypto::rand::OsRandom;
    use mantis_crypto::rsa::RsaPrivateKey;
    use mantis_pki::x509::{Certificate, CertificateBuilder, DistinguishedName, SigningKey};
    use mantis_tls::handshake::verify::PeerVerification;
    use mantis_tls::{
        CipherSuite, Connection, Context, PrivateKey, Session, SessionCache, TlsError, TlsRole, TlsVersion,
        VerifyClient,
    };
    use mantis_types::{EccCurveId, HashAlgId};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Mutex, OnceLock};
    use std::thread::{self, JoinHandle};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn now() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
    }

    fn self_signed(key: &SigningKey, cn: &str) -> Vec<u8> {
        CertificateBuilder::self_signed(DistinguishedName::new().with("CN", cn), key, now() - 3600, now() + 86400)
            .unwrap()
            .build(key, &mut OsRandom)
            .unwrap()
            .raw
    }

    fn ed25519_identity(seed: u8) -> (Vec<u8>, PrivateKey) {
        let signer = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap());
        let cert = self_signed(&signer, "localhost");
        (cert, PrivateKey::Ed25519(Ed25519KeyPair::from_seed(&[seed; 32]).unwrap()))
    }

    fn ecdsa_identity(curve: EccCurveId) -> (Vec<u8>, PrivateKey) {
        let kp = EcdsaKeyPair::generate(curve, &mut OsRandom).unwrap();
        let private = kp.private_key_bytes().unwrap();
        let cert = self_signed(&SigningKey::Ecdsa(kp), "localhost");
        (cert, PrivateKey::Ecdsa(EcdsaKeyPair::from_private_key(curve, &private).unwrap()))
    }

    fn rsa_identity() -> (Vec<u8>, PrivateKey) {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        let key = KEY.get_or_init(|| RsaPrivateKey::generate(1024, &mut OsRandom).unwrap());
        let cert = self_signed(&SigningKey::Rsa(key.clone()), "localhost");
        (cert, PrivateKey::Rsa(key.clone()))
    }

    fn server_ctx(cert: Vec<u8>, key: PrivateKey) -> Context {
        Context::builder().identity(vec![cert], key).build().unwrap()
    }

    fn client_ctx(root: Vec<u8>) -> Context {
        Context::builder()
            .trusted_root(root)
            .server_name("localhost")
            .build()
            .unwrap()
    }

    fn tcp(stream: &TcpStream) {
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.set_write_timeout(Some(Duration::from_secs(10))).unwrap();
    }

    #[derive(Debug)]
    struct Served {
        version: Option<TlsVersion>,
        resumed: bool,
        echoed: usize,
    }

    /// Echo server for `count` sequential connections on a loopback port.
    fn echo_server(ctx: Context, count: usize) -> (SocketAddr, JoinHandle<Vec<Result<Served, TlsError>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let ctx = Arc::new(ctx);
        let handle = thread::spawn(move || {
            (0..count)
                .map(|_| -> Result<Served, TlsError> {
                    let (stream, _) = listener.accept().unwrap();
                    tcp(&stream);
                    let mut conn = Connection::new(ctx.clone(), TlsRole::Server)?;
                    conn.set_stream(stream);
                    conn.handshake()?;
                    let mut buf = vec![0u8; 16384];
                    let mut echoed = 0;
                    loop {
                        let n = conn.recv(&mut buf)?;
                        if n == 0 {
                            break;
                        }
                        conn.send(&buf[..n])?;
                        echoed += n;
                    }
                    conn.shutdown()?;
                    Ok(Served {
                        version: conn.version(),
                        resumed: conn.is_resumed(),
                        echoed,
                    })
                })
                .collect()
        });
        (addr, handle)
    }

    fn connect(addr: SocketAddr, ctx: &Arc<Context>, session: Option<Session>) -> Result<Connection, TlsError> {
        let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(5)).unwrap();
        tcp(&stream);
        let mut conn = Connection::new(ctx.clone(), TlsRole::Client)?;
        if let Some(s) = session {
            conn.set_session(s)?;
        }
        conn.set_stream(stream);
        conn.handshake()?;
        Ok(conn)
    }

    fn echo(conn: &mut Connection, msg: &[u8]) -> Vec<u8> {
        conn.send(msg).unwrap();
        let mut reply = Vec::new();
        let mut buf = vec![0u8; 16384];
        while reply.len() < msg.len() {
            let n = conn.recv(&mut buf).unwrap();
            assert_ne!(n, 0, "server closed early");
            reply.extend_from_slice(&buf[..n]);
        }
        reply
    }

    // -------------------------------------------------------
    // 1. HMAC-SHA256 and HKDF known answers through the public API
    // -------------------------------------------------------
    #[test]
    fn test_hmac_sha256_rfc4231_case1() {
        let mac = mantis_crypto::hmac::Hmac::mac(HashAlgId::Sha256, &[0x0b; 20], b"Hi There").unwrap();
        assert_eq!(mac, hex("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"));
    }

    #[test]
    fn test_hkdf_sha256_rfc5869_case1() {
        let prk = mantis_crypto::hkdf::extract(
            HashAlgId::Sha256,
            &hex("000102030405060708090a0b0c"),
            &[0x0b; 22],
        )
        .unwrap();
        assert_eq!(prk, hex("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5"));
        let okm = mantis_crypto::hkdf::expand(HashAlgId::Sha256, &prk, &hex("f0f1f2f3f4f5f6f7f8f9"), 42).unwrap();
        assert_eq!(
            okm,
            hex("3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865")
        );
    }

    // -------------------------------------------------------
    // 2. CA -> leaf chain built with mantis-pki, trusted by mantis-tls
    // -------------------------------------------------------
    #[test]
    fn test_ca_signed_leaf_handshake() {
        let ca_key = SigningKey::Ecdsa(EcdsaKeyPair::generate(EccCurveId::NistP256, &mut OsRandom).unwrap());
        let ca_name = DistinguishedName::new().with("CN", "Mantis Test CA");
        let ca = CertificateBuilder::self_signed(ca_name.clone(), &ca_key, now() - 3600, now() + 86400)
            .unwrap()
            .build(&ca_key, &mut OsRandom)
            .unwrap();

        let leaf_signer = SigningKey::Ed25519(Ed25519KeyPair::from_seed(&[9; 32]).unwrap());
        let leaf = CertificateBuilder::new()
            .serial_number(&[0x02])
            .issuer(ca_name)
            .subject(DistinguishedName::new().with("CN", "localhost"))
            .validity(now() - 3600, now() + 86400)
            .subject_public_key(leaf_signer.public_key_info().unwrap())
            .build(&ca_key, &mut OsRandom)
            .unwrap();
        assert!(leaf.verify_signature(&ca).unwrap());
        assert!(!leaf.is_self_signed());

        let server = Context::builder()
            .identity(
                vec![leaf.raw.clone(), ca.raw.clone()],
                PrivateKey::Ed25519(Ed25519KeyPair::from_seed(&[9; 32]).unwrap()),
            )
            .build()
            .unwrap();
        let (addr, handle) = echo_server(server, 1);
        let client = Arc::new(client_ctx(ca.raw.clone()));
        let mut conn = connect(addr, &client, None).unwrap();
        assert_eq!(conn.peer_verification(), &PeerVerification::Verified);
        assert_eq!(conn.peer_certificates().len(), 2);
        let parsed = Certificate::from_der(&conn.peer_certificates()[0]).unwrap();
        assert_eq!(parsed.subject.get("CN"), Some("localhost"));
        assert_eq!(echo(&mut conn, b"chain"), b"chain");
        conn.shutdown().unwrap();
        assert_eq!(handle.join().unwrap()[0].as_ref().unwrap().echoed, 5);
    }

    // -------------------------------------------------------
    // 3. TCP loopback: TLS 1.3 Ed25519
    // -------------------------------------------------------
    #[test]
    fn test_tcp_tls13_loopback_ed25519() {
        let (cert, key) = ed25519_identity(1);
        let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
        let client = Arc::new(client_ctx(cert));

        let mut conn = connect(addr, &client, None).unwrap();
        assert_eq!(conn.version(), Some(TlsVersion::Tls13));
        assert_eq!(echo(&mut conn, b"Hello from client!"), b"Hello from client!");
        conn.shutdown().unwrap();
        assert_eq!(conn.send(b"late"), Err(TlsError::NotReady));

        let served = handle.join().unwrap();
        let s = served[0].as_ref().unwrap();
        assert_eq!(s.version, Some(TlsVersion::Tls13));
        assert_eq!(s.echoed, 18);
    }

    // -------------------------------------------------------
    // 4. TCP loopback: TLS 1.2 ECDSA P-256 and P-384
    // -------------------------------------------------------
    #[test]
    fn test_tcp_tls12_loopback_ecdsa() {
        for curve in [EccCurveId::NistP256, EccCurveId::NistP384] {
            let (cert, key) = ecdsa_identity(curve);
            let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
            let client = Arc::new(
                Context::builder()
                    .max_version(TlsVersion::Tls12)
                    .trusted_root(cert)
                    .build()
                    .unwrap(),
            );
            let mut conn = connect(addr, &client, None).unwrap();
            assert_eq!(conn.version(), Some(TlsVersion::Tls12), "{curve:?}");
            assert_eq!(echo(&mut conn, b"ecdsa over tls12"), b"ecdsa over tls12");
            conn.shutdown().unwrap();
            handle.join().unwrap()[0].as_ref().unwrap();
        }
    }

    // -------------------------------------------------------
    // 5. TCP loopback: TLS 1.2 RSA key transport, DHE and CBC suites
    // -------------------------------------------------------
    #[test]
    fn test_tcp_tls12_loopback_rsa_suites() {
        for suite in [
            CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,
            CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
        ] {
            let (cert, key) = rsa_identity();
            let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
            let client = Arc::new(
                Context::builder()
                    .cipher_suites(&[suite])
                    .max_version(TlsVersion::Tls12)
                    .trusted_root(cert)
                    .build()
                    .unwrap(),
            );
            let mut conn = connect(addr, &client, None).unwrap();
            assert_eq!(conn.cipher_suite(), Some(suite));
            assert_eq!(echo(&mut conn, b"rsa payload"), b"rsa payload");
            conn.shutdown().unwrap();
            handle.join().unwrap()[0].as_ref().unwrap();
        }
    }

    // -------------------------------------------------------
    // 6. TCP loopback: TLS 1.3 large payload across many records
    // -------------------------------------------------------
    #[test]
    fn test_tcp_tls13_large_payload() {
        let (cert, key) = ecdsa_identity(EccCurveId::NistP256);
        let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
        let client = Arc::new(client_ctx(cert));
        let mut conn = connect(addr, &client, None).unwrap();

        let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        assert_eq!(echo(&mut conn, &payload), payload);
        conn.shutdown().unwrap();
        assert_eq!(handle.join().unwrap()[0].as_ref().unwrap().echoed, payload.len());
    }

    // -------------------------------------------------------
    // 7. TCP loopback: multi-message echo with a KeyUpdate in the middle
    // -------------------------------------------------------
    #[test]
    fn test_tcp_tls13_key_update_multi_message() {
        let (cert, key) = ed25519_identity(2);
        let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
        let client = Arc::new(client_ctx(cert));
        let mut conn = connect(addr, &client, None).unwrap();

        for i in 0..6 {
            let msg = format!("message number {i}");
            if i == 3 {
                conn.key_update(true).unwrap();
            }
            assert_eq!(echo(&mut conn, msg.as_bytes()), msg.as_bytes());
        }
        conn.shutdown().unwrap();
        handle.join().unwrap()[0].as_ref().unwrap();
    }

    // -------------------------------------------------------
    // 8. TCP loopback: session resumption for both versions
    // -------------------------------------------------------
    #[test]
    fn test_tcp_session_resumption() {
        for version in [TlsVersion::Tls12, TlsVersion::Tls13] {
            let (cert, key) = ed25519_identity(3);
            let server = Context::builder()
                .identity(vec![cert.clone()], key)
                .session_cache(Arc::new(SessionCache::new(16, 300)))
                .build()
                .unwrap();
            let (addr, handle) = echo_server(server, 2);
            let client = Arc::new(
                Context::builder()
                    .max_version(version)
                    .trusted_root(cert)
                    .build()
                    .unwrap(),
            );

            let mut first = connect(addr, &client, None).unwrap();
            assert_eq!(echo(&mut first, b"first"), b"first");
            let session = first.session().expect("session to resume");
            assert_eq!(session.version, version);
            first.shutdown().unwrap();

            let mut second = connect(addr, &client, Some(session)).unwrap();
            assert!(second.is_resumed(), "{version}");
            assert_eq!(echo(&mut second, b"second"), b"second");
            second.shutdown().unwrap();

            let served = handle.join().unwrap();
            assert!(!served[0].as_ref().unwrap().resumed);
            assert!(served[1].as_ref().unwrap().resumed);
        }
    }

    // -------------------------------------------------------
    // 9. TCP loopback: mutual authentication, TLS 1.2 and 1.3
    // -------------------------------------------------------
    #[test]
    fn test_tcp_mutual_auth() {
        for version in [TlsVersion::Tls12, TlsVersion::Tls13] {
            let (server_cert, server_key) = ecdsa_identity(EccCurveId::NistP256);
            let (client_cert, client_key) = ed25519_identity(4);
            let server = Context::builder()
                .identity(vec![server_cert.clone()], server_key)
                .verify_client(VerifyClient::Require)
                .trusted_root(client_cert.clone())
                .build()
                .unwrap();
            let (addr, handle) = echo_server(server, 1);
            let client = Arc::new(
                Context::builder()
                    .max_version(version)
                    .trusted_root(server_cert)
                    .identity(vec![client_cert], client_key)
                    .build()
                    .unwrap(),
            );
            let mut conn = connect(addr, &client, None).unwrap();
            assert_eq!(echo(&mut conn, b"mtls"), b"mtls");
            conn.shutdown().unwrap();
            handle.join().unwrap()[0].as_ref().unwrap();
        }
    }

    #[test]
    fn test_tcp_mutual_auth_required_without_cert() {
        let (server_cert, server_key) = ed25519_identity(5);
        let server = Context::builder()
            .identity(vec![server_cert.clone()], server_key)
            .verify_client(VerifyClient::Require)
            .build()
            .unwrap();
        let (addr, handle) = echo_server(server, 1);
        let client = Arc::new(
            Context::builder()
                .max_version(TlsVersion::Tls12)
                .trusted_root(server_cert)
                .build()
                .unwrap(),
        );
        let err = connect(addr, &client, None).unwrap_err();
        assert!(matches!(err, TlsError::AlertReceived(_)), "{err:?}");
        let served = handle.join().unwrap();
        assert!(matches!(served[0], Err(TlsError::HandshakeFailure(_))), "{:?}", served[0]);
    }

    // -------------------------------------------------------
    // 10. TCP loopback: untrusted server certificate
    // -------------------------------------------------------
    #[test]
    fn test_tcp_untrusted_server_certificate() {
        let (cert, key) = ed25519_identity(6);
        let (other_root, _) = ed25519_identity(7);
        let (addr, handle) = echo_server(server_ctx(cert, key), 1);
        let client = Arc::new(client_ctx(other_root));

        let err = connect(addr, &client, None).unwrap_err();
        assert!(matches!(err, TlsError::BadCertificate(_)), "{err:?}");
        let served = handle.join().unwrap();
        assert!(matches!(served[0], Err(TlsError::AlertReceived(42))), "{:?}", served[0]);
    }

    // -------------------------------------------------------
    // 11. Key log callback sees every TLS 1.3 traffic secret
    // -------------------------------------------------------
    #[test]
    fn test_tcp_key_log_lines() {
        let (cert, key) = ed25519_identity(8);
        let (addr, handle) = echo_server(server_ctx(cert.clone(), key), 1);
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();
        let client = Arc::new(
            Context::builder()
                .trusted_root(cert)
                .key_log(Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string())))
                .build()
                .unwrap(),
        );
        let mut conn = connect(addr, &client, None).unwrap();
        echo(&mut conn, b"k");
        conn.shutdown().unwrap();
        handle.join().unwrap()[0].as_ref().unwrap();

        let lines = lines.lock().unwrap();
        for label in [
            "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
            "SERVER_HANDSHAKE_TRAFFIC_SECRET",
            "CLIENT_TRAFFIC_SECRET_0",
            "SERVER_TRAFFIC_SECRET_0",
        ] {
            let line = lines.iter().find(|l| l.starts_with(label)).expect(label);
            let fields: Vec<&str> = line.split(' ').collect();
            assert_eq!(fields.len(), 3);
            assert_eq!(fields[1].len(), 64);
            assert_eq!(fields[2].len(), 64);
        }
    }

    // -------------------------------------------------------
    // 12. Cipher suite choice follows server preference
    // -------------------------------------------------------
    mod suite_order {
        use mantis_tls::crypt::{select_cipher_suite, CipherSuiteParams, CredentialKind};
        use mantis_tls::{CipherSuite, TlsVersion};
        use proptest::prelude::*;
        use proptest::sample::subsequence;

        fn tls13_suites() -> Vec<CipherSuite> {
            CipherSuiteParams::all()
                .iter()
                .filter(|p| p.is_tls13())
                .map(|p| p.suite)
                .collect()
        }

        proptest! {
            #[test]
            fn prop_choice_ignores_client_order(
                offer in subsequence(tls13_suites(), 1..=4).prop_shuffle(),
                server in Just(tls13_suites()).prop_shuffle(),
            ) {
                let chosen = select_cipher_suite(&server, &offer, TlsVersion::Tls13, CredentialKind::Ed25519)
                    .unwrap()
                    .suite;
                let expected = *server.iter().find(|s| offer.contains(s)).unwrap();
                prop_assert_eq!(chosen, expected);

                let reversed: Vec<_> = offer.iter().rev().copied().collect();
                let again = select_cipher_suite(&server, &reversed, TlsVersion::Tls13, CredentialKind::Ed25519)
                    .unwrap()
                    .suite;
                prop_assert_eq!(again, chosen);
            }

            #[test]
            fn prop_tls12_offer_never_picks_tls13(
                offer in subsequence(CipherSuiteParams::all().iter().map(|p| p.suite).collect::<Vec<_>>(), 1..8),
            ) {
                let server: Vec<_> = CipherSuiteParams::all().iter().map(|p| p.suite).collect();
                if let Ok(p) = select_cipher_suite(&server, &offer, TlsVersion::Tls12, CredentialKind::Rsa) {
                    prop_assert_eq!(p.version, TlsVersion::Tls12);
                    prop_assert!(offer.contains(&p.suite));
                }
            }
        }
    }
}
