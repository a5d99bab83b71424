//! TLS 1.2 server flow, entered from the shared ClientHello handling.

use super::client::change_cipher_spec;
use super::codec::{
    decode_certificate12, decode_client_key_exchange, encode_certificate12, encode_finished, wrap_handshake,
    CertificateRequest12, CertificateVerify, ClientHello, ServerHello, ServerKeyExchange, ServerKxParams,
    CERT_TYPE_ECDSA_SIGN, CERT_TYPE_RSA_SIGN,
};
use super::extensions::{
    build_ec_point_formats, build_extended_master_secret, build_renegotiation_info, check_renegotiation_info, find,
    parse_signature_algorithms, parse_supported_groups, Extension, ExtensionType,
};
use super::key_exchange::{decrypt_rsa_premaster, KeyShare};
use super::server::{ServerHandshake, ServerStage};
use super::signing::{select_scheme, sign, verify};
use super::verify::check_peer_chain;
use super::{body, check_verify_data, random32, Action, HandshakeType, DOWNGRADE_TLS12};
use crate::config::{PrivateKey, VerifyClient};
use crate::crypt::key_schedule12::{
    compute_verify_data, derive_extended_master_secret, derive_key_block, derive_master_secret, KeyBlock,
};
use crate::crypt::keylog::log_master_secret;
use crate::crypt::{select_cipher_suite, CipherSuiteParams, KeyExchangeAlg, NamedGroup};
use crate::session::{unix_now, Session};
use crate::{CipherSuite, TlsVersion};
use mantis_types::{SecureRandom, TlsError};
use zeroize::Zeroizing;

impl ServerHandshake {
    pub(super) fn client_hello12(
        &mut self,
        ch: &ClientHello,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        let ctx = self.ctx.clone();
        let key = ctx
            .private_key()
            .ok_or_else(|| TlsError::HandshakeFailure("server has no certificate".into()))?;
        let secure_reneg = ch.cipher_suites.contains(&CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV)
            || match find(&ch.extensions, ExtensionType::RENEGOTIATION_INFO) {
                Some(data) => check_renegotiation_info(data).map(|_| true)?,
                None => false,
            };
        let client_ems = find(&ch.extensions, ExtensionType::EXTENDED_MASTER_SECRET).is_some();
        self.ems = client_ems && ctx.extended_master_secret();
        let client_groups = find(&ch.extensions, ExtensionType::SUPPORTED_GROUPS)
            .map(parse_supported_groups)
            .transpose()?;
        let client_schemes = find(&ch.extensions, ExtensionType::SIGNATURE_ALGORITHMS)
            .map(parse_signature_algorithms)
            .transpose()?;

        self.transcript.update(msg);
        self.server_random = random32(rng)?;
        if ctx.max_version() == TlsVersion::Tls13 {
            self.server_random[24..].copy_from_slice(&DOWNGRADE_TLS12);
        }
        let mut extensions = self.negotiate_extensions(ch)?;
        if secure_reneg {
            extensions.push(build_renegotiation_info());
        }
        if self.ems {
            extensions.push(build_extended_master_secret());
        }

        if let Some(session) = self.find_session12(ch) {
            return self.resume12(ch, session, extensions);
        }

        // ECDHE suites need a curve both sides enable.
        let group = ctx
            .groups()
            .iter()
            .copied()
            .find(|g| g.is_ecdhe() && client_groups.as_ref().map_or(true, |c| c.contains(g)));
        let offer: Vec<CipherSuite> = ch
            .cipher_suites
            .iter()
            .copied()
            .filter(|s| {
                group.is_some()
                    || CipherSuiteParams::from_suite(*s).map_or(true, |p| p.kx != KeyExchangeAlg::Ecdhe)
            })
            .collect();
        let params = select_cipher_suite(ctx.cipher_suites(), &offer, TlsVersion::Tls12, key.kind())?;
        self.params = Some(params);
        self.info.suite = Some(params.suite);
        let scheme = match params.kx {
            KeyExchangeAlg::Rsa => None,
            _ => Some(select_scheme(
                key,
                client_schemes.as_deref(),
                ctx.signature_schemes(),
                TlsVersion::Tls12,
            )?),
        };
        if params.kx == KeyExchangeAlg::Ecdhe {
            extensions.push(build_ec_point_formats());
        }
        self.session_id = match ctx.session_cache() {
            Some(_) => random32(rng)?.to_vec(),
            None => Vec::new(),
        };

        let hello = ServerHello {
            legacy_version: TlsVersion::Tls12.wire(),
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: params.suite,
            extensions,
        };
        let mut actions = Vec::new();
        self.send(&mut actions, hello.encode());
        self.send(&mut actions, encode_certificate12(ctx.certificate_chain()));

        if let Some(scheme) = scheme {
            let (share, kx_params) = match params.kx {
                KeyExchangeAlg::Ecdhe => {
                    let group = group.ok_or_else(|| TlsError::Internal("no ECDHE group".into()))?;
                    let share = KeyShare::generate(group, rng)?;
                    let public = share.public_bytes().to_vec();
                    (share, ServerKxParams::Ecdhe { group, public })
                }
                _ => {
                    let group = dhe_group(client_groups.as_deref());
                    let share = KeyShare::generate(group, rng)?;
                    let (p, g) = share
                        .dh_params()
                        .ok_or_else(|| TlsError::Internal("finite-field share without parameters".into()))?;
                    let public = share.public_bytes().to_vec();
                    (share, ServerKxParams::Dhe { p, g, public })
                }
            };
            let mut signed = Vec::with_capacity(64 + 128);
            signed.extend_from_slice(&self.client_random);
            signed.extend_from_slice(&self.server_random);
            signed.extend_from_slice(&kx_params.encode());
            let signature = sign(key, scheme, &signed, rng)?;
            let ske = ServerKeyExchange {
                params: kx_params,
                scheme,
                signature,
            };
            self.send(&mut actions, ske.encode());
            self.share = Some(share);
        }

        if ctx.verify_client() != VerifyClient::None {
            let req = CertificateRequest12 {
                cert_types: vec![CERT_TYPE_RSA_SIGN, CERT_TYPE_ECDSA_SIGN],
                schemes: ctx.signature_schemes().to_vec(),
            };
            self.send(&mut actions, req.encode());
            self.cert_requested = true;
        }
        self.send(&mut actions, wrap_handshake(HandshakeType::ServerHelloDone, &[]));
        self.stage = if self.cert_requested {
            ServerStage::WaitCertificate12
        } else {
            ServerStage::WaitClientKeyExchange
        };
        Ok(actions)
    }

    /// A cached session the client asked to resume, if it still fits.
    fn find_session12(&self, ch: &ClientHello) -> Option<Session> {
        if ch.session_id.is_empty() {
            return None;
        }
        let session = self.ctx.session_cache()?.lookup(&ch.session_id)?;
        let fits = session.version == TlsVersion::Tls12
            && ch.cipher_suites.contains(&session.cipher_suite)
            && self.ctx.cipher_suites().contains(&session.cipher_suite);
        if !fits {
            return None;
        }
        if session.extended_master_secret != self.ems {
            log::debug!("extended master secret mismatch, falling back to a full handshake");
            return None;
        }
        Some(session)
    }

    /// Abbreviated handshake: ServerHello, ChangeCipherSpec, Finished.
    fn resume12(
        &mut self,
        ch: &ClientHello,
        session: Session,
        extensions: Vec<Extension>,
    ) -> Result<Vec<Action>, TlsError> {
        let params = CipherSuiteParams::from_suite(session.cipher_suite)?;
        self.params = Some(params);
        self.info.suite = Some(params.suite);
        self.info.resumed = true;
        self.info.peer_certificates = session.peer_certificates.clone();
        self.session_id = ch.session_id.clone();
        self.master_secret = Zeroizing::new(session.master_secret.clone());
        log::debug!("resuming TLS 1.2 session with {}", params.name);

        let hello = ServerHello {
            legacy_version: TlsVersion::Tls12.wire(),
            random: self.server_random,
            session_id: self.session_id.clone(),
            cipher_suite: params.suite,
            extensions,
        };
        let mut actions = Vec::new();
        self.send(&mut actions, hello.encode());
        actions.extend(self.change_cipher_and_finish()?);
        self.info.session = Some(session);
        self.stage = ServerStage::WaitChangeCipherSpec;
        Ok(actions)
    }

    pub(super) fn handle_certificate12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let chain = decode_certificate12(body(msg))?;
        let ctx = self.ctx.clone();
        let required = ctx.verify_client() == VerifyClient::Require;
        if chain.is_empty() {
            if required {
                return Err(TlsError::HandshakeFailure("client certificate required".into()));
            }
        } else {
            let (parsed, verification) = check_peer_chain(&ctx, &chain, required)?;
            self.peer_key = Some(parsed[0].public_key.clone());
            self.info.peer_certificates = chain;
            self.info.peer_verification = verification;
        }
        self.transcript.update(msg);
        self.stage = ServerStage::WaitClientKeyExchange;
        Ok(Vec::new())
    }

    pub(super) fn handle_client_key_exchange(
        &mut self,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let exchange = decode_client_key_exchange(params.kx, body(msg))?;
        let ctx = self.ctx.clone();
        let pms = match params.kx {
            KeyExchangeAlg::Rsa => match ctx.private_key() {
                Some(PrivateKey::Rsa(key)) => decrypt_rsa_premaster(key, &exchange, self.client_version, rng)?,
                _ => return Err(TlsError::Internal("static RSA without an RSA key".into())),
            },
            _ => self
                .share
                .take()
                .ok_or_else(|| TlsError::Internal("no server key share".into()))?
                .agree_tls12(&exchange)?,
        };
        self.transcript.update(msg);
        let master = if self.ems {
            derive_extended_master_secret(params.hash, &pms, &self.transcript.hash(params.hash)?)?
        } else {
            derive_master_secret(params.hash, &pms, &self.client_random, &self.server_random)?
        };
        log_master_secret(ctx.key_log(), &self.client_random, &master);
        self.master_secret = master;
        self.stage = if self.peer_key.is_some() {
            ServerStage::WaitCertificateVerify12
        } else {
            ServerStage::WaitChangeCipherSpec
        };
        Ok(Vec::new())
    }

    pub(super) fn handle_certificate_verify12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let cv = CertificateVerify::decode(body(msg))?;
        if !self.ctx.signature_schemes().contains(&cv.scheme) || !cv.scheme.allowed_in(TlsVersion::Tls12) {
            return Err(TlsError::IllegalParameter(format!("signature scheme 0x{:04X}", cv.scheme.0)));
        }
        let key = self
            .peer_key
            .as_ref()
            .ok_or_else(|| TlsError::Internal("no client key".into()))?;
        verify(key, cv.scheme, self.transcript.messages(), &cv.signature)?;
        self.transcript.update(msg);
        self.stage = ServerStage::WaitChangeCipherSpec;
        Ok(Vec::new())
    }

    fn key_block(&self) -> Result<KeyBlock, TlsError> {
        derive_key_block(self.params()?, &self.master_secret, &self.client_random, &self.server_random)
    }

    /// ChangeCipherSpec, switch to the new write keys, server Finished.
    fn change_cipher_and_finish(&mut self) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let KeyBlock { server_write, .. } = self.key_block()?;
        let verify_data = compute_verify_data(
            params.hash,
            &self.master_secret,
            "server finished",
            &self.transcript.hash(params.hash)?,
        )?;
        let mut actions = vec![change_cipher_spec(), Action::WriteKeys(params, server_write)];
        self.send(&mut actions, encode_finished(&verify_data));
        Ok(actions)
    }

    pub(super) fn handle_ccs12(&mut self) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let KeyBlock { client_write, .. } = self.key_block()?;
        self.stage = ServerStage::WaitFinished12;
        Ok(vec![Action::ReadKeys(params, client_write)])
    }

    pub(super) fn handle_finished12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let expected = compute_verify_data(
            params.hash,
            &self.master_secret,
            "client finished",
            &self.transcript.hash(params.hash)?,
        )?;
        check_verify_data(&expected, body(msg))?;
        self.transcript.update(msg);

        let mut actions = Vec::new();
        if !self.info.resumed {
            actions.extend(self.change_cipher_and_finish()?);
            if let Some(cache) = self.ctx.session_cache().filter(|_| !self.session_id.is_empty()) {
                let session = Session {
                    id: self.session_id.clone(),
                    version: TlsVersion::Tls12,
                    cipher_suite: params.suite,
                    master_secret: self.master_secret.to_vec(),
                    extended_master_secret: self.ems,
                    created: unix_now(),
                    lifetime: self.ctx.session_timeout(),
                    alpn: self.info.alpn.clone(),
                    server_name: self.info.server_name.clone(),
                    peer_certificates: self.info.peer_certificates.clone(),
                    ticket_age_add: 0,
                };
                cache.store(session.clone());
                self.info.session = Some(session);
            }
        }
        self.stage = ServerStage::Established;
        log::info!("TLS 1.2 handshake complete: {}, resumed={}", params.name, self.info.resumed);
        actions.push(Action::Complete);
        Ok(actions)
    }
}

/// First finite-field group the client lists, else FFDHE2048.
fn dhe_group(client_groups: Option<&[NamedGroup]>) -> NamedGroup {
    client_groups
        .and_then(|groups| groups.iter().copied().find(|g| g.ffdhe().is_some()))
        .unwrap_or(NamedGroup::FFDHE2048)
}
