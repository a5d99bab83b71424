//! TLS 1.2 client flow, entered from the shared ServerHello handling.
//!
//! ```text
//! full:        ServerHello, Certificate, [ServerKeyExchange], [CertificateRequest],
//!              ServerHelloDone -> [Certificate], ClientKeyExchange, [CertificateVerify],
//!              [ChangeCipherSpec], Finished <- [ChangeCipherSpec], Finished
//! abbreviated: ServerHello, [ChangeCipherSpec], Finished -> [ChangeCipherSpec], Finished
//! ```

use super::client::{change_cipher_spec, CertRequest, ClientHandshake, ClientStage};
use super::codec::{
    decode_certificate12, encode_certificate12, encode_client_key_exchange, encode_finished, CertificateRequest12,
    CertificateVerify, ServerHello, ServerKeyExchange, ServerKxParams, CERT_TYPE_ECDSA_SIGN, CERT_TYPE_RSA_SIGN,
};
use super::extensions::{check_renegotiation_info, find, ExtensionType};
use super::key_exchange::{rsa_premaster, KeyShare};
use super::signing::{select_scheme, sign, verify};
use super::verify::check_peer_chain;
use super::{body, check_verify_data, Action};
use crate::crypt::key_schedule12::{
    compute_verify_data, derive_extended_master_secret, derive_key_block, derive_master_secret, KeyBlock,
};
use crate::crypt::keylog::log_master_secret;
use crate::crypt::{CipherSuiteParams, CredentialKind, KeyExchangeAlg};
use crate::session::{unix_now, Session};
use crate::trust::PeerPublicKey;
use crate::TlsVersion;
use mantis_crypto::rsa::RsaPublicKey;
use mantis_types::{SecureRandom, TlsError};
use zeroize::Zeroizing;

impl ClientHandshake {
    pub(super) fn server_hello12(
        &mut self,
        sh: &ServerHello,
        msg: &[u8],
        params: &'static CipherSuiteParams,
    ) -> Result<Vec<Action>, TlsError> {
        if let Some(data) = find(&sh.extensions, ExtensionType::RENEGOTIATION_INFO) {
            check_renegotiation_info(data)?;
        }
        let ems = find(&sh.extensions, ExtensionType::EXTENDED_MASTER_SECRET).is_some();
        if ems && !self.ctx.extended_master_secret() {
            return Err(TlsError::IllegalParameter("unsolicited extended_master_secret".into()));
        }
        self.ems = ems;
        let actions = self.apply_server_extensions(&sh.extensions)?;
        self.transcript.update(msg);
        self.shares.clear();
        self.psk_schedule = None;

        let resumed = self
            .offered
            .as_ref()
            .filter(|s| s.version == TlsVersion::Tls12 && !sh.session_id.is_empty() && s.id == sh.session_id)
            .cloned();
        match resumed {
            Some(session) => {
                if session.cipher_suite != params.suite {
                    return Err(TlsError::IllegalParameter("resumed session with another cipher suite".into()));
                }
                if session.extended_master_secret != ems {
                    return Err(TlsError::HandshakeFailure("extended master secret changed on resumption".into()));
                }
                log::debug!("server accepted session resumption");
                self.master_secret = Zeroizing::new(session.master_secret.clone());
                self.info.resumed = true;
                self.info.peer_certificates = session.peer_certificates.clone();
                self.stage = ClientStage::WaitChangeCipherSpec;
            }
            None => self.stage = ClientStage::WaitCertificate12,
        }
        self.session_id = sh.session_id.clone();
        Ok(actions)
    }

    pub(super) fn handle_certificate12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let chain = decode_certificate12(body(msg))?;
        let ctx = self.ctx.clone();
        let (parsed, verification) = check_peer_chain(&ctx, &chain, ctx.verify_peer())?;
        let key = parsed[0].public_key.clone();
        if !params.accepts_credential(key.kind()) {
            return Err(TlsError::BadCertificate(format!("certificate key does not fit {}", params.name)));
        }
        self.peer_key = Some(key);
        self.info.peer_certificates = chain;
        self.info.peer_verification = verification;
        self.transcript.update(msg);
        self.stage = match params.kx {
            KeyExchangeAlg::Rsa => ClientStage::WaitServerHelloDone,
            _ => ClientStage::WaitServerKeyExchange,
        };
        Ok(Vec::new())
    }

    pub(super) fn handle_server_key_exchange(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let ske = ServerKeyExchange::decode(params.kx, body(msg))?;
        if !self.ctx.signature_schemes().contains(&ske.scheme) || !ske.scheme.allowed_in(TlsVersion::Tls12) {
            return Err(TlsError::IllegalParameter(format!("signature scheme 0x{:04X}", ske.scheme.0)));
        }
        let mut signed = Vec::with_capacity(64 + 128);
        signed.extend_from_slice(&self.random);
        signed.extend_from_slice(&self.server_random);
        signed.extend_from_slice(&ske.params.encode());
        let key = self
            .peer_key
            .as_ref()
            .ok_or_else(|| TlsError::Internal("no server key".into()))?;
        verify(key, ske.scheme, &signed, &ske.signature)?;
        if let ServerKxParams::Ecdhe { group, .. } = &ske.params {
            if !group.is_ecdhe() || !self.ctx.groups().contains(group) {
                return Err(TlsError::IllegalParameter(format!("server chose group 0x{:04X}", group.0)));
            }
        }
        self.server_kx = Some(ske.params);
        self.transcript.update(msg);
        self.stage = ClientStage::WaitServerHelloDone;
        Ok(Vec::new())
    }

    pub(super) fn handle_certificate_request12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let req = CertificateRequest12::decode(body(msg))?;
        self.cert_request = Some(CertRequest {
            context: Vec::new(),
            schemes: req.schemes,
            cert_types: req.cert_types,
        });
        self.transcript.update(msg);
        Ok(Vec::new())
    }

    pub(super) fn handle_server_hello_done(
        &mut self,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        if !body(msg).is_empty() {
            return Err(TlsError::DecodeError("ServerHelloDone with a body".into()));
        }
        let params = self.params()?;
        let ctx = self.ctx.clone();
        self.transcript.update(msg);
        let mut actions = Vec::new();

        let request = self.cert_request.take();
        let mut signing_key = None;
        if let Some(req) = &request {
            let key = ctx.private_key().filter(|k| {
                let wanted = match k.kind() {
                    CredentialKind::Rsa => CERT_TYPE_RSA_SIGN,
                    CredentialKind::Ecdsa(_) | CredentialKind::Ed25519 => CERT_TYPE_ECDSA_SIGN,
                };
                req.cert_types.contains(&wanted)
            });
            let chain = match key {
                Some(_) => ctx.certificate_chain().to_vec(),
                None => Vec::new(),
            };
            log::debug!("sending client certificate chain of {}", chain.len());
            signing_key = key;
            self.send(&mut actions, encode_certificate12(&chain));
        }

        let (pms, exchange) = match (params.kx, &self.server_kx) {
            (KeyExchangeAlg::Ecdhe, Some(ServerKxParams::Ecdhe { group, public })) => {
                let share = KeyShare::generate(*group, rng)?;
                (share.agree_tls12(public)?, share.public_bytes().to_vec())
            }
            (KeyExchangeAlg::Dhe, Some(ServerKxParams::Dhe { p, g, public })) => {
                let share = KeyShare::generate_dh(p, g, rng)?;
                (share.agree_tls12(public)?, share.public_bytes().to_vec())
            }
            (KeyExchangeAlg::Rsa, None) => match &self.peer_key {
                Some(PeerPublicKey::Rsa { n, e }) => {
                    let key = RsaPublicKey::new(n, e)
                        .map_err(|e| TlsError::BadCertificate(format!("server RSA key: {e}")))?;
                    rsa_premaster(&key, TlsVersion::Tls12.wire(), rng)?
                }
                _ => return Err(TlsError::BadCertificate("static RSA needs an RSA certificate".into())),
            },
            _ => return Err(TlsError::UnexpectedMessage("ServerHelloDone before key exchange parameters".into())),
        };
        self.send(&mut actions, encode_client_key_exchange(params.kx, &exchange));

        let master = if self.ems {
            derive_extended_master_secret(params.hash, &pms, &self.transcript.hash(params.hash)?)?
        } else {
            derive_master_secret(params.hash, &pms, &self.random, &self.server_random)?
        };
        log_master_secret(ctx.key_log(), &self.random, &master);
        self.master_secret = master;

        if let (Some(key), Some(req)) = (signing_key, &request) {
            let scheme = select_scheme(key, Some(&req.schemes), ctx.signature_schemes(), TlsVersion::Tls12)?;
            let signature = sign(key, scheme, self.transcript.messages(), rng)?;
            self.send(&mut actions, CertificateVerify { scheme, signature }.encode());
        }
        actions.extend(self.change_cipher_and_finish()?);
        self.stage = ClientStage::WaitChangeCipherSpec;
        Ok(actions)
    }

    fn key_block(&self) -> Result<KeyBlock, TlsError> {
        derive_key_block(self.params()?, &self.master_secret, &self.random, &self.server_random)
    }

    /// ChangeCipherSpec, switch to the new write keys, client Finished.
    fn change_cipher_and_finish(&mut self) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let KeyBlock { client_write, .. } = self.key_block()?;
        let verify_data = compute_verify_data(
            params.hash,
            &self.master_secret,
            "client finished",
            &self.transcript.hash(params.hash)?,
        )?;
        let mut actions = vec![change_cipher_spec(), Action::WriteKeys(params, client_write)];
        self.send(&mut actions, encode_finished(&verify_data));
        Ok(actions)
    }

    pub(super) fn handle_ccs12(&mut self) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let KeyBlock { server_write, .. } = self.key_block()?;
        self.stage = ClientStage::WaitFinished12;
        Ok(vec![Action::ReadKeys(params, server_write)])
    }

    pub(super) fn handle_finished12(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let expected = compute_verify_data(
            params.hash,
            &self.master_secret,
            "server finished",
            &self.transcript.hash(params.hash)?,
        )?;
        check_verify_data(&expected, body(msg))?;
        self.transcript.update(msg);

        let mut actions = Vec::new();
        if self.info.resumed {
            actions.extend(self.change_cipher_and_finish()?);
        }
        if !self.session_id.is_empty() {
            self.info.session = match self.offered.take().filter(|_| self.info.resumed) {
                Some(session) => Some(session),
                None => Some(Session {
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
                }),
            };
        }
        self.stage = ClientStage::Established;
        log::info!("TLS 1.2 handshake complete: {}, resumed={}", params.name, self.info.resumed);
        actions.push(Action::Complete);
        Ok(actions)
    }
}
