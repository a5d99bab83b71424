//! Client handshake state machine.
//!
//! One ClientHello covers every enabled version. The ServerHello picks
//! the path: TLS 1.3 continues here, TLS 1.2 in `client12`.
//!
//! ```text
//! TLS 1.3: ClientHello -> ServerHello -> {EncryptedExtensions}
//!          -> [{CertificateRequest}] -> {Certificate} -> {CertificateVerify}
//!          -> {Finished} -> client [{Certificate} {CertificateVerify}] {Finished}
//! ```

use super::codec::{
    encode_finished, Certificate13, CertificateRequest13, CertificateVerify, ClientHello, NewSessionTicket,
    ServerHello,
};
use super::extensions::{
    build_alpn, build_ec_point_formats, build_extended_master_secret, build_key_share_ch, build_max_fragment_length,
    build_pre_shared_key_ch, build_psk_key_exchange_modes, build_renegotiation_info, build_server_name,
    build_signature_algorithms, build_supported_groups, build_supported_versions_ch, find, max_fragment_code,
    max_fragment_from_code, parse_alpn, parse_key_share_sh, parse_max_fragment_length, parse_pre_shared_key_sh,
    parse_signature_algorithms, parse_supported_versions_sh, Extension, ExtensionType, KeyShareEntry, OfferedPsks,
    PskIdentity,
};
use super::key_exchange::KeyShare;
use super::signing::{certificate_verify_content, select_scheme, sign, verify};
use super::verify::check_peer_chain;
use super::{
    body, check_verify_data, no_renegotiation, psk_binder, random32, send_message, unexpected, Action, AppSecrets,
    HandshakeState, HandshakeType, Negotiated, DOWNGRADE_TLS12, MAX_TICKET_LIFETIME,
};
use crate::config::Context;
use crate::crypt::key_schedule::{
    compute_finished_verify_data, derive_finished_key, derive_resumption_psk, KeySchedule,
};
use crate::crypt::keylog::{self, log_key};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::transcript::Transcript;
use crate::crypt::{CipherSuiteParams, SignatureScheme};
use crate::record::ContentType;
use crate::session::{unix_now, Session};
use crate::trust::PeerPublicKey;
use crate::{CipherSuite, TlsVersion};
use mantis_types::{SecureRandom, TlsError};
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ClientStage {
    Start,
    WaitServerHello,
    WaitEncryptedExtensions,
    WaitCertificateOrRequest,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,
    WaitCertificate12,
    WaitServerKeyExchange,
    WaitServerHelloDone,
    WaitChangeCipherSpec,
    WaitFinished12,
    Established,
    Closed,
}

/// A server's request for a client certificate.
pub(super) struct CertRequest {
    pub(super) context: Vec<u8>,
    pub(super) schemes: Vec<SignatureScheme>,
    /// TLS 1.2 certificate types; empty for TLS 1.3.
    pub(super) cert_types: Vec<u8>,
}

pub struct ClientHandshake {
    pub(super) ctx: Arc<Context>,
    pub(super) stage: ClientStage,
    pub(super) info: Negotiated,
    pub(super) transcript: Transcript,
    pub(super) random: [u8; 32],
    pub(super) server_random: [u8; 32],
    pub(super) session_id: Vec<u8>,
    /// Session offered for resumption.
    pub(super) offered: Option<Session>,
    /// Early secret of the offered TLS 1.3 PSK.
    pub(super) psk_schedule: Option<KeySchedule>,
    pub(super) shares: Vec<KeyShare>,
    pub(super) params: Option<&'static CipherSuiteParams>,
    pub(super) schedule: Option<KeySchedule>,
    pub(super) client_hs_secret: Zeroizing<Vec<u8>>,
    pub(super) server_hs_secret: Zeroizing<Vec<u8>>,
    pub(super) resumption_secret: Zeroizing<Vec<u8>>,
    pub(super) app: Option<AppSecrets>,
    pub(super) cert_request: Option<CertRequest>,
    pub(super) peer_key: Option<PeerPublicKey>,
    pub(super) ems: bool,
    pub(super) master_secret: Zeroizing<Vec<u8>>,
    pub(super) server_kx: Option<super::codec::ServerKxParams>,
}

impl ClientHandshake {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            stage: ClientStage::Start,
            info: Negotiated::default(),
            transcript: Transcript::new(),
            random: [0; 32],
            server_random: [0; 32],
            session_id: Vec::new(),
            offered: None,
            psk_schedule: None,
            shares: Vec::new(),
            params: None,
            schedule: None,
            client_hs_secret: Zeroizing::new(Vec::new()),
            server_hs_secret: Zeroizing::new(Vec::new()),
            resumption_secret: Zeroizing::new(Vec::new()),
            app: None,
            cert_request: None,
            peer_key: None,
            ems: false,
            master_secret: Zeroizing::new(Vec::new()),
            server_kx: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        use ClientStage as S;
        match self.stage {
            S::Start => HandshakeState::Start,
            S::WaitServerHello => HandshakeState::NegotiateVersionCipher,
            S::WaitEncryptedExtensions
            | S::WaitCertificateOrRequest
            | S::WaitCertificate
            | S::WaitCertificate12
            | S::WaitServerKeyExchange
            | S::WaitServerHelloDone => HandshakeState::KeyExchange,
            S::WaitCertificateVerify => HandshakeState::CertificateVerify,
            S::WaitFinished | S::WaitChangeCipherSpec | S::WaitFinished12 => HandshakeState::WaitFinished,
            S::Established => HandshakeState::Established,
            S::Closed => HandshakeState::Closed,
        }
    }

    pub(super) fn set_session(&mut self, session: Session) -> Result<(), TlsError> {
        if self.stage != ClientStage::Start {
            return Err(TlsError::InvalidArgument("session must be set before the handshake".into()));
        }
        self.offered = Some(session);
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.stage = ClientStage::Closed;
        self.app = None;
        self.schedule = None;
        self.psk_schedule = None;
    }

    pub(super) fn app_secrets(&mut self) -> Option<&mut AppSecrets> {
        match self.stage {
            ClientStage::Established => self.app.as_mut(),
            _ => None,
        }
    }

    pub(super) fn params(&self) -> Result<&'static CipherSuiteParams, TlsError> {
        self.params
            .ok_or_else(|| TlsError::Internal("cipher suite not negotiated".into()))
    }

    pub(super) fn send(&mut self, actions: &mut Vec<Action>, msg: Vec<u8>) {
        send_message(&mut self.transcript, actions, msg);
    }

    pub(super) fn start(&mut self, rng: &mut dyn SecureRandom) -> Result<Vec<Action>, TlsError> {
        if self.stage != ClientStage::Start {
            return Err(TlsError::InvalidArgument("handshake already started".into()));
        }
        let ctx = self.ctx.clone();
        let offer13 = ctx.supports_version(TlsVersion::Tls13);
        let offer12 = ctx.supports_version(TlsVersion::Tls12);
        self.random = random32(rng)?;

        let usable = |s: &Session| {
            !s.is_expired() && ctx.supports_version(s.version) && ctx.cipher_suites().contains(&s.cipher_suite)
        };
        if self.offered.as_ref().is_some_and(|s| !usable(s)) {
            log::debug!("cached session not usable, full handshake");
            self.offered = None;
        }
        self.session_id = match &self.offered {
            Some(s) if s.version == TlsVersion::Tls12 => s.id.clone(),
            // non-empty legacy session id for middlebox compatibility
            _ if offer13 => random32(rng)?.to_vec(),
            _ => Vec::new(),
        };

        let suites: Vec<CipherSuite> = ctx
            .cipher_suites()
            .iter()
            .copied()
            .filter(|s| CipherSuiteParams::from_suite(*s).is_ok_and(|p| ctx.supports_version(p.version)))
            .collect();

        let mut extensions = Vec::new();
        if let Some(name) = ctx.server_name() {
            extensions.push(build_server_name(name));
            self.info.server_name = Some(name.to_string());
        }
        extensions.push(build_supported_groups(ctx.groups()));
        extensions.push(build_signature_algorithms(ctx.signature_schemes()));
        if offer12 {
            extensions.push(build_ec_point_formats());
            extensions.push(build_renegotiation_info());
            if ctx.extended_master_secret() {
                extensions.push(build_extended_master_secret());
            }
        }
        if !ctx.alpn_protocols().is_empty() {
            extensions.push(build_alpn(ctx.alpn_protocols()));
        }
        if let Some(code) = ctx.max_fragment_length().and_then(max_fragment_code) {
            extensions.push(build_max_fragment_length(code));
        }
        if offer13 {
            let versions: Vec<u16> = [TlsVersion::Tls13, TlsVersion::Tls12]
                .into_iter()
                .filter(|v| ctx.supports_version(*v))
                .map(TlsVersion::wire)
                .collect();
            extensions.push(build_supported_versions_ch(&versions));
            let mut entries = Vec::with_capacity(ctx.groups().len());
            for group in ctx.groups() {
                let share = KeyShare::generate(*group, rng)?;
                entries.push(KeyShareEntry {
                    group: *group,
                    key_exchange: share.public_bytes().to_vec(),
                });
                self.shares.push(share);
            }
            extensions.push(build_key_share_ch(&entries));
            extensions.push(build_psk_key_exchange_modes());
        }

        let psk = match &self.offered {
            Some(s) if offer13 && s.version == TlsVersion::Tls13 => Some(s.clone()),
            _ => None,
        };
        let mut binder_len = 0;
        if let Some(s) = &psk {
            let hash_len = CipherSuiteParams::from_suite(s.cipher_suite)?.hash.output_size();
            let age_ms = unix_now().saturating_sub(s.created).saturating_mul(1000) as u32;
            let offer = OfferedPsks {
                identities: vec![PskIdentity {
                    identity: s.id.clone(),
                    obfuscated_ticket_age: age_ms.wrapping_add(s.ticket_age_add),
                }],
                binders: vec![vec![0; hash_len]],
            };
            binder_len = hash_len;
            // pre_shared_key goes last
            extensions.push(build_pre_shared_key_ch(&offer));
        }

        let hello = ClientHello {
            legacy_version: TlsVersion::Tls12.wire(),
            random: self.random,
            session_id: self.session_id.clone(),
            cipher_suites: suites,
            extensions,
        };
        let mut msg = hello.encode();
        if let Some(s) = &psk {
            let params = CipherSuiteParams::from_suite(s.cipher_suite)?;
            let mut early = KeySchedule::new(params.hash);
            early.derive_early_secret(Some(&s.master_secret))?;
            // the binders list is u16 length, u8 length, binder
            let cut = msg.len() - (3 + binder_len);
            let binder = psk_binder(&early, &msg[..cut])?;
            let at = msg.len() - binder_len;
            msg[at..].copy_from_slice(&binder);
            self.psk_schedule = Some(early);
        }
        log::debug!(
            "client hello: versions {:?}..={:?}, resumption={}",
            ctx.min_version(),
            ctx.max_version(),
            self.offered.is_some()
        );

        let mut actions = Vec::new();
        self.send(&mut actions, msg);
        self.stage = ClientStage::WaitServerHello;
        Ok(actions)
    }

    pub(super) fn handle_message(
        &mut self,
        msg_type: HandshakeType,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        use ClientStage as S;
        use HandshakeType as T;
        let tls13 = self.info.version == Some(TlsVersion::Tls13);
        let tls12 = self.info.version == Some(TlsVersion::Tls12);
        match (self.stage, msg_type) {
            (S::WaitServerHello, T::ServerHello) => self.handle_server_hello(msg),
            (S::WaitEncryptedExtensions, T::EncryptedExtensions) => self.handle_encrypted_extensions(msg),
            (S::WaitCertificateOrRequest, T::CertificateRequest) => self.handle_certificate_request13(msg),
            (S::WaitCertificateOrRequest | S::WaitCertificate, T::Certificate) => self.handle_certificate13(msg),
            (S::WaitCertificateVerify, T::CertificateVerify) => self.handle_certificate_verify13(msg),
            (S::WaitFinished, T::Finished) => self.handle_finished13(msg, rng),
            (S::Established, T::NewSessionTicket) if tls13 => self.handle_new_session_ticket(msg),
            (S::Established, T::KeyUpdate) if tls13 => match self.app.as_mut() {
                Some(app) => app.on_key_update(body(msg)),
                None => Err(TlsError::Internal("missing application secrets".into())),
            },

            (S::WaitCertificate12, T::Certificate) => self.handle_certificate12(msg),
            (S::WaitServerKeyExchange, T::ServerKeyExchange) => self.handle_server_key_exchange(msg),
            (S::WaitServerHelloDone, T::CertificateRequest) if self.cert_request.is_none() => {
                self.handle_certificate_request12(msg)
            }
            (S::WaitServerHelloDone, T::ServerHelloDone) => self.handle_server_hello_done(msg, rng),
            (S::WaitFinished12, T::Finished) => self.handle_finished12(msg),
            (S::Established, T::HelloRequest) if tls12 => Ok(vec![no_renegotiation()]),
            // HelloRequest is ignored while a TLS 1.2 handshake runs
            (stage, T::HelloRequest) if tls12 && stage != S::Closed => Ok(Vec::new()),
            (stage, t) => Err(unexpected(t, stage)),
        }
    }

    pub(super) fn handle_ccs(&mut self) -> Result<Vec<Action>, TlsError> {
        match self.stage {
            ClientStage::WaitChangeCipherSpec => self.handle_ccs12(),
            // middlebox compatibility records are dropped during a TLS 1.3 handshake
            stage
                if self.info.version == Some(TlsVersion::Tls13)
                    && stage != ClientStage::Established
                    && stage != ClientStage::Closed =>
            {
                Ok(Vec::new())
            }
            stage => Err(TlsError::UnexpectedMessage(format!("ChangeCipherSpec in {stage:?}"))),
        }
    }

    fn handle_server_hello(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let sh = ServerHello::decode(body(msg))?;
        let ctx = self.ctx.clone();
        let version = match find(&sh.extensions, ExtensionType::SUPPORTED_VERSIONS) {
            Some(data) => {
                let v = parse_supported_versions_sh(data)?;
                if v != TlsVersion::Tls13.wire() || !ctx.supports_version(TlsVersion::Tls13) {
                    return Err(TlsError::IllegalParameter(format!("server selected version 0x{v:04X}")));
                }
                TlsVersion::Tls13
            }
            None => {
                if sh.legacy_version != TlsVersion::Tls12.wire() || !ctx.supports_version(TlsVersion::Tls12) {
                    return Err(TlsError::ProtocolVersion);
                }
                if ctx.supports_version(TlsVersion::Tls13) && sh.random[24..] == DOWNGRADE_TLS12 {
                    return Err(TlsError::IllegalParameter("downgrade to TLS 1.2 detected".into()));
                }
                TlsVersion::Tls12
            }
        };
        let params = CipherSuiteParams::from_suite(sh.cipher_suite)
            .map_err(|_| TlsError::IllegalParameter(format!("server chose suite {}", sh.cipher_suite)))?;
        if !ctx.cipher_suites().contains(&sh.cipher_suite) || params.version != version {
            return Err(TlsError::IllegalParameter(format!("server chose suite {}", sh.cipher_suite)));
        }
        log::debug!("server hello: {version}, {}", params.name);

        self.server_random = sh.random;
        self.params = Some(params);
        self.info.version = Some(version);
        self.info.suite = Some(sh.cipher_suite);
        let mut actions = vec![Action::SetVersion(version)];
        match version {
            TlsVersion::Tls13 => actions.extend(self.server_hello13(&sh, msg, params)?),
            TlsVersion::Tls12 => actions.extend(self.server_hello12(&sh, msg, params)?),
        }
        Ok(actions)
    }

    /// ALPN and max_fragment_length answers, common to both versions.
    pub(super) fn apply_server_extensions(&mut self, exts: &[Extension]) -> Result<Vec<Action>, TlsError> {
        let mut actions = Vec::new();
        if let Some(data) = find(exts, ExtensionType::ALPN) {
            let chosen = parse_alpn(data)?;
            match chosen.as_slice() {
                [p] if self.ctx.alpn_protocols().contains(p) => self.info.alpn = Some(p.clone()),
                _ => return Err(TlsError::IllegalParameter("server ALPN choice was not offered".into())),
            }
        }
        if let Some(data) = find(exts, ExtensionType::MAX_FRAGMENT_LENGTH) {
            let code = parse_max_fragment_length(data)?;
            let requested = self.ctx.max_fragment_length().and_then(max_fragment_code);
            if requested != Some(code) {
                return Err(TlsError::IllegalParameter("max_fragment_length differs from the request".into()));
            }
            let len = max_fragment_from_code(code)
                .ok_or_else(|| TlsError::IllegalParameter("max_fragment_length".into()))?;
            self.info.max_fragment = Some(len);
            actions.push(Action::SetMaxFragment(len));
        }
        Ok(actions)
    }

    fn server_hello13(
        &mut self,
        sh: &ServerHello,
        msg: &[u8],
        params: &'static CipherSuiteParams,
    ) -> Result<Vec<Action>, TlsError> {
        if sh.session_id != self.session_id {
            return Err(TlsError::IllegalParameter("session id not echoed".into()));
        }
        let entry = find(&sh.extensions, ExtensionType::KEY_SHARE)
            .ok_or_else(|| TlsError::HandshakeFailure("ServerHello without key_share".into()))
            .and_then(parse_key_share_sh)?;
        let share = self
            .shares
            .iter()
            .find(|s| s.group() == Some(entry.group))
            .ok_or_else(|| TlsError::IllegalParameter(format!("key share for group 0x{:04X}", entry.group.0)))?;
        let shared = share.agree(&entry.key_exchange)?;

        let mut schedule = match find(&sh.extensions, ExtensionType::PRE_SHARED_KEY) {
            Some(data) => {
                let selected = parse_pre_shared_key_sh(data)?;
                let early = self
                    .psk_schedule
                    .take()
                    .filter(|_| selected == 0)
                    .ok_or_else(|| TlsError::IllegalParameter("server selected a PSK that was not offered".into()))?;
                if early.hash_alg() != params.hash {
                    return Err(TlsError::IllegalParameter("PSK hash does not match the cipher suite".into()));
                }
                self.info.resumed = true;
                if let Some(s) = &self.offered {
                    self.info.peer_certificates = s.peer_certificates.clone();
                }
                early
            }
            None => {
                let mut ks = KeySchedule::new(params.hash);
                ks.derive_early_secret(None)?;
                ks
            }
        };
        self.shares.clear();
        self.psk_schedule = None;
        self.transcript.update(msg);

        schedule.derive_handshake_secret(&shared)?;
        let (client_hs, server_hs) = schedule.derive_handshake_traffic_secrets(&self.transcript.hash(params.hash)?)?;
        let key_log = self.ctx.key_log();
        log_key(key_log, keylog::CLIENT_HANDSHAKE_TRAFFIC_SECRET, &self.random, &client_hs);
        log_key(key_log, keylog::SERVER_HANDSHAKE_TRAFFIC_SECRET, &self.random, &server_hs);
        let actions = vec![
            Action::ReadKeys(params, KeyMaterial::from_traffic_secret(params, &server_hs)?),
            Action::WriteKeys(params, KeyMaterial::from_traffic_secret(params, &client_hs)?),
        ];
        self.client_hs_secret = Zeroizing::new(client_hs);
        self.server_hs_secret = Zeroizing::new(server_hs);
        self.schedule = Some(schedule);
        self.stage = ClientStage::WaitEncryptedExtensions;
        Ok(actions)
    }

    fn handle_encrypted_extensions(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let exts = super::codec::decode_encrypted_extensions(body(msg))?;
        let actions = self.apply_server_extensions(&exts)?;
        self.transcript.update(msg);
        self.stage = if self.info.resumed {
            ClientStage::WaitFinished
        } else {
            ClientStage::WaitCertificateOrRequest
        };
        Ok(actions)
    }

    fn handle_certificate_request13(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let req = CertificateRequest13::decode(body(msg))?;
        let schemes = find(&req.extensions, ExtensionType::SIGNATURE_ALGORITHMS)
            .ok_or_else(|| TlsError::DecodeError("CertificateRequest without signature_algorithms".into()))
            .and_then(parse_signature_algorithms)?;
        self.cert_request = Some(CertRequest {
            context: req.context,
            schemes,
            cert_types: Vec::new(),
        });
        self.transcript.update(msg);
        self.stage = ClientStage::WaitCertificate;
        Ok(Vec::new())
    }

    fn handle_certificate13(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let cert = Certificate13::decode(body(msg))?;
        if !cert.context.is_empty() {
            return Err(TlsError::IllegalParameter("server Certificate with request context".into()));
        }
        let ctx = self.ctx.clone();
        let (parsed, verification) = check_peer_chain(&ctx, &cert.chain, ctx.verify_peer())?;
        self.peer_key = Some(parsed[0].public_key.clone());
        self.info.peer_certificates = cert.chain;
        self.info.peer_verification = verification;
        self.transcript.update(msg);
        self.stage = ClientStage::WaitCertificateVerify;
        Ok(Vec::new())
    }

    fn handle_certificate_verify13(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let cv = CertificateVerify::decode(body(msg))?;
        if !self.ctx.signature_schemes().contains(&cv.scheme) || !cv.scheme.allowed_in(TlsVersion::Tls13) {
            return Err(TlsError::IllegalParameter(format!("signature scheme 0x{:04X}", cv.scheme.0)));
        }
        let content = certificate_verify_content(true, &self.transcript.hash(params.hash)?);
        let key = self
            .peer_key
            .as_ref()
            .ok_or_else(|| TlsError::Internal("no server key".into()))?;
        verify(key, cv.scheme, &content, &cv.signature)?;
        self.transcript.update(msg);
        self.stage = ClientStage::WaitFinished;
        Ok(Vec::new())
    }

    fn handle_finished13(&mut self, msg: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let alg = params.hash;
        let finished_key = Zeroizing::new(derive_finished_key(alg, &self.server_hs_secret)?);
        let expected = compute_finished_verify_data(alg, &finished_key, &self.transcript.hash(alg)?)?;
        check_verify_data(&expected, body(msg))?;
        self.transcript.update(msg);

        let mut schedule = self
            .schedule
            .take()
            .ok_or_else(|| TlsError::Internal("key schedule missing".into()))?;
        schedule.derive_master_secret()?;
        let (client_app, server_app) = schedule.derive_app_traffic_secrets(&self.transcript.hash(alg)?)?;
        let key_log = self.ctx.key_log();
        log_key(key_log, keylog::CLIENT_TRAFFIC_SECRET_0, &self.random, &client_app);
        log_key(key_log, keylog::SERVER_TRAFFIC_SECRET_0, &self.random, &server_app);

        let mut actions = Vec::new();
        if let Some(req) = self.cert_request.take() {
            let ctx = self.ctx.clone();
            let chain = match ctx.private_key() {
                Some(_) => ctx.certificate_chain().to_vec(),
                None => Vec::new(),
            };
            log::debug!("sending client certificate chain of {}", chain.len());
            let has_chain = !chain.is_empty();
            self.send(&mut actions, Certificate13 { context: req.context, chain }.encode());
            if let (Some(key), true) = (ctx.private_key(), has_chain) {
                let scheme = select_scheme(key, Some(&req.schemes), ctx.signature_schemes(), TlsVersion::Tls13)?;
                let content = certificate_verify_content(false, &self.transcript.hash(alg)?);
                let signature = sign(key, scheme, &content, rng)?;
                self.send(&mut actions, CertificateVerify { scheme, signature }.encode());
            }
        }
        let finished_key = Zeroizing::new(derive_finished_key(alg, &self.client_hs_secret)?);
        let verify_data = compute_finished_verify_data(alg, &finished_key, &self.transcript.hash(alg)?)?;
        self.send(&mut actions, encode_finished(&verify_data));
        self.resumption_secret =
            Zeroizing::new(schedule.derive_resumption_master_secret(&self.transcript.hash(alg)?)?);

        actions.push(Action::WriteKeys(params, KeyMaterial::from_traffic_secret(params, &client_app)?));
        actions.push(Action::ReadKeys(params, KeyMaterial::from_traffic_secret(params, &server_app)?));
        self.app = Some(AppSecrets::new(params, client_app, server_app));
        self.client_hs_secret = Zeroizing::new(Vec::new());
        self.server_hs_secret = Zeroizing::new(Vec::new());
        self.stage = ClientStage::Established;
        log::info!("TLS 1.3 handshake complete: {}, resumed={}", params.name, self.info.resumed);
        actions.push(Action::Complete);
        Ok(actions)
    }

    fn handle_new_session_ticket(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let nst = NewSessionTicket::decode(body(msg))?;
        if nst.lifetime == 0 {
            return Ok(Vec::new());
        }
        let params = self.params()?;
        let psk = derive_resumption_psk(params.hash, &self.resumption_secret, &nst.nonce)?;
        log::debug!("new session ticket, lifetime {}s", nst.lifetime);
        self.info.session = Some(Session {
            id: nst.ticket,
            version: TlsVersion::Tls13,
            cipher_suite: params.suite,
            master_secret: psk,
            extended_master_secret: false,
            created: unix_now(),
            lifetime: u64::from(nst.lifetime).min(MAX_TICKET_LIFETIME),
            alpn: self.info.alpn.clone(),
            server_name: self.info.server_name.clone(),
            peer_certificates: self.info.peer_certificates.clone(),
            ticket_age_add: nst.age_add,
        });
        Ok(Vec::new())
    }
}

/// The TLS 1.2 ChangeCipherSpec record.
pub(super) fn change_cipher_spec() -> Action {
    Action::Send(ContentType::ChangeCipherSpec, vec![1])
}
