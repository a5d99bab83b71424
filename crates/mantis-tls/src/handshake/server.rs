//! Server handshake state machine.
//!
//! The ClientHello picks the version. TLS 1.3 is handled here, TLS 1.2 in
//! `server12`. There is no HelloRetryRequest: a client without a key share
//! for one of the server's groups fails the handshake.

use super::codec::{
    encode_encrypted_extensions, encode_finished, Certificate13, CertificateRequest13, CertificateVerify,
    ClientHello, NewSessionTicket, ServerHello,
};
use super::extensions::{
    build_alpn, build_key_share_sh, build_max_fragment_length, build_pre_shared_key_sh, build_signature_algorithms,
    build_supported_versions_sh, find, max_fragment_from_code, parse_alpn, parse_key_share_ch,
    parse_max_fragment_length, parse_pre_shared_key_ch, parse_psk_key_exchange_modes, parse_server_name,
    parse_signature_algorithms, parse_supported_versions_ch, Extension, ExtensionType, KeyShareEntry, PSK_DHE_KE,
};
use super::key_exchange::KeyShare;
use super::signing::{certificate_verify_content, select_scheme, sign, verify};
use super::verify::check_peer_chain;
use super::{
    body, check_verify_data, no_renegotiation, psk_binder, random32, send_message, unexpected, Action, AppSecrets,
    HandshakeState, HandshakeType, Negotiated, MAX_TICKET_LIFETIME,
};
use crate::config::{Context, VerifyClient};
use crate::crypt::key_schedule::{
    compute_finished_verify_data, derive_finished_key, derive_resumption_psk, KeySchedule,
};
use crate::crypt::keylog::{self, log_key};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::transcript::Transcript;
use crate::crypt::{select_cipher_suite, CipherSuiteParams};
use crate::session::{unix_now, Session, SessionCache};
use crate::trust::PeerPublicKey;
use crate::TlsVersion;
use mantis_types::{SecureRandom, TlsError};
use std::sync::Arc;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ServerStage {
    Start,
    WaitCertificate,
    WaitCertificateVerify,
    WaitFinished,
    WaitCertificate12,
    WaitClientKeyExchange,
    WaitCertificateVerify12,
    WaitChangeCipherSpec,
    WaitFinished12,
    Established,
    Closed,
}

pub struct ServerHandshake {
    pub(super) ctx: Arc<Context>,
    pub(super) stage: ServerStage,
    pub(super) info: Negotiated,
    pub(super) transcript: Transcript,
    pub(super) client_random: [u8; 32],
    pub(super) server_random: [u8; 32],
    /// `legacy_version` of the ClientHello, bound into an RSA premaster.
    pub(super) client_version: u16,
    pub(super) session_id: Vec<u8>,
    pub(super) params: Option<&'static CipherSuiteParams>,
    pub(super) schedule: Option<KeySchedule>,
    pub(super) client_hs_secret: Zeroizing<Vec<u8>>,
    /// Client application keys, installed once the client Finished checks out.
    pub(super) pending_read: Option<KeyMaterial>,
    pub(super) app: Option<AppSecrets>,
    pub(super) cert_requested: bool,
    pub(super) peer_key: Option<PeerPublicKey>,
    pub(super) ems: bool,
    pub(super) master_secret: Zeroizing<Vec<u8>>,
    pub(super) share: Option<KeyShare>,
}

impl ServerHandshake {
    pub fn new(ctx: Arc<Context>) -> Self {
        Self {
            ctx,
            stage: ServerStage::Start,
            info: Negotiated::default(),
            transcript: Transcript::new(),
            client_random: [0; 32],
            server_random: [0; 32],
            client_version: 0,
            session_id: Vec::new(),
            params: None,
            schedule: None,
            client_hs_secret: Zeroizing::new(Vec::new()),
            pending_read: None,
            app: None,
            cert_requested: false,
            peer_key: None,
            ems: false,
            master_secret: Zeroizing::new(Vec::new()),
            share: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        use ServerStage as S;
        match self.stage {
            S::Start => HandshakeState::Start,
            S::WaitCertificate | S::WaitCertificate12 | S::WaitClientKeyExchange => HandshakeState::KeyExchange,
            S::WaitCertificateVerify | S::WaitCertificateVerify12 => HandshakeState::CertificateVerify,
            S::WaitFinished | S::WaitChangeCipherSpec | S::WaitFinished12 => HandshakeState::WaitFinished,
            S::Established => HandshakeState::Established,
            S::Closed => HandshakeState::Closed,
        }
    }

    pub(super) fn start(&mut self) -> Result<Vec<Action>, TlsError> {
        if self.ctx.private_key().is_none() {
            return Err(TlsError::InvalidArgument("server context has no certificate and key".into()));
        }
        Ok(Vec::new())
    }

    pub(super) fn close(&mut self) {
        self.stage = ServerStage::Closed;
        self.app = None;
        self.schedule = None;
        self.share = None;
    }

    pub(super) fn app_secrets(&mut self) -> Option<&mut AppSecrets> {
        match self.stage {
            ServerStage::Established => self.app.as_mut(),
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

    pub(super) fn handle_message(
        &mut self,
        msg_type: HandshakeType,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        use HandshakeType as T;
        use ServerStage as S;
        let tls13 = self.info.version == Some(TlsVersion::Tls13);
        match (self.stage, msg_type) {
            (S::Start, T::ClientHello) => self.handle_client_hello(msg, rng),
            (S::WaitCertificate, T::Certificate) => self.handle_certificate13(msg),
            (S::WaitCertificateVerify, T::CertificateVerify) => self.handle_certificate_verify13(msg),
            (S::WaitFinished, T::Finished) => self.handle_finished13(msg, rng),
            (S::Established, T::KeyUpdate) if tls13 => match self.app.as_mut() {
                Some(app) => app.on_key_update(body(msg)),
                None => Err(TlsError::Internal("missing application secrets".into())),
            },

            (S::WaitCertificate12, T::Certificate) => self.handle_certificate12(msg),
            (S::WaitClientKeyExchange, T::ClientKeyExchange) => self.handle_client_key_exchange(msg, rng),
            (S::WaitCertificateVerify12, T::CertificateVerify) => self.handle_certificate_verify12(msg),
            (S::WaitFinished12, T::Finished) => self.handle_finished12(msg),
            (S::Established, T::ClientHello) if !tls13 => Ok(vec![no_renegotiation()]),
            (stage, t) => Err(unexpected(t, stage)),
        }
    }

    pub(super) fn handle_ccs(&mut self) -> Result<Vec<Action>, TlsError> {
        match self.stage {
            ServerStage::WaitChangeCipherSpec => self.handle_ccs12(),
            ServerStage::WaitCertificate | ServerStage::WaitCertificateVerify | ServerStage::WaitFinished => {
                Ok(Vec::new())
            }
            stage => Err(TlsError::UnexpectedMessage(format!("ChangeCipherSpec in {stage:?}"))),
        }
    }

    fn select_version(&self, ch: &ClientHello) -> Result<TlsVersion, TlsError> {
        match find(&ch.extensions, ExtensionType::SUPPORTED_VERSIONS) {
            Some(data) => {
                let offered = parse_supported_versions_ch(data)?;
                [TlsVersion::Tls13, TlsVersion::Tls12]
                    .into_iter()
                    .find(|v| self.ctx.supports_version(*v) && offered.contains(&v.wire()))
                    .ok_or(TlsError::ProtocolVersion)
            }
            None if ch.legacy_version >= TlsVersion::Tls12.wire() && self.ctx.supports_version(TlsVersion::Tls12) => {
                Ok(TlsVersion::Tls12)
            }
            None => Err(TlsError::ProtocolVersion),
        }
    }

    fn handle_client_hello(&mut self, msg: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<Action>, TlsError> {
        let ch = ClientHello::decode(body(msg))?;
        let version = self.select_version(&ch)?;
        self.client_random = ch.random;
        self.client_version = ch.legacy_version;
        if let Some(data) = find(&ch.extensions, ExtensionType::SERVER_NAME) {
            self.info.server_name = Some(parse_server_name(data)?);
        }
        log::debug!(
            "client hello: {} suites, sni={:?}, negotiating {version}",
            ch.cipher_suites.len(),
            self.info.server_name
        );
        self.info.version = Some(version);
        let mut actions = vec![Action::SetVersion(version)];
        match version {
            TlsVersion::Tls13 => actions.extend(self.client_hello13(&ch, msg, rng)?),
            TlsVersion::Tls12 => actions.extend(self.client_hello12(&ch, msg, rng)?),
        }
        Ok(actions)
    }

    /// ALPN and max_fragment_length answers, common to both versions.
    pub(super) fn negotiate_extensions(&mut self, ch: &ClientHello) -> Result<Vec<Extension>, TlsError> {
        let mut exts = Vec::new();
        if let Some(data) = find(&ch.extensions, ExtensionType::ALPN) {
            let offered = parse_alpn(data)?;
            match self.ctx.alpn_protocols().iter().find(|p| offered.contains(p)) {
                Some(p) => {
                    exts.push(build_alpn(std::slice::from_ref(p)));
                    self.info.alpn = Some(p.clone());
                }
                None => log::debug!("no common ALPN protocol"),
            }
        }
        if let Some(data) = find(&ch.extensions, ExtensionType::MAX_FRAGMENT_LENGTH) {
            let code = parse_max_fragment_length(data)?;
            exts.push(build_max_fragment_length(code));
            self.info.max_fragment = max_fragment_from_code(code);
        }
        Ok(exts)
    }

    fn client_hello13(
        &mut self,
        ch: &ClientHello,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        let ctx = self.ctx.clone();
        let key = ctx
            .private_key()
            .ok_or_else(|| TlsError::HandshakeFailure("server has no certificate".into()))?;
        let params = select_cipher_suite(ctx.cipher_suites(), &ch.cipher_suites, TlsVersion::Tls13, key.kind())?;
        self.params = Some(params);
        self.info.suite = Some(params.suite);

        let offered_shares = find(&ch.extensions, ExtensionType::KEY_SHARE)
            .ok_or_else(|| TlsError::HandshakeFailure("ClientHello without key_share".into()))
            .and_then(parse_key_share_ch)?;
        let (group, peer_share) = ctx
            .groups()
            .iter()
            .find_map(|g| offered_shares.iter().find(|e| e.group == *g))
            .map(|e| (e.group, e.key_exchange.clone()))
            .ok_or_else(|| TlsError::HandshakeFailure("no key share for a supported group".into()))?;
        let client_schemes = find(&ch.extensions, ExtensionType::SIGNATURE_ALGORITHMS)
            .map(parse_signature_algorithms)
            .transpose()?;

        let psk = self.accept_psk(ch, msg, params)?;
        let scheme = match psk {
            Some(_) => None,
            None => Some(select_scheme(
                key,
                client_schemes.as_deref(),
                ctx.signature_schemes(),
                TlsVersion::Tls13,
            )?),
        };
        self.transcript.update(msg);

        let share = KeyShare::generate(group, rng)?;
        let shared = share.agree(&peer_share)?;
        self.server_random = random32(rng)?;
        let mut extensions = vec![
            build_supported_versions_sh(TlsVersion::Tls13.wire()),
            build_key_share_sh(&KeyShareEntry {
                group,
                key_exchange: share.public_bytes().to_vec(),
            }),
        ];
        let mut schedule = match psk {
            Some((early, index)) => {
                extensions.push(build_pre_shared_key_sh(index));
                self.info.resumed = true;
                early
            }
            None => {
                let mut ks = KeySchedule::new(params.hash);
                ks.derive_early_secret(None)?;
                ks
            }
        };
        let hello = ServerHello {
            legacy_version: TlsVersion::Tls12.wire(),
            random: self.server_random,
            session_id: ch.session_id.clone(),
            cipher_suite: params.suite,
            extensions,
        };
        let mut actions = Vec::new();
        self.send(&mut actions, hello.encode());

        let alg = params.hash;
        schedule.derive_handshake_secret(&shared)?;
        let (client_hs, server_hs) = schedule.derive_handshake_traffic_secrets(&self.transcript.hash(alg)?)?;
        let key_log = ctx.key_log();
        log_key(key_log, keylog::CLIENT_HANDSHAKE_TRAFFIC_SECRET, &self.client_random, &client_hs);
        log_key(key_log, keylog::SERVER_HANDSHAKE_TRAFFIC_SECRET, &self.client_random, &server_hs);
        actions.push(Action::WriteKeys(params, KeyMaterial::from_traffic_secret(params, &server_hs)?));
        actions.push(Action::ReadKeys(params, KeyMaterial::from_traffic_secret(params, &client_hs)?));

        let ee = self.negotiate_extensions(ch)?;
        self.send(&mut actions, encode_encrypted_extensions(&ee));
        if let Some(len) = self.info.max_fragment {
            actions.push(Action::SetMaxFragment(len));
        }

        if let Some(scheme) = scheme {
            if ctx.verify_client() != VerifyClient::None {
                let req = CertificateRequest13 {
                    context: Vec::new(),
                    extensions: vec![build_signature_algorithms(ctx.signature_schemes())],
                };
                self.send(&mut actions, req.encode());
                self.cert_requested = true;
            }
            let cert = Certificate13 {
                context: Vec::new(),
                chain: ctx.certificate_chain().to_vec(),
            };
            self.send(&mut actions, cert.encode());
            let content = certificate_verify_content(true, &self.transcript.hash(alg)?);
            let signature = sign(key, scheme, &content, rng)?;
            self.send(&mut actions, CertificateVerify { scheme, signature }.encode());
        }

        let finished_key = Zeroizing::new(derive_finished_key(alg, &server_hs)?);
        let verify_data = compute_finished_verify_data(alg, &finished_key, &self.transcript.hash(alg)?)?;
        self.send(&mut actions, encode_finished(&verify_data));

        schedule.derive_master_secret()?;
        let (client_app, server_app) = schedule.derive_app_traffic_secrets(&self.transcript.hash(alg)?)?;
        log_key(key_log, keylog::CLIENT_TRAFFIC_SECRET_0, &self.client_random, &client_app);
        log_key(key_log, keylog::SERVER_TRAFFIC_SECRET_0, &self.client_random, &server_app);
        actions.push(Action::WriteKeys(params, KeyMaterial::from_traffic_secret(params, &server_app)?));
        self.pending_read = Some(KeyMaterial::from_traffic_secret(params, &client_app)?);
        self.app = Some(AppSecrets::new(params, server_app, client_app));

        self.client_hs_secret = Zeroizing::new(client_hs);
        self.schedule = Some(schedule);
        self.stage = if self.cert_requested {
            ServerStage::WaitCertificate
        } else {
            ServerStage::WaitFinished
        };
        Ok(actions)
    }

    /// Look for a resumable ticket among the offered PSKs. A ticket that is
    /// unknown, expired or bound to another hash is skipped; a bad binder
    /// on a known ticket is fatal.
    fn accept_psk(
        &mut self,
        ch: &ClientHello,
        msg: &[u8],
        params: &'static CipherSuiteParams,
    ) -> Result<Option<(KeySchedule, u16)>, TlsError> {
        let Some(data) = find(&ch.extensions, ExtensionType::PRE_SHARED_KEY) else {
            return Ok(None);
        };
        if ch.extensions.last().map(|e| e.ext_type) != Some(ExtensionType::PRE_SHARED_KEY) {
            return Err(TlsError::IllegalParameter("pre_shared_key is not the last extension".into()));
        }
        let offer = parse_pre_shared_key_ch(data)?;
        let modes = find(&ch.extensions, ExtensionType::PSK_KEY_EXCHANGE_MODES)
            .map(parse_psk_key_exchange_modes)
            .transpose()?
            .unwrap_or_default();
        let Some(cache) = self.ctx.session_cache().cloned() else {
            return Ok(None);
        };
        if !modes.contains(&PSK_DHE_KE) {
            return Ok(None);
        }
        let truncated_len = msg
            .len()
            .checked_sub(offer.binders_len())
            .ok_or_else(|| TlsError::DecodeError("pre_shared_key binders".into()))?;

        let now = unix_now();
        for (index, identity) in offer.identities.iter().enumerate() {
            let Some(session) = cache.lookup_at(&identity.identity, now) else {
                continue;
            };
            let same_hash = CipherSuiteParams::from_suite(session.cipher_suite).is_ok_and(|p| p.hash == params.hash);
            if session.version != TlsVersion::Tls13 || !same_hash {
                continue;
            }
            let age_ms = identity.obfuscated_ticket_age.wrapping_sub(session.ticket_age_add);
            if u64::from(age_ms) / 1000 > session.lifetime {
                log::debug!("ticket age {age_ms}ms beyond its lifetime");
                continue;
            }
            let mut early = KeySchedule::new(params.hash);
            early.derive_early_secret(Some(&session.master_secret))?;
            let expected = psk_binder(&early, &msg[..truncated_len])?;
            check_verify_data(&expected, &offer.binders[index])?;
            // tickets are single use
            cache.remove(&identity.identity);
            self.info.peer_certificates = session.peer_certificates.clone();
            log::debug!("resuming with PSK identity {index}");
            return Ok(Some((early, index as u16)));
        }
        Ok(None)
    }

    fn handle_certificate13(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let cert = Certificate13::decode(body(msg))?;
        let ctx = self.ctx.clone();
        let required = ctx.verify_client() == VerifyClient::Require;
        if cert.chain.is_empty() {
            if required {
                return Err(TlsError::HandshakeFailure("client certificate required".into()));
            }
            self.stage = ServerStage::WaitFinished;
        } else {
            let (parsed, verification) = check_peer_chain(&ctx, &cert.chain, required)?;
            self.peer_key = Some(parsed[0].public_key.clone());
            self.info.peer_certificates = cert.chain;
            self.info.peer_verification = verification;
            self.stage = ServerStage::WaitCertificateVerify;
        }
        self.transcript.update(msg);
        Ok(Vec::new())
    }

    fn handle_certificate_verify13(&mut self, msg: &[u8]) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let cv = CertificateVerify::decode(body(msg))?;
        if !self.ctx.signature_schemes().contains(&cv.scheme) || !cv.scheme.allowed_in(TlsVersion::Tls13) {
            return Err(TlsError::IllegalParameter(format!("signature scheme 0x{:04X}", cv.scheme.0)));
        }
        let content = certificate_verify_content(false, &self.transcript.hash(params.hash)?);
        let key = self
            .peer_key
            .as_ref()
            .ok_or_else(|| TlsError::Internal("no client key".into()))?;
        verify(key, cv.scheme, &content, &cv.signature)?;
        self.transcript.update(msg);
        self.stage = ServerStage::WaitFinished;
        Ok(Vec::new())
    }

    fn handle_finished13(&mut self, msg: &[u8], rng: &mut dyn SecureRandom) -> Result<Vec<Action>, TlsError> {
        let params = self.params()?;
        let alg = params.hash;
        let finished_key = Zeroizing::new(derive_finished_key(alg, &self.client_hs_secret)?);
        let expected = compute_finished_verify_data(alg, &finished_key, &self.transcript.hash(alg)?)?;
        check_verify_data(&expected, body(msg))?;
        self.transcript.update(msg);

        let keys = self
            .pending_read
            .take()
            .ok_or_else(|| TlsError::Internal("client application keys missing".into()))?;
        let mut actions = vec![Action::ReadKeys(params, keys)];
        let schedule = self
            .schedule
            .take()
            .ok_or_else(|| TlsError::Internal("key schedule missing".into()))?;
        let resumption = Zeroizing::new(schedule.derive_resumption_master_secret(&self.transcript.hash(alg)?)?);
        if let Some(cache) = self.ctx.session_cache().cloned() {
            actions.push(self.issue_ticket(&cache, &resumption, params, rng)?);
        }
        self.client_hs_secret = Zeroizing::new(Vec::new());
        self.stage = ServerStage::Established;
        log::info!("TLS 1.3 handshake complete: {}, resumed={}", params.name, self.info.resumed);
        actions.push(Action::Complete);
        Ok(actions)
    }

    /// Store a fresh PSK in the cache and hand its key to the client.
    fn issue_ticket(
        &mut self,
        cache: &SessionCache,
        resumption_secret: &[u8],
        params: &'static CipherSuiteParams,
        rng: &mut dyn SecureRandom,
    ) -> Result<Action, TlsError> {
        let ticket = random32(rng)?.to_vec();
        let mut age_add = [0u8; 4];
        rng.fill_bytes(&mut age_add)?;
        let age_add = u32::from_be_bytes(age_add);
        let nonce = vec![0u8];
        let lifetime = self.ctx.session_timeout().min(cache.timeout()).min(MAX_TICKET_LIFETIME);
        let session = Session {
            id: ticket.clone(),
            version: TlsVersion::Tls13,
            cipher_suite: params.suite,
            master_secret: derive_resumption_psk(params.hash, resumption_secret, &nonce)?,
            extended_master_secret: false,
            created: unix_now(),
            lifetime,
            alpn: self.info.alpn.clone(),
            server_name: self.info.server_name.clone(),
            peer_certificates: self.info.peer_certificates.clone(),
            ticket_age_add: age_add,
        };
        cache.store(session.clone());
        self.info.session = Some(session);
        let nst = NewSessionTicket {
            lifetime: lifetime as u32,
            age_add,
            nonce,
            ticket,
        };
        log::debug!("issued session ticket, lifetime {lifetime}s");
        Ok(Action::Send(crate::record::ContentType::Handshake, nst.encode()))
    }
}
