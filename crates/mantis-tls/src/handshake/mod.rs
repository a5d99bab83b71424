//! TLS handshake protocol state machine.
//!
//! Each side is driven message by message. A step returns a list of
//! [`Action`]s that the connection applies in order: records to send,
//! record keys to install and the completion signal. The state machines
//! never touch the transport.

pub mod client;
mod client12;
pub mod codec;
pub mod extensions;
pub mod fragment;
pub mod key_exchange;
pub mod server;
mod server12;
pub mod signing;
pub mod verify;

use crate::alert::{Alert, AlertDescription};
use crate::config::Context;
use crate::crypt::key_schedule::{
    compute_finished_verify_data, derive_finished_key, update_traffic_secret, KeySchedule,
};
use crate::crypt::traffic_keys::KeyMaterial;
use crate::crypt::transcript::Transcript;
use crate::crypt::CipherSuiteParams;
use crate::record::ContentType;
use crate::session::Session;
use crate::{CipherSuite, TlsRole, TlsVersion};
use client::ClientHandshake;
use mantis_crypto::hash::Hash;
use mantis_types::{SecureRandom, TlsError};
use server::ServerHandshake;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use verify::PeerVerification;
use zeroize::Zeroizing;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EncryptedExtensions = 8,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    KeyUpdate = 24,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            4 => HandshakeType::NewSessionTicket,
            8 => HandshakeType::EncryptedExtensions,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            24 => HandshakeType::KeyUpdate,
            _ => return None,
        })
    }
}

/// Coarse handshake progress, shared by both roles and versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent or received yet.
    Start,
    /// Hello messages in flight.
    NegotiateVersionCipher,
    /// Certificates and key exchange messages.
    KeyExchange,
    /// Waiting for the peer's CertificateVerify.
    CertificateVerify,
    /// Waiting for ChangeCipherSpec or Finished.
    WaitFinished,
    Established,
    /// Failed or shut down.
    Closed,
}

/// One step for the connection to carry out.
#[derive(Debug)]
pub enum Action {
    /// Seal and queue a record with the current write protection.
    Send(ContentType, Vec<u8>),
    /// Protect everything written from now on.
    WriteKeys(&'static CipherSuiteParams, KeyMaterial),
    /// Unprotect everything read from now on. Rejected while a partial
    /// handshake message is buffered.
    ReadKeys(&'static CipherSuiteParams, KeyMaterial),
    SetVersion(TlsVersion),
    SetMaxFragment(usize),
    /// The handshake finished successfully.
    Complete,
}

/// What the handshake settled on.
#[derive(Debug, Clone, Default)]
pub struct Negotiated {
    pub version: Option<TlsVersion>,
    pub suite: Option<CipherSuite>,
    /// Leaf first.
    pub peer_certificates: Vec<Vec<u8>>,
    pub peer_verification: PeerVerification,
    pub alpn: Option<Vec<u8>>,
    /// SNI sent by the client.
    pub server_name: Option<String>,
    pub max_fragment: Option<usize>,
    pub resumed: bool,
    /// Resumable state: the last ticket (TLS 1.3) or the session id.
    pub session: Option<Session>,
}

/// Last 8 bytes of a ServerHello random when a TLS 1.3 server settles
/// for TLS 1.2 (RFC 8446 §4.1.3).
pub(crate) const DOWNGRADE_TLS12: [u8; 8] = *b"DOWNGRD\x01";

pub(crate) fn body(msg: &[u8]) -> &[u8] {
    msg.get(4..).unwrap_or_default()
}

pub(crate) fn random32(rng: &mut dyn SecureRandom) -> Result<[u8; 32], TlsError> {
    let mut r = [0u8; 32];
    rng.fill_bytes(&mut r)?;
    Ok(r)
}

/// Constant-time Finished comparison; a mismatch is `DecryptError`.
pub(crate) fn check_verify_data(expected: &[u8], received: &[u8]) -> Result<(), TlsError> {
    if expected.len() == received.len() && bool::from(expected.ct_eq(received)) {
        Ok(())
    } else {
        Err(TlsError::DecryptError)
    }
}

pub(crate) fn unexpected(msg_type: HandshakeType, stage: impl std::fmt::Debug) -> TlsError {
    TlsError::UnexpectedMessage(format!("{msg_type:?} in {stage:?}"))
}

/// Record `msg` in the transcript and queue it.
pub(crate) fn send_message(transcript: &mut Transcript, actions: &mut Vec<Action>, msg: Vec<u8>) {
    transcript.update(&msg);
    actions.push(Action::Send(ContentType::Handshake, msg));
}

/// Warning sent instead of renegotiating.
pub(crate) fn no_renegotiation() -> Action {
    log::debug!("renegotiation refused");
    Action::Send(
        ContentType::Alert,
        Alert::warning(AlertDescription::NoRenegotiation).encode().to_vec(),
    )
}

/// PSK binder over a ClientHello truncated before its binders list.
pub(crate) fn psk_binder(early: &KeySchedule, truncated_hello: &[u8]) -> Result<Vec<u8>, TlsError> {
    let alg = early.hash_alg();
    let binder_key = Zeroizing::new(early.derive_binder_key()?);
    let finished_key = Zeroizing::new(derive_finished_key(alg, &binder_key)?);
    compute_finished_verify_data(alg, &finished_key, &Hash::digest(alg, truncated_hello)?)
}

/// Cap on a TLS 1.3 ticket lifetime, seconds (RFC 8446 §4.6.1).
pub(crate) const MAX_TICKET_LIFETIME: u64 = 604_800;

/// TLS 1.3 application traffic secrets and the KeyUpdate sub-machine.
pub(crate) struct AppSecrets {
    params: &'static CipherSuiteParams,
    ours: Zeroizing<Vec<u8>>,
    theirs: Zeroizing<Vec<u8>>,
}

impl AppSecrets {
    pub(crate) fn new(params: &'static CipherSuiteParams, ours: Vec<u8>, theirs: Vec<u8>) -> Self {
        Self {
            params,
            ours: Zeroizing::new(ours),
            theirs: Zeroizing::new(theirs),
        }
    }

    /// Send KeyUpdate under the current keys, then rotate the write side.
    pub(crate) fn update_ours(&mut self, request_peer: bool) -> Result<Vec<Action>, TlsError> {
        let next = Zeroizing::new(update_traffic_secret(self.params.hash, &self.ours)?);
        let keys = KeyMaterial::from_traffic_secret(self.params, &next)?;
        self.ours = next;
        log::debug!("key update sent, request_peer={request_peer}");
        Ok(vec![
            Action::Send(ContentType::Handshake, codec::encode_key_update(request_peer)),
            Action::WriteKeys(self.params, keys),
        ])
    }

    /// Rotate the read side; answer when the peer asked for it.
    pub(crate) fn on_key_update(&mut self, body: &[u8]) -> Result<Vec<Action>, TlsError> {
        let requested = codec::decode_key_update(body)?;
        let next = Zeroizing::new(update_traffic_secret(self.params.hash, &self.theirs)?);
        let keys = KeyMaterial::from_traffic_secret(self.params, &next)?;
        self.theirs = next;
        log::debug!("key update received, update_requested={requested}");
        let mut actions = vec![Action::ReadKeys(self.params, keys)];
        if requested {
            actions.extend(self.update_ours(false)?);
        }
        Ok(actions)
    }
}

/// The handshake of one connection.
pub enum Handshake {
    Client(Box<ClientHandshake>),
    Server(Box<ServerHandshake>),
}

impl Handshake {
    pub fn new(ctx: Arc<Context>, role: TlsRole) -> Self {
        match role {
            TlsRole::Client => Handshake::Client(Box::new(ClientHandshake::new(ctx))),
            TlsRole::Server => Handshake::Server(Box::new(ServerHandshake::new(ctx))),
        }
    }

    /// First flight: the ClientHello for a client, nothing for a server.
    pub fn start(&mut self, rng: &mut dyn SecureRandom) -> Result<Vec<Action>, TlsError> {
        match self {
            Handshake::Client(c) => c.start(rng),
            Handshake::Server(s) => s.start(),
        }
    }

    /// Process one complete handshake message, header included.
    pub fn handle_message(
        &mut self,
        msg_type: HandshakeType,
        msg: &[u8],
        rng: &mut dyn SecureRandom,
    ) -> Result<Vec<Action>, TlsError> {
        match self {
            Handshake::Client(c) => c.handle_message(msg_type, msg, rng),
            Handshake::Server(s) => s.handle_message(msg_type, msg, rng),
        }
    }

    pub fn handle_ccs(&mut self) -> Result<Vec<Action>, TlsError> {
        match self {
            Handshake::Client(c) => c.handle_ccs(),
            Handshake::Server(s) => s.handle_ccs(),
        }
    }

    /// TLS 1.3 KeyUpdate; only valid once established.
    pub fn key_update(&mut self, request_peer: bool) -> Result<Vec<Action>, TlsError> {
        let secrets = match self {
            Handshake::Client(c) => c.app_secrets(),
            Handshake::Server(s) => s.app_secrets(),
        };
        secrets
            .ok_or_else(|| TlsError::InvalidArgument("key update needs an established TLS 1.3 connection".into()))?
            .update_ours(request_peer)
    }

    pub fn state(&self) -> HandshakeState {
        match self {
            Handshake::Client(c) => c.state(),
            Handshake::Server(s) => s.state(),
        }
    }

    pub fn negotiated(&self) -> &Negotiated {
        match self {
            Handshake::Client(c) => &c.info,
            Handshake::Server(s) => &s.info,
        }
    }

    /// Offer `session` for resumption. Clients only, before `start`.
    pub fn set_session(&mut self, session: Session) -> Result<(), TlsError> {
        match self {
            Handshake::Client(c) => c.set_session(session),
            Handshake::Server(_) => Err(TlsError::InvalidArgument("set_session on a server".into())),
        }
    }

    /// Move to `Closed` after a fatal error or shutdown.
    pub fn close(&mut self) {
        match self {
            Handshake::Client(c) => c.close(),
            Handshake::Server(s) => s.close(),
        }
    }
}
