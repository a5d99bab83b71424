//! Connection object: one handshake and one record layer over a caller
//! supplied byte transport.
//!
//! A `Connection` must be driven from one thread at a time. Every public
//! operation runs until it completes or the transport reports
//! `WouldBlock`; calling the same operation again resumes where it stopped.

use crate::alert::{Alert, AlertDescription};
use crate::config::Context;
use crate::handshake::fragment::HandshakeReassembler;
use crate::handshake::verify::PeerVerification;
use crate::handshake::{Action, Handshake, HandshakeState, Negotiated};
use crate::record::{ContentType, RecordLayer};
use crate::session::Session;
use crate::{CipherSuite, TlsRole, TlsVersion};
use mantis_crypto::drbg::Drbg;
use mantis_types::TlsError;
use std::io::{self, Read, Write};
use std::sync::Arc;
use zeroize::Zeroize;

/// Byte stream underneath a connection.
///
/// Either call may fail with [`io::ErrorKind::WouldBlock`], which surfaces
/// as [`TlsError::WouldBlock`].
pub trait Transport: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

struct Stream<S>(S);

impl<S: Read + Write + Send> Transport for Stream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
}

struct Callbacks<R, W> {
    read: R,
    write: W,
}

impl<R, W> Transport for Callbacks<R, W>
where
    R: FnMut(&mut [u8]) -> io::Result<usize> + Send,
    W: FnMut(&[u8]) -> io::Result<usize> + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self.read)(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.write)(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnState {
    Handshaking,
    Established,
    /// A fatal error; returned again by every later call.
    Failed(TlsError),
    /// `shutdown` was called.
    Closed,
}

/// A TLS client or server connection.
pub struct Connection {
    ctx: Arc<Context>,
    role: TlsRole,
    handshake: Handshake,
    record: RecordLayer,
    reassembler: HandshakeReassembler,
    rng: Drbg,
    transport: Option<Box<dyn Transport>>,
    state: ConnState,
    started: bool,
    /// Raw bytes read but not yet consumed as records.
    incoming: Vec<u8>,
    /// Sealed records not yet written.
    outgoing: Vec<u8>,
    /// Decrypted application data not yet returned by `recv`.
    plaintext: Vec<u8>,
    /// Length reported for a `send` whose records are still in `outgoing`.
    pending_send: Option<usize>,
    peer_closed: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("version", &self.version())
            .field("cipher_suite", &self.cipher_suite())
            .finish_non_exhaustive()
    }
}

const READ_CHUNK: usize = 16 * 1024 + 512;

impl Connection {
    /// Fails only if the context's random generator cannot be seeded.
    pub fn new(ctx: Arc<Context>, role: TlsRole) -> Result<Self, TlsError> {
        let rng = ctx.crypto().new_rng()?;
        Ok(Self {
            handshake: Handshake::new(ctx.clone(), role),
            ctx,
            role,
            record: RecordLayer::new(),
            reassembler: HandshakeReassembler::new(),
            rng,
            transport: None,
            state: ConnState::Handshaking,
            started: false,
            incoming: Vec::with_capacity(READ_CHUNK),
            outgoing: Vec::new(),
            plaintext: Vec::new(),
            pending_send: None,
            peer_closed: false,
        })
    }

    /// Use a pair of functions as the transport.
    pub fn set_transport<R, W>(&mut self, read: R, write: W)
    where
        R: FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static,
        W: FnMut(&[u8]) -> io::Result<usize> + Send + 'static,
    {
        self.transport = Some(Box::new(Callbacks { read, write }));
    }

    /// Use a `Read + Write` stream such as a `TcpStream` as the transport.
    pub fn set_stream<S: Read + Write + Send + 'static>(&mut self, stream: S) {
        self.transport = Some(Box::new(Stream(stream)));
    }

    /// Offer a session from an earlier connection for resumption.
    pub fn set_session(&mut self, session: Session) -> Result<(), TlsError> {
        if self.started {
            return Err(TlsError::InvalidArgument("set_session after the handshake started".into()));
        }
        self.handshake.set_session(session)
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn role(&self) -> TlsRole {
        self.role
    }

    pub fn state(&self) -> HandshakeState {
        self.handshake.state()
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnState::Established
    }

    fn info(&self) -> &Negotiated {
        self.handshake.negotiated()
    }

    pub fn version(&self) -> Option<TlsVersion> {
        self.info().version
    }

    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.info().suite
    }

    /// Peer chain, leaf first. Empty if the peer sent none.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.info().peer_certificates
    }

    pub fn peer_verification(&self) -> &PeerVerification {
        &self.info().peer_verification
    }

    pub fn alpn_protocol(&self) -> Option<&[u8]> {
        self.info().alpn.as_deref()
    }

    /// SNI sent by the client.
    pub fn server_name(&self) -> Option<&str> {
        self.info().server_name.as_deref()
    }

    pub fn is_resumed(&self) -> bool {
        self.info().resumed
    }

    /// True once close_notify has arrived.
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }

    /// State for resuming this session later. For TLS 1.3 this is the
    /// latest ticket, which may arrive after the handshake.
    pub fn session(&self) -> Option<Session> {
        self.info().session.clone()
    }

    /// Drive the handshake to completion.
    pub fn handshake(&mut self) -> Result<(), TlsError> {
        match &self.state {
            ConnState::Established => return Ok(()),
            ConnState::Failed(e) => return Err(e.clone()),
            ConnState::Closed => return Err(TlsError::NotReady),
            ConnState::Handshaking => {}
        }
        if self.transport.is_none() {
            return Err(TlsError::InvalidArgument("no transport set".into()));
        }
        let result = self.drive_handshake();
        self.check(result)
    }

    fn drive_handshake(&mut self) -> Result<(), TlsError> {
        if !self.started {
            self.started = true;
            log::debug!("{:?} handshake started", self.role);
            let actions = self.handshake.start(&mut self.rng)?;
            self.apply(actions)?;
        }
        loop {
            self.flush()?;
            if self.state == ConnState::Established {
                return Ok(());
            }
            self.process_record()?;
        }
    }

    /// Encrypt and send `data`.
    ///
    /// After `WouldBlock` the data has been accepted; call `send` again
    /// with the same buffer to finish writing it.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        self.ready()?;
        let result = self.send_inner(data);
        self.check(result)
    }

    fn send_inner(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        if let Some(n) = self.pending_send {
            self.flush()?;
            self.pending_send = None;
            return Ok(n);
        }
        if data.is_empty() {
            return Ok(0);
        }
        let sealed = self.record.seal_record(ContentType::ApplicationData, data)?;
        self.outgoing.extend_from_slice(&sealed);
        self.pending_send = Some(data.len());
        self.flush()?;
        self.pending_send = None;
        Ok(data.len())
    }

    /// Read decrypted application data. `Ok(0)` into a non-empty `buf`
    /// means the peer sent close_notify. An empty `buf` returns `Ok(0)`
    /// without touching the transport; [`Connection::is_peer_closed`] tells
    /// the two apart.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.ready()?;
        let result = self.recv_inner(buf);
        self.check(result)
    }

    fn recv_inner(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        loop {
            if !self.plaintext.is_empty() {
                let n = buf.len().min(self.plaintext.len());
                buf[..n].copy_from_slice(&self.plaintext[..n]);
                self.plaintext.drain(..n);
                return Ok(n);
            }
            if self.peer_closed || buf.is_empty() {
                return Ok(0);
            }
            // answers to KeyUpdate
            self.flush()?;
            self.process_record()?;
        }
    }

    /// TLS 1.3 KeyUpdate; `request_peer` asks the peer to update too.
    pub fn key_update(&mut self, request_peer: bool) -> Result<(), TlsError> {
        self.ready()?;
        if self.pending_send.is_some() || !self.outgoing.is_empty() {
            return Err(TlsError::WouldBlock);
        }
        let actions = self.handshake.key_update(request_peer)?;
        let result = self.apply(actions).and_then(|_| self.flush());
        self.check(result)
    }

    /// Send close_notify if established, then drop all key material.
    /// Calling it again does nothing.
    pub fn shutdown(&mut self) -> Result<(), TlsError> {
        if self.state == ConnState::Closed {
            return Ok(());
        }
        if self.state == ConnState::Established {
            match self.record.seal_record(ContentType::Alert, &Alert::CLOSE_NOTIFY.encode()) {
                Ok(rec) => {
                    self.outgoing.extend_from_slice(&rec);
                    if let Err(e) = self.flush() {
                        log::debug!("close_notify not delivered: {e}");
                    }
                }
                Err(e) => log::debug!("close_notify not sealed: {e}"),
            }
        }
        log::debug!("{:?} connection shut down", self.role);
        self.teardown();
        self.state = ConnState::Closed;
        Ok(())
    }

    fn ready(&self) -> Result<(), TlsError> {
        match &self.state {
            ConnState::Established => Ok(()),
            ConnState::Failed(e) => Err(e.clone()),
            ConnState::Handshaking | ConnState::Closed => Err(TlsError::NotReady),
        }
    }

    /// Make a fatal error sticky and tell the peer about it.
    fn check<T>(&mut self, result: Result<T, TlsError>) -> Result<T, TlsError> {
        let err = match result {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => e,
        };
        log::warn!("{:?} connection failed: {err}", self.role);
        if let Some(description) = AlertDescription::for_error(&err) {
            self.outgoing.clear();
            if let Ok(rec) = self.record.seal_record(ContentType::Alert, &Alert::fatal(description).encode()) {
                self.outgoing.extend_from_slice(&rec);
                let _ = self.flush();
            }
        }
        self.teardown();
        self.state = ConnState::Failed(err.clone());
        Err(err)
    }

    fn teardown(&mut self) {
        self.handshake.close();
        self.record.close();
        self.plaintext.zeroize();
        self.incoming.clear();
        self.outgoing.clear();
        self.pending_send = None;
    }

    fn apply(&mut self, actions: Vec<Action>) -> Result<(), TlsError> {
        for action in actions {
            match action {
                Action::Send(content_type, data) => {
                    let sealed = self.record.seal_record(content_type, &data)?;
                    self.outgoing.extend_from_slice(&sealed);
                }
                Action::WriteKeys(params, keys) => self.record.set_write_protection(params, &keys)?,
                Action::ReadKeys(params, keys) => {
                    if !self.reassembler.is_empty() {
                        return Err(TlsError::UnexpectedMessage(
                            "handshake data buffered across a key change".into(),
                        ));
                    }
                    self.record.set_read_protection(params, &keys)?;
                }
                Action::SetVersion(v) => self.record.set_version(v),
                Action::SetMaxFragment(len) => self.record.set_max_fragment(len),
                Action::Complete => {
                    log::debug!(
                        "{:?} established: {:?} {:?}",
                        self.role,
                        self.version(),
                        self.cipher_suite()
                    );
                    self.state = ConnState::Established;
                }
            }
        }
        Ok(())
    }

    /// Write everything in `outgoing`, keeping the rest on `WouldBlock`.
    fn flush(&mut self) -> Result<(), TlsError> {
        while !self.outgoing.is_empty() {
            let transport = self.transport.as_mut().ok_or(TlsError::NotReady)?;
            let n = transport.write(&self.outgoing)?;
            if n == 0 {
                return Err(TlsError::Io("transport accepted no bytes".into()));
            }
            self.outgoing.drain(..n);
        }
        Ok(())
    }

    /// Read and handle exactly one record.
    fn process_record(&mut self) -> Result<(), TlsError> {
        loop {
            if let Some((content_type, data, consumed)) = self.record.open_record(&self.incoming)? {
                self.incoming.drain(..consumed);
                return self.handle_record(content_type, data);
            }
            let transport = self.transport.as_mut().ok_or(TlsError::NotReady)?;
            let mut chunk = [0u8; READ_CHUNK];
            let n = transport.read(&mut chunk)?;
            if n == 0 {
                return Err(TlsError::Io("transport closed before close_notify".into()));
            }
            self.incoming.extend_from_slice(&chunk[..n]);
        }
    }

    fn handle_record(&mut self, content_type: ContentType, mut data: Vec<u8>) -> Result<(), TlsError> {
        match content_type {
            ContentType::Handshake => {
                if data.is_empty() {
                    return Err(TlsError::DecodeError("empty handshake record".into()));
                }
                self.reassembler.push(&data);
                while let Some((msg_type, msg)) = self.reassembler.next_message()? {
                    let actions = self.handshake.handle_message(msg_type, &msg, &mut self.rng)?;
                    self.apply(actions)?;
                }
            }
            ContentType::ChangeCipherSpec => {
                if data != [1] {
                    return Err(TlsError::DecodeError("ChangeCipherSpec body".into()));
                }
                if !self.reassembler.is_empty() {
                    return Err(TlsError::UnexpectedMessage("ChangeCipherSpec inside a handshake message".into()));
                }
                let actions = self.handshake.handle_ccs()?;
                self.apply(actions)?;
            }
            ContentType::Alert => {
                let alert = Alert::decode(&data)?;
                log::debug!("{:?} received alert {:?} {:?}", self.role, alert.level, alert.description);
                let fatal = if self.version() == Some(TlsVersion::Tls13) {
                    alert.is_fatal_tls13()
                } else {
                    alert.is_fatal()
                };
                if fatal {
                    self.record.close();
                    return Err(TlsError::AlertReceived(alert.description as u8));
                }
                if alert.description == AlertDescription::CloseNotify {
                    if self.state != ConnState::Established {
                        return Err(TlsError::HandshakeFailure("peer closed during the handshake".into()));
                    }
                    self.peer_closed = true;
                }
            }
            ContentType::ApplicationData => {
                if self.state != ConnState::Established {
                    data.zeroize();
                    return Err(TlsError::UnexpectedMessage("application data before the handshake finished".into()));
                }
                self.plaintext.extend_from_slice(&data);
                data.zeroize();
            }
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.plaintext.zeroize();
    }
}
