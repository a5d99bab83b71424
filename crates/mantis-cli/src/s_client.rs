//! TLS client command (`s_client`).

use crate::config::Settings;
use mantis_tls::{Connection, Context, Session, TlsRole, TlsVersion};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub ca: Option<String>,
    pub resume: bool,
    pub key_update: bool,
    pub message: String,
    pub config: Option<String>,
}

pub fn run(opts: &ClientOptions) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(opts.config.as_deref())?;
    let mut builder = Context::builder().server_name(&opts.host);
    match &opts.ca {
        Some(path) => {
            let der = std::fs::read(path).map_err(|e| format!("cannot read CA file '{path}': {e}"))?;
            builder = builder.trusted_root(der);
        }
        None => {
            eprintln!("Warning: no --ca given, server certificate is not verified");
            builder = builder.verify_peer(false);
        }
    }
    let ctx = Arc::new(settings.apply(builder)?.build()?);

    let session = exchange(&ctx, opts, None)?;
    if opts.resume {
        let session = session.ok_or("server issued no session to resume")?;
        exchange(&ctx, opts, Some(session))?;
    }
    Ok(())
}

fn connect(host: &str, port: u16) -> Result<TcpStream, Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve '{addr}': {e}"))?
        .next()
        .ok_or_else(|| format!("cannot resolve '{addr}': no addresses found"))?;
    let stream = TcpStream::connect_timeout(&socket_addr, Duration::from_secs(10))
        .map_err(|e| format!("cannot connect to '{addr}': {e}"))?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
    Ok(stream)
}

/// One connection: handshake, echo round trip, close. Returns the session for resumption.
fn exchange(
    ctx: &Arc<Context>,
    opts: &ClientOptions,
    resume: Option<Session>,
) -> Result<Option<Session>, Box<dyn std::error::Error>> {
    let stream = connect(&opts.host, opts.port)?;
    let mut conn = Connection::new(ctx.clone(), TlsRole::Client)?;
    let offered = resume.is_some();
    if let Some(session) = resume {
        conn.set_session(session)?;
    }
    conn.set_stream(stream);
    conn.handshake()?;

    eprintln!("--- TLS connection established ---");
    if let Some(version) = conn.version() {
        eprintln!("  Protocol: {version}");
    }
    if let Some(cs) = conn.cipher_suite() {
        eprintln!("  Cipher:   {cs}");
    }
    if let Some(alpn) = conn.alpn_protocol() {
        eprintln!("  ALPN:     {}", String::from_utf8_lossy(alpn));
    }
    eprintln!("  Peer certificates: {}", conn.peer_certificates().len());
    eprintln!("  Verification: {:?}", conn.peer_verification());
    if offered {
        eprintln!("  Resumed:  {}", conn.is_resumed());
    }
    eprintln!("----------------------------------");

    if opts.key_update {
        if conn.version() == Some(TlsVersion::Tls13) {
            conn.key_update(true)?;
            eprintln!("Sent KeyUpdate");
        } else {
            eprintln!("KeyUpdate needs TLS 1.3, skipped");
        }
    }

    let message = opts.message.as_bytes();
    conn.send(message)?;
    let mut reply = Vec::with_capacity(message.len());
    let mut buf = vec![0u8; 16384];
    while reply.len() < message.len() {
        let n = conn.recv(&mut buf)?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
    }
    println!("{}", String::from_utf8_lossy(&reply));

    let session = conn.session();
    conn.shutdown()?;
    Ok(session)
}
