//! TLS echo server command (`s_server`).

use crate::config::Settings;
use crate::identity::{self, KeyType};
use mantis_tls::{Connection, Context, SessionCache, TlsRole};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

pub struct ServerOptions {
    pub port: u16,
    pub key_type: String,
    pub cert_out: Option<String>,
    pub cache: bool,
    pub config: Option<String>,
    pub count: Option<usize>,
}

pub fn run(opts: &ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load(opts.config.as_deref())?;
    let ctx = Arc::new(build_context(opts, &settings)?);

    let bind_addr = format!("0.0.0.0:{}", opts.port);
    let listener =
        TcpListener::bind(&bind_addr).map_err(|e| format!("cannot bind to '{bind_addr}': {e}"))?;
    eprintln!(
        "Listening on {bind_addr} ({}..{}, session cache {})",
        ctx.min_version(),
        ctx.max_version(),
        if ctx.session_cache().is_some() { "on" } else { "off" }
    );

    let mut served = 0usize;
    for incoming in listener.incoming() {
        let stream = match incoming {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("accept error: {e}");
                continue;
            }
        };
        if let Ok(addr) = stream.peer_addr() {
            eprintln!("Accepted connection from {addr}");
        }
        if let Err(e) = serve(&ctx, stream) {
            eprintln!("Connection error: {e}");
        }
        if let Some(cache) = ctx.session_cache() {
            let evicted = cache.evict_expired();
            if evicted > 0 {
                tracing::debug!("evicted {evicted} expired sessions");
            }
        }
        served += 1;
        if opts.count.is_some_and(|n| served >= n) {
            break;
        }
    }
    Ok(())
}

fn build_context(opts: &ServerOptions, settings: &Settings) -> Result<Context, Box<dyn std::error::Error>> {
    let key_type: KeyType = opts.key_type.parse()?;
    let (cert, key) = identity::generate(key_type, "localhost")?;
    if let Some(path) = &opts.cert_out {
        std::fs::write(path, &cert).map_err(|e| format!("cannot write certificate to '{path}': {e}"))?;
        eprintln!("Wrote server certificate (DER) to {path}");
    }
    let mut builder = settings.apply(Context::builder().identity(vec![cert], key))?;
    let cache = match settings.cache() {
        Some(cache) => Some(cache),
        None if opts.cache => Some(Arc::new(SessionCache::default())),
        None => None,
    };
    if let Some(cache) = cache {
        builder = builder.session_cache(cache);
    }
    Ok(builder.build()?)
}

fn serve(ctx: &Arc<Context>, stream: TcpStream) -> Result<(), Box<dyn std::error::Error>> {
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;
    stream.set_write_timeout(Some(Duration::from_secs(30)))?;
    let mut conn = Connection::new(ctx.clone(), TlsRole::Server)?;
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
    if let Some(name) = conn.server_name() {
        eprintln!("  SNI:      {name}");
    }
    eprintln!("  Resumed:  {}", conn.is_resumed());
    eprintln!("----------------------------------");

    let mut buf = vec![0u8; 16384];
    let mut echoed = 0usize;
    loop {
        let n = conn.recv(&mut buf)?;
        if n == 0 {
            break;
        }
        conn.send(&buf[..n])?;
        echoed += n;
    }
    tracing::info!("echoed {echoed} bytes");
    conn.shutdown()?;
    eprintln!("Connection closed.");
    Ok(())
}
