//! NSS key log lines (`SSLKEYLOGFILE` format) for traffic analysis tools.
//!
//! `<label> <client_random_hex> <secret_hex>`; TLS 1.2 uses `CLIENT_RANDOM`
//! with the master secret, TLS 1.3 logs each traffic secret.

use std::sync::Arc;

/// Receives one key log line per call.
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub const CLIENT_HANDSHAKE_TRAFFIC_SECRET: &str = "CLIENT_HANDSHAKE_TRAFFIC_SECRET";
pub const SERVER_HANDSHAKE_TRAFFIC_SECRET: &str = "SERVER_HANDSHAKE_TRAFFIC_SECRET";
pub const CLIENT_TRAFFIC_SECRET_0: &str = "CLIENT_TRAFFIC_SECRET_0";
pub const SERVER_TRAFFIC_SECRET_0: &str = "SERVER_TRAFFIC_SECRET_0";

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn log_key(cb: Option<&KeyLogCallback>, label: &str, client_random: &[u8; 32], secret: &[u8]) {
    if let Some(cb) = cb {
        cb(&format!("{label} {} {}", to_hex(client_random), to_hex(secret)));
    }
}

pub fn log_master_secret(cb: Option<&KeyLogCallback>, client_random: &[u8; 32], master_secret: &[u8]) {
    log_key(cb, "CLIENT_RANDOM", client_random, master_secret);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_log_line_format() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let cb: KeyLogCallback = Arc::new(move |l: &str| sink.lock().unwrap().push(l.to_string()));

        log_master_secret(Some(&cb), &[0x42; 32], &[0xAB, 0xCD]);
        log_key(Some(&cb), SERVER_TRAFFIC_SECRET_0, &[0; 32], &[1]);
        log_key(None, SERVER_TRAFFIC_SECRET_0, &[0; 32], &[1]);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("CLIENT_RANDOM {} abcd", "42".repeat(32)));
        assert!(lines[1].starts_with("SERVER_TRAFFIC_SECRET_0 0000"));
        assert!(lines[1].ends_with(" 01"));
    }
}
