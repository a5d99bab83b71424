//! Optional JSON settings for `s_server` and `s_client`.
//!
//! ```json
//! {
//!   "min_version": "1.2",
//!   "max_version": "1.3",
//!   "cipher_suites": ["TLS_AES_128_GCM_SHA256", "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"],
//!   "groups": ["x25519", "secp256r1"],
//!   "alpn": ["h2", "http/1.1"],
//!   "verify_peer": true,
//!   "session_cache": { "capacity": 1024, "timeout_secs": 300 }
//! }
//! ```

use mantis_tls::crypt::{CipherSuiteParams, NamedGroup};
use mantis_tls::{CipherSuite, ContextBuilder, SessionCache, TlsVersion};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    #[serde(default)]
    pub cipher_suites: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub alpn: Vec<String>,
    pub verify_peer: Option<bool>,
    pub session_cache: Option<CacheSettings>,
    pub max_fragment_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_capacity() -> usize {
    1024
}

fn default_timeout() -> u64 {
    mantis_tls::session::DEFAULT_SESSION_TIMEOUT
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => {
                let text =
                    std::fs::read_to_string(path).map_err(|e| format!("cannot read config '{path}': {e}"))?;
                Self::parse(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        serde_json::from_str(text).map_err(|e| format!("invalid config: {e}").into())
    }

    /// Fold the settings into a context builder.
    pub fn apply(&self, mut builder: ContextBuilder) -> Result<ContextBuilder, Box<dyn std::error::Error>> {
        if let Some(v) = &self.min_version {
            builder = builder.min_version(parse_version(v)?);
        }
        if let Some(v) = &self.max_version {
            builder = builder.max_version(parse_version(v)?);
        }
        if !self.cipher_suites.is_empty() {
            let suites = self
                .cipher_suites
                .iter()
                .map(|s| parse_suite(s))
                .collect::<Result<Vec<_>, _>>()?;
            builder = builder.cipher_suites(&suites);
        }
        if !self.groups.is_empty() {
            let groups = self.groups.iter().map(|g| parse_group(g)).collect::<Result<Vec<_>, _>>()?;
            builder = builder.groups(&groups);
        }
        if !self.alpn.is_empty() {
            let names: Vec<&[u8]> = self.alpn.iter().map(|p| p.as_bytes()).collect();
            builder = builder.alpn_protocols(&names);
        }
        if let Some(verify) = self.verify_peer {
            builder = builder.verify_peer(verify);
        }
        if let Some(len) = self.max_fragment_length {
            builder = builder.max_fragment_length(len);
        }
        Ok(builder)
    }

    pub fn cache(&self) -> Option<Arc<SessionCache>> {
        self.session_cache
            .as_ref()
            .map(|c| Arc::new(SessionCache::new(c.capacity, c.timeout_secs)))
    }
}

fn parse_version(v: &str) -> Result<TlsVersion, String> {
    match v {
        "1.2" | "TLSv1.2" => Ok(TlsVersion::Tls12),
        "1.3" | "TLSv1.3" => Ok(TlsVersion::Tls13),
        other => Err(format!("unsupported TLS version '{other}' (use \"1.2\" or \"1.3\")")),
    }
}

fn parse_suite(name: &str) -> Result<CipherSuite, String> {
    CipherSuiteParams::all()
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.suite)
        .ok_or_else(|| format!("unknown cipher suite '{name}'"))
}

fn parse_group(name: &str) -> Result<NamedGroup, String> {
    match name.to_lowercase().as_str() {
        "x25519" => Ok(NamedGroup::X25519),
        "secp256r1" | "p256" | "p-256" => Ok(NamedGroup::SECP256R1),
        "secp384r1" | "p384" | "p-384" => Ok(NamedGroup::SECP384R1),
        "ffdhe2048" => Ok(NamedGroup::FFDHE2048),
        "ffdhe3072" => Ok(NamedGroup::FFDHE3072),
        other => Err(format!("unknown group '{other}'")),
    }
}
