//! Resumable sessions and the shared server-side session cache.

use crate::{CipherSuite, TlsVersion};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

/// Default lifetime of a cached session, in seconds.
pub const DEFAULT_SESSION_TIMEOUT: u64 = 500;
/// Default number of cached sessions.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// State needed to resume a connection.
///
/// For TLS 1.2 `id` is the session id and `master_secret` the master
/// secret. For TLS 1.3 `id` is the ticket and `master_secret` the
/// resumption PSK.
#[derive(Clone)]
pub struct Session {
    pub id: Vec<u8>,
    pub version: TlsVersion,
    pub cipher_suite: CipherSuite,
    pub master_secret: Vec<u8>,
    pub extended_master_secret: bool,
    /// Unix seconds.
    pub created: u64,
    /// Seconds.
    pub lifetime: u64,
    pub alpn: Option<Vec<u8>>,
    pub server_name: Option<String>,
    pub peer_certificates: Vec<Vec<u8>>,
    /// TLS 1.3 ticket age obfuscation.
    pub ticket_age_add: u32,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id_len", &self.id.len())
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("extended_master_secret", &self.extended_master_secret)
            .field("created", &self.created)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.created.saturating_add(self.lifetime)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

#[derive(Default)]
struct CacheInner {
    sessions: HashMap<Vec<u8>, Session>,
    /// Insertion order, oldest first.
    order: VecDeque<Vec<u8>>,
}

impl CacheInner {
    fn remove(&mut self, id: &[u8]) -> Option<Session> {
        let s = self.sessions.remove(id)?;
        self.order.retain(|k| k != id);
        Some(s)
    }
}

/// Bounded, expiring session store shared by server connections.
///
/// All methods take `&self`; the cache is meant to live behind an `Arc`.
pub struct SessionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    timeout: u64,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_SESSION_TIMEOUT)
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionCache {
    /// `capacity` of zero is raised to one.
    pub fn new(capacity: usize, timeout_secs: u64) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            timeout: timeout_secs,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // a panic while holding the lock leaves the map itself consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace; the lifetime is capped at the cache timeout and
    /// the oldest entry is evicted when full.
    pub fn store(&self, mut session: Session) {
        session.lifetime = session.lifetime.min(self.timeout);
        let mut inner = self.lock();
        let id = session.id.clone();
        inner.remove(&id);
        while inner.sessions.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.sessions.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(id.clone());
        inner.sessions.insert(id, session);
    }

    pub fn lookup(&self, id: &[u8]) -> Option<Session> {
        self.lookup_at(id, unix_now())
    }

    /// An expired entry is removed and reported as absent.
    pub fn lookup_at(&self, id: &[u8], now: u64) -> Option<Session> {
        let mut inner = self.lock();
        let expired = inner.sessions.get(id)?.is_expired_at(now);
        if expired {
            inner.remove(id);
            log::debug!("session cache: expired entry dropped");
            return None;
        }
        inner.sessions.get(id).cloned()
    }

    pub fn remove(&self, id: &[u8]) -> Option<Session> {
        self.lock().remove(id)
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(unix_now())
    }

    /// Returns the number of entries removed.
    pub fn evict_expired_at(&self, now: u64) -> usize {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| !s.is_expired_at(now));
        let CacheInner { sessions, order } = &mut *inner;
        order.retain(|k| sessions.contains_key(k));
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn session(id: u8, created: u64, lifetime: u64) -> Session {
        Session {
            id: vec![id; 32],
            version: TlsVersion::Tls12,
            cipher_suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            master_secret: vec![0x55; 48],
            extended_master_secret: true,
            created,
            lifetime,
            alpn: None,
            server_name: None,
            peer_certificates: Vec::new(),
            ticket_age_add: 0,
        }
    }

    #[test]
    fn test_store_lookup_remove() {
        let cache = SessionCache::new(4, 100);
        cache.store(session(1, 1000, 100));
        let got = cache.lookup_at(&[1; 32], 1050).unwrap();
        assert_eq!(got.master_secret, vec![0x55; 48]);
        assert!(cache.lookup_at(&[2; 32], 1050).is_none());
        assert!(cache.remove(&[1; 32]).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_lookup_removes() {
        let cache = SessionCache::new(4, 100);
        cache.store(session(1, 1000, 500));
        // lifetime capped to the cache timeout
        assert!(cache.lookup_at(&[1; 32], 1099).is_some());
        assert!(cache.lookup_at(&[1; 32], 1100).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = SessionCache::new(2, 100);
        cache.store(session(1, 1000, 100));
        cache.store(session(2, 1000, 100));
        cache.store(session(3, 1000, 100));
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup_at(&[1; 32], 1001).is_none());
        assert!(cache.lookup_at(&[3; 32], 1001).is_some());

        // replacing an entry does not evict another
        cache.store(session(3, 1001, 100));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evict_expired() {
        let cache = SessionCache::new(8, 1000);
        cache.store(session(1, 0, 10));
        cache.store(session(2, 0, 50));
        cache.store(session(3, 0, 100));
        assert_eq!(cache.evict_expired_at(60), 2);
        assert_eq!(cache.len(), 1);
        cache.store(session(4, 60, 10));
        cache.store(session(5, 60, 10));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_shared_between_threads() {
        let cache = Arc::new(SessionCache::new(64, 100));
        let now = unix_now();
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let c = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..8u8 {
                        c.store(session(t * 8 + i, now, 100));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 32);
        assert!(cache.lookup(&[31; 32]).is_some());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let s = format!("{:?}", session(1, 0, 1));
        assert!(!s.contains("85"));
        assert!(s.contains("Session"));
    }
}
