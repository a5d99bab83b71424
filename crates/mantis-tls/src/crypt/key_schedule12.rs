//! TLS 1.2 key derivation (RFC 5246 §6.3, §8.1; RFC 7627).

use super::prf::prf;
use super::traffic_keys::{Direction, KeyMaterial};
use super::CipherSuiteParams;
use mantis_types::{HashAlgId, TlsError};
use zeroize::Zeroizing;

/// `PRF(pms, "master secret", client_random + server_random)[0..48]`.
pub fn derive_master_secret(
    alg: HashAlgId,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(alg, pre_master_secret, "master secret", &seed, 48)
}

/// Extended master secret: `session_hash` covers ClientHello through
/// ClientKeyExchange.
pub fn derive_extended_master_secret(
    alg: HashAlgId,
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    prf(alg, pre_master_secret, "extended master secret", session_hash, 48)
}

/// Both directions' keys cut from one key block.
#[derive(Debug)]
pub struct KeyBlock {
    pub client_write: KeyMaterial,
    pub server_write: KeyMaterial,
}

/// Expand the master secret and partition the key block as
/// `client MAC || server MAC || client key || server key || client IV || server IV`.
///
/// CBC suites carry an explicit per-record IV, so their IV parts are empty.
pub fn derive_key_block(
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let mac_len = params.mac_key_len();
    let key_len = params.key_len();
    let iv_len = params.fixed_iv_len();
    let block = prf(
        params.hash,
        master_secret,
        "key expansion",
        &seed,
        params.key_block_len(),
    )?;

    let mut rest: &[u8] = &block;
    let mut take = |len: usize| {
        let (head, tail) = rest.split_at(len);
        rest = tail;
        head.to_vec()
    };
    let client_mac = take(mac_len);
    let server_mac = take(mac_len);
    let client_key = take(key_len);
    let server_key = take(key_len);
    let client_iv = take(iv_len);
    let server_iv = take(iv_len);

    Ok(KeyBlock {
        client_write: KeyMaterial {
            key: client_key,
            iv: client_iv,
            mac_key: client_mac,
        },
        server_write: KeyMaterial {
            key: server_key,
            iv: server_iv,
            mac_key: server_mac,
        },
    })
}

/// Keys for one direction of a TLS 1.2 connection.
pub fn derive_traffic_keys(
    params: &CipherSuiteParams,
    master_secret: &[u8],
    direction: Direction,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyMaterial, TlsError> {
    let block = derive_key_block(params, master_secret, client_random, server_random)?;
    Ok(match direction {
        Direction::ClientWrite => block.client_write.clone(),
        Direction::ServerWrite => block.server_write.clone(),
    })
}

/// Finished `verify_data`: `PRF(master, label, Hash(handshake))[0..12]`.
pub fn compute_verify_data(
    alg: HashAlgId,
    master_secret: &[u8],
    label: &str,
    handshake_hash: &[u8],
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    prf(alg, master_secret, label, handshake_hash, 12)
}
