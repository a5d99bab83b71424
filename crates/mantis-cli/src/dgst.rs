//! Hash/digest command implementation.

use mantis_crypto::hash::Hash;
use mantis_types::HashAlgId;
use std::fs;
use std::io::{self, Read};

pub fn run(algorithm: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let data = if file == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(file).map_err(|e| format!("cannot read '{file}': {e}"))?
    };

    let (digest, alg_name) = hash_data(algorithm, &data)?;
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    if file == "-" {
        println!("{alg_name}(stdin)= {hex}");
    } else {
        println!("{alg_name}({file})= {hex}");
    }
    Ok(())
}

pub(crate) fn parse_hash(algorithm: &str) -> Option<(HashAlgId, &'static str)> {
    let found = match algorithm.to_lowercase().as_str() {
        "md5" => (HashAlgId::Md5, "MD5"),
        "sha1" | "sha-1" => (HashAlgId::Sha1, "SHA1"),
        "sha224" | "sha-224" => (HashAlgId::Sha224, "SHA224"),
        "sha256" | "sha-256" => (HashAlgId::Sha256, "SHA256"),
        "sha384" | "sha-384" => (HashAlgId::Sha384, "SHA384"),
        "sha512" | "sha-512" => (HashAlgId::Sha512, "SHA512"),
        "sha3-224" => (HashAlgId::Sha3_224, "SHA3-224"),
        "sha3-256" => (HashAlgId::Sha3_256, "SHA3-256"),
        "sha3-384" => (HashAlgId::Sha3_384, "SHA3-384"),
        "sha3-512" => (HashAlgId::Sha3_512, "SHA3-512"),
        _ => return None,
    };
    Some(found)
}

fn hash_data(algorithm: &str, data: &[u8]) -> Result<(Vec<u8>, &'static str), Box<dyn std::error::Error>> {
    let (alg, name) = parse_hash(algorithm).ok_or_else(|| format!("unsupported hash algorithm: {algorithm}"))?;
    Ok((Hash::digest(alg, data)?, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_hex(data: &[u8]) -> String {
        data.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_hash_data_md5_empty() {
        let (digest, name) = hash_data("md5", b"").unwrap();
        assert_eq!(name, "MD5");
        assert_eq!(to_hex(&digest), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_hash_data_sha256_abc() {
        let (digest, name) = hash_data("sha256", b"abc").unwrap();
        assert_eq!(name, "SHA256");
        assert_eq!(
            to_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_data_output_sizes() {
        for (alg, len) in [
            ("sha1", 20),
            ("sha224", 28),
            ("sha384", 48),
            ("sha512", 64),
            ("sha3-256", 32),
            ("sha3-512", 64),
        ] {
            assert_eq!(hash_data(alg, b"").unwrap().0.len(), len, "{alg}");
        }
    }

    #[test]
    fn test_hash_data_aliases_and_case() {
        assert_eq!(hash_data("sha-256", b"x").unwrap().0, hash_data("SHA256", b"x").unwrap().0);
        assert_eq!(hash_data("sha-1", b"x").unwrap().0, hash_data("sha1", b"x").unwrap().0);
    }

    #[test]
    fn test_hash_data_unsupported_algorithm() {
        let err = hash_data("blake2b", b"data").unwrap_err();
        assert!(err.to_string().contains("unsupported hash algorithm"));
    }

    #[test]
    fn test_run_file() {
        let tmp = std::env::temp_dir().join("mantis_dgst_run.txt");
        fs::write(&tmp, b"test data for dgst").unwrap();
        assert!(run("sha256", tmp.to_str().unwrap()).is_ok());
        let _ = fs::remove_file(&tmp);
    }

    #[test]
    fn test_run_nonexistent_file() {
        assert!(run("sha256", "/nonexistent_mantis_dgst/file.txt").is_err());
    }
}
