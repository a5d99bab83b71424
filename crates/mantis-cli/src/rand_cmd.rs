//! Random bytes from a freshly seeded DRBG, printed as hex.

use mantis_crypto::drbg::Drbg;

const MAX_BYTES: usize = 1 << 20;

pub fn run(num: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", random_hex(num)?);
    Ok(())
}

fn random_hex(num: usize) -> Result<String, Box<dyn std::error::Error>> {
    if num == 0 || num > MAX_BYTES {
        return Err(format!("num must be between 1 and {MAX_BYTES}").into());
    }
    let mut drbg = Drbg::from_os()?;
    let mut buf = vec![0u8; num];
    drbg.generate(&mut buf)?;
    Ok(buf.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_length() {
        let hex = random_hex(16).unwrap();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(random_hex(16).unwrap(), hex);
    }

    #[test]
    fn test_random_hex_bounds() {
        assert!(random_hex(0).is_err());
        assert!(random_hex(MAX_BYTES + 1).is_err());
    }
}
