use sha2::{Digest, Sha256};

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parses a rate such as "50" or "62,5".
pub fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_hex_sha256() {
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(sha256_bytes(b"abc"), sha256_bytes(b"abd"));
    }

    #[test]
    fn parses_comma_decimals() {
        assert_eq!(parse_decimal("62,5"), Some(62.5));
        assert_eq!(parse_decimal(" 50 "), Some(50.0));
        assert_eq!(parse_decimal("fifty"), None);
    }
}
