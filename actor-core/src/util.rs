//! Small helpers shared by the router and worker error paths.

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Renders `bytes` as a lowercase hex string, used to describe the
/// payload of a message bounced back as a dead-letter error.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0F) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_lowercase_pairs() {
        assert_eq!(hex_dump(b""), "");
        assert_eq!(hex_dump(&[0x00, 0xAB, 0xFF]), "00abff");
    }
}
