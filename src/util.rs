//! Module for some utility functions shared by the codec, its tests and the
//! server's debug logging.

/// Parse a wireshark-style hex dump into bytes. Each line starts with an
/// offset column which is discarded:
///
/// ```
/// use dnsgate::util::get_sample_slice;
///
/// let sample = r#"
/// 0000   76 86 81 a0
/// 0004   00 01
/// "#;
/// assert_eq!(get_sample_slice(sample), &[0x76, 0x86, 0x81, 0xa0, 0x00, 0x01]);
/// ```
pub fn get_sample_slice(sample: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for line in sample.lines() {
        let mut tokens = line.split_whitespace();
        // skip the offset column
        if tokens.next().is_none() {
            continue;
        }
        for token in tokens {
            if let Ok(b) = u8::from_str_radix(token, 16) {
                bytes.push(b);
            }
        }
    }
    bytes
}

/// Render a buffer as spaced uppercase hex for debug logging.
pub fn hex_buffer(buffer: &[u8]) -> String {
    buffer
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_parsing() {
        let sample = r#"
0000   5c 7d 81 80 00 01 00 00 00 00 00 00
"#;
        let bytes = get_sample_slice(sample);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes[0], 0x5c);
        assert_eq!(bytes[11], 0x00);
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(hex_buffer(&[0x00, 0xab, 0x10]), "00 AB 10");
    }
}
