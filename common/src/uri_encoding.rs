//! Percent-encoding with the semantics browsers use for whole URIs: the
//! structural characters of a query string stay literal, everything else
//! that is not an unreserved mark gets escaped.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters a whole-URI encoder leaves untouched besides alphanumerics.
const URI_RESERVED: &[u8] = b";,/?:@&=+$#";

const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    // unreserved marks
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    // reserved
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Inverse of [`encode_uri`]. Escapes that decode to a reserved character
/// are kept as-is, so an encoded `&` inside a value does not turn into a
/// separator. Malformed escapes pass through literally and invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_uri(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = bytes.get(i + 1..i + 3).and_then(hex_pair) {
                if URI_RESERVED.contains(&byte) {
                    decoded.extend_from_slice(&bytes[i..i + 3]);
                } else {
                    decoded.push(byte);
                }
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
