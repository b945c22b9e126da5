//! Decoding of the format's `_xHHHH_` escape sequences
//!
//! Control characters that cannot appear literally in the markup are encoded
//! as `_xHHHH_` (four hex digits), e.g.:
//! - `_x000d_` = CR (carriage return)
//! - `_x000a_` = LF (line feed)
//! - `_x0009_` = Tab
//! - `_x005f_` = Underscore (escaped underscore)

/// Decode `_xHHHH_` escape sequences in a string.
///
/// Sequences that do not match the pattern exactly (wrong length, non-hex
/// digits, no closing underscore) are passed through unchanged.
pub(crate) fn decode_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);

        // Candidate escape body: HHHH_
        let body = &tail[2..];
        let decoded = body
            .get(..5)
            .filter(|b| b.ends_with('_') && b[..4].bytes().all(|c| c.is_ascii_hexdigit()))
            .and_then(|b| u32::from_str_radix(&b[..4], 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &body[5..];
            }
            None => {
                out.push_str("_x");
                rest = body;
            }
        }
    }

    out.push_str(rest);
    out
}
