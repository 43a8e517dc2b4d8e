//! Hardware address formatting

use std::fmt::Write as _;

/// Format a 6-byte hardware address as colon-separated lowercase hex. The
/// array type carries the length guarantee.
pub fn format(addr: &[u8; 6]) -> String {
    let mut out = String::with_capacity(17);
    for (i, byte) in addr.iter().enumerate() {
        if i != 0 {
            out.push(':');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
