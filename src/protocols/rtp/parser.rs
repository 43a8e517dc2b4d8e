//! RTP header codec
//!
//! Fixed 12-byte header, then `4 * CC` bytes of CSRC identifiers, then an
//! optional extension of 4 + `4 * L` bytes where L is the extension length
//! field in 32-bit words. The version field is checked before anything
//! else so a rejected packet can never have touched stream state.

use crate::error::{DecodeError, DecodeResult};
use crate::protocols::ProtocolId;

use super::types::RtpHeader;

/// The only version this decoder speaks.
pub const RTP_VERSION: u8 = 2;

/// Length of the fixed part of the header.
pub const FIXED_HEADER_LEN: usize = 12;

/// Decode the header at the front of `data`.
pub fn parse_header(data: &[u8]) -> DecodeResult<RtpHeader> {
    if data.len() < FIXED_HEADER_LEN {
        return Err(DecodeError::truncated(
            ProtocolId::Rtp,
            FIXED_HEADER_LEN,
            data.len(),
        ));
    }

    let version = data[0] >> 6;
    if version != RTP_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            protocol: ProtocolId::Rtp,
            version,
        });
    }

    let padding = data[0] & 0x20 != 0;
    let extension = data[0] & 0x10 != 0;
    let csrc_count = (data[0] & 0x0f) as usize;
    let marker = data[1] & 0x80 != 0;
    let payload_type = data[1] & 0x7f;
    let sequence = u16::from_be_bytes([data[2], data[3]]);
    let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    let mut header_len = FIXED_HEADER_LEN + 4 * csrc_count;
    if data.len() < header_len {
        return Err(DecodeError::truncated(ProtocolId::Rtp, header_len, data.len()));
    }

    let mut csrcs = Vec::with_capacity(csrc_count);
    for i in 0..csrc_count {
        let off = FIXED_HEADER_LEN + 4 * i;
        csrcs.push(u32::from_be_bytes([
            data[off],
            data[off + 1],
            data[off + 2],
            data[off + 3],
        ]));
    }

    let mut extension_profile = None;
    if extension {
        if data.len() < header_len + 4 {
            return Err(DecodeError::truncated(
                ProtocolId::Rtp,
                header_len + 4,
                data.len(),
            ));
        }
        let profile = u16::from_be_bytes([data[header_len], data[header_len + 1]]);
        let words = u16::from_be_bytes([data[header_len + 2], data[header_len + 3]]) as usize;
        header_len += 4 + 4 * words;
        if data.len() < header_len {
            return Err(DecodeError::truncated(ProtocolId::Rtp, header_len, data.len()));
        }
        extension_profile = Some(profile);
    }

    Ok(RtpHeader {
        version,
        padding,
        extension,
        marker,
        payload_type,
        sequence,
        timestamp,
        ssrc,
        csrcs,
        extension_profile,
        header_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid header: version 2, no padding/extension/CSRCs,
    /// marker set, payload type 0 (PCMU), seq 0x1234, ts 0x11223344,
    /// ssrc 0xdeadbeef.
    fn base_header() -> Vec<u8> {
        vec![
            0x80, 0x80, 0x12, 0x34, 0x11, 0x22, 0x33, 0x44, 0xde, 0xad, 0xbe, 0xef,
        ]
    }

    #[test]
    fn test_fixed_header() {
        let hdr = parse_header(&base_header()).unwrap();
        assert_eq!(hdr.version, 2);
        assert!(!hdr.padding);
        assert!(!hdr.extension);
        assert!(hdr.marker);
        assert_eq!(hdr.payload_type, 0);
        assert_eq!(hdr.sequence, 0x1234);
        assert_eq!(hdr.timestamp, 0x1122_3344);
        assert_eq!(hdr.ssrc, 0xdead_beef);
        assert_eq!(hdr.header_len, 12);
    }

    #[test]
    fn test_header_len_counts_csrcs() {
        for cc in 0..=15usize {
            let mut data = base_header();
            data[0] = 0x80 | cc as u8;
            for i in 0..cc {
                data.extend_from_slice(&(i as u32).to_be_bytes());
            }
            let hdr = parse_header(&data).unwrap();
            assert_eq!(hdr.header_len, 12 + 4 * cc);
            assert_eq!(hdr.csrc_count() as usize, cc);
        }
    }

    #[test]
    fn test_header_len_counts_extension_words() {
        for words in [0usize, 1, 3] {
            let mut data = base_header();
            data[0] = 0x90; // version 2 + extension flag
            data.extend_from_slice(&0xbedeu16.to_be_bytes());
            data.extend_from_slice(&(words as u16).to_be_bytes());
            data.extend(std::iter::repeat(0u8).take(4 * words));
            let hdr = parse_header(&data).unwrap();
            assert_eq!(hdr.header_len, 12 + 4 + 4 * words);
            assert_eq!(hdr.extension_profile, Some(0xbede));
        }
    }

    #[test]
    fn test_wrong_version_rejected() {
        for version in [0u8, 1, 3] {
            let mut data = base_header();
            data[0] = version << 6;
            let err = parse_header(&data).unwrap_err();
            assert_eq!(err.kind(), "unsupported_version");
        }
    }

    #[test]
    fn test_short_fixed_header_rejected() {
        let err = parse_header(&base_header()[..8]).unwrap_err();
        assert_eq!(err.kind(), "truncated");
    }

    #[test]
    fn test_declared_extension_longer_than_slice_rejected() {
        let mut data = base_header();
        data[0] = 0x90;
        data.extend_from_slice(&0x1000u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes()); // claims 16 bytes
        data.extend_from_slice(&[0u8; 8]); // only 8 present
        let err = parse_header(&data).unwrap_err();
        assert_eq!(err.kind(), "truncated");
    }

    #[test]
    fn test_missing_csrcs_rejected() {
        let mut data = base_header();
        data[0] = 0x83; // claims 3 CSRCs, none present
        let err = parse_header(&data).unwrap_err();
        assert_eq!(err.kind(), "truncated");
    }
}
