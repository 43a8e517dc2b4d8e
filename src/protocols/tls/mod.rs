//! TLS record classification
//!
//! Classifies record headers on a stream: content type, version label,
//! declared length. Record payloads are opaque here; there is no handshake
//! decode and no decryption.

pub mod version;

pub use version::TlsVersion;

use tracing::trace;

use crate::context::ContextRef;
use crate::core::observation::Observation;
use crate::core::pdu::PduSlice;
use crate::engine::Engine;
use crate::error::{DecodeError, DecodeResult};
use crate::protocols::traits::{ProtocolProcessor, ProtocolState};
use crate::protocols::ProtocolId;

/// Record header length on the wire.
pub const RECORD_HEADER_LEN: usize = 5;

/// Lowest and highest assigned record content types (change_cipher_spec
/// through heartbeat).
const CONTENT_TYPE_MIN: u8 = 20;
const CONTENT_TYPE_MAX: u8 = 24;

/// Largest legal record payload: 2^14 plus expansion allowance.
const MAX_RECORD_LEN: u16 = 16_384 + 2_048;

pub struct TlsProcessor;

impl TlsProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TlsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolProcessor for TlsProcessor {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn protocol(&self) -> ProtocolId {
        ProtocolId::Tls
    }

    fn default_tcp_ports(&self) -> &'static [u16] {
        &[443, 8443, 993, 995, 465]
    }

    fn process(
        &self,
        engine: &Engine,
        ctx: &ContextRef,
        _state: &mut ProtocolState,
        slice: &PduSlice<'_>,
    ) -> DecodeResult<()> {
        let mut rest = *slice;
        let mut records = 0usize;

        while !rest.is_empty() {
            let bytes = rest.bytes();
            if bytes.len() < RECORD_HEADER_LEN {
                if records == 0 {
                    return Err(DecodeError::truncated(
                        ProtocolId::Tls,
                        RECORD_HEADER_LEN,
                        bytes.len(),
                    ));
                }
                // Trailing partial header after complete records; the next
                // reassembled span will carry it whole.
                break;
            }

            let content_type = bytes[0];
            if !(CONTENT_TYPE_MIN..=CONTENT_TYPE_MAX).contains(&content_type) {
                return Err(DecodeError::malformed(
                    ProtocolId::Tls,
                    format!("record content type {}", content_type),
                ));
            }

            let version = TlsVersion::from_bytes(bytes[1], bytes[2]);
            let length = u16::from_be_bytes([bytes[3], bytes[4]]);
            if length > MAX_RECORD_LEN {
                return Err(DecodeError::malformed(
                    ProtocolId::Tls,
                    format!("record length {} exceeds maximum", length),
                ));
            }

            engine.emit(
                ctx,
                slice.time(),
                Observation::TlsRecord {
                    content_type,
                    version,
                    length,
                },
            );
            records += 1;
            trace!(context = %ctx.id, %version, length, "tls record");

            let consumed = RECORD_HEADER_LEN + length as usize;
            match rest.advance(consumed.min(rest.len())) {
                Some(next) => rest = next,
                None => break,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_constants() {
        assert_eq!(RECORD_HEADER_LEN, 5);
        assert!(CONTENT_TYPE_MIN < CONTENT_TYPE_MAX);
    }
}
