//! RTP decoder
//!
//! Header codec plus per-SSRC sequencing state. RTP flows are normally
//! wired up dynamically from SIP/SDP negotiation, so the processor claims
//! no default ports.

pub mod parser;
pub mod state;
pub mod types;

pub use state::{RtpState, SsrcState};
pub use types::RtpHeader;

use tracing::trace;

use crate::config::numeric_parameter;
use crate::context::ContextRef;
use crate::core::observation::Observation;
use crate::core::pdu::PduSlice;
use crate::engine::Engine;
use crate::error::DecodeResult;
use crate::protocols::traits::{ProtocolProcessor, ProtocolState};
use crate::protocols::ProtocolId;

pub struct RtpProcessor;

impl RtpProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RtpProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolProcessor for RtpProcessor {
    fn name(&self) -> &'static str {
        "rtp"
    }

    fn protocol(&self) -> ProtocolId {
        ProtocolId::Rtp
    }

    fn process(
        &self,
        engine: &Engine,
        ctx: &ContextRef,
        state: &mut ProtocolState,
        slice: &PduSlice<'_>,
    ) -> DecodeResult<()> {
        // Header first: a packet rejected here has not touched stream
        // state.
        let hdr = parser::parse_header(slice.bytes())?;

        let max_jump = numeric_parameter(&engine.get_parameter("rtp.max-seq-jump", "64"), 64u16);

        let rtp = state.inner_or_default::<RtpState>();
        let verdict = rtp.observe(&hdr, max_jump);

        if verdict.loss_detected {
            trace!(context = %ctx.id, ssrc = hdr.ssrc, sequence = hdr.sequence,
                   "rtp sequence anomaly");
        }

        engine.emit(
            ctx,
            slice.time(),
            Observation::RtpPacket {
                ssrc: hdr.ssrc,
                payload_type: hdr.payload_type,
                sequence: hdr.sequence,
                timestamp: hdr.timestamp,
                marker: hdr.marker,
                loss_detected: verdict.loss_detected,
            },
        );
        Ok(())
    }
}
