//! SIP decoder
//!
//! Parses signaling messages, correlates dialogs by Call-ID, and wires up
//! RTP decoding for media streams negotiated in SDP bodies. The engine
//! learns about RTP ports only through this decoder's child-context
//! registrations.

pub mod parser;
pub mod state;
pub mod types;

pub use state::{Dialog, SipState};
pub use types::{DialogState, HeaderBlock, MediaSummary, SipMessage, StartLine};

use chrono::Duration;
use tracing::debug;

use crate::config::numeric_parameter;
use crate::context::ContextRef;
use crate::core::address::{Endpoint, Transport};
use crate::core::observation::Observation;
use crate::core::pdu::PduSlice;
use crate::engine::Engine;
use crate::error::{DecodeError, DecodeResult};
use crate::protocols::traits::{ProtocolProcessor, ProtocolState};
use crate::protocols::ProtocolId;

pub struct SipProcessor;

impl SipProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SipProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolProcessor for SipProcessor {
    fn name(&self) -> &'static str {
        "sip"
    }

    fn protocol(&self) -> ProtocolId {
        ProtocolId::Sip
    }

    fn default_tcp_ports(&self) -> &'static [u16] {
        &[5060, 5061]
    }

    fn default_udp_ports(&self) -> &'static [u16] {
        &[5060]
    }

    fn process(
        &self,
        engine: &Engine,
        ctx: &ContextRef,
        pstate: &mut ProtocolState,
        slice: &PduSlice<'_>,
    ) -> DecodeResult<()> {
        let max_block = numeric_parameter(
            &engine.get_parameter("sip.max-header-block", "16384"),
            16_384usize,
        );

        // Parse before touching the dialog table: a malformed message must
        // leave state from prior packets intact.
        let msg = parser::parse_message(slice.bytes(), max_block)?;

        let call_id = msg
            .call_id()
            .ok_or_else(|| DecodeError::malformed(ProtocolId::Sip, "missing Call-ID header"))?
            .to_string();
        let from = msg.from().unwrap_or("<unknown>").to_string();
        let to = msg.to().unwrap_or("<unknown>").to_string();
        let cseq = msg.cseq();
        let from_tag = msg.from_tag().map(str::to_string);
        let to_tag = msg.to_tag().map(str::to_string);

        // Negotiated media first: each RTP stream advertised in the body
        // becomes a child context, routed to on first packet.
        let mut media = Vec::new();
        if msg.has_sdp_body() {
            media = parser::parse_sdp(msg.body).media;
            for stream in &media {
                if !stream.is_rtp() || stream.port == 0 {
                    continue;
                }
                let Some(addr) = stream.connection else {
                    continue;
                };
                let child = engine.create_child_context(
                    ctx,
                    ProtocolId::Rtp,
                    Transport::Udp,
                    Endpoint::new(addr, stream.port),
                    slice.time(),
                );
                debug!(context = %ctx.id, call_id = %call_id, media = %stream.media,
                       endpoint = %Endpoint::new(addr, stream.port), child = %child,
                       "media stream negotiated");
            }
        }

        let timeout = numeric_parameter(&engine.get_parameter("sip.dialog-timeout", "120"), 120i64);

        let sip = pstate.inner_or_default::<SipState>();
        sip.expire(slice.time(), Duration::seconds(timeout));

        match msg.start {
            StartLine::Request { method, uri } => {
                let dialog = sip.on_request(
                    &call_id,
                    &method,
                    from_tag.as_deref(),
                    cseq,
                    slice.time(),
                );
                if !media.is_empty() {
                    sip.set_media(&call_id, media.clone());
                }

                if dialog == DialogState::Terminated {
                    // Signaling ended this dialog: retire its media
                    // registrations so stale advertisements stop binding
                    // new flows. Live RTP contexts run on until external
                    // teardown.
                    let endpoints: Vec<Endpoint> = sip
                        .dialog(&call_id)
                        .map(|d| {
                            d.media
                                .iter()
                                .filter_map(|m| Some(Endpoint::new(m.connection?, m.port)))
                                .collect()
                        })
                        .unwrap_or_default();
                    for endpoint in endpoints {
                        engine.release_binding(Transport::Udp, endpoint);
                    }
                }

                engine.emit(
                    ctx,
                    slice.time(),
                    Observation::SipRequest {
                        method,
                        request_uri: uri,
                        call_id,
                        from,
                        to,
                        cseq,
                        dialog,
                        media,
                    },
                );
            }
            StartLine::Response { code, reason } => {
                let dialog =
                    sip.on_response(&call_id, code, to_tag.as_deref(), cseq, slice.time());
                if !media.is_empty() {
                    sip.set_media(&call_id, media.clone());
                }

                engine.emit(
                    ctx,
                    slice.time(),
                    Observation::SipResponse {
                        code,
                        reason,
                        call_id,
                        from,
                        to,
                        cseq,
                        dialog,
                        media,
                    },
                );
            }
        }

        Ok(())
    }
}
