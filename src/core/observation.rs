//! Observations and sinks
//!
//! An `Observation` is one structured fact decoded from traffic. Decoders
//! emit them through the engine, which wraps each in an
//! `ObservationRecord` envelope and forwards it to every registered sink.
//! Delivery is best-effort fire-and-forget; sinks own their backpressure.

use std::io::Write;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::context::ContextId;
use crate::core::address::{FlowKey, Transport};
use crate::protocols::sip::types::{DialogState, MediaSummary};
use crate::protocols::tls::version::TlsVersion;
use crate::protocols::ProtocolId;

/// A decoded fact, emitted by a protocol processor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    /// A context came into existence for this flow.
    FlowStarted,

    /// A context was torn down by an explicit external signal.
    FlowEnded,

    /// SIP request seen on a signaling flow.
    SipRequest {
        method: String,
        request_uri: String,
        call_id: String,
        from: String,
        to: String,
        cseq: Option<u32>,
        dialog: DialogState,
        media: Vec<MediaSummary>,
    },

    /// SIP response seen on a signaling flow.
    SipResponse {
        code: u16,
        reason: String,
        call_id: String,
        from: String,
        to: String,
        cseq: Option<u32>,
        dialog: DialogState,
        media: Vec<MediaSummary>,
    },

    /// One RTP packet on a media flow.
    RtpPacket {
        ssrc: u32,
        payload_type: u8,
        sequence: u16,
        timestamp: u32,
        marker: bool,
        loss_detected: bool,
    },

    /// One TLS record header classified on a stream.
    TlsRecord {
        content_type: u8,
        version: TlsVersion,
        length: u16,
    },

    /// Traffic for which no processor is registered. Expected, not an
    /// error: the bytes are accounted for and discarded.
    UnrecognisedPayload { transport: Transport, length: usize },

    /// A processor failed to decode the current slice. Diagnostic only;
    /// the flow keeps its state and future slices are processed normally.
    DecodeFailure {
        protocol: ProtocolId,
        #[serde(rename = "failure_kind")]
        kind: String,
        reason: String,
    },
}

impl Observation {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Observation::FlowStarted => "flow_started",
            Observation::FlowEnded => "flow_ended",
            Observation::SipRequest { .. } => "sip_request",
            Observation::SipResponse { .. } => "sip_response",
            Observation::RtpPacket { .. } => "rtp_packet",
            Observation::TlsRecord { .. } => "tls_record",
            Observation::UnrecognisedPayload { .. } => "unrecognised_payload",
            Observation::DecodeFailure { .. } => "decode_failure",
        }
    }
}

/// Envelope carrying one observation to the sinks.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRecord {
    /// Unique record id.
    pub id: Uuid,
    /// Arrival time of the data that produced the observation.
    pub time: DateTime<Utc>,
    /// Context the observation was decoded in.
    pub context: ContextId,
    /// Protocol tag of that context.
    pub protocol: ProtocolId,
    /// Capture device label of the session, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Flow addressing of the context.
    pub flow: FlowKey,
    #[serde(flatten)]
    pub observation: Observation,
}

/// Receives emitted observations. Implementations must not block
/// indefinitely.
pub trait ObservationSink: Send + Sync {
    fn on_observation(&self, record: &ObservationRecord);
}

impl<T: ObservationSink + ?Sized> ObservationSink for std::sync::Arc<T> {
    fn on_observation(&self, record: &ObservationRecord) {
        (**self).on_observation(record)
    }
}

/// Sink that retains every record in memory. Used by tests and small
/// offline runs.
#[derive(Default)]
pub struct CollectSink {
    records: Mutex<Vec<ObservationRecord>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ObservationRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ObservationSink for CollectSink {
    fn on_observation(&self, record: &ObservationRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Sink writing one JSON document per line. Serialization failures are
/// logged and dropped; emission is fire-and-forget by contract.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> ObservationSink for JsonLinesSink<W> {
    fn on_observation(&self, record: &ObservationRecord) {
        match serde_json::to_string(record) {
            Ok(line) => {
                let mut w = self.writer.lock();
                if let Err(e) = writeln!(w, "{}", line) {
                    tracing::warn!(error = %e, "observation sink write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "observation serialization failed"),
        }
    }
}
