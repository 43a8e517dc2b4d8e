//! Core data model: PDU slices, flow addressing, observations.

pub mod address;
pub mod observation;
pub mod pdu;

pub use address::{Endpoint, FlowKey, Transport};
pub use observation::{
    CollectSink, JsonLinesSink, Observation, ObservationRecord, ObservationSink,
};
pub use pdu::PduSlice;
