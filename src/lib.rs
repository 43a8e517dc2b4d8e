//! flowsift - passive traffic decode engine
//!
//! Decodes reassembled network flow payloads, layer by layer, into
//! structured observations for downstream security and monitoring use.
//! The crate sits after capture and stream reassembly: callers push
//! contiguous byte spans for a flow into an [`engine::Engine`], which
//! routes each span to the protocol decoder owning that flow's context.
//!
//! Decoders can discover new flows as they parse - the SIP decoder reads
//! SDP bodies and registers the negotiated RTP endpoints, so RTP decoding
//! attaches to media streams with no prior port knowledge.
//!
//! ```no_run
//! use chrono::Utc;
//! use flowsift::config::Config;
//! use flowsift::core::{CollectSink, Endpoint, PduSlice, Transport};
//! use flowsift::engine::Engine;
//! use std::sync::Arc;
//!
//! let engine = Engine::new(Config::default());
//! let sink = Arc::new(CollectSink::new());
//! engine.add_sink(Box::new(Arc::clone(&sink)));
//!
//! let payload = b"OPTIONS sip:carol@chicago.example.com SIP/2.0\r\nCall-ID: x@y\r\n\r\n";
//! let slice = PduSlice::new(payload, Utc::now());
//! engine.deliver(
//!     Transport::Udp,
//!     Endpoint::new("198.51.100.1".parse().unwrap(), 49172),
//!     Endpoint::new("198.51.100.2".parse().unwrap(), 5060),
//!     &slice,
//! );
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod protocols;
pub mod util;

pub use config::Config;
pub use core::{Observation, ObservationRecord, ObservationSink, PduSlice};
pub use engine::Engine;
pub use error::{DecodeError, DecodeResult};
pub use protocols::ProtocolId;
