//! Protocol decoders
//!
//! Each protocol module implements the `ProtocolProcessor` trait and keeps
//! its per-flow memory in a `ProtocolStateData` value owned by the flow's
//! context. `init_registry` assembles the built-in decoder set; callers
//! can register additional processors without touching this crate.

pub mod rtp;
pub mod sip;
pub mod tls;
pub mod traits;

pub use traits::{ProtocolProcessor, ProtocolState, ProtocolStateData};

use serde::{Deserialize, Serialize};

use crate::engine::registry::ProcessorRegistry;

/// Protocol identity: the tag that fixes which decoder owns a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolId {
    Sip,
    Rtp,
    Tls,
    /// Traffic no decoder claims; kept addressable so the bytes are still
    /// accounted for.
    Unrecognised,
}

impl std::fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolId::Sip => write!(f, "sip"),
            ProtocolId::Rtp => write!(f, "rtp"),
            ProtocolId::Tls => write!(f, "tls"),
            ProtocolId::Unrecognised => write!(f, "unrecognised"),
        }
    }
}

impl std::str::FromStr for ProtocolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sip" => Ok(ProtocolId::Sip),
            "rtp" => Ok(ProtocolId::Rtp),
            "tls" => Ok(ProtocolId::Tls),
            "unrecognised" | "unrecognized" => Ok(ProtocolId::Unrecognised),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// Registry with the built-in decoder set.
pub fn init_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Box::new(sip::SipProcessor::new()));
    registry.register(Box::new(rtp::RtpProcessor::new()));
    registry.register(Box::new(tls::TlsProcessor::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_id_round_trip() {
        for (id, name) in [
            (ProtocolId::Sip, "sip"),
            (ProtocolId::Rtp, "rtp"),
            (ProtocolId::Tls, "tls"),
            (ProtocolId::Unrecognised, "unrecognised"),
        ] {
            assert_eq!(id.to_string(), name);
            assert_eq!(name.parse::<ProtocolId>().unwrap(), id);
        }
        assert!("quic".parse::<ProtocolId>().is_err());
    }
}
