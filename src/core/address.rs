//! Flow addressing
//!
//! Endpoint and flow-key types used to look contexts up. Flow keys are
//! normalized so that both directions of a conversation resolve to the same
//! context.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Transport carrying the payload span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

/// One side of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ip {
            IpAddr::V4(ip) => write!(f, "{}:{}", ip, self.port),
            IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, self.port),
        }
    }
}

/// Normalized flow key: the lower endpoint always comes first, so a packet
/// and its reply map to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub transport: Transport,
    pub lower: Endpoint,
    pub upper: Endpoint,
}

impl FlowKey {
    pub fn new(transport: Transport, a: Endpoint, b: Endpoint) -> Self {
        if a <= b {
            Self {
                transport,
                lower: a,
                upper: b,
            }
        } else {
            Self {
                transport,
                lower: b,
                upper: a,
            }
        }
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} <-> {}", self.transport, self.lower, self.upper)
    }
}
