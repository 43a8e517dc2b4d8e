//! Decode failure taxonomy
//!
//! Every protocol decoder reports failure through `DecodeError`. A failure
//! aborts the current layer only: the engine converts it into a diagnostic
//! observation at the dispatch boundary and carries on, so one malformed
//! slice can never disturb another context.

use thiserror::Error;

use crate::protocols::ProtocolId;

/// A single decode failure, scoped to one dispatch invocation.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// Payload does not conform to the protocol's grammar.
    #[error("malformed {protocol} payload: {reason}")]
    Malformed { protocol: ProtocolId, reason: String },

    /// Payload is structurally valid so far but too short for a declared
    /// or fixed-size field.
    #[error("truncated {protocol} payload: need {needed} bytes, have {have}")]
    Truncated {
        protocol: ProtocolId,
        needed: usize,
        have: usize,
    },

    /// Protocol version field carries a value this decoder does not speak.
    #[error("unsupported {protocol} version {version}")]
    UnsupportedVersion { protocol: ProtocolId, version: u8 },

    /// Engine-internal invariant violation. Not expected under correct
    /// configuration; aborts the offending operation only.
    #[error("internal decode error: {0}")]
    Internal(String),
}

impl DecodeError {
    pub fn malformed(protocol: ProtocolId, reason: impl Into<String>) -> Self {
        Self::Malformed {
            protocol,
            reason: reason.into(),
        }
    }

    pub fn truncated(protocol: ProtocolId, needed: usize, have: usize) -> Self {
        Self::Truncated {
            protocol,
            needed,
            have,
        }
    }

    /// Originating protocol, if the failure is protocol-scoped.
    pub fn protocol(&self) -> Option<ProtocolId> {
        match self {
            Self::Malformed { protocol, .. }
            | Self::Truncated { protocol, .. }
            | Self::UnsupportedVersion { protocol, .. } => Some(*protocol),
            Self::Internal(_) => None,
        }
    }

    /// Stable kind name for diagnostics and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::Truncated { .. } => "truncated",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::Internal(_) => "internal",
        }
    }
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
