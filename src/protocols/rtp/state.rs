//! Per-source RTP stream state
//!
//! Tracks sequencing per SSRC: last sequence number and timestamp, loss
//! and reorder counters. Anomalies are reported on the observation, never
//! rejected; a stream that jumps stays decodable.

use std::any::Any;
use std::collections::HashMap;

use crate::protocols::traits::ProtocolStateData;

use super::types::RtpHeader;

/// Sequencing verdict for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceVerdict {
    /// First packet seen from its SSRC.
    pub first: bool,
    /// Sequence did not advance by exactly one (gap, duplicate, reorder,
    /// or jump beyond the configured threshold).
    pub loss_detected: bool,
}

/// State for one synchronization source.
#[derive(Debug, Clone, Default)]
pub struct SsrcState {
    pub last_sequence: u16,
    pub last_timestamp: u32,
    pub packets: u64,
    /// Packets inferred missing from forward gaps within the jump
    /// threshold.
    pub lost: u64,
    /// Packets that arrived with a sequence decrease.
    pub reordered: u64,
    /// Largest forward jump observed.
    pub max_jump: u16,
}

/// Per-flow RTP state: one entry per SSRC seen on the flow.
#[derive(Debug, Default)]
pub struct RtpState {
    pub sources: HashMap<u32, SsrcState>,
}

impl RtpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded header into the stream state and judge its
    /// sequencing. `max_jump` bounds how large a forward gap is still
    /// counted as loss; anything larger is flagged and treated as a new
    /// sequence position.
    pub fn observe(&mut self, hdr: &RtpHeader, max_jump: u16) -> SequenceVerdict {
        let entry = self.sources.entry(hdr.ssrc);
        let state = match entry {
            std::collections::hash_map::Entry::Vacant(v) => {
                v.insert(SsrcState {
                    last_sequence: hdr.sequence,
                    last_timestamp: hdr.timestamp,
                    packets: 1,
                    ..SsrcState::default()
                });
                return SequenceVerdict {
                    first: true,
                    loss_detected: false,
                };
            }
            std::collections::hash_map::Entry::Occupied(o) => o.into_mut(),
        };

        let delta = hdr.sequence.wrapping_sub(state.last_sequence);
        let loss_detected = match delta {
            1 => false,
            0 => true, // duplicate
            d if d < 0x8000 => {
                // Forward gap.
                let gap = d - 1;
                if gap <= max_jump {
                    state.lost += gap as u64;
                } else if d > state.max_jump {
                    state.max_jump = d;
                }
                true
            }
            _ => {
                // Wrapped delta in the upper half is a decrease: late or
                // reordered packet.
                state.reordered += 1;
                true
            }
        };

        if delta >= 1 && delta < 0x8000 {
            state.last_sequence = hdr.sequence;
            state.last_timestamp = hdr.timestamp;
        }
        state.packets += 1;

        SequenceVerdict {
            first: false,
            loss_detected,
        }
    }
}

impl ProtocolStateData for RtpState {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
