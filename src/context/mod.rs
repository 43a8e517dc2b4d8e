//! Flow contexts
//!
//! A context is one node in the per-flow decode hierarchy: it fixes the
//! protocol tag for a flow, carries its addressing, links to the parent
//! context that discovered it, and owns the durable per-protocol decode
//! state. Contexts are addressed by stable identifiers, so a child may
//! outlive the parent that created it.

pub mod table;

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::address::FlowKey;
use crate::protocols::traits::ProtocolState;
use crate::protocols::ProtocolId;

pub use table::{Binding, ContextTable, TableStats};

/// Stable context identifier. Parent links and observation records refer
/// to contexts by id, never by pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// One addressable flow at one protocol layer.
///
/// The protocol tag never changes after creation. Decode state is guarded
/// by a mutex: slices for the same context are serialized, slices for
/// different contexts run in parallel.
pub struct Context {
    pub id: ContextId,
    pub protocol: ProtocolId,
    pub flow: FlowKey,
    pub parent: Option<ContextId>,
    pub device: Option<String>,
    pub created: DateTime<Utc>,

    /// Per-protocol decode state, mutated only under this lock and only by
    /// the owning protocol's processor.
    pub state: Mutex<ProtocolState>,

    /// Unix timestamp of the last dispatched slice, for eviction ordering.
    last_activity: AtomicI64,
}

impl Context {
    pub fn new(
        id: ContextId,
        protocol: ProtocolId,
        flow: FlowKey,
        parent: Option<ContextId>,
        device: Option<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            protocol,
            flow,
            parent,
            device,
            created,
            state: Mutex::new(ProtocolState::new()),
            last_activity: AtomicI64::new(created.timestamp()),
        }
    }

    /// Record activity without taking the state lock.
    pub fn touch(&self, time: DateTime<Utc>) {
        self.last_activity.store(time.timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Cheap identity snapshot handed to processors and observation
    /// records.
    pub fn to_ref(&self) -> ContextRef {
        ContextRef {
            id: self.id,
            protocol: self.protocol,
            flow: self.flow,
            parent: self.parent,
            device: self.device.clone(),
        }
    }
}

/// Identity snapshot of a context, safe to hold across engine calls.
#[derive(Debug, Clone)]
pub struct ContextRef {
    pub id: ContextId,
    pub protocol: ProtocolId,
    pub flow: FlowKey,
    pub parent: Option<ContextId>,
    pub device: Option<String>,
}
