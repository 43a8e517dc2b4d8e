//! Context table
//!
//! Arena of live contexts with the lookup structures the engine routes by:
//! an id map, a flow-key index, and the dynamic endpoint bindings that
//! processors install for flows they discover (e.g., an RTP port learned
//! from SDP).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Context, ContextId};
use crate::core::address::{Endpoint, FlowKey, Transport};
use crate::protocols::ProtocolId;

/// A dynamic registration: traffic to `endpoint` belongs to `context`.
#[derive(Debug, Clone)]
pub struct Binding {
    pub protocol: ProtocolId,
    pub context: ContextId,
    /// Context that installed the binding (e.g., the SIP dialog context),
    /// so signaling teardown can retire its own registrations.
    pub owner: Option<ContextId>,
}

/// Table statistics.
#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub created: u64,
    pub binding_hits: u64,
    pub torn_down: u64,
    pub evictions: u64,
}

/// Storage and lookup for live contexts.
pub struct ContextTable {
    contexts: HashMap<ContextId, Arc<Context>>,
    by_flow: HashMap<FlowKey, ContextId>,
    bindings: HashMap<(Transport, Endpoint), Binding>,
    next_id: u64,
    max_size: usize,
    pub stats: TableStats,
}

impl ContextTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            by_flow: HashMap::new(),
            bindings: HashMap::new(),
            next_id: 1,
            max_size,
            stats: TableStats::default(),
        }
    }

    /// Create a context and index it by its flow key.
    pub fn create(
        &mut self,
        protocol: ProtocolId,
        flow: FlowKey,
        parent: Option<ContextId>,
        device: Option<String>,
        created: DateTime<Utc>,
    ) -> Arc<Context> {
        if self.contexts.len() >= self.max_size {
            self.evict_oldest();
        }

        let id = ContextId(self.next_id);
        self.next_id += 1;

        let ctx = Arc::new(Context::new(id, protocol, flow, parent, device, created));
        self.contexts.insert(id, Arc::clone(&ctx));
        self.by_flow.insert(flow, id);
        self.stats.created += 1;
        ctx
    }

    pub fn get(&self, id: ContextId) -> Option<Arc<Context>> {
        self.contexts.get(&id).cloned()
    }

    pub fn by_flow(&self, key: &FlowKey) -> Option<ContextId> {
        self.by_flow.get(key).copied()
    }

    /// Map an additional flow key onto an existing context. Used when a
    /// dynamically bound endpoint sees its first real flow.
    pub fn alias_flow(&mut self, key: FlowKey, id: ContextId) {
        self.by_flow.insert(key, id);
    }

    /// Install or replace an endpoint binding. Last writer wins.
    pub fn bind_endpoint(
        &mut self,
        transport: Transport,
        endpoint: Endpoint,
        binding: Binding,
    ) -> Option<Binding> {
        self.bindings.insert((transport, endpoint), binding)
    }

    pub fn binding(&self, transport: Transport, endpoint: &Endpoint) -> Option<Binding> {
        self.bindings.get(&(transport, *endpoint)).cloned()
    }

    pub fn note_binding_hit(&mut self) {
        self.stats.binding_hits += 1;
    }

    /// Drop every binding installed by `owner`. The contexts the bindings
    /// pointed at are left alone; they have their own lifecycle.
    pub fn release_bindings(&mut self, owner: ContextId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|_, b| b.owner != Some(owner));
        before - self.bindings.len()
    }

    /// Drop the binding for one endpoint, if any.
    pub fn release_binding(&mut self, transport: Transport, endpoint: &Endpoint) -> bool {
        self.bindings.remove(&(transport, *endpoint)).is_some()
    }

    /// Remove a context and every lookup entry that leads to it.
    pub fn remove(&mut self, id: ContextId) -> Option<Arc<Context>> {
        let ctx = self.contexts.remove(&id)?;
        self.by_flow.retain(|_, v| *v != id);
        self.bindings.retain(|_, b| b.context != id);
        self.stats.torn_down += 1;
        Some(ctx)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Drop the longest-idle context to make room. Activity is tracked
    /// without the state lock, so eviction never waits on a dispatch.
    fn evict_oldest(&mut self) {
        if let Some(id) = self
            .contexts
            .values()
            .min_by_key(|c| c.last_activity())
            .map(|c| c.id)
        {
            if self.remove(id).is_some() {
                self.stats.torn_down -= 1;
                self.stats.evictions += 1;
            }
        }
    }
}
