//! Dispatch engine
//!
//! The `Engine` is the hub a decode session runs through: it owns the
//! processor registry, the context table, the observation sinks, and the
//! parameter source. Callers push reassembled payload spans in with
//! [`Engine::deliver`]; processors call back into the engine to emit
//! observations and to register flows they discover.
//!
//! Dispatch is synchronous and run-to-completion. Slices for one context
//! are serialized by the context's state lock; slices for different
//! contexts run in parallel. A decode failure is caught at the dispatch
//! boundary, reported as a diagnostic observation, and never unwinds
//! further: state from prior well-formed packets survives and unrelated
//! contexts are untouched.

pub mod registry;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::config::{Config, Parameters};
use crate::context::{Binding, ContextId, ContextRef, ContextTable};
use crate::core::address::{Endpoint, FlowKey, Transport};
use crate::core::observation::{Observation, ObservationRecord, ObservationSink};
use crate::core::pdu::PduSlice;
use crate::protocols::{init_registry, ProtocolId};

pub use registry::ProcessorRegistry;

/// One decode session: registry, contexts, sinks, parameters.
///
/// Constructed explicitly per capture/analysis session; several engines
/// can coexist in one process.
pub struct Engine {
    registry: ProcessorRegistry,
    contexts: RwLock<ContextTable>,
    sinks: RwLock<Vec<Box<dyn ObservationSink>>>,
    params: Box<dyn Parameters>,
    device: Option<String>,
}

impl Engine {
    /// Engine with the built-in decoder set.
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, init_registry())
    }

    /// Engine with a caller-assembled registry. Port lists from the
    /// configuration are layered over the processors' defaults.
    pub fn with_registry(config: Config, mut registry: ProcessorRegistry) -> Self {
        for &port in &config.sip.ports {
            registry.register_port(Transport::Tcp, port, ProtocolId::Sip);
            registry.register_port(Transport::Udp, port, ProtocolId::Sip);
        }
        for &port in &config.tls.ports {
            registry.register_port(Transport::Tcp, port, ProtocolId::Tls);
        }

        let device = config.engine.device.clone();
        let max_contexts = config.engine.max_contexts;

        Self {
            registry,
            contexts: RwLock::new(ContextTable::new(max_contexts)),
            sinks: RwLock::new(Vec::new()),
            params: Box::new(config),
            device,
        }
    }

    /// Replace the parameter source (configuration injected from outside).
    pub fn set_parameters(&mut self, params: Box<dyn Parameters>) {
        self.params = params;
    }

    /// Register an observation sink. Rare, externally serialized.
    pub fn add_sink(&self, sink: Box<dyn ObservationSink>) {
        self.sinks.write().push(sink);
    }

    /// Parameter lookup for decoders; the default is returned when the key
    /// is absent.
    pub fn get_parameter(&self, key: &str, default: &str) -> String {
        self.params.get_parameter(key, default)
    }

    /// Entry point: route one reassembled payload span for the flow
    /// `src -> dst`.
    ///
    /// Resolution order: existing context for the flow, then a dynamic
    /// endpoint binding installed by a processor, then default-port
    /// classification. Traffic that resolves to nothing gets an
    /// unrecognised-payload context so the bytes are still accounted for.
    pub fn deliver(&self, transport: Transport, src: Endpoint, dst: Endpoint, slice: &PduSlice<'_>) {
        let key = FlowKey::new(transport, src, dst);

        let existing = self.contexts.read().by_flow(&key);
        if let Some(id) = existing {
            self.dispatch(id, slice);
            return;
        }

        let binding = {
            let table = self.contexts.read();
            table
                .binding(transport, &dst)
                .or_else(|| table.binding(transport, &src))
        };
        if let Some(binding) = binding {
            trace!(flow = %key, context = %binding.context, "flow matched dynamic binding");
            {
                let mut table = self.contexts.write();
                table.alias_flow(key, binding.context);
                table.note_binding_hit();
            }
            self.dispatch(binding.context, slice);
            return;
        }

        let protocol = self
            .registry
            .port_protocol(transport, dst.port)
            .or_else(|| self.registry.port_protocol(transport, src.port))
            .unwrap_or(ProtocolId::Unrecognised);

        let ctx = self
            .contexts
            .write()
            .create(protocol, key, None, self.device.clone(), slice.time());
        let cref = ctx.to_ref();
        debug!(flow = %key, protocol = %protocol, context = %cref.id, "new flow");
        self.emit(&cref, slice.time(), Observation::FlowStarted);
        self.dispatch(ctx.id, slice);
    }

    /// Invoke the processor registered for the context's protocol tag.
    ///
    /// No registered processor is not an error: an unrecognised-payload
    /// observation is emitted and the bytes are discarded. A processor
    /// failure becomes a decode-failure observation; this method always
    /// returns normally.
    pub fn dispatch(&self, id: ContextId, slice: &PduSlice<'_>) {
        let ctx = self.contexts.read().get(id);
        let Some(ctx) = ctx else {
            warn!(context = %id, "dispatch to unknown context");
            return;
        };
        ctx.touch(slice.time());
        let cref = ctx.to_ref();

        let Some(processor) = self.registry.get(ctx.protocol) else {
            self.emit(
                &cref,
                slice.time(),
                Observation::UnrecognisedPayload {
                    transport: ctx.flow.transport,
                    length: slice.len(),
                },
            );
            return;
        };

        let mut state = ctx.state.lock();
        state.packets += 1;
        state.last_seen = Some(slice.time());

        if let Err(err) = processor.process(self, &cref, &mut state, slice) {
            drop(state);
            debug!(context = %cref.id, error = %err, "layer decode failed");
            self.emit(
                &cref,
                slice.time(),
                Observation::DecodeFailure {
                    protocol: err.protocol().unwrap_or(cref.protocol),
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                },
            );
        }
    }

    /// Register a flow a processor has discovered (e.g., an RTP endpoint
    /// from SDP) and return its context, created on the spot so it is
    /// usable immediately. Future traffic matching the endpoint routes to
    /// it with no further registration.
    ///
    /// Re-advertisement of an endpoint already bound to the same protocol
    /// reuses the existing child (its sequencing state survives
    /// renegotiation); a conflicting advertisement replaces the binding,
    /// last writer wins.
    pub fn create_child_context(
        &self,
        parent: &ContextRef,
        protocol: ProtocolId,
        transport: Transport,
        endpoint: Endpoint,
        time: DateTime<Utc>,
    ) -> ContextId {
        let mut table = self.contexts.write();

        if let Some(existing) = table.binding(transport, &endpoint) {
            if existing.protocol == protocol && table.get(existing.context).is_some() {
                table.bind_endpoint(
                    transport,
                    endpoint,
                    Binding {
                        protocol,
                        context: existing.context,
                        owner: Some(parent.id),
                    },
                );
                trace!(endpoint = %endpoint, context = %existing.context, "endpoint re-advertised, child reused");
                return existing.context;
            }
        }

        let flow = FlowKey::new(transport, endpoint, endpoint);
        let ctx = table.create(
            protocol,
            flow,
            Some(parent.id),
            parent.device.clone(),
            time,
        );
        table.bind_endpoint(
            transport,
            endpoint,
            Binding {
                protocol,
                context: ctx.id,
                owner: Some(parent.id),
            },
        );
        let cref = ctx.to_ref();
        drop(table);

        debug!(parent = %parent.id, protocol = %protocol, endpoint = %endpoint,
               context = %cref.id, "child context created");
        self.emit(&cref, time, Observation::FlowStarted);
        cref.id
    }

    /// Retire every dynamic binding installed by `owner`. The contexts the
    /// bindings pointed at keep running; only the routing entries go.
    pub fn release_bindings(&self, owner: &ContextRef) -> usize {
        self.contexts.write().release_bindings(owner.id)
    }

    /// Retire the dynamic binding for one endpoint, if present. The bound
    /// context keeps running.
    pub fn release_binding(&self, transport: Transport, endpoint: Endpoint) -> bool {
        self.contexts.write().release_binding(transport, &endpoint)
    }

    /// Explicit teardown of a context by id. Emits a flow-ended
    /// observation. Children are untouched; they are independently
    /// addressable and independently destroyed.
    pub fn teardown(&self, id: ContextId, time: DateTime<Utc>) -> bool {
        let removed = {
            let mut table = self.contexts.write();
            let ctx = table.remove(id);
            if ctx.is_some() {
                table.release_bindings(id);
            }
            ctx
        };
        match removed {
            Some(ctx) => {
                self.emit(&ctx.to_ref(), time, Observation::FlowEnded);
                true
            }
            None => false,
        }
    }

    /// Explicit teardown by flow addressing.
    pub fn close_flow(
        &self,
        transport: Transport,
        a: Endpoint,
        b: Endpoint,
        time: DateTime<Utc>,
    ) -> bool {
        let key = FlowKey::new(transport, a, b);
        let id = self.contexts.read().by_flow(&key);
        match id {
            Some(id) => self.teardown(id, time),
            None => false,
        }
    }

    /// Forward a decoded fact to every registered sink.
    pub fn emit(&self, ctx: &ContextRef, time: DateTime<Utc>, observation: Observation) {
        let record = ObservationRecord {
            id: Uuid::new_v4(),
            time,
            context: ctx.id,
            protocol: ctx.protocol,
            device: ctx.device.clone(),
            flow: ctx.flow,
            observation,
        };
        for sink in self.sinks.read().iter() {
            sink.on_observation(&record);
        }
    }

    /// Identity snapshot of a live context.
    pub fn context(&self, id: ContextId) -> Option<ContextRef> {
        self.contexts.read().get(id).map(|c| c.to_ref())
    }

    /// Number of live contexts.
    pub fn context_count(&self) -> usize {
        self.contexts.read().len()
    }
}
