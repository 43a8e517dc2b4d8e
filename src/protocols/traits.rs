//! Protocol processor contract
//!
//! Every decoder implements `ProtocolProcessor`: a synchronous, pure
//! function of (engine, context, slice) that validates its layer, emits
//! observations through the engine, and may spawn child contexts for flows
//! it discovers. All durable per-flow memory lives in `ProtocolState`,
//! owned by the context and handed to the processor mutably for the length
//! of one dispatch call.

use std::any::Any;

use chrono::{DateTime, Utc};

use crate::context::ContextRef;
use crate::core::pdu::PduSlice;
use crate::engine::Engine;
use crate::error::DecodeResult;
use crate::protocols::ProtocolId;

/// One protocol decoder.
///
/// Processors hold no per-flow state of their own; a single instance is
/// shared by every context carrying its protocol tag. Failure is a
/// returned `DecodeError` and aborts the current slice only.
pub trait ProtocolProcessor: Send + Sync {
    /// Protocol identifier (e.g., "sip", "rtp").
    fn name(&self) -> &'static str;

    /// Protocol tag this processor owns.
    fn protocol(&self) -> ProtocolId;

    /// Default TCP ports classified as this protocol.
    fn default_tcp_ports(&self) -> &'static [u16] {
        &[]
    }

    /// Default UDP ports classified as this protocol.
    fn default_udp_ports(&self) -> &'static [u16] {
        &[]
    }

    /// Decode one slice within the given context.
    fn process(
        &self,
        engine: &Engine,
        ctx: &ContextRef,
        state: &mut ProtocolState,
        slice: &PduSlice<'_>,
    ) -> DecodeResult<()>;
}

/// Per-flow decode state held by a context.
///
/// The protocol-specific part is opaque to the engine: decoders downcast
/// through `ProtocolStateData`, so only the owning protocol's code ever
/// touches it.
pub struct ProtocolState {
    inner: Option<Box<dyn ProtocolStateData>>,

    /// Slices dispatched into this context.
    pub packets: u64,

    /// Arrival time of the most recent slice.
    pub last_seen: Option<DateTime<Utc>>,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self {
            inner: None,
            packets: 0,
            last_seen: None,
        }
    }

    /// Get typed inner state.
    pub fn get_inner<T: ProtocolStateData + 'static>(&self) -> Option<&T> {
        self.inner.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Get typed inner state mutably.
    pub fn get_inner_mut<T: ProtocolStateData + 'static>(&mut self) -> Option<&mut T> {
        self.inner.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Set inner state.
    pub fn set_inner<T: ProtocolStateData + 'static>(&mut self, state: T) {
        self.inner = Some(Box::new(state));
    }

    /// Get typed inner state mutably, installing `T::default()` first if
    /// no state exists yet.
    pub fn inner_or_default<T: ProtocolStateData + Default + 'static>(&mut self) -> &mut T {
        if self.get_inner::<T>().is_none() {
            self.set_inner(T::default());
        }
        // Just installed above when absent.
        self.get_inner_mut::<T>().expect("state just installed")
    }
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for protocol-specific state data.
pub trait ProtocolStateData: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
