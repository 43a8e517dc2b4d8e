//! Processor registry
//!
//! Maps protocol identities to decoder implementations and indexes their
//! default ports for initial flow classification. Registration happens at
//! engine construction; afterwards the registry is read-only and shared by
//! every dispatch call.

use std::collections::HashMap;

use crate::core::address::Transport;
use crate::protocols::traits::ProtocolProcessor;
use crate::protocols::ProtocolId;

/// Identity → processor table with port indexes.
pub struct ProcessorRegistry {
    processors: HashMap<ProtocolId, Box<dyn ProtocolProcessor>>,
    tcp_ports: HashMap<u16, ProtocolId>,
    udp_ports: HashMap<u16, ProtocolId>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
            tcp_ports: HashMap::new(),
            udp_ports: HashMap::new(),
        }
    }

    /// Register a processor and index its default ports. A later
    /// registration for the same protocol or port wins.
    pub fn register(&mut self, processor: Box<dyn ProtocolProcessor>) {
        for &port in processor.default_tcp_ports() {
            self.tcp_ports.insert(port, processor.protocol());
        }
        for &port in processor.default_udp_ports() {
            self.udp_ports.insert(port, processor.protocol());
        }
        self.processors.insert(processor.protocol(), processor);
    }

    /// Map an extra port onto a registered protocol (configuration
    /// overrides beyond the processor defaults).
    pub fn register_port(&mut self, transport: Transport, port: u16, protocol: ProtocolId) {
        match transport {
            Transport::Tcp => self.tcp_ports.insert(port, protocol),
            Transport::Udp => self.udp_ports.insert(port, protocol),
        };
    }

    pub fn get(&self, protocol: ProtocolId) -> Option<&dyn ProtocolProcessor> {
        self.processors.get(&protocol).map(|p| p.as_ref())
    }

    /// Protocol classified for a port, if any.
    pub fn port_protocol(&self, transport: Transport, port: u16) -> Option<ProtocolId> {
        match transport {
            Transport::Tcp => self.tcp_ports.get(&port).copied(),
            Transport::Udp => self.udp_ports.get(&port).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::init_registry;

    #[test]
    fn test_init_registry_registers_decoders() {
        let registry = init_registry();
        assert!(registry.get(ProtocolId::Sip).is_some());
        assert!(registry.get(ProtocolId::Rtp).is_some());
        assert!(registry.get(ProtocolId::Tls).is_some());
        assert!(registry.get(ProtocolId::Unrecognised).is_none());
    }

    #[test]
    fn test_default_port_classification() {
        let registry = init_registry();
        assert_eq!(
            registry.port_protocol(Transport::Udp, 5060),
            Some(ProtocolId::Sip)
        );
        assert_eq!(
            registry.port_protocol(Transport::Tcp, 443),
            Some(ProtocolId::Tls)
        );
        assert_eq!(registry.port_protocol(Transport::Udp, 9), None);
    }

    #[test]
    fn test_register_port_override() {
        let mut registry = init_registry();
        registry.register_port(Transport::Udp, 5080, ProtocolId::Sip);
        assert_eq!(
            registry.port_protocol(Transport::Udp, 5080),
            Some(ProtocolId::Sip)
        );
    }
}
