// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery state machine.

use super::{Channel, DataPlane, DatagramSink};
use crate::config::PROTOCOL_VERSION;
use crate::core::Guid;
use crate::error::{Error, Result};
use crate::protocol::{decode_datagram, Advertisement, DiscoveryHeader, DiscoveryMessage, MessageType};
use crate::registry::{ConnectionLedger, Role, TopicRegistry};
use crate::transport::is_inproc_address;

/// What handling a datagram did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Sent by this node; dropped.
    SelfMessage,
    /// Protocol version mismatch; dropped.
    VersionMismatch(u16),
    /// Address recorded, no local interest in the name.
    Registered,
    /// Address already linked on this channel; name marked connected.
    AlreadyConnected,
    /// Address refused by the loopback-affinity rule.
    Rejected,
    /// New data-plane connection made.
    Connected,
    /// SUB for a name advertised here; this many ADVs were resent.
    Readvertised(usize),
    /// SUB for a name not advertised here.
    Ignored,
}

/// Inproc endpoints are only ever linked for our own advertisements, network
/// endpoints only for other nodes'.
pub fn loopback_affinity_allows(address: &str, sender_is_self: bool) -> bool {
    is_inproc_address(address) == sender_is_self
}

/// Per-node discovery state: identity, both registries and both ledgers.
#[derive(Debug)]
pub struct DiscoveryEngine {
    guid: Guid,
    topics: TopicRegistry,
    services: TopicRegistry,
    topic_ledger: ConnectionLedger,
    service_ledger: ConnectionLedger,
    topic_addresses: Vec<String>,
    service_addresses: Vec<String>,
}

impl DiscoveryEngine {
    pub fn new(guid: Guid) -> Self {
        Self {
            guid,
            topics: TopicRegistry::new(),
            services: TopicRegistry::new(),
            topic_ledger: ConnectionLedger::new(),
            service_ledger: ConnectionLedger::new(),
            topic_addresses: Vec::new(),
            service_addresses: Vec::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn registry(&self, channel: Channel) -> &TopicRegistry {
        match channel {
            Channel::Topic => &self.topics,
            Channel::Service => &self.services,
        }
    }

    pub fn registry_mut(&mut self, channel: Channel) -> &mut TopicRegistry {
        match channel {
            Channel::Topic => &mut self.topics,
            Channel::Service => &mut self.services,
        }
    }

    pub fn ledger(&self, channel: Channel) -> &ConnectionLedger {
        match channel {
            Channel::Topic => &self.topic_ledger,
            Channel::Service => &self.service_ledger,
        }
    }

    /// Record an endpoint this node serves on `channel`.
    ///
    /// Only network endpoints are advertised; inproc endpoints never leave
    /// the process.
    pub fn add_local_address(&mut self, channel: Channel, address: impl Into<String>) {
        let address = address.into();
        if is_inproc_address(&address) {
            return;
        }
        let addresses = match channel {
            Channel::Topic => &mut self.topic_addresses,
            Channel::Service => &mut self.service_addresses,
        };
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }

    pub fn local_addresses(&self, channel: Channel) -> &[String] {
        match channel {
            Channel::Topic => &self.topic_addresses,
            Channel::Service => &self.service_addresses,
        }
    }

    // ===== Sending =====

    /// Broadcast an ADV / ADV_SVC for `name` at `address`.
    pub fn send_advertisement(
        &self,
        sink: &mut dyn DatagramSink,
        kind: MessageType,
        name: &str,
        address: &str,
    ) -> Result<()> {
        let header = DiscoveryHeader::new(self.guid, name, kind);
        let bytes = Advertisement::new(header, address).encode()?;
        sink.send_datagram(&bytes)
            .map_err(|e| Error::SendFailed(format!("{} {}: {}", kind, name, e)))?;
        log::debug!("[DISC] sent {} topic={} addr={}", kind, name, address);
        Ok(())
    }

    /// Broadcast a SUB / SUB_SVC for `name`.
    pub fn send_subscription(
        &self,
        sink: &mut dyn DatagramSink,
        kind: MessageType,
        name: &str,
    ) -> Result<()> {
        let bytes = DiscoveryHeader::new(self.guid, name, kind).encode()?;
        sink.send_datagram(&bytes)
            .map_err(|e| Error::SendFailed(format!("{} {}: {}", kind, name, e)))?;
        log::debug!("[DISC] sent {} topic={}", kind, name);
        Ok(())
    }

    /// Advertise `name` on every local endpoint of its channel.
    pub fn advertise_all(
        &self,
        sink: &mut dyn DatagramSink,
        channel: Channel,
        name: &str,
    ) -> Result<usize> {
        let kind = channel.advertise_kind();
        for address in self.local_addresses(channel) {
            self.send_advertisement(sink, kind, name, address)?;
        }
        Ok(self.local_addresses(channel).len())
    }

    // ===== Receiving =====

    /// Decode and act on one raw datagram.
    pub fn handle_datagram(
        &mut self,
        bytes: &[u8],
        plane: &mut dyn DataPlane,
        sink: &mut dyn DatagramSink,
    ) -> Result<Handled> {
        let message = decode_datagram(bytes)?;
        self.handle_message(message, plane, sink)
    }

    /// Act on one decoded discovery message.
    pub fn handle_message(
        &mut self,
        message: DiscoveryMessage,
        plane: &mut dyn DataPlane,
        sink: &mut dyn DatagramSink,
    ) -> Result<Handled> {
        let header = message.header();
        if header.version != PROTOCOL_VERSION {
            log::debug!(
                "[DISC] dropping {} with version {} (expected {})",
                header.kind,
                header.version,
                PROTOCOL_VERSION
            );
            return Ok(Handled::VersionMismatch(header.version));
        }
        if header.sender == self.guid {
            return Ok(Handled::SelfMessage);
        }

        match message {
            DiscoveryMessage::Advertise(adv) => self.on_advertisement(adv, plane),
            DiscoveryMessage::Subscribe(header) => self.on_subscription(&header, sink),
        }
    }

    fn on_advertisement(
        &mut self,
        adv: Advertisement,
        plane: &mut dyn DataPlane,
    ) -> Result<Handled> {
        let channel = Channel::of(adv.header.kind);
        let sender_is_self = adv.header.sender == self.guid;
        let name = adv.header.topic.as_str();
        let address = adv.address.as_str();

        let (registry, ledger) = match channel {
            Channel::Topic => (&mut self.topics, &mut self.topic_ledger),
            Channel::Service => (&mut self.services, &mut self.service_ledger),
        };

        if registry.add_known_address(name, address) {
            log::debug!("[DISC] {} {} at {} from {}", adv.header.kind, name, address, adv.header.sender);
        }
        if !registry.has_role(name, Role::Subscribed) {
            return Ok(Handled::Registered);
        }

        if ledger.contains(address) {
            // The existing link already carries every name served there
            registry.set_connected(name, true);
            return Ok(Handled::AlreadyConnected);
        }

        if !loopback_affinity_allows(address, sender_is_self) {
            log::debug!("[DISC] refusing {} for {} (loopback affinity)", address, name);
            return Ok(Handled::Rejected);
        }

        plane.connect(channel, address)?;
        if channel == Channel::Topic {
            plane.subscribe_filter(name)?;
        }
        registry.set_connected(name, true);
        ledger.record(address);
        log::info!("[DISC] connected {} -> {}", name, address);
        Ok(Handled::Connected)
    }

    fn on_subscription(
        &mut self,
        header: &DiscoveryHeader,
        sink: &mut dyn DatagramSink,
    ) -> Result<Handled> {
        let channel = Channel::of(header.kind);
        if !self.registry(channel).has_role(&header.topic, Role::Advertised) {
            return Ok(Handled::Ignored);
        }
        let sent = self.advertise_all(sink, channel, &header.topic)?;
        log::debug!("[DISC] {} {} answered with {} ADV", header.kind, header.topic, sent);
        Ok(Handled::Readvertised(sent))
    }

    // ===== Link loss =====

    /// Forget a data-plane link that closed.
    ///
    /// The address leaves the ledger and every record that knew it, so a
    /// later advertisement from it connects again. A name stays connected
    /// only while another of its addresses is still linked. Returns the names
    /// that lost their connection.
    pub fn forget_link(&mut self, channel: Channel, address: &str) -> Vec<String> {
        let (registry, ledger) = match channel {
            Channel::Topic => (&mut self.topics, &mut self.topic_ledger),
            Channel::Service => (&mut self.services, &mut self.service_ledger),
        };
        ledger.forget(address);

        let mut disconnected = Vec::new();
        for name in registry.names_with_address(address) {
            let was_connected = registry.is_connected(&name);
            registry.remove_known_address(&name, address);
            let still_linked = registry
                .known_addresses(&name)
                .iter()
                .any(|other| ledger.contains(other));
            if !still_linked {
                registry.set_connected(&name, false);
                if was_connected {
                    disconnected.push(name);
                }
            }
        }
        log::debug!("[DISC] link to {} lost, disconnected {:?}", address, disconnected);
        disconnected
    }
}
