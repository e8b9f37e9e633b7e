// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime state of an initialized node and its dispatch step.
//!
//! A [`Session`] exists between `init()` and `close()`. It owns the discovery
//! engine, the transport with its four sockets and the broadcast socket.
//! [`Session::run_once`] is one turn of the cooperative loop: flush queued
//! async requests, poll, then dispatch at most one event per handle in fixed
//! order (discovery, subscriber, requester, replier).

use crate::config::{NodeConfig, UDP_MAX_SIZE};
use crate::core::Guid;
use crate::discovery::{Channel, DataPlane, DiscoveryEngine, Handled};
use crate::error::{Error, Result};
use crate::registry::Role;
use crate::transport::{
    broadcast_for, local_ipv4, BroadcastSocket, Endpoint, Incoming, PeerId, SocketId, SocketKind,
    Transport,
};
use mio::Token;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Reply slot used by a blocking request while it waits.
#[derive(Debug)]
struct AwaitedReply {
    name: String,
    response: Option<Vec<u8>>,
}

pub(crate) struct Session {
    pub(crate) engine: DiscoveryEngine,
    transport: Transport,
    broadcast: BroadcastSocket,
    broadcast_token: Token,
    publisher: SocketId,
    subscriber: SocketId,
    requester: SocketId,
    replier: SocketId,
    publisher_endpoint: Endpoint,
    service_endpoint: Endpoint,
    /// Subscriber links by publisher address
    topic_peers: HashMap<String, PeerId>,
    /// Requester links by provider address
    service_peers: HashMap<String, PeerId>,
    awaited: Option<AwaitedReply>,
    recv_buf: Vec<u8>,
}

/// Connection actions routed to the session's sockets.
struct Plane<'a> {
    transport: &'a mut Transport,
    subscriber: SocketId,
    requester: SocketId,
    topic_peers: &'a mut HashMap<String, PeerId>,
    service_peers: &'a mut HashMap<String, PeerId>,
}

impl DataPlane for Plane<'_> {
    fn connect(&mut self, channel: Channel, address: &str) -> Result<()> {
        let endpoint: Endpoint = address.parse()?;
        let socket = match channel {
            Channel::Topic => self.subscriber,
            Channel::Service => self.requester,
        };
        let peer = self
            .transport
            .connect(socket, &endpoint)
            .map_err(|e| Error::ConnectFailed(format!("{}: {}", address, e)))?;
        let peers = match channel {
            Channel::Topic => &mut *self.topic_peers,
            Channel::Service => &mut *self.service_peers,
        };
        peers.insert(address.to_owned(), peer);
        Ok(())
    }

    fn subscribe_filter(&mut self, topic: &str) -> Result<()> {
        self.transport
            .set_receive_filter(self.subscriber, topic.as_bytes())?;
        Ok(())
    }
}

/// Forget every link of `socket` the transport has closed.
fn reap_links(
    engine: &mut DiscoveryEngine,
    transport: &Transport,
    channel: Channel,
    socket: SocketId,
    peers: &mut HashMap<String, PeerId>,
) {
    let closed: Vec<String> = peers
        .iter()
        .filter(|(_, peer)| !transport.has_peer(socket, **peer))
        .map(|(address, _)| address.clone())
        .collect();
    for address in closed {
        peers.remove(&address);
        let lost = engine.forget_link(channel, &address);
        if !lost.is_empty() {
            log::info!("[NODE] lost {} ({:?})", address, lost);
        }
    }
}

/// Resolve the local address: configured, detected, else loopback.
fn resolve_local_ip(config: &NodeConfig) -> Ipv4Addr {
    if let Some(ip) = config.local_ip {
        return ip;
    }
    local_ipv4().unwrap_or_else(|| {
        log::warn!("[NODE] no non-loopback IPv4 interface, falling back to 127.0.0.1");
        Ipv4Addr::LOCALHOST
    })
}

impl Session {
    /// Open every socket of a node.
    pub(crate) fn open(config: &NodeConfig) -> Result<Self> {
        let guid = Guid::generate();
        let local_ip = resolve_local_ip(config);
        let broadcast_ip = config
            .broadcast_ip
            .unwrap_or_else(|| broadcast_for(local_ip));

        let mut broadcast = BroadcastSocket::open(config.discovery_port, broadcast_ip).map_err(|e| {
            Error::BindFailed(format!("udp 0.0.0.0:{}: {}", config.discovery_port, e))
        })?;
        let mut transport = Transport::new(config.max_message_size)?;
        let broadcast_token = transport.register_source(broadcast.source_mut())?;

        let publisher = transport.socket(SocketKind::Publisher);
        let subscriber = transport.socket(SocketKind::Subscriber);
        let requester = transport.socket(SocketKind::Requester);
        let replier = transport.socket(SocketKind::Replier);

        let bind = |transport: &mut Transport, socket, endpoint: Endpoint| {
            transport
                .bind(socket, &endpoint)
                .map_err(|e| Error::BindFailed(format!("{}: {}", endpoint, e)))
        };

        let publisher_endpoint = bind(&mut transport, publisher, Endpoint::tcp((local_ip, 0u16)))?;
        let loopback = bind(&mut transport, publisher, Endpoint::inproc(guid.inproc_name()))?;
        // Self-delivery: local subscriptions see local publications
        transport
            .connect(subscriber, &loopback)
            .map_err(|e| Error::ConnectFailed(format!("{}: {}", loopback, e)))?;
        let service_endpoint = bind(&mut transport, replier, Endpoint::tcp((local_ip, 0u16)))?;

        let mut engine = DiscoveryEngine::new(guid);
        engine.add_local_address(Channel::Topic, publisher_endpoint.to_string());
        engine.add_local_address(Channel::Service, service_endpoint.to_string());

        log::info!(
            "[NODE] {} up: pub={} srv={} discovery={}",
            guid,
            publisher_endpoint,
            service_endpoint,
            broadcast.target()
        );

        Ok(Self {
            engine,
            transport,
            broadcast,
            broadcast_token,
            publisher,
            subscriber,
            requester,
            replier,
            publisher_endpoint,
            service_endpoint,
            topic_peers: HashMap::new(),
            service_peers: HashMap::new(),
            awaited: None,
            recv_buf: vec![0u8; UDP_MAX_SIZE],
        })
    }

    pub(crate) fn guid(&self) -> Guid {
        self.engine.guid()
    }

    pub(crate) fn publisher_endpoint(&self) -> &Endpoint {
        &self.publisher_endpoint
    }

    pub(crate) fn service_endpoint(&self) -> &Endpoint {
        &self.service_endpoint
    }

    pub(crate) fn broadcast_target(&self) -> SocketAddr {
        self.broadcast.target()
    }

    pub(crate) fn publisher_peer_count(&self) -> usize {
        self.transport.peer_count(self.publisher)
    }

    // ===== Discovery sends =====

    /// Broadcast ADV/ADV_SVC for `name` on every local endpoint of `channel`.
    pub(crate) fn advertise(&mut self, channel: Channel, name: &str) -> Result<()> {
        self.engine.advertise_all(&mut self.broadcast, channel, name)?;
        Ok(())
    }

    /// Broadcast SUB/SUB_SVC for `name`.
    pub(crate) fn solicit(&mut self, channel: Channel, name: &str) -> Result<()> {
        self.engine
            .send_subscription(&mut self.broadcast, channel.subscribe_kind(), name)
    }

    // ===== Data plane =====

    pub(crate) fn set_topic_filter(&mut self, topic: &str, on: bool) -> Result<()> {
        let prefix = topic.as_bytes();
        if on {
            self.transport.set_receive_filter(self.subscriber, prefix)?;
        } else {
            self.transport.remove_receive_filter(self.subscriber, prefix)?;
        }
        Ok(())
    }

    pub(crate) fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        let sender = self.publisher_endpoint.to_string();
        let parts: [&[u8]; 3] = [topic.as_bytes(), sender.as_bytes(), payload];
        self.transport
            .send(self.publisher, &parts)
            .map_err(|e| Error::SendFailed(format!("publish {}: {}", topic, e)))
    }

    /// Send one request frame, preferring a link to a known provider of `name`.
    pub(crate) fn send_request(&mut self, name: &str, payload: &[u8]) -> Result<()> {
        let sender = self.service_endpoint.to_string();
        let parts: [&[u8]; 3] = [name.as_bytes(), sender.as_bytes(), payload];

        let provider = self
            .engine
            .registry(Channel::Service)
            .known_addresses(name)
            .iter()
            .filter_map(|address| self.service_peers.get(address).copied())
            .find(|peer| self.transport.has_peer(self.requester, *peer));

        let sent = match provider {
            Some(peer) => self.transport.send_to(self.requester, peer, &parts),
            None => self.transport.send(self.requester, &parts),
        };
        sent.map_err(|e| Error::SendFailed(format!("request {}: {}", name, e)))?;
        log::debug!("[NODE] request sent to {} ({} bytes)", name, payload.len());
        Ok(())
    }

    /// Start capturing the next reply for `name` instead of dispatching it.
    pub(crate) fn await_reply(&mut self, name: &str) {
        self.awaited = Some(AwaitedReply {
            name: name.to_owned(),
            response: None,
        });
    }

    /// Captured reply, if one arrived. Ends the capture either way.
    pub(crate) fn take_awaited(&mut self) -> Option<Vec<u8>> {
        self.awaited.take().and_then(|slot| slot.response)
    }

    pub(crate) fn has_awaited_reply(&self) -> bool {
        self.awaited
            .as_ref()
            .is_some_and(|slot| slot.response.is_some())
    }

    // ===== Loop step =====

    fn has_buffered_work(&self) -> bool {
        self.transport.source_ready(self.broadcast_token)
            || self.transport.has_pending(self.subscriber)
            || self.transport.has_pending(self.requester)
            || self.transport.has_pending(self.replier)
    }

    /// One turn of the loop. Only a failed poll is returned as an error.
    pub(crate) fn run_once(&mut self, timeout: Duration) -> Result<()> {
        self.flush_async_requests();

        let wait = if self.has_buffered_work() {
            Duration::ZERO
        } else {
            timeout
        };
        self.transport.poll(Some(wait)).map_err(Error::Poll)?;
        self.reap_closed_links();

        if self.transport.source_ready(self.broadcast_token) {
            self.dispatch_discovery();
        }
        if let Some(message) = self.transport.recv(self.subscriber) {
            self.dispatch_data(message);
        }
        if let Some(message) = self.transport.recv(self.requester) {
            self.dispatch_reply(message);
        }
        if let Some(message) = self.transport.recv(self.replier) {
            self.dispatch_request(message);
        }
        Ok(())
    }

    /// Process pending I/O without dispatching, then drop closed links.
    ///
    /// Lets a caller see a provider that went away before relying on the
    /// `connected` flag.
    pub(crate) fn refresh_links(&mut self) -> Result<()> {
        self.transport.poll(Some(Duration::ZERO)).map_err(Error::Poll)?;
        self.reap_closed_links();
        Ok(())
    }

    fn reap_closed_links(&mut self) {
        reap_links(
            &mut self.engine,
            &self.transport,
            Channel::Topic,
            self.subscriber,
            &mut self.topic_peers,
        );
        reap_links(
            &mut self.engine,
            &self.transport,
            Channel::Service,
            self.requester,
            &mut self.service_peers,
        );
    }

    fn flush_async_requests(&mut self) {
        for name in self.engine.registry(Channel::Service).ready_with_pending() {
            let Some(payload) = self
                .engine
                .registry_mut(Channel::Service)
                .dequeue_request(&name)
            else {
                continue;
            };
            if let Err(e) = self.send_request(&name, &payload) {
                log::warn!("[NODE] async request {} dropped: {}", name, e);
            }
        }
    }

    fn dispatch_discovery(&mut self) {
        let (len, from) = match self.broadcast.recv(&mut self.recv_buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.transport.clear_source_ready(self.broadcast_token);
                return;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return,
            Err(e) => {
                log::debug!("[DISC] recv error: {}", e);
                return;
            }
        };

        let mut plane = Plane {
            transport: &mut self.transport,
            subscriber: self.subscriber,
            requester: self.requester,
            topic_peers: &mut self.topic_peers,
            service_peers: &mut self.service_peers,
        };
        match self
            .engine
            .handle_datagram(&self.recv_buf[..len], &mut plane, &mut self.broadcast)
        {
            Ok(Handled::SelfMessage) => {}
            Ok(handled) => log::trace!("[DISC] datagram from {}: {:?}", from, handled),
            Err(e) => log::debug!("[DISC] datagram from {} dropped: {}", from, e),
        }
    }

    fn dispatch_data(&mut self, message: Incoming) {
        let Some((topic, payload)) = split_frame(&message) else {
            log::debug!(
                "[NODE] dropping data frame with {} parts",
                message.parts.len()
            );
            return;
        };
        match self
            .engine
            .registry_mut(Channel::Topic)
            .data_callback_mut(topic)
        {
            Some(callback) => callback(topic, payload),
            None => log::debug!("[NODE] no callback for topic {}", topic),
        }
    }

    fn dispatch_reply(&mut self, message: Incoming) {
        let Some((name, response)) = split_frame(&message) else {
            log::debug!(
                "[NODE] dropping reply with {} parts",
                message.parts.len()
            );
            return;
        };
        if let Some(slot) = self.awaited.as_mut() {
            if slot.name == name && slot.response.is_none() {
                slot.response = Some(response.to_vec());
                return;
            }
        }
        match self
            .engine
            .registry_mut(Channel::Service)
            .response_callback_mut(name)
        {
            Some(callback) => callback(name, response),
            None => log::debug!("[NODE] unsolicited reply for {}", name),
        }
    }

    fn dispatch_request(&mut self, message: Incoming) {
        let Some((name, payload)) = split_frame(&message) else {
            log::debug!(
                "[NODE] dropping request with {} parts",
                message.parts.len()
            );
            return;
        };
        let services = self.engine.registry_mut(Channel::Service);
        if !services.has_role(name, Role::Advertised) {
            log::debug!("[NODE] request for {} which is not served here", name);
            return;
        }
        let Some(handler) = services.reply_handler_mut(name) else {
            log::debug!("[NODE] no handler for service {}", name);
            return;
        };
        let response = handler(name, payload);

        let sender = self.service_endpoint.to_string();
        let parts: [&[u8]; 3] = [name.as_bytes(), sender.as_bytes(), &response];
        if let Err(e) = self.transport.send_to(self.replier, message.peer, &parts) {
            log::warn!("[NODE] reply for {} not sent: {}", name, e);
        }
    }
}

/// `(name, sender, payload)` frame as `(name, payload)`.
fn split_frame(message: &Incoming) -> Option<(&str, &[u8])> {
    match message.parts.as_slice() {
        [name, _sender, payload] => {
            let name = std::str::from_utf8(name).ok()?;
            Some((name, payload.as_slice()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(parts: &[&[u8]]) -> Incoming {
        Incoming {
            peer: PeerId::Tcp(Token(0)),
            parts: parts.iter().map(|p| p.to_vec()).collect(),
        }
    }

    #[test]
    fn test_split_frame() {
        let message = frame(&[b"foo", b"tcp://10.0.0.1:4000", b"payload"]);
        assert_eq!(split_frame(&message), Some(("foo", &b"payload"[..])));

        assert!(split_frame(&frame(&[b"foo", b"payload"])).is_none());
        assert!(split_frame(&frame(&[b"\xff\xfe", b"x", b"y"])).is_none());
    }

    #[test]
    fn test_resolve_local_ip_prefers_config() {
        let config = NodeConfig {
            local_ip: Some(Ipv4Addr::new(10, 9, 8, 7)),
            ..NodeConfig::default()
        };
        assert_eq!(resolve_local_ip(&config), Ipv4Addr::new(10, 9, 8, 7));
    }
}
