// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broadcast discovery.
//!
//! The [`DiscoveryEngine`] decides what a received ADV/SUB datagram means for
//! this node and what it must do about it. It performs no I/O itself: sends go
//! through a [`DatagramSink`] and connection actions through a [`DataPlane`],
//! both provided by the caller on every call.
//!
//! ```text
//!  ADV  ──> known address ──> subscribed? ──> already linked? ──> mark connected
//!                                   │                  │
//!                                   no                 no ──> connect + filter + ledger
//!  SUB  ──> advertised here? ──> resend ADV for every local endpoint
//! ```

mod engine;

pub use engine::{loopback_affinity_allows, DiscoveryEngine, Handled};

use crate::error::Result;
use crate::protocol::MessageType;
use std::io;

/// Data-plane channel a discovery message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Pub/sub topics (subscriber socket)
    Topic,
    /// Request/reply services (requester socket)
    Service,
}

impl Channel {
    pub fn of(kind: MessageType) -> Self {
        if kind.is_service() {
            Channel::Service
        } else {
            Channel::Topic
        }
    }

    pub const fn advertise_kind(self) -> MessageType {
        match self {
            Channel::Topic => MessageType::Adv,
            Channel::Service => MessageType::AdvSvc,
        }
    }

    pub const fn subscribe_kind(self) -> MessageType {
        match self {
            Channel::Topic => MessageType::Sub,
            Channel::Service => MessageType::SubSvc,
        }
    }
}

/// Connection actions the engine can request.
pub trait DataPlane {
    /// Connect the channel's consuming socket to `address`.
    fn connect(&mut self, channel: Channel, address: &str) -> Result<()>;

    /// Make the subscriber accept messages for `topic`.
    fn subscribe_filter(&mut self, topic: &str) -> Result<()>;
}

/// Where encoded discovery datagrams go.
pub trait DatagramSink {
    fn send_datagram(&mut self, bytes: &[u8]) -> io::Result<usize>;
}

impl DatagramSink for crate::transport::BroadcastSocket {
    fn send_datagram(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.send(bytes)
    }
}
