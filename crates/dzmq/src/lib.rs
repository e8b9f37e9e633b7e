// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dzmq - broker-less publish/subscribe and request/reply
//!
//! Nodes find each other by broadcasting small UDP discovery datagrams on a
//! shared port, then exchange data over direct TCP links. There is no broker
//! and no central registry: every node keeps its own view of who provides
//! which topic or service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dzmq::{Node, Result};
//!
//! fn main() -> Result<()> {
//!     let mut node = Node::builder().with_env().build()?;
//!
//!     node.subscribe("sensors/temperature", |topic, payload| {
//!         println!("{} -> {} bytes", topic, payload.len());
//!     })?;
//!     node.srv_advertise("echo", |_name, request| request.to_vec())?;
//!
//!     node.spin()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                            Node facade                              |
//! |   advertise | subscribe | publish | srv_request | timer | spin      |
//! +---------------------------------------------------------------------+
//! |         Discovery engine          |          Topic registry         |
//! |   ADV/SUB state machine, ledger   |   roles, addresses, callbacks   |
//! +---------------------------------------------------------------------+
//! |                         Discovery codec                             |
//! |   version | sender GUID | topic | type | flags | [address]          |
//! +---------------------------------------------------------------------+
//! |                           Transport                                 |
//! |   UDP broadcast socket | pub/sub/req/rep sockets over TCP, inproc   |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Node`] | One participant; owns all sockets and state |
//! | [`NodeBuilder`] | Fluent configuration + `init` |
//! | [`NodeConfig`] | Ports, addresses, timeouts, env overrides |
//! | [`Guid`] | 128-bit node identity carried in every datagram |
//! | [`Error`] | Crate error type |
//!
//! ## Environment
//!
//! - `DZMQ_IP` - local IPv4 address for bound endpoints
//! - `DZMQ_BCAST_HOST` - discovery broadcast address
//! - `DZMQ_BCAST_PORT` - discovery port (default 11312)

/// Protocol constants and node configuration.
pub mod config;
/// Identity and byte-level helpers.
pub mod core;
/// ADV/SUB discovery state machine.
pub mod discovery;
/// Crate error type.
pub mod error;
/// The node facade.
pub mod node;
/// Discovery datagram codec.
pub mod protocol;
/// Topic and service bookkeeping.
pub mod registry;
/// UDP broadcast socket and the message-queue transport.
pub mod transport;

pub use crate::config::NodeConfig;
pub use crate::core::Guid;
pub use crate::error::{Error, Result};
pub use crate::node::{Node, NodeBuilder};
