// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent construction of an initialized [`Node`].

use super::Node;
use crate::config::NodeConfig;
use crate::error::Result;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Builder for configuring and creating a [`Node`].
///
/// # Example
/// ```no_run
/// use dzmq::Node;
///
/// let node = Node::builder()
///     .discovery_port(11312)
///     .with_env()
///     .build()?;
/// # Ok::<(), dzmq::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeBuilder {
    config: NodeConfig,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply `DZMQ_IP`, `DZMQ_BCAST_HOST` and `DZMQ_BCAST_PORT`.
    pub fn with_env(mut self) -> Self {
        self.config = self.config.with_env_overrides();
        self
    }

    /// Local IPv4 address for bound endpoints (default: auto-detect).
    pub fn local_ip(mut self, ip: Ipv4Addr) -> Self {
        self.config.local_ip = Some(ip);
        self
    }

    /// Discovery broadcast address (default: local address with last octet 255).
    pub fn broadcast_ip(mut self, ip: Ipv4Addr) -> Self {
        self.config.broadcast_ip = Some(ip);
        self
    }

    /// UDP discovery port (default: 11312). All peers must agree on it.
    pub fn discovery_port(mut self, port: u16) -> Self {
        self.config.discovery_port = port;
        self
    }

    pub fn spin_timeout(mut self, timeout: Duration) -> Self {
        self.config.spin_timeout = timeout;
        self
    }

    /// Blocking request discovery budget: `retries` rounds of `interval`.
    pub fn srv_retries(mut self, retries: u32, interval: Duration) -> Self {
        self.config.srv_retries = retries;
        self.config.srv_retry_interval = interval;
        self
    }

    pub fn srv_reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.srv_reply_timeout = timeout;
        self
    }

    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.config.max_message_size = bytes;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Create and initialize the node.
    pub fn build(self) -> Result<Node> {
        let mut node = Node::new(self.config);
        node.init()?;
        Ok(node)
    }
}
