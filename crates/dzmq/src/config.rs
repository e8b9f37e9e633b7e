// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dzmq configuration.
//!
//! Compile-time protocol constants live here so that the codec, the
//! discovery engine and the node all agree on them. Per-node tunables are
//! collected in [`NodeConfig`].
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `DZMQ_IP` | Local IPv4 address used for bound endpoints |
//! | `DZMQ_BCAST_HOST` | Broadcast address discovery datagrams are sent to |
//! | `DZMQ_BCAST_PORT` | UDP discovery port (default 11312) |

use std::net::Ipv4Addr;
use std::time::Duration;

// =======================================================================
// Discovery wire protocol
// =======================================================================

/// Discovery protocol version carried in every datagram header.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default UDP port for discovery broadcasts.
pub const DEFAULT_DISCOVERY_PORT: u16 = 11312;

/// Largest discovery datagram the engine sends or expects.
pub const UDP_MAX_SIZE: usize = 512;

/// Maximum topic or service name length in bytes.
pub const MAX_TOPIC_LENGTH: usize = 193;

/// Maximum advertised address length in bytes.
///
/// The wire prefix is a single byte, which caps the encodable length at 255.
pub const MAX_ADDRESS_LENGTH: usize = 267;

/// Size of the reserved flags block in the header.
pub const FLAGS_LENGTH: usize = 16;

/// Size of the sender identity in the header.
pub const GUID_LENGTH: usize = 16;

// =======================================================================
// Session defaults
// =======================================================================

/// Poll timeout used by `Node::spin`.
pub const DEFAULT_SPIN_TIMEOUT: Duration = Duration::from_millis(200);

/// SUB_SVC resend rounds before a blocking request gives up.
pub const DEFAULT_SRV_RETRIES: u32 = 25;

/// Spin budget between two SUB_SVC resends.
pub const DEFAULT_SRV_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// How long a blocking request waits for its reply once sent.
pub const DEFAULT_SRV_REPLY_TIMEOUT: Duration = Duration::from_millis(250);

/// Largest data-plane message accepted from a TCP peer (anti-OOM).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Environment variable overriding the local IPv4 address.
pub const ENV_LOCAL_IP: &str = "DZMQ_IP";

/// Environment variable overriding the broadcast address.
pub const ENV_BROADCAST_HOST: &str = "DZMQ_BCAST_HOST";

/// Environment variable overriding the discovery port.
pub const ENV_BROADCAST_PORT: &str = "DZMQ_BCAST_PORT";

/// Per-node configuration.
///
/// `None` for `local_ip` means "auto-detect the first non-loopback
/// interface"; `None` for `broadcast_ip` means "local address with the last
/// octet set to 255".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Local IPv4 address for bound TCP endpoints
    pub local_ip: Option<Ipv4Addr>,
    /// Destination address for discovery broadcasts
    pub broadcast_ip: Option<Ipv4Addr>,
    /// UDP discovery port (bind and send)
    pub discovery_port: u16,
    /// Poll timeout used by `spin()`
    pub spin_timeout: Duration,
    /// SUB_SVC resend rounds for blocking requests
    pub srv_retries: u32,
    /// Spin budget per resend round
    pub srv_retry_interval: Duration,
    /// Reply wait once a blocking request is sent
    pub srv_reply_timeout: Duration,
    /// Maximum accepted data-plane message size
    pub max_message_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            local_ip: None,
            broadcast_ip: None,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            spin_timeout: DEFAULT_SPIN_TIMEOUT,
            srv_retries: DEFAULT_SRV_RETRIES,
            srv_retry_interval: DEFAULT_SRV_RETRY_INTERVAL,
            srv_reply_timeout: DEFAULT_SRV_REPLY_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl NodeConfig {
    /// Create from environment variables.
    ///
    /// Starts from [`NodeConfig::default`] and applies `DZMQ_IP`,
    /// `DZMQ_BCAST_HOST` and `DZMQ_BCAST_PORT`. Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of an existing configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var(ENV_LOCAL_IP) {
            match val.parse::<Ipv4Addr>() {
                Ok(ip) => self.local_ip = Some(ip),
                Err(_) => log::debug!("[CONFIG] ignoring {}={:?}", ENV_LOCAL_IP, val),
            }
        }

        if let Ok(val) = std::env::var(ENV_BROADCAST_HOST) {
            match val.parse::<Ipv4Addr>() {
                Ok(ip) => self.broadcast_ip = Some(ip),
                Err(_) => log::debug!("[CONFIG] ignoring {}={:?}", ENV_BROADCAST_HOST, val),
            }
        }

        if let Ok(val) = std::env::var(ENV_BROADCAST_PORT) {
            match val.parse::<u16>() {
                Ok(port) if port != 0 => self.discovery_port = port,
                _ => log::debug!("[CONFIG] ignoring {}={:?}", ENV_BROADCAST_PORT, val),
            }
        }

        self
    }

    /// Minimum encoded discovery header size for an `n`-byte topic.
    pub const fn header_len(topic_len: usize) -> usize {
        2 + GUID_LENGTH + 1 + topic_len + 1 + FLAGS_LENGTH
    }
}
