// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data-plane endpoint strings.
//!
//! Two schemes are understood:
//!
//! - `tcp://<ipv4>:<port>` - network endpoint (port 0 asks for an ephemeral port on bind)
//! - `inproc://<name>` - in-process loopback endpoint, scoped to one transport

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

const TCP_SCHEME: &str = "tcp://";
const INPROC_SCHEME: &str = "inproc://";

/// A bindable / connectable endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp(SocketAddr),
    Inproc(String),
}

impl Endpoint {
    pub fn tcp(addr: impl Into<SocketAddr>) -> Self {
        Endpoint::Tcp(addr.into())
    }

    pub fn inproc(name: impl Into<String>) -> Self {
        Endpoint::Inproc(name.into())
    }

    pub fn is_inproc(&self) -> bool {
        matches!(self, Endpoint::Inproc(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{}{}", TCP_SCHEME, addr),
            Endpoint::Inproc(name) => write!(f, "{}{}", INPROC_SCHEME, name),
        }
    }
}

/// Error returned when an endpoint string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEndpointError(String);

impl fmt::Display for ParseEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid endpoint: {}", self.0)
    }
}

impl std::error::Error for ParseEndpointError {}

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix(TCP_SCHEME) {
            return rest
                .parse::<SocketAddr>()
                .map(Endpoint::Tcp)
                .map_err(|_| ParseEndpointError(s.to_owned()));
        }
        if let Some(name) = s.strip_prefix(INPROC_SCHEME) {
            if name.is_empty() {
                return Err(ParseEndpointError(s.to_owned()));
            }
            return Ok(Endpoint::Inproc(name.to_owned()));
        }
        Err(ParseEndpointError(s.to_owned()))
    }
}

/// True if `address` names an in-process endpoint.
pub fn is_inproc_address(address: &str) -> bool {
    address.starts_with(INPROC_SCHEME)
}
