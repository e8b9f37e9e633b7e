// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public error type.

use crate::protocol::WireError;
use crate::transport::ParseEndpointError;

/// dzmq error.
///
/// Only [`Error::Poll`] is fatal (see [`Error::is_fatal`]); everything else
/// leaves the node usable.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation requires `init()` first (or the node was closed).
    NotInitialized,
    /// `init()` was called on a running node.
    AlreadyInitialized,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Discovery datagram could not be decoded.
    MalformedMessage(WireError),
    /// Topic or service name is empty or too long.
    InvalidName(String),
    /// Topic/service already advertised by this node.
    AlreadyAdvertised(String),
    /// Topic/service not advertised by this node.
    NotAdvertised(String),
    /// Topic already subscribed by this node.
    AlreadySubscribed(String),
    /// Topic not subscribed by this node.
    NotSubscribed(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Failed to bind a socket.
    BindFailed(String),
    /// Failed to connect a data-plane socket.
    ConnectFailed(String),
    /// Send operation failed.
    SendFailed(String),
    /// Endpoint string could not be parsed.
    InvalidEndpoint(String),
    /// Readiness poll failed (not interrupted). Ends `spin()`.
    Poll(std::io::Error),

    // ========================================================================
    // Service Errors
    // ========================================================================
    /// No provider connected within the retry budget.
    ServiceUnavailable(String),
    /// Provider connected but no reply arrived in time.
    Timeout(String),
}

impl Error {
    /// True for errors that terminate the spin loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Poll(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Lifecycle
            Error::NotInitialized => write!(f, "Node not initialized"),
            Error::AlreadyInitialized => write!(f, "Node already initialized"),
            // Protocol
            Error::MalformedMessage(e) => write!(f, "Malformed discovery message: {}", e),
            Error::InvalidName(msg) => write!(f, "Invalid name: {}", msg),
            Error::AlreadyAdvertised(name) => write!(f, "Already advertised: {}", name),
            Error::NotAdvertised(name) => write!(f, "Not advertised: {}", name),
            Error::AlreadySubscribed(name) => write!(f, "Already subscribed: {}", name),
            Error::NotSubscribed(name) => write!(f, "Not subscribed: {}", name),
            // Transport
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::ConnectFailed(msg) => write!(f, "Connect failed: {}", msg),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            Error::InvalidEndpoint(msg) => write!(f, "Invalid endpoint: {}", msg),
            Error::Poll(e) => write!(f, "Poll failed: {}", e),
            // Service
            Error::ServiceUnavailable(name) => write!(f, "No provider for service: {}", name),
            Error::Timeout(name) => write!(f, "Timed out waiting for reply: {}", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) | Error::Poll(e) => Some(e),
            Error::MalformedMessage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Error::MalformedMessage(e)
    }
}

impl From<ParseEndpointError> for Error {
    fn from(e: ParseEndpointError) -> Self {
        Error::InvalidEndpoint(e.to_string())
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_poll_is_fatal() {
        let poll = Error::Poll(std::io::Error::new(std::io::ErrorKind::Other, "epoll failed"));
        assert!(poll.is_fatal());
        assert!(!Error::Timeout("echo".into()).is_fatal());
        assert!(!Error::MalformedMessage(WireError::EmptyTopic).is_fatal());
    }

    #[test]
    fn test_display_and_source() {
        let err: Error = WireError::UnknownMessageType(7).into();
        assert_eq!(
            err.to_string(),
            "Malformed discovery message: unknown message type 7"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(Error::NotAdvertised("t".into()).to_string(), "Not advertised: t");
    }
}
