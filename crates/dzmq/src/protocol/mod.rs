// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery wire protocol.
//!
//! Every discovery datagram starts with a fixed header; advertisements append
//! the endpoint where the topic or service can be reached.
//!
//! ```text
//! offset  field            size
//! 0       version          2 bytes (LE), value 1
//! 2       senderId         16 bytes raw
//! 18      topicLen         1 byte
//! 19      topic            topicLen bytes (UTF-8, no NUL)
//! 19+N    messageType      1 byte: 1=ADV 2=SUB 3=ADV_SVC 4=SUB_SVC
//! 20+N    flags            16 bytes reserved, zero-filled
//! 36+N    [addrLen]        1 byte, ADV / ADV_SVC only
//! 37+N    [address]        addrLen bytes, ADV / ADV_SVC only
//! ```
//!
//! All functions here are pure: they never perform I/O and never panic on
//! hostile input.

mod header;
mod message;

pub use header::{Advertisement, DiscoveryHeader};
pub use message::{decode_datagram, DiscoveryMessage};

use std::fmt;

/// Discovery message kind (1 byte on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// "I publish this topic at this address"
    Adv = 1,
    /// "Who publishes this topic?"
    Sub = 2,
    /// "I serve this service at this address"
    AdvSvc = 3,
    /// "Who serves this service?"
    SubSvc = 4,
}

impl MessageType {
    /// True for kinds followed by an address body.
    pub const fn carries_address(self) -> bool {
        matches!(self, MessageType::Adv | MessageType::AdvSvc)
    }

    /// True for kinds that concern services rather than topics.
    pub const fn is_service(self) -> bool {
        matches!(self, MessageType::AdvSvc | MessageType::SubSvc)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MessageType::Adv => "ADV",
            MessageType::Sub => "SUB",
            MessageType::AdvSvc => "ADV_SVC",
            MessageType::SubSvc => "SUB_SVC",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Adv),
            2 => Ok(MessageType::Sub),
            3 => Ok(MessageType::AdvSvc),
            4 => Ok(MessageType::SubSvc),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec error for discovery datagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A field or length prefix runs past the end of the buffer.
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// Message type byte is not one of ADV/SUB/ADV_SVC/SUB_SVC.
    UnknownMessageType(u8),
    /// Topic is empty.
    EmptyTopic,
    /// Topic exceeds [`MAX_TOPIC_LENGTH`](crate::config::MAX_TOPIC_LENGTH).
    TopicTooLong(usize),
    /// Address exceeds what the 1-byte prefix can carry.
    AddressTooLong(usize),
    /// Topic or address is not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// An address body was requested for a SUB/SUB_SVC header.
    NotAnAdvertisement(MessageType),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated at offset {}: need {} bytes, {} available",
                offset, needed, available
            ),
            WireError::UnknownMessageType(t) => write!(f, "unknown message type {}", t),
            WireError::EmptyTopic => write!(f, "empty topic"),
            WireError::TopicTooLong(len) => write!(
                f,
                "topic too long: {} bytes (max {})",
                len,
                crate::config::MAX_TOPIC_LENGTH
            ),
            WireError::AddressTooLong(len) => write!(
                f,
                "address too long: {} bytes (max {})",
                len,
                header::ADDRESS_CAPACITY
            ),
            WireError::InvalidUtf8 { offset } => write!(f, "invalid UTF-8 at offset {}", offset),
            WireError::NotAnAdvertisement(kind) => {
                write!(f, "{} messages carry no address", kind)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Check a topic or service name against the wire limits.
pub fn validate_topic(topic: &str) -> Result<(), WireError> {
    if topic.is_empty() {
        return Err(WireError::EmptyTopic);
    }
    if topic.len() > crate::config::MAX_TOPIC_LENGTH {
        return Err(WireError::TopicTooLong(topic.len()));
    }
    Ok(())
}
