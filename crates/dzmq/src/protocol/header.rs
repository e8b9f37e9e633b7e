// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery header and advertisement body codec.

use super::{validate_topic, MessageType, WireError};
use crate::config::{FLAGS_LENGTH, MAX_ADDRESS_LENGTH, MAX_TOPIC_LENGTH, PROTOCOL_VERSION};
use crate::core::cursor::Cursor;
use crate::core::Guid;

/// Longest address the 1-byte length prefix can carry.
pub(crate) const ADDRESS_CAPACITY: usize = if MAX_ADDRESS_LENGTH < u8::MAX as usize {
    MAX_ADDRESS_LENGTH
} else {
    u8::MAX as usize
};

/// Fixed header present in every discovery datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryHeader {
    pub version: u16,
    pub sender: Guid,
    pub topic: String,
    pub kind: MessageType,
    pub flags: [u8; FLAGS_LENGTH],
}

impl DiscoveryHeader {
    /// Current-version header with zeroed flags.
    pub fn new(sender: Guid, topic: impl Into<String>, kind: MessageType) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sender,
            topic: topic.into(),
            kind,
            flags: [0; FLAGS_LENGTH],
        }
    }

    /// Encoded size: `2 + 16 + 1 + len(topic) + 1 + 16`.
    pub fn encoded_len(&self) -> usize {
        crate::config::NodeConfig::header_len(self.topic.len())
    }

    /// Encode the header into a new buffer.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoded header to `buf`.
    ///
    /// Nothing is written when the topic is rejected.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), WireError> {
        validate_topic(&self.topic)?;
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.sender.as_bytes());
        buf.push(self.topic.len() as u8);
        buf.extend_from_slice(self.topic.as_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.flags);
        Ok(())
    }

    /// Decode a header from the start of `bytes`.
    ///
    /// Returns the header and the number of bytes consumed. Trailing bytes are
    /// left for the caller (the advertisement body, or padding).
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        let mut cursor = Cursor::new(bytes);
        let header = Self::read(&mut cursor)?;
        Ok((header, cursor.offset()))
    }

    pub(crate) fn read(cursor: &mut Cursor<'_>) -> Result<Self, WireError> {
        let version = cursor.read_u16_le()?;
        let sender = Guid::from_bytes(cursor.read_array::<16>()?);
        let topic = cursor.read_short_str()?;
        if topic.is_empty() {
            return Err(WireError::EmptyTopic);
        }
        if topic.len() > MAX_TOPIC_LENGTH {
            return Err(WireError::TopicTooLong(topic.len()));
        }
        let kind = MessageType::try_from(cursor.read_u8()?)?;
        let flags = cursor.read_array::<FLAGS_LENGTH>()?;

        Ok(Self {
            version,
            sender,
            topic: topic.to_owned(),
            kind,
            flags,
        })
    }
}

/// ADV / ADV_SVC: header plus the endpoint the name is reachable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub header: DiscoveryHeader,
    pub address: String,
}

impl Advertisement {
    pub fn new(header: DiscoveryHeader, address: impl Into<String>) -> Self {
        Self {
            header,
            address: address.into(),
        }
    }

    /// Encode header and body into a new buffer.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        if !self.header.kind.carries_address() {
            return Err(WireError::NotAnAdvertisement(self.header.kind));
        }
        if self.address.len() > ADDRESS_CAPACITY {
            return Err(WireError::AddressTooLong(self.address.len()));
        }
        let mut buf = Vec::with_capacity(self.header.encoded_len() + 1 + self.address.len());
        self.header.encode_into(&mut buf)?;
        buf.push(self.address.len() as u8);
        buf.extend_from_slice(self.address.as_bytes());
        Ok(buf)
    }

    /// Decode the address body that follows an already-decoded header.
    ///
    /// `bytes` starts right after the header. Returns the advertisement and
    /// the number of body bytes consumed.
    pub fn decode_body(header: DiscoveryHeader, bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if !header.kind.carries_address() {
            return Err(WireError::NotAnAdvertisement(header.kind));
        }
        let mut cursor = Cursor::new(bytes);
        let address = cursor.read_short_str()?.to_owned();
        Ok((Self { header, address }, cursor.offset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Guid {
        Guid::from_bytes([0xab; 16])
    }

    #[test]
    fn test_header_layout() {
        let header = DiscoveryHeader::new(sender(), "foo", MessageType::Sub);
        let bytes = header.encode().unwrap();

        assert_eq!(bytes.len(), 2 + 16 + 1 + 3 + 1 + 16);
        assert_eq!(&bytes[0..2], &[1, 0]);
        assert_eq!(&bytes[2..18], &[0xab; 16]);
        assert_eq!(bytes[18], 3);
        assert_eq!(&bytes[19..22], b"foo");
        assert_eq!(bytes[22], 2);
        assert!(bytes[23..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_decode_reports_consumed() {
        let header = DiscoveryHeader::new(sender(), "chatter", MessageType::SubSvc);
        let mut bytes = header.encode().unwrap();
        let header_len = bytes.len();
        bytes.extend_from_slice(b"trailing");

        let (decoded, consumed) = DiscoveryHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(consumed, header_len);
    }

    #[test]
    fn test_advertisement_layout() {
        let header = DiscoveryHeader::new(sender(), "foo", MessageType::Adv);
        let adv = Advertisement::new(header, "tcp://10.0.0.2:5555");
        let bytes = adv.encode().unwrap();

        let body_start = 2 + 16 + 1 + 3 + 1 + 16;
        assert_eq!(bytes[body_start] as usize, "tcp://10.0.0.2:5555".len());
        assert_eq!(&bytes[body_start + 1..], b"tcp://10.0.0.2:5555");

        let (decoded_header, consumed) = DiscoveryHeader::decode(&bytes).unwrap();
        assert_eq!(consumed, body_start);
        let (decoded, body_len) =
            Advertisement::decode_body(decoded_header, &bytes[consumed..]).unwrap();
        assert_eq!(decoded, adv);
        assert_eq!(body_len, 1 + "tcp://10.0.0.2:5555".len());
    }

    #[test]
    fn test_encode_rejects_oversized_fields() {
        let long_topic = "t".repeat(MAX_TOPIC_LENGTH + 1);
        let header = DiscoveryHeader::new(sender(), long_topic, MessageType::Sub);
        assert_eq!(
            header.encode(),
            Err(WireError::TopicTooLong(MAX_TOPIC_LENGTH + 1))
        );

        let header = DiscoveryHeader::new(sender(), "foo", MessageType::Adv);
        let adv = Advertisement::new(header, "a".repeat(ADDRESS_CAPACITY + 1));
        assert_eq!(
            adv.encode(),
            Err(WireError::AddressTooLong(ADDRESS_CAPACITY + 1))
        );
    }

    #[test]
    fn test_max_sizes_encode() {
        let header = DiscoveryHeader::new(
            sender(),
            "t".repeat(MAX_TOPIC_LENGTH),
            MessageType::AdvSvc,
        );
        let adv = Advertisement::new(header, "a".repeat(ADDRESS_CAPACITY));
        let bytes = adv.encode().unwrap();
        assert!(bytes.len() <= crate::config::UDP_MAX_SIZE);
    }

    #[test]
    fn test_sub_has_no_body() {
        let header = DiscoveryHeader::new(sender(), "foo", MessageType::Sub);
        assert_eq!(
            Advertisement::new(header.clone(), "tcp://x:1").encode(),
            Err(WireError::NotAnAdvertisement(MessageType::Sub))
        );
        assert_eq!(
            Advertisement::decode_body(header, &[0]),
            Err(WireError::NotAnAdvertisement(MessageType::Sub))
        );
    }

    #[test]
    fn test_header_rejects_empty_topic_on_decode() {
        let mut bytes = vec![1, 0];
        bytes.extend_from_slice(&[0; 16]);
        bytes.push(0);
        bytes.push(MessageType::Sub as u8);
        bytes.extend_from_slice(&[0; FLAGS_LENGTH]);
        assert_eq!(DiscoveryHeader::decode(&bytes), Err(WireError::EmptyTopic));
    }

    #[test]
    fn test_header_rejects_oversized_topic_on_decode() {
        let topic_len = MAX_TOPIC_LENGTH + 1;
        let mut bytes = vec![1, 0];
        bytes.extend_from_slice(&[0; 16]);
        bytes.push(topic_len as u8);
        bytes.extend(std::iter::repeat(b'x').take(topic_len));
        bytes.push(MessageType::Sub as u8);
        bytes.extend_from_slice(&[0; FLAGS_LENGTH]);
        assert_eq!(
            DiscoveryHeader::decode(&bytes),
            Err(WireError::TopicTooLong(topic_len))
        );
    }
}
