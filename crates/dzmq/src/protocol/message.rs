// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Whole-datagram decoding.

use super::{Advertisement, DiscoveryHeader, MessageType, WireError};
use crate::core::cursor::Cursor;
use crate::core::Guid;

/// A decoded discovery datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    /// ADV or ADV_SVC
    Advertise(Advertisement),
    /// SUB or SUB_SVC
    Subscribe(DiscoveryHeader),
}

impl DiscoveryMessage {
    pub fn header(&self) -> &DiscoveryHeader {
        match self {
            DiscoveryMessage::Advertise(adv) => &adv.header,
            DiscoveryMessage::Subscribe(header) => header,
        }
    }

    pub fn kind(&self) -> MessageType {
        self.header().kind
    }

    pub fn sender(&self) -> Guid {
        self.header().sender
    }

    pub fn topic(&self) -> &str {
        &self.header().topic
    }

    /// Encode back to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            DiscoveryMessage::Advertise(adv) => adv.encode(),
            DiscoveryMessage::Subscribe(header) => header.encode(),
        }
    }
}

/// Decode one discovery datagram.
///
/// Bytes after a complete message are ignored.
pub fn decode_datagram(bytes: &[u8]) -> Result<DiscoveryMessage, WireError> {
    let mut cursor = Cursor::new(bytes);
    let header = DiscoveryHeader::read(&mut cursor)?;
    if !header.kind.carries_address() {
        return Ok(DiscoveryMessage::Subscribe(header));
    }
    let address = cursor.read_short_str()?.to_owned();
    Ok(DiscoveryMessage::Advertise(Advertisement { header, address }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FLAGS_LENGTH, UDP_MAX_SIZE};

    fn sample_adv() -> Vec<u8> {
        let header = DiscoveryHeader::new(Guid::from_bytes([3; 16]), "foo", MessageType::Adv);
        Advertisement::new(header, "tcp://192.168.1.7:40211")
            .encode()
            .unwrap()
    }

    #[test]
    fn test_decode_advertisement() {
        let msg = decode_datagram(&sample_adv()).unwrap();
        assert_eq!(msg.kind(), MessageType::Adv);
        assert_eq!(msg.topic(), "foo");
        assert_eq!(msg.sender(), Guid::from_bytes([3; 16]));
        match msg {
            DiscoveryMessage::Advertise(adv) => assert_eq!(adv.address, "tcp://192.168.1.7:40211"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_subscription_ignores_trailing_bytes() {
        let header = DiscoveryHeader::new(Guid::from_bytes([9; 16]), "svc", MessageType::SubSvc);
        let mut bytes = header.encode().unwrap();
        bytes.extend_from_slice(&[0xee; 7]);
        assert_eq!(
            decode_datagram(&bytes).unwrap(),
            DiscoveryMessage::Subscribe(header)
        );
    }

    #[test]
    fn test_every_prefix_is_rejected() {
        let bytes = sample_adv();
        for len in 0..bytes.len() {
            assert!(
                decode_datagram(&bytes[..len]).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
        assert!(decode_datagram(&bytes).is_ok());
    }

    #[test]
    fn test_short_buffers_are_truncated() {
        for len in 0..19 {
            let buf = vec![1u8; len];
            assert!(matches!(
                decode_datagram(&buf),
                Err(WireError::Truncated { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut bytes = sample_adv();
        bytes[2 + 16 + 1 + 3] = 9;
        assert_eq!(
            decode_datagram(&bytes),
            Err(WireError::UnknownMessageType(9))
        );
    }

    #[test]
    fn test_address_prefix_past_end() {
        let mut bytes = sample_adv();
        let addr_len_at = 2 + 16 + 1 + 3 + 1 + FLAGS_LENGTH;
        bytes[addr_len_at] = 0xff;
        assert!(matches!(
            decode_datagram(&bytes),
            Err(WireError::Truncated { needed: 255, .. })
        ));
    }

    #[test]
    fn test_random_buffers_never_panic() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..20_000 {
            let len = rng.usize(0..UDP_MAX_SIZE);
            let mut buf: Vec<u8> = (0..len).map(|_| rng.u8(..)).collect();
            // Bias toward plausible headers so the deeper fields get exercised
            if len > 23 && rng.bool() {
                buf[0] = 1;
                buf[1] = 0;
                buf[18] = rng.u8(0..8);
                let kind_at = 19 + buf[18] as usize;
                if kind_at < len {
                    buf[kind_at] = rng.u8(1..5);
                }
            }
            let _ = decode_datagram(&buf);
        }
    }

    #[test]
    fn test_message_encode_matches_parts() {
        let msg = decode_datagram(&sample_adv()).unwrap();
        assert_eq!(msg.encode().unwrap(), sample_adv());
    }
}
