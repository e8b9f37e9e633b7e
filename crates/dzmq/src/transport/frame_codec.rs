// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefix framing for multipart messages over TCP.
//!
//! TCP is a stream protocol without message boundaries. Each data-plane
//! message is sent as one length-prefixed frame whose body holds the parts:
//!
//! ```text
//! +----------------+------------------+----------------+--------+-----
//! | Length (4B BE) | Part count (2B)  | Part len (4B)  | Part   | ...
//! +----------------+------------------+----------------+--------+-----
//! ```
//!
//! All integers are big-endian (network byte order). The outer length does
//! not include its own 4 bytes.

use std::io::{self, Read};

/// Frame header size (4 bytes for length).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Part count prefix size.
const PART_COUNT_SIZE: usize = 2;

/// Per-part length prefix size.
const PART_LEN_SIZE: usize = 4;

/// Length-prefix frame codec.
///
/// Keeps partial read state so a non-blocking stream can be drained in as
/// many `read` calls as the kernel needs.
#[derive(Debug)]
pub struct FrameCodec {
    state: ReadState,
    buffer: Vec<u8>,
    /// Maximum allowed message size (anti-OOM protection)
    max_size: usize,
    frames_decoded: u64,
    frames_rejected: u64,
}

#[derive(Debug, Clone, Copy)]
enum ReadState {
    ReadingLength { bytes_read: usize },
    ReadingBody { expected_len: usize, bytes_read: usize },
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::ReadingLength { bytes_read: 0 }
    }
}

impl FrameCodec {
    pub fn new(max_size: usize) -> Self {
        Self {
            state: ReadState::default(),
            buffer: vec![0u8; FRAME_HEADER_SIZE],
            max_size,
            frames_decoded: 0,
            frames_rejected: 0,
        }
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Frames rejected for exceeding `max_size`.
    pub fn frames_rejected(&self) -> u64 {
        self.frames_rejected
    }

    /// Append `[length: u32 BE][payload]` to `buf`.
    pub fn encode_into(payload: &[u8], buf: &mut Vec<u8>) {
        let len = payload.len() as u32;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(payload);
    }

    /// Try to decode a complete frame from the reader.
    ///
    /// Returns:
    /// - `Ok(Some(data))` - a complete frame body
    /// - `Ok(None)` - need more data (WouldBlock)
    /// - `Err(e)` - I/O error, oversized frame or closed stream
    pub fn decode<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<Option<Vec<u8>>> {
        loop {
            match self.state {
                ReadState::ReadingLength { bytes_read } => {
                    match reader.read(&mut self.buffer[bytes_read..FRAME_HEADER_SIZE]) {
                        Ok(0) => {
                            let reason = if bytes_read == 0 {
                                "connection closed"
                            } else {
                                "incomplete frame header"
                            };
                            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, reason));
                        }
                        Ok(n) => {
                            let total = bytes_read + n;
                            if total < FRAME_HEADER_SIZE {
                                self.state = ReadState::ReadingLength { bytes_read: total };
                                continue;
                            }

                            let len = u32::from_be_bytes([
                                self.buffer[0],
                                self.buffer[1],
                                self.buffer[2],
                                self.buffer[3],
                            ]) as usize;

                            if len > self.max_size {
                                self.frames_rejected += 1;
                                self.state = ReadState::default();
                                return Err(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!("frame too large: {} bytes (max {})", len, self.max_size),
                                ));
                            }

                            if len == 0 {
                                self.frames_decoded += 1;
                                self.state = ReadState::default();
                                return Ok(Some(Vec::new()));
                            }

                            self.buffer.resize(len, 0);
                            self.state = ReadState::ReadingBody {
                                expected_len: len,
                                bytes_read: 0,
                            };
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            self.state = ReadState::ReadingLength { bytes_read };
                            return Ok(None);
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                }

                ReadState::ReadingBody {
                    expected_len,
                    bytes_read,
                } => match reader.read(&mut self.buffer[bytes_read..expected_len]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "incomplete frame body",
                        ));
                    }
                    Ok(n) => {
                        let total = bytes_read + n;
                        if total < expected_len {
                            self.state = ReadState::ReadingBody {
                                expected_len,
                                bytes_read: total,
                            };
                            continue;
                        }

                        let message = self.buffer[..expected_len].to_vec();
                        self.frames_decoded += 1;
                        self.buffer.resize(FRAME_HEADER_SIZE, 0);
                        self.state = ReadState::default();
                        return Ok(Some(message));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        self.state = ReadState::ReadingBody {
                            expected_len,
                            bytes_read,
                        };
                        return Ok(None);
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                },
            }
        }
    }
}

/// Encode message parts into a frame body.
pub fn encode_multipart<P: AsRef<[u8]>>(parts: &[P]) -> io::Result<Vec<u8>> {
    let count = u16::try_from(parts.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many message parts"))?;
    let total: usize = parts
        .iter()
        .map(|p| PART_LEN_SIZE + p.as_ref().len())
        .sum();
    let mut body = Vec::with_capacity(PART_COUNT_SIZE + total);
    body.extend_from_slice(&count.to_be_bytes());
    for part in parts {
        let part = part.as_ref();
        let len = u32::try_from(part.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message part too large"))?;
        body.extend_from_slice(&len.to_be_bytes());
        body.extend_from_slice(part);
    }
    Ok(body)
}

/// Encode message parts as a complete length-prefixed frame, appended to `buf`.
pub fn encode_multipart_frame<P: AsRef<[u8]>>(parts: &[P], buf: &mut Vec<u8>) -> io::Result<()> {
    let body = encode_multipart(parts)?;
    FrameCodec::encode_into(&body, buf);
    Ok(())
}

/// Split a frame body back into its parts.
pub fn decode_multipart(body: &[u8]) -> io::Result<Vec<Vec<u8>>> {
    let invalid = |reason: &str| io::Error::new(io::ErrorKind::InvalidData, reason.to_owned());

    if body.len() < PART_COUNT_SIZE {
        return Err(invalid("missing part count"));
    }
    let count = u16::from_be_bytes([body[0], body[1]]) as usize;
    let mut offset = PART_COUNT_SIZE;
    let mut parts = Vec::with_capacity(count.min(64));

    for _ in 0..count {
        if body.len() - offset < PART_LEN_SIZE {
            return Err(invalid("truncated part length"));
        }
        let len = u32::from_be_bytes([
            body[offset],
            body[offset + 1],
            body[offset + 2],
            body[offset + 3],
        ]) as usize;
        offset += PART_LEN_SIZE;
        if body.len() - offset < len {
            return Err(invalid("truncated part body"));
        }
        parts.push(body[offset..offset + len].to_vec());
        offset += len;
    }

    if offset != body.len() {
        return Err(invalid("trailing bytes after last part"));
    }
    Ok(parts)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per call, then WouldBlock.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        budget: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.budget == 0 || self.pos == self.data.len() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.budget -= 1;
            let n = self.chunk.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_encode_into() {
        let mut buf = Vec::new();
        FrameCodec::encode_into(b"hello", &mut buf);
        assert_eq!(&buf[..4], &5u32.to_be_bytes());
        assert_eq!(&buf[4..], b"hello");
    }

    #[test]
    fn test_decode_multiple() {
        let mut codec = FrameCodec::new(1024);
        let mut buf = Vec::new();
        FrameCodec::encode_into(b"first", &mut buf);
        FrameCodec::encode_into(b"", &mut buf);
        FrameCodec::encode_into(b"third", &mut buf);
        let mut cursor = Cursor::new(buf);

        assert_eq!(codec.decode(&mut cursor).unwrap(), Some(b"first".to_vec()));
        assert_eq!(codec.decode(&mut cursor).unwrap(), Some(Vec::new()));
        assert_eq!(codec.decode(&mut cursor).unwrap(), Some(b"third".to_vec()));
        assert_eq!(codec.frames_decoded(), 3);

        let eof = codec.decode(&mut cursor).unwrap_err();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_decode_too_large() {
        let mut codec = FrameCodec::new(4);
        let mut buf = Vec::new();
        FrameCodec::encode_into(b"oversized", &mut buf);
        let err = codec.decode(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(codec.frames_rejected(), 1);
    }

    #[test]
    fn test_decode_resumes_after_would_block() {
        let mut data = Vec::new();
        FrameCodec::encode_into(b"split across reads", &mut data);
        let mut reader = Trickle {
            data,
            pos: 0,
            chunk: 3,
            budget: 2,
        };
        let mut codec = FrameCodec::new(1024);

        assert_eq!(codec.decode(&mut reader).unwrap(), None);
        assert_eq!(codec.frames_decoded(), 0);

        reader.budget = usize::MAX;
        assert_eq!(
            codec.decode(&mut reader).unwrap(),
            Some(b"split across reads".to_vec())
        );
        assert_eq!(codec.frames_decoded(), 1);
    }

    #[test]
    fn test_multipart_frame_through_codec() {
        let mut wire = Vec::new();
        let parts: [&[u8]; 3] = [b"foo", b"tcp://10.0.0.1:4000", b""];
        encode_multipart_frame(&parts, &mut wire).unwrap();

        let mut codec = FrameCodec::new(1024);
        let body = codec.decode(&mut Cursor::new(wire)).unwrap().unwrap();
        let parts = decode_multipart(&body).unwrap();
        assert_eq!(
            parts,
            vec![b"foo".to_vec(), b"tcp://10.0.0.1:4000".to_vec(), Vec::new()]
        );
    }

    #[test]
    fn test_decode_multipart_rejects_bad_bodies() {
        assert!(decode_multipart(&[]).is_err());
        // claims one part of 10 bytes, carries 2
        assert!(decode_multipart(&[0, 1, 0, 0, 0, 10, b'a', b'b']).is_err());
        // trailing garbage
        assert!(decode_multipart(&[0, 0, 0xff]).is_err());
        assert_eq!(decode_multipart(&[0, 0]).unwrap(), Vec::<Vec<u8>>::new());
    }
}
